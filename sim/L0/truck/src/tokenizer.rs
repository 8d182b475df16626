//! Line tokenizer and lenient number parsing.
//!
//! Whitespace, `,`, `:` and `|` all separate arguments and runs of them
//! collapse into one. Numbers are read the way the format always read them:
//! the longest numeric prefix counts, trailing garbage only earns a warning.

/// Maximum number of arguments kept per line; the rest is dropped.
pub const LINE_MAX_ARGS: usize = 100;

/// True for argument separators.
#[must_use]
pub fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | ':' | '|')
}

/// Split a line into at most [`LINE_MAX_ARGS`] arguments.
#[must_use]
pub fn split_args(line: &str) -> Vec<&str> {
    line.split(is_separator)
        .filter(|s| !s.is_empty())
        .take(LINE_MAX_ARGS)
        .collect()
}

/// Split on the given characters only, trimming and dropping empty pieces.
#[must_use]
pub fn split_on<'a>(line: &'a str, seps: &[char]) -> Vec<&'a str> {
    line.split(|c| seps.contains(&c))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Outcome of parsing a numeric argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lenient<'a, T> {
    /// The whole argument was a number.
    Exact(T),
    /// A numeric prefix followed by the returned garbage.
    Trailing(T, &'a str),
    /// No numeric prefix at all.
    Invalid,
}

impl<T: Copy + Default> Lenient<'_, T> {
    /// The parsed value, or `T::default()` when invalid.
    #[must_use]
    pub fn value(&self) -> T {
        match *self {
            Self::Exact(v) | Self::Trailing(v, _) => v,
            Self::Invalid => T::default(),
        }
    }
}

fn digits_len(bytes: &[u8], from: usize) -> usize {
    bytes[from..].iter().take_while(|b| b.is_ascii_digit()).count()
}

/// Length of the longest prefix of `s` that reads as a decimal float.
fn float_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    let int_digits = digits_len(bytes, i);
    i += int_digits;
    let mut frac_digits = 0;
    if bytes.get(i) == Some(&b'.') {
        frac_digits = digits_len(bytes, i + 1);
        i += 1 + frac_digits;
    }
    if int_digits + frac_digits == 0 {
        return 0;
    }
    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let exp_digits = digits_len(bytes, j);
        if exp_digits > 0 {
            i = j + exp_digits;
        }
    }
    i
}

/// Length of the longest prefix of `s` that reads as a decimal integer.
fn int_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let sign = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let digits = digits_len(bytes, sign);
    if digits == 0 {
        0
    } else {
        sign + digits
    }
}

/// Parse a float the lenient way.
#[must_use]
pub fn parse_float(s: &str) -> Lenient<'_, f64> {
    let len = float_prefix_len(s);
    match s[..len].parse::<f64>() {
        Ok(v) if len == s.len() => Lenient::Exact(v),
        Ok(v) => Lenient::Trailing(v, &s[len..]),
        Err(_) => Lenient::Invalid,
    }
}

/// Parse an integer the lenient way.
#[must_use]
pub fn parse_int(s: &str) -> Lenient<'_, i64> {
    let len = int_prefix_len(s);
    match s[..len].parse::<i64>() {
        Ok(v) if len == s.len() => Lenient::Exact(v),
        Ok(v) => Lenient::Trailing(v, &s[len..]),
        Err(_) => Lenient::Invalid,
    }
}

/// Float prefix of `s`, 0 when there is none.
#[must_use]
pub fn float_or_zero(s: &str) -> f64 {
    parse_float(s).value()
}

/// Boolean as the format spells it: `true`, `yes` or `1` prefixes are true.
#[must_use]
pub fn parse_bool(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    lower.starts_with("true") || lower.starts_with("yes") || lower.starts_with('1')
}
