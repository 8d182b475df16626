//! Typed argument accessors.
//!
//! Every accessor reports anomalies against the line being parsed. Argument
//! numbers in messages are 1-based; on directive lines argument 0 is the
//! keyword itself.

use sim_types::Severity;

use super::Parser;
use crate::document::{Braking, Inertia, Propulsion, WheelSide};
use crate::node_ref::{NodeList, NodeListItem, NodeRef};
use crate::tokenizer::{self, Lenient};

impl Parser {
    /// False (with a warning) when fewer than `required` arguments are present.
    pub(super) fn check_args(&mut self, args: &[&str], required: usize) -> bool {
        if args.len() < required {
            self.report(
                Severity::Warning,
                format!(
                    "Not enough arguments, {required} required, got {}. Skipping line.",
                    args.len()
                ),
            );
            return false;
        }
        true
    }

    pub(super) fn arg_float(&mut self, args: &[&str], i: usize) -> f64 {
        let Some(text) = args.get(i) else { return 0.0 };
        match tokenizer::parse_float(text) {
            Lenient::Exact(v) => v,
            Lenient::Trailing(v, rest) => {
                self.report(
                    Severity::Warning,
                    format!(
                        "Argument [{}] (type: float) has invalid trailing characters (\"{rest}\")",
                        i + 1
                    ),
                );
                v
            }
            Lenient::Invalid => {
                self.report(
                    Severity::Error,
                    format!("Argument [{}] (\"{text}\") is not valid float", i + 1),
                );
                0.0
            }
        }
    }

    pub(super) fn arg_int(&mut self, args: &[&str], i: usize) -> i64 {
        let Some(text) = args.get(i) else { return 0 };
        match tokenizer::parse_int(text) {
            Lenient::Exact(v) => v,
            Lenient::Trailing(v, _) => {
                self.report(
                    Severity::Warning,
                    format!("Integer argument [{}] has invalid trailing characters", i + 1),
                );
                v
            }
            Lenient::Invalid => {
                self.report(
                    Severity::Error,
                    format!("Argument [{}] is not valid integer", i + 1),
                );
                0
            }
        }
    }

    pub(super) fn arg_i32(&mut self, args: &[&str], i: usize) -> i32 {
        clamp_i32(self.arg_int(args, i))
    }

    pub(super) fn arg_u32(&mut self, args: &[&str], i: usize) -> u32 {
        u32::try_from(self.arg_int(args, i).max(0)).unwrap_or(u32::MAX)
    }

    pub(super) fn opt_float(&mut self, args: &[&str], i: usize) -> Option<f64> {
        (i < args.len()).then(|| self.arg_float(args, i))
    }

    pub(super) fn opt_int(&mut self, args: &[&str], i: usize) -> Option<i64> {
        (i < args.len()).then(|| self.arg_int(args, i))
    }

    /// Parse a node reference as written.
    pub(super) fn node_ref(&mut self, text: &str) -> NodeRef {
        let text = text.trim();
        let number = match tokenizer::parse_int(text) {
            Lenient::Exact(v) | Lenient::Trailing(v, _) => Some(v),
            Lenient::Invalid => None,
        };
        match number {
            Some(n) if n < 0 => {
                // Historical: negative node numbers are read as their
                // absolute value.
                let abs = n.unsigned_abs();
                self.report(
                    Severity::Warning,
                    format!(
                        "Invalid negative node number {n}, parsing as {abs} for backwards compatibility"
                    ),
                );
                let mut r = NodeRef::numbered(u32::try_from(abs).unwrap_or(u32::MAX));
                r.line = self.line;
                r
            }
            _ => NodeRef {
                text: text.to_owned(),
                number: number.and_then(|n| u32::try_from(n).ok()),
                resolved: None,
                line: self.line,
            },
        }
    }

    pub(super) fn arg_node(&mut self, args: &[&str], i: usize) -> NodeRef {
        let text = args.get(i).copied().unwrap_or_default();
        self.node_ref(text)
    }

    pub(super) fn arg_nodes<const N: usize>(&mut self, args: &[&str], from: usize) -> [NodeRef; N] {
        std::array::from_fn(|k| self.arg_node(args, from + k))
    }

    /// `9999` stands for "no rigidity node".
    pub(super) fn arg_rigidity_node(&mut self, args: &[&str], i: usize) -> Option<NodeRef> {
        (args.get(i).copied() != Some("9999")).then(|| self.arg_node(args, i))
    }

    pub(super) fn arg_braking(&mut self, args: &[&str], i: usize) -> Braking {
        let code = self.arg_int(args, i);
        Braking::from_code(code).unwrap_or_else(|| {
            self.report(
                Severity::Error,
                format!("Bad value of param ~{} (braking), using 0 (no braking)", i + 1),
            );
            Braking::None
        })
    }

    pub(super) fn arg_propulsion(&mut self, args: &[&str], i: usize) -> Propulsion {
        let code = self.arg_int(args, i);
        Propulsion::from_code(code).unwrap_or_else(|| {
            self.report(
                Severity::Error,
                format!(
                    "Bad value of param ~{} (propulsion), using 0 (no propulsion)",
                    i + 1
                ),
            );
            Propulsion::None
        })
    }

    pub(super) fn arg_wheel_side(&mut self, args: &[&str], i: usize) -> WheelSide {
        let c = arg_char(args, i).unwrap_or(' ');
        if c == 'r' {
            return WheelSide::Right;
        }
        if c != 'l' {
            self.report(
                Severity::Warning,
                format!(
                    "Bad arg~{} 'side' (value: {c}), parsing as 'l' for backwards compatibility.",
                    i + 1
                ),
            );
        }
        WheelSide::Left
    }

    /// Up to four inertia arguments starting at `from`.
    pub(super) fn arg_inertia(&mut self, args: &[&str], from: usize) -> Inertia {
        let mut inertia = Inertia::default();
        if let Some(v) = self.opt_float(args, from) {
            inertia.start_delay = v;
        }
        if let Some(v) = self.opt_float(args, from + 1) {
            inertia.stop_delay = v;
        }
        inertia.start_function = arg_str(args, from + 2);
        inertia.stop_function = arg_str(args, from + 3);
        inertia
    }

    /// A list of singles and `a-b` ranges.
    ///
    /// A token is a range only when both sides of the dash read as integers;
    /// anything else is a single reference.
    pub(super) fn node_list<'a>(&mut self, tokens: impl IntoIterator<Item = &'a str>) -> NodeList {
        let mut list = NodeList::default();
        for token in tokens {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let range = token.split_once('-').and_then(|(a, b)| {
                let a = a.trim().parse::<u32>().ok()?;
                let b = b.trim().parse::<u32>().ok()?;
                Some((a, b))
            });
            let item = match range {
                Some((a, b)) => {
                    let mut start = NodeRef::numbered(a);
                    let mut end = NodeRef::numbered(b);
                    start.line = self.line;
                    end.line = self.line;
                    NodeListItem::Range(start, end)
                }
                None => NodeListItem::Single(self.node_ref(token)),
            };
            list.items.push(item);
        }
        list
    }
}

/// Argument `i` as an owned string, empty when absent.
pub(super) fn arg_str(args: &[&str], i: usize) -> String {
    args.get(i).map(|s| (*s).to_owned()).unwrap_or_default()
}

/// First character of argument `i`.
pub(super) fn arg_char(args: &[&str], i: usize) -> Option<char> {
    args.get(i).and_then(|s| s.chars().next())
}

pub(super) fn arg_bool(args: &[&str], i: usize) -> bool {
    args.get(i).is_some_and(|s| tokenizer::parse_bool(s))
}

pub(super) fn clamp_i32(v: i64) -> i32 {
    i32::try_from(v).unwrap_or(if v < 0 { i32::MIN } else { i32::MAX })
}
