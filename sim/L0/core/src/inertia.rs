//! Delayed response of command keys.
//!
//! A key with inertia does not jump to its commanded value; each substep it
//! moves towards it by a step read from a response curve. The curve is
//! sampled at `delay·t`, where `t` is the time since the output last matched
//! the input, so the step grows while the key is held.

use sim_truck::document::records::Inertia;
use sim_truck::document::InertiaDefaults;

/// Built-in response curves.
///
/// Curves map normalised time in `[0, 1]` to a step size in thousandths of
/// full travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCurve {
    /// Constant step.
    Constant,
    /// Step grows linearly with time.
    Linear,
}

impl ResponseCurve {
    /// Look up a curve by name. `""`, `"/"` and `"-"` are placeholders.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "constant" => Some(Self::Constant),
            "linear" => Some(Self::Linear),
            _ => None,
        }
    }

    /// Name as written in documents.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Linear => "linear",
        }
    }

    fn sample(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        let y = match self {
            Self::Constant => 1.0,
            Self::Linear => t,
        };
        y * 0.001
    }
}

fn is_placeholder(name: &str) -> bool {
    matches!(name.trim(), "" | "/" | "-")
}

/// Inertia filter state of one key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyInertia {
    start_delay: f64,
    stop_delay: f64,
    start: Option<ResponseCurve>,
    stop: Option<ResponseCurve>,
    last_output: f64,
    time: f64,
}

impl Default for KeyInertia {
    fn default() -> Self {
        Self::passthrough()
    }
}

impl KeyInertia {
    /// Filter that returns its input unchanged.
    #[must_use]
    pub fn passthrough() -> Self {
        Self {
            start_delay: 0.0,
            stop_delay: 0.0,
            start: None,
            stop: None,
            last_output: 0.0,
            time: 0.0,
        }
    }

    /// Filter with explicit delays and curve names.
    ///
    /// Unknown curve names leave that side without a curve, which turns the
    /// whole filter into a passthrough.
    #[must_use]
    pub fn new(start_delay: f64, stop_delay: f64, start_fn: &str, stop_fn: &str) -> Self {
        let mut k = Self::passthrough();
        if start_delay > 0.0 {
            k.start_delay = start_delay;
        } else {
            tracing::debug!(start_delay, "inertia start delay should be > 0");
        }
        if stop_delay > 0.0 {
            k.stop_delay = stop_delay;
        } else {
            tracing::debug!(stop_delay, "inertia stop delay should be > 0");
        }
        k.start = ResponseCurve::from_name(start_fn);
        k.stop = ResponseCurve::from_name(stop_fn);
        if k.start.is_none() {
            tracing::warn!(function = start_fn, "inertia start function not found");
        }
        if k.stop.is_none() {
            tracing::warn!(function = stop_fn, "inertia stop function not found");
        }
        k
    }

    /// Build the filter for a record, falling back to `set_inertia_defaults`.
    #[must_use]
    pub fn from_record(inertia: &Inertia, defaults: &InertiaDefaults) -> Self {
        let start_fn = if is_placeholder(&inertia.start_function) { "" } else { &inertia.start_function };
        let stop_fn = if is_placeholder(&inertia.stop_function) { "" } else { &inertia.stop_function };
        if inertia.start_delay != 0.0 && inertia.stop_delay != 0.0 {
            Self::new(inertia.start_delay, inertia.stop_delay, start_fn, stop_fn)
        } else if defaults.start_delay > 0.0 || defaults.stop_delay > 0.0 {
            Self::new(
                defaults.start_delay,
                defaults.stop_delay,
                &defaults.start_function,
                &defaults.stop_function,
            )
        } else {
            Self::passthrough()
        }
    }

    /// True when the filter changes its input.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.start.is_some() && self.stop.is_some()
    }

    /// Inline inertia record reproducing this filter; empty for a passthrough.
    #[must_use]
    pub fn to_record(&self) -> Inertia {
        match (self.start, self.stop) {
            (Some(start), Some(stop)) => Inertia {
                start_delay: self.start_delay,
                stop_delay: self.stop_delay,
                start_function: start.name().to_owned(),
                stop_function: stop.name().to_owned(),
            },
            _ => Inertia::default(),
        }
    }

    /// Filter `input` over one step of `dt`.
    pub fn apply(&mut self, input: f64, dt: f64) -> f64 {
        let (Some(start), Some(stop)) = (self.start, self.stop) else {
            return input;
        };
        let last = self.last_output;
        let mut out = last;
        let rel_diff = input.abs() - last.abs();
        let abs_diff = input - last;
        if abs_diff.abs() < 0.002 {
            self.time = 0.0;
        }
        self.time += dt;
        let start_step = start.sample(self.start_delay * self.time);
        let stop_step = stop.sample(self.stop_delay * self.time);
        if abs_diff > 0.0 {
            if rel_diff > 0.0 {
                out = last + start_step;
            }
            if rel_diff < 0.0 {
                out = last + stop_step;
            }
            out = out.min(input);
        }
        if abs_diff < 0.0 {
            if rel_diff > 0.0 {
                out = last - start_step;
            }
            if rel_diff < 0.0 {
                out = last - stop_step;
            }
            out = out.max(input);
        }
        self.last_output = out;
        out
    }

    /// Forget the filter history.
    pub fn reset(&mut self) {
        self.last_output = 0.0;
        self.time = 0.0;
    }
}
