//! Shock absorber parameters and the stabiliser.
//!
//! `shocks2` beams switch between inbound and outbound springs and dampers
//! by the sign of the length rate and grow progressively stiffer towards
//! the ends of their travel. `shocks3` beams instead split damping into a
//! slow and a fast regime around a split velocity. Active (`L`/`R`)
//! shocks are shortened or lengthened by the stabiliser to level the
//! chassis roll.

use sim_types::constants::{DEFAULT_DAMP, DEFAULT_SPRING, STAB_RATE};

use crate::beam::Beam;

/// Role of a `shocks` beam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShockRole {
    /// Passive.
    #[default]
    Normal,
    /// Stabiliser, lengthened for a positive request.
    ActiveRight,
    /// Stabiliser, shortened for a positive request.
    ActiveLeft,
}

/// Auxiliary data of a shock beam.
#[derive(Debug, Clone, PartialEq)]
pub struct Shock {
    /// Beam this belongs to.
    pub beam: usize,
    /// Stabiliser role.
    pub role: ShockRole,
    /// Soft bump bounds (`shocks2` option `s`).
    pub soft_bump: bool,
    /// Inbound spring.
    pub spring_in: f64,
    /// Inbound damping.
    pub damp_in: f64,
    /// Outbound spring.
    pub spring_out: f64,
    /// Outbound damping.
    pub damp_out: f64,
    /// Inbound spring progression.
    pub sprog_in: f64,
    /// Inbound damping progression.
    pub dprog_in: f64,
    /// Outbound spring progression.
    pub sprog_out: f64,
    /// Outbound damping progression.
    pub dprog_out: f64,
    /// Inbound split velocity.
    pub split_in: f64,
    /// Inbound slow-regime damping factor.
    pub dslow_in: f64,
    /// Inbound fast-regime damping factor.
    pub dfast_in: f64,
    /// Outbound split velocity.
    pub split_out: f64,
    /// Outbound slow-regime damping factor.
    pub dslow_out: f64,
    /// Outbound fast-regime damping factor.
    pub dfast_out: f64,
    /// Bump-stop spring.
    pub sbd_spring: f64,
    /// Bump-stop damping.
    pub sbd_damp: f64,
}

impl Shock {
    /// Shock on `beam` with the default bump stop and no progression.
    #[must_use]
    pub fn new(beam: usize) -> Self {
        Self {
            beam,
            role: ShockRole::Normal,
            soft_bump: false,
            spring_in: 0.0,
            damp_in: 0.0,
            spring_out: 0.0,
            damp_out: 0.0,
            sprog_in: 0.0,
            dprog_in: 0.0,
            sprog_out: 0.0,
            dprog_out: 0.0,
            split_in: 0.0,
            dslow_in: 0.0,
            dfast_in: 0.0,
            split_out: 0.0,
            dslow_out: 0.0,
            dfast_out: 0.0,
            sbd_spring: DEFAULT_SPRING,
            sbd_damp: DEFAULT_DAMP,
        }
    }

    /// `k` and `d` of a `shocks2` beam.
    #[must_use]
    pub fn shock2_spring_damp(&self, beam: &Beam, diff: f64, v: f64) -> (f64, f64) {
        let l = beam.rest_length;
        let long = beam.long_bound;
        let short = beam.short_bound;
        let progression = |bound: f64, x: f64| -> f64 {
            if bound == 0.0 {
                1.0
            } else {
                let f = x / (bound * l);
                (f * f).min(1.0)
            }
        };
        let outbound = || {
            let f = progression(long, diff);
            let k = self.spring_out;
            let d = self.damp_out;
            (k + self.sprog_out * k * f, d + self.dprog_out * d * f)
        };
        let inbound = || {
            let f = progression(short, diff);
            let k = self.spring_in;
            let d = self.damp_in;
            (k + self.sprog_in * k * f, d + self.dprog_in * d * f)
        };

        let (mut k, mut d) = if v > 0.0 { outbound() } else { inbound() };
        let beyond = diff > long * l || diff < -short * l;
        if self.soft_bump {
            let lep = l * 0.8;
            let long_pre = long * lep;
            let short_pre = -short * lep;
            if diff > long_pre {
                (k, d) = outbound();
                let f = progression(long, (diff - long_pre) * 5.0);
                k += (k + 100.0) * self.sprog_out * f;
                d += (d + 100.0) * self.dprog_out * f;
                if v < 0.0 {
                    (k, d) = (self.spring_in, self.damp_in);
                }
            } else if diff < short_pre {
                (k, d) = inbound();
                let f = progression(short, (diff - short_pre) * 5.0);
                // Historical: the bump term uses the outbound progression.
                k += (k + 100.0) * self.sprog_out * f;
                d += (d + 100.0) * self.dprog_out * f;
                if v > 0.0 {
                    (k, d) = (self.spring_out, self.damp_out);
                }
            }
            if beyond {
                k = k.max(self.sbd_spring);
                d = d.max(self.sbd_damp);
            }
        } else if beyond {
            k = self.sbd_spring;
            d = self.sbd_damp;
        }
        (k, d)
    }

    /// `k` and `d` of a `shocks3` beam, starting from the beam's own values.
    #[must_use]
    pub fn shock3_spring_damp(&self, beam: &Beam, diff: f64, v: f64) -> (f64, f64) {
        let l = beam.rest_length;
        let (mut k, mut d) = (beam.k, beam.d);
        if diff > beam.long_bound * l {
            let interp = diff - beam.long_bound * l;
            k += (self.sbd_spring - k) * interp;
            d += (self.sbd_damp - d) * interp;
        } else if diff < -beam.short_bound * l {
            let interp = -diff - beam.short_bound * l;
            k += (self.sbd_spring - k) * interp;
            d += (self.sbd_damp - d) * interp;
        } else if v > 0.0 {
            let v = v.abs().clamp(0.15, 20.0);
            k = self.spring_out;
            d = (self.damp_out * self.dslow_out * v.min(self.split_out)
                + self.damp_out * self.dfast_out * (v - self.split_out).max(0.0))
                / v;
        } else if v < 0.0 {
            let v = v.abs().clamp(0.15, 20.0);
            k = self.spring_in;
            d = (self.damp_in * self.dslow_in * v.min(self.split_in)
                + self.damp_in * self.dfast_in * (v - self.split_in).max(0.0))
                / v;
        }
        (k, d)
    }
}

/// Roll-levelling state shared by the active shocks of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Stabilizer {
    /// -1, 0 or 1.
    pub request: i8,
    /// Current length offset as a fraction of the spawn length.
    pub ratio: f64,
    /// Seconds until the next adjustment.
    pub sleep: f64,
}

impl Stabilizer {
    /// Move the active shocks one substep towards the request.
    pub fn apply(&mut self, dt: f64, shocks: &[Shock], beams: &mut [Beam]) {
        if self.request == 0 {
            return;
        }
        if (self.request == 1 && self.ratio < 0.1) || (self.request == -1 && self.ratio > -0.1) {
            self.ratio += f64::from(self.request) * dt * STAB_RATE;
        }
        for shock in shocks {
            let Some(beam) = beams.get_mut(shock.beam) else {
                continue;
            };
            match shock.role {
                ShockRole::ActiveRight => beam.rest_length = beam.ref_length * (1.0 + self.ratio),
                ShockRole::ActiveLeft => beam.rest_length = beam.ref_length * (1.0 - self.ratio),
                ShockRole::Normal => {}
            }
        }
    }

    /// Choose a new request from the chassis roll (radians).
    ///
    /// Returns whether the air pump should run.
    pub fn adjust(&mut self, roll: f64, elapsed: f64) -> bool {
        self.sleep -= elapsed;
        if roll.abs() > 0.2 {
            self.sleep = -1.0;
        }
        if roll.abs() > 0.01 && self.sleep < 0.0 {
            if roll > 0.0 && self.request != -1 {
                self.request = 1;
            } else if roll < 0.0 && self.request != 1 {
                self.request = -1;
            } else {
                self.request = 0;
                self.sleep = 3.0;
            }
        } else {
            self.request = 0;
        }
        self.request != 0 && self.ratio.abs() < 0.1
    }
}
