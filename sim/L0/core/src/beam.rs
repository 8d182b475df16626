//! Two-node spring-damper constraints.
//!
//! A beam pulls its endpoints towards the rest length `L` with
//! `s = -k·(|p1 - p2| - L) - d·v`, where `v` is the rate of change of the
//! length. Normal beams deform plastically once `|s|` passes the yield
//! stress and break once it passes their strength. The bounded variants
//! change `k` and `d` before the force is evaluated:
//!
//! | kind | behaviour |
//! |---|---|
//! | `Shock1` | blends towards the default spring outside its travel |
//! | `Shock2` / `Shock3` | see [`crate::shock`] |
//! | `Rope` | slack when compressed |
//! | `Support` | slack when extended, breaks past its limit |
//! | `Trigger` | no force, fires actions, see [`crate::trigger`] |

use sim_types::constants::{DEFAULT_DAMP, DEFAULT_SPRING, MIN_BEAM_LENGTH, SUPPORT_BEAM_LIMIT};
use sim_types::{ActorId, NodeIdx, Vec3};

/// Bounded-type tag of a beam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundedKind {
    /// Plain beam with plastic deformation.
    #[default]
    Normal,
    /// Only pulls.
    Rope,
    /// Only pushes.
    Support,
    /// `shocks` and generated wheel beams.
    Shock1,
    /// `shocks2`.
    Shock2,
    /// `shocks3`.
    Shock3,
    /// `triggers`.
    Trigger,
}

/// Structural type of a beam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BeamType {
    /// Regular beam.
    #[default]
    Normal,
    /// Length driven by a hydro, command, shock or trigger.
    Hydro,
    /// Invisible helper beam (wheel rigidity).
    Virtual,
}

/// A beam of an actor.
#[derive(Debug, Clone, PartialEq)]
pub struct Beam {
    /// Endpoints. With [`Beam::remote`] set, the second index is a node of
    /// the remote actor.
    pub nodes: [NodeIdx; 2],
    /// Actor owning the second endpoint, for inter-actor beams.
    pub remote: Option<ActorId>,
    /// Rest length `L`.
    pub rest_length: f64,
    /// Rest length at spawn.
    pub ref_length: f64,
    /// Spring constant.
    pub k: f64,
    /// Damping.
    pub d: f64,
    /// Last evaluated stress.
    pub stress: f64,
    /// Compression yield stress.
    pub max_pos_stress: f64,
    /// Extension yield stress, negative.
    pub max_neg_stress: f64,
    /// `min(max_pos, -max_neg, strength)`; below it no deformation test runs.
    pub min_max_stress: f64,
    /// Breaking stress.
    pub strength: f64,
    /// Breaking stress at spawn.
    pub initial_strength: f64,
    /// Yield stress at spawn.
    pub default_deform: f64,
    /// Share of the deformation that is elastic.
    pub plastic_coef: f64,
    /// Bounded variant.
    pub bounded: BoundedKind,
    /// Structural type.
    pub beam_type: BeamType,
    /// Allowed compression as a fraction of `L`.
    pub short_bound: f64,
    /// Allowed extension as a fraction of `L`; for supports the break limit.
    pub long_bound: f64,
    /// Detacher group; negative groups are minor members of `|group|`.
    pub detacher_group: i32,
    /// Broke under load.
    pub broken: bool,
    /// Excluded from the force pass.
    pub disabled: bool,
    /// Index into the actor's shock array for shocks, or into its trigger
    /// array for triggers.
    pub aux: Option<usize>,
    /// Hidden from the skeleton view.
    pub invisible: bool,
}

impl Beam {
    /// Beam between `a` and `b` with the built-in defaults.
    #[must_use]
    pub fn new(a: NodeIdx, b: NodeIdx) -> Self {
        use sim_types::constants::{BEAM_BREAK, BEAM_DEFORM};
        Self {
            nodes: [a, b],
            remote: None,
            rest_length: 0.0,
            ref_length: 0.0,
            k: DEFAULT_SPRING,
            d: DEFAULT_DAMP,
            stress: 0.0,
            max_pos_stress: BEAM_DEFORM,
            max_neg_stress: -BEAM_DEFORM,
            min_max_stress: BEAM_DEFORM.min(BEAM_BREAK),
            strength: BEAM_BREAK,
            initial_strength: BEAM_BREAK,
            default_deform: BEAM_DEFORM,
            plastic_coef: 0.0,
            bounded: BoundedKind::Normal,
            beam_type: BeamType::Normal,
            short_bound: 0.0,
            long_bound: 0.0,
            detacher_group: 0,
            broken: false,
            disabled: false,
            aux: None,
            invisible: false,
        }
    }

    /// Set the yield stress on both sides.
    pub fn set_deform(&mut self, deform: f64) {
        self.default_deform = deform;
        self.max_pos_stress = deform;
        self.max_neg_stress = -deform;
        self.refresh_min_max();
    }

    /// Set the breaking stress, remembering it for repairs.
    pub fn set_strength(&mut self, strength: f64) {
        self.strength = strength;
        self.initial_strength = strength;
        self.refresh_min_max();
    }

    /// Set `L` and the spawn length together.
    pub fn set_length(&mut self, length: f64) {
        self.rest_length = length;
        self.ref_length = length;
    }

    /// True when the second endpoint belongs to another actor.
    #[must_use]
    pub fn is_inter_actor(&self) -> bool {
        self.remote.is_some()
    }

    /// True when the force pass evaluates this beam.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.disabled
    }

    /// Mark broken and disabled.
    pub fn break_apart(&mut self) {
        self.broken = true;
        self.disabled = true;
    }

    /// Undo deformation and breakage.
    pub fn repair(&mut self) {
        self.broken = false;
        self.disabled = false;
        self.rest_length = self.ref_length;
        self.strength = self.initial_strength;
        self.stress = 0.0;
        self.set_deform(self.default_deform);
    }

    /// `k` and `d` after the rope, support and shock1 rules.
    ///
    /// Returns `true` in the third slot when a support beam went past its
    /// break limit.
    #[must_use]
    pub fn bounded_spring_damp(&self, ext: &Extension) -> (f64, f64, bool) {
        let mut k = self.k;
        let mut d = self.d;
        let l = self.rest_length;
        match self.bounded {
            BoundedKind::Shock1 => {
                let interp = if ext.diff > self.long_bound * l {
                    ext.diff - self.long_bound * l
                } else if ext.diff < -self.short_bound * l {
                    -ext.diff - self.short_bound * l
                } else {
                    0.0
                };
                if interp != 0.0 {
                    k += (DEFAULT_SPRING - k) * interp;
                    d += (DEFAULT_DAMP - d) * interp;
                }
            }
            BoundedKind::Support if ext.diff > 0.0 => {
                k = 0.0;
                d *= 0.1;
                let limit = if self.long_bound > 0.0 {
                    self.long_bound
                } else {
                    SUPPORT_BEAM_LIMIT
                };
                return (k, d, ext.diff > l * limit);
            }
            BoundedKind::Rope if ext.diff < 0.0 => {
                k = 0.0;
                d *= 0.1;
            }
            _ => {}
        }
        (k, d, false)
    }

    /// Evaluate the stress for `k` and `d`, deforming the beam when it
    /// yields.
    ///
    /// Returns the stress to apply and whether it exceeds the strength.
    pub fn resolve_stress(&mut self, k: f64, d: f64, ext: &Extension) -> (f64, bool) {
        let diff = ext.diff;
        let mut slen = -k * diff - d * ext.rate;
        self.stress = slen;
        let mut len = slen.abs();
        if len <= self.min_max_stress {
            return (slen, false);
        }
        if self.beam_type == BeamType::Normal && self.bounded != BoundedKind::Shock1 && k != 0.0 {
            if slen > self.max_pos_stress && diff < 0.0 {
                // Compression keeps the strength.
                let yield_length = self.max_pos_stress / k;
                let deform = diff + yield_length * (1.0 - self.plastic_coef);
                let old = self.rest_length;
                self.rest_length = (self.rest_length + deform).max(MIN_BEAM_LENGTH);
                slen -= (slen - self.max_pos_stress) * 0.5;
                len = slen;
                if self.rest_length > 0.0 && old > self.rest_length {
                    self.max_pos_stress *= old / self.rest_length;
                    self.refresh_min_max();
                }
            } else if slen < self.max_neg_stress && diff > 0.0 {
                let yield_length = self.max_neg_stress / k;
                let deform = diff + yield_length * (1.0 - self.plastic_coef);
                let old = self.rest_length;
                self.rest_length += deform;
                slen -= (slen - self.max_neg_stress) * 0.5;
                len = -slen;
                if old > 0.0 && self.rest_length > old {
                    self.max_neg_stress *= self.rest_length / old;
                    self.refresh_min_max();
                }
                self.strength -= deform * k;
            }
        }
        (slen, len > self.strength)
    }

    /// Raise the strength after a break was vetoed.
    pub fn reinforce(&mut self) {
        self.strength = 2.0 * self.min_max_stress;
    }

    fn refresh_min_max(&mut self) {
        self.min_max_stress = self
            .max_pos_stress
            .min(-self.max_neg_stress)
            .min(self.strength);
    }
}

/// Geometry of a beam during one substep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extension {
    /// `p1 - p2`.
    pub delta: Vec3,
    /// `|p1 - p2|`.
    pub length: f64,
    /// `length - L`.
    pub diff: f64,
    /// Rate of change of the length.
    pub rate: f64,
}

impl Extension {
    /// Measure a beam with rest length `rest` between two moving points.
    #[must_use]
    pub fn measure(rest: f64, p1: Vec3, v1: Vec3, p2: Vec3, v2: Vec3) -> Self {
        let delta = p1 - p2;
        let length = delta.norm();
        let rate = if length > 0.0 {
            (v1 - v2).dot(&delta) / length
        } else {
            0.0
        };
        Self {
            delta,
            length,
            diff: length - rest,
            rate,
        }
    }

    /// Force on the first endpoint for a stress `slen`.
    #[must_use]
    pub fn force(&self, slen: f64) -> Vec3 {
        if self.length > 0.0 {
            self.delta * (slen / self.length)
        } else {
            Vec3::zeros()
        }
    }

    /// Spring energy `½·k·Δ²`, the break sound volume.
    #[must_use]
    pub fn energy(&self, k: f64) -> f64 {
        0.5 * k * self.diff * self.diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn beam(k: f64, d: f64, l: f64) -> Beam {
        let mut b = Beam::new(NodeIdx(0), NodeIdx(1));
        b.k = k;
        b.d = d;
        b.set_length(l);
        b
    }

    fn stretched(len: f64, rest: f64) -> Extension {
        Extension::measure(
            rest,
            Vec3::new(len, 0.0, 0.0),
            Vec3::zeros(),
            Vec3::zeros(),
            Vec3::zeros(),
        )
    }

    #[test]
    fn spring_pulls_back_towards_rest_length() {
        let mut b = beam(1000.0, 0.0, 1.0);
        let ext = stretched(1.1, 1.0);
        let (slen, breaks) = b.resolve_stress(b.k, b.d, &ext);
        assert_relative_eq!(slen, -100.0, epsilon = 1e-9);
        assert!(!breaks);
        // p1 sits at +x, the force on it points back to the origin.
        assert!(ext.force(slen).x < 0.0);
    }

    #[test]
    fn damping_opposes_extension_rate() {
        let ext = Extension::measure(
            1.0,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::zeros(),
            Vec3::zeros(),
        );
        assert_relative_eq!(ext.rate, 2.0);
        let mut b = beam(0.0, 5.0, 1.0);
        let (slen, _) = b.resolve_stress(0.0, 5.0, &ext);
        assert_relative_eq!(slen, -10.0);
    }

    #[test]
    fn rope_is_slack_when_compressed() {
        let mut b = beam(1000.0, 10.0, 1.0);
        b.bounded = BoundedKind::Rope;
        let (k, d, _) = b.bounded_spring_damp(&stretched(0.5, 1.0));
        assert_eq!(k, 0.0);
        assert_relative_eq!(d, 1.0);
        let (k, _, _) = b.bounded_spring_damp(&stretched(1.5, 1.0));
        assert_eq!(k, 1000.0);
    }

    #[test]
    fn support_breaks_only_past_its_limit() {
        let mut b = beam(1000.0, 10.0, 1.0);
        b.bounded = BoundedKind::Support;
        b.long_bound = 4.0;
        assert!(!b.bounded_spring_damp(&stretched(4.9, 1.0)).2);
        assert!(b.bounded_spring_damp(&stretched(5.1, 1.0)).2);
        let (k, _, _) = b.bounded_spring_damp(&stretched(0.8, 1.0));
        assert_eq!(k, 1000.0);
    }

    #[test]
    fn support_default_limit() {
        let mut b = beam(1000.0, 10.0, 1.0);
        b.bounded = BoundedKind::Support;
        assert!(!b.bounded_spring_damp(&stretched(4.9, 1.0)).2);
        assert!(b.bounded_spring_damp(&stretched(5.2, 1.0)).2);
    }

    #[test]
    fn shock1_blends_outside_travel() {
        let mut b = beam(100.0, 1.0, 1.0);
        b.bounded = BoundedKind::Shock1;
        b.long_bound = 0.1;
        b.short_bound = 0.1;
        let (k, _, _) = b.bounded_spring_damp(&stretched(1.05, 1.0));
        assert_eq!(k, 100.0);
        let (k, _, _) = b.bounded_spring_damp(&stretched(1.2, 1.0));
        assert_relative_eq!(k, 100.0 + (DEFAULT_SPRING - 100.0) * 0.1, max_relative = 1e-9);
    }

    #[test]
    fn extension_past_yield_lengthens_and_weakens() {
        let mut b = beam(1.0e5, 0.0, 1.0);
        b.set_deform(1000.0);
        b.set_strength(1.0e6);
        let ext = stretched(1.05, 1.0);
        let (slen, breaks) = b.resolve_stress(b.k, b.d, &ext);
        assert!(!breaks);
        assert!(b.rest_length > 1.0);
        assert!(b.strength < 1.0e6);
        assert!(slen < 0.0);
        assert!(b.max_neg_stress < -1000.0);
    }

    #[test]
    fn compression_past_yield_keeps_strength() {
        let mut b = beam(1.0e5, 0.0, 1.0);
        b.set_deform(1000.0);
        b.set_strength(1.0e6);
        let ext = stretched(0.95, 1.0);
        let _ = b.resolve_stress(b.k, b.d, &ext);
        assert!(b.rest_length < 1.0);
        assert_relative_eq!(b.strength, 1.0e6);
        assert!(b.max_pos_stress > 1000.0);
    }

    #[test]
    fn overload_reports_break_and_repair_restores() {
        let mut b = beam(1.0e5, 5.0, 1.0);
        b.set_deform(5.0);
        b.set_strength(10.0);
        let ext = stretched(1.1, 1.0);
        let (_, breaks) = b.resolve_stress(b.k, b.d, &ext);
        assert!(breaks);
        b.break_apart();
        assert!(b.broken && b.disabled);
        b.repair();
        assert!(!b.broken && !b.disabled);
        assert_relative_eq!(b.rest_length, 1.0);
        assert_relative_eq!(b.strength, 10.0);
    }

    #[test]
    fn weak_beam_breaks_before_it_yields() {
        let mut b = beam(1.0e5, 0.0, 1.0);
        b.set_deform(1.0e6);
        b.set_strength(10.0);
        assert_relative_eq!(b.min_max_stress, 10.0);
        let (_, breaks) = b.resolve_stress(b.k, b.d, &stretched(1.01, 1.0));
        assert!(breaks);
        // No plastic deformation below the yield stress.
        assert_relative_eq!(b.rest_length, 1.0);
    }

    #[test]
    fn stress_below_both_thresholds_is_elastic() {
        let mut b = beam(1.0e5, 0.0, 1.0);
        b.set_deform(1.0e6);
        b.set_strength(1.0e4);
        let (slen, breaks) = b.resolve_stress(b.k, b.d, &stretched(1.01, 1.0));
        assert!(!breaks);
        assert_relative_eq!(slen, -1000.0, max_relative = 1e-9);
    }
}
