//! Differentials, the transfer case, and torque distribution to the wheels.

use sim_truck::document::records::DiffType;

use crate::wheel::Wheel;

/// A differential splitting torque between two outputs.
///
/// For wheel differentials the outputs are wheels; for axle differentials
/// they are wheel differentials (the axle pairs).
#[derive(Debug, Clone, PartialEq)]
pub struct Differential {
    /// Output indices.
    pub pair: [usize; 2],
    /// Available modes; the first is active.
    pub modes: Vec<DiffType>,
    /// Accumulated relative rotation of a locked differential.
    pub delta_rotation: f64,
}

impl Differential {
    /// Differential over `pair` with the given modes.
    #[must_use]
    pub fn new(pair: [usize; 2], modes: Vec<DiffType>) -> Self {
        Self {
            pair,
            modes,
            delta_rotation: 0.0,
        }
    }

    /// Active mode.
    #[must_use]
    pub fn mode(&self) -> Option<DiffType> {
        self.modes.first().copied()
    }

    /// Cycle to the next mode.
    pub fn toggle(&mut self) {
        if self.modes.len() > 1 {
            self.modes.rotate_left(1);
            self.delta_rotation = 0.0;
        }
    }

    /// Display name of the active mode.
    #[must_use]
    pub fn mode_name(&self) -> &'static str {
        match self.mode() {
            Some(DiffType::Split) => "Split",
            Some(DiffType::Open) => "Open",
            Some(DiffType::Viscous) => "Viscous",
            Some(DiffType::Locked) => "Locked",
            None => "invalid",
        }
    }

    /// Split `in_torque` between outputs turning at `speeds`.
    pub fn split(&mut self, speeds: [f64; 2], in_torque: f64, dt: f64) -> [f64; 2] {
        let delta = speeds[0] - speeds[1];
        match self.mode() {
            Some(DiffType::Open) => {
                let (a, b) = (speeds[0].abs(), speeds[1].abs());
                let ratio = if a.min(b) > 1.0 { a / (a + b) } else { 0.5 };
                [
                    in_torque * ratio.clamp(0.1, 0.9),
                    in_torque * (1.0 - ratio).clamp(0.1, 0.9),
                ]
            }
            Some(DiffType::Viscous) => {
                let half = in_torque / 2.0;
                [half - delta * 10_000.0, half + delta * 10_000.0]
            }
            Some(DiffType::Locked) => {
                self.delta_rotation += delta * dt;
                let lock = self.delta_rotation * 1e6 + delta * 1e4;
                let half = in_torque / 2.0;
                [half - lock, half + lock]
            }
            Some(DiffType::Split) | None => [in_torque / 2.0, in_torque / 2.0],
        }
    }
}

/// Transfer case between the front and rear axle differentials.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferCase {
    /// Always-driven axle.
    pub axle_1: usize,
    /// Switchable axle, `None` for a 2wd-only case.
    pub axle_2: Option<usize>,
    /// Can run in 2wd.
    pub has_2wd: bool,
    /// Reduction gears usable in 2wd.
    pub has_2wd_lo: bool,
    /// Both axles driven.
    pub four_wd: bool,
    /// Reduction ratios; the first is active.
    pub ratios: Vec<f64>,
}

impl TransferCase {
    /// Transfer case starting in 4wd unless a 2wd mode exists.
    #[must_use]
    pub fn new(axle_1: usize, axle_2: Option<usize>, has_2wd: bool, has_2wd_lo: bool, ratios: Vec<f64>) -> Self {
        let mut ratios = ratios;
        if ratios.is_empty() {
            ratios.push(1.0);
        }
        Self {
            axle_1,
            axle_2,
            has_2wd,
            has_2wd_lo,
            four_wd: !has_2wd,
            ratios,
        }
    }

    /// Active reduction ratio.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        self.ratios.first().copied().unwrap_or(1.0)
    }

    /// Switch between 2wd and 4wd. Returns false when the case can't switch.
    ///
    /// Leaving 4wd without a low range in 2wd drops back to the direct ratio.
    pub fn toggle_mode(&mut self) -> bool {
        if self.axle_2.is_none() || !self.has_2wd {
            return false;
        }
        if self.four_wd && !self.has_2wd_lo {
            if let Some(direct) = self.ratios.iter().position(|r| (r - 1.0).abs() < f64::EPSILON) {
                self.ratios.rotate_left(direct);
            }
        }
        self.four_wd = !self.four_wd;
        true
    }

    /// Cycle the reduction ratio. Returns the new ratio when it changed.
    pub fn toggle_ratio(&mut self) -> Option<f64> {
        if self.ratios.len() < 2 || !(self.four_wd || self.has_2wd_lo) {
            return None;
        }
        self.ratios.rotate_left(1);
        Some(self.ratio())
    }

    /// Mark the wheels of the driven axles as propelled.
    pub fn apply_propulsion(&self, axles: &[Differential], wheels: &mut [Wheel]) {
        use sim_truck::document::records::Propulsion;
        for w in wheels.iter_mut() {
            w.propulsion = Propulsion::None;
        }
        let mut driven = vec![self.axle_1];
        if self.four_wd {
            driven.extend(self.axle_2);
        }
        for a in driven {
            if let Some(diff) = axles.get(a) {
                for &w in &diff.pair {
                    if let Some(wheel) = wheels.get_mut(w) {
                        wheel.propulsion = Propulsion::Forward;
                    }
                }
            }
        }
    }
}

/// Differential tree of an actor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Drivetrain {
    /// Wheel pairs.
    pub wheel_diffs: Vec<Differential>,
    /// Pairs of wheel differentials.
    pub axle_diffs: Vec<Differential>,
    /// Differential between the transfer case axles, active in 4wd.
    pub tcase_diff: Option<Differential>,
    /// Transfer case.
    pub transfer_case: Option<TransferCase>,
    /// Axles were declared explicitly, doubling the per-wheel torque share.
    pub has_axles_section: bool,
}

impl Drivetrain {
    /// Build automatic differentials when the definition declared none.
    ///
    /// Propelled wheel pairs `(2i, 2i+1)` form viscous wheel differentials; consecutive
    /// wheel differentials are then coupled by axle differentials, skipping
    /// the pair the transfer case already couples.
    pub fn finalize(&mut self, wheels: &[Wheel]) {
        self.has_axles_section = !self.wheel_diffs.is_empty();
        if self.wheel_diffs.is_empty() {
            for i in (1..wheels.len()).step_by(2) {
                if wheels[i - 1].is_propelled() && wheels[i].is_propelled() {
                    self.wheel_diffs
                        .push(Differential::new([i - 1, i], vec![DiffType::Viscous]));
                }
            }
        }
        if self.axle_diffs.is_empty() && self.wheel_diffs.len() > 1 {
            let skip = self
                .transfer_case
                .as_ref()
                .and_then(|tc| tc.axle_2.map(|a2| (tc.axle_1.min(a2), tc.axle_1.max(a2))));
            let mode = if self.has_axles_section {
                DiffType::Locked
            } else {
                DiffType::Viscous
            };
            for i in 1..self.wheel_diffs.len() {
                if skip == Some((i - 1, i)) {
                    continue;
                }
                self.axle_diffs.push(Differential::new([i - 1, i], vec![mode]));
            }
        }
        if let Some(tc) = &self.transfer_case {
            if let Some(a2) = tc.axle_2 {
                self.tcase_diff = Some(Differential::new([tc.axle_1, a2], vec![DiffType::Locked]));
            }
        }
    }

    /// Number of axle differentials currently coupling torque.
    #[must_use]
    pub fn active_axle_diffs(&self) -> usize {
        let four_wd = self.transfer_case.as_ref().is_some_and(|tc| tc.four_wd);
        self.axle_diffs.len() + usize::from(four_wd && self.tcase_diff.is_some())
    }

    /// Feed engine torque into the wheels and balance it across the
    /// differentials.
    pub fn distribute(&mut self, wheels: &mut [Wheel], clutch_torque: Option<f64>, dt: f64) {
        let num_propelled = wheels.iter().filter(|w| w.is_propelled()).count();
        if let Some(torque) = clutch_torque {
            if num_propelled > 0 {
                let mut share = torque / num_propelled as f64;
                if self.has_axles_section {
                    share *= 2.0;
                }
                for w in wheels.iter_mut().filter(|w| w.is_propelled() && !w.detached) {
                    w.torque += share;
                }
            }
        }

        let four_wd = self.transfer_case.as_ref().is_some_and(|tc| tc.four_wd);
        let tcase = if four_wd { self.tcase_diff.as_mut() } else { None };
        let wheel_diffs = &self.wheel_diffs;
        for diff in self.axle_diffs.iter_mut().chain(tcase) {
            let (Some(a), Some(b)) = (wheel_diffs.get(diff.pair[0]), wheel_diffs.get(diff.pair[1])) else {
                continue;
            };
            let mut quad = [a.pair[0], a.pair[1], b.pair[0], b.pair[1]];
            if quad.iter().any(|&w| w >= wheels.len()) {
                continue;
            }
            // A fully detached axle follows the other one.
            let first_gone = wheels[quad[0]].detached && wheels[quad[1]].detached;
            let second_gone = wheels[quad[2]].detached && wheels[quad[3]].detached;
            if first_gone {
                quad[0] = quad[2];
                quad[1] = quad[3];
            } else if second_gone {
                quad[2] = quad[0];
                quad[3] = quad[1];
            }
            let speeds = [
                (wheels[quad[0]].speed + wheels[quad[1]].speed) * 0.5,
                (wheels[quad[2]].speed + wheels[quad[3]].speed) * 0.5,
            ];
            let in_torque: f64 = [a.pair[0], a.pair[1], b.pair[0], b.pair[1]]
                .iter()
                .map(|&w| wheels[w].torque)
                .sum();
            let out = diff.split(speeds, in_torque, dt);
            wheels[a.pair[0]].torque = out[0] * 0.5;
            wheels[a.pair[1]].torque = out[0] * 0.5;
            wheels[b.pair[0]].torque = out[1] * 0.5;
            wheels[b.pair[1]].torque = out[1] * 0.5;
        }

        for diff in &mut self.wheel_diffs {
            let [a, b] = diff.pair;
            if a >= wheels.len() || b >= wheels.len() {
                continue;
            }
            let mut speeds = [wheels[a].speed, wheels[b].speed];
            if wheels[a].detached {
                speeds[0] = speeds[1];
            }
            if wheels[b].detached {
                speeds[1] = speeds[0];
            }
            let in_torque = wheels[a].torque + wheels[b].torque;
            let out = diff.split(speeds, in_torque, dt);
            wheels[a].torque = out[0];
            wheels[b].torque = out[1];
        }
    }

    /// Cycle every axle differential. Returns the new mode names.
    pub fn toggle_axle_diffs(&mut self) -> Vec<&'static str> {
        self.axle_diffs
            .iter_mut()
            .map(|d| {
                d.toggle();
                d.mode_name()
            })
            .collect()
    }

    /// Cycle every wheel differential. Returns the new mode names.
    pub fn toggle_wheel_diffs(&mut self) -> Vec<&'static str> {
        self.wheel_diffs
            .iter_mut()
            .map(|d| {
                d.toggle();
                d.mode_name()
            })
            .collect()
    }

    /// Reset locked-differential memory.
    pub fn reset(&mut self) {
        for d in self
            .wheel_diffs
            .iter_mut()
            .chain(self.axle_diffs.iter_mut())
            .chain(self.tcase_diff.iter_mut())
        {
            d.delta_rotation = 0.0;
        }
    }
}
