//! Engine, gearbox and driving aids.

use std::sync::LazyLock;

use regex::Regex;
use sim_types::Severity;

use super::args::{arg_char, clamp_i32};
use super::Parser;
use crate::document::{
    Axle, Brakes, CruiseControl, DiffType, Engine, EngineType, Engoption, Engturbo, InterAxle,
    Record, SlipControl, SlopeBrake, TorqueCurve, TransferCase, ENGTURBO_UNSET,
};
use crate::keyword::Keyword;
use crate::tokenizer::split_on;

/// One comma-separated `axles` property: `w1(a b)` or `d(modes)`.
static AXLE_PROPERTY: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^[ \t]*(?:[ \t]*w([12])\(([[:alnum:]_-]+)[ \t]+([[:alnum:]_-]+)\)[ \t]*)?(?:[ \t]*d\(([olsv]*)\)[ \t]*)?[ \t]*(?:(?:;|//).*)?$",
    )
    .ok()
});

fn diff_modes(letters: &str) -> Vec<DiffType> {
    letters.chars().filter_map(DiffType::from_letter).collect()
}

impl Parser {
    pub(super) fn parse_engine(&mut self, args: &[&str]) {
        if !self.check_args(args, 6) {
            return;
        }
        let mut engine = Engine {
            shift_down_rpm: self.arg_float(args, 0),
            shift_up_rpm: self.arg_float(args, 1),
            torque: self.arg_float(args, 2),
            global_gear_ratio: self.arg_float(args, 3),
            reverse_gear_ratio: self.arg_float(args, 4),
            neutral_gear_ratio: self.arg_float(args, 5),
            gear_ratios: Vec::new(),
        };
        for i in 6..args.len() {
            let ratio = self.arg_float(args, i);
            if ratio < 0.0 {
                break;
            }
            if ratio == 0.0 {
                // Historical: a zero ratio is kept.
                self.report(
                    Severity::Warning,
                    format!("Forward gear {} has a ratio of 0", engine.gear_ratios.len() + 1),
                );
            }
            engine.gear_ratios.push(ratio);
        }
        if engine.gear_ratios.is_empty() {
            self.report(
                Severity::Error,
                "Engine has no forward gear, ignoring...".to_owned(),
            );
            return;
        }
        self.push(Keyword::Engine, Record::Engine(engine));
    }

    pub(super) fn parse_engoption(&mut self, args: &[&str]) {
        if !self.check_args(args, 1) {
            return;
        }
        let mut opt = Engoption {
            inertia: self.arg_float(args, 0),
            ..Engoption::default()
        };
        if let Some(c) = arg_char(args, 1) {
            opt.engine_type = match c {
                't' => EngineType::Truck,
                'c' => EngineType::Car,
                'e' => EngineType::Electric,
                _ => {
                    self.report(
                        Severity::Warning,
                        format!("Invalid engine type '{c}', using 't' (truck)"),
                    );
                    EngineType::Truck
                }
            };
        }
        let fields = [
            &mut opt.clutch_force,
            &mut opt.shift_time,
            &mut opt.clutch_time,
            &mut opt.post_shift_time,
            &mut opt.stall_rpm,
            &mut opt.idle_rpm,
            &mut opt.max_idle_mixture,
            &mut opt.min_idle_mixture,
            &mut opt.braking_torque,
        ];
        for (k, field) in fields.into_iter().enumerate() {
            if let Some(v) = self.opt_float(args, k + 2) {
                *field = v;
            }
        }
        self.push(Keyword::Engoption, Record::Engoption(opt));
    }

    pub(super) fn parse_engturbo(&mut self, args: &[&str]) {
        if !self.check_args(args, 4) {
            return;
        }
        let version = self.arg_i32(args, 0);
        let inertia_factor = self.arg_float(args, 1);
        let mut count = self.arg_u32(args, 2);
        let mut params = [ENGTURBO_UNSET; 11];
        for (k, p) in params.iter_mut().enumerate() {
            if let Some(v) = self.opt_float(args, k + 3) {
                *p = v;
            }
        }
        if count > 4 {
            self.report(
                Severity::Warning,
                "You cannot have more than 4 turbos. Fallback: using 4 instead.".to_owned(),
            );
            count = 4;
        }
        let turbo = Engturbo {
            version,
            inertia_factor,
            count,
            params,
        };
        self.push(Keyword::Engturbo, Record::Engturbo(turbo));
    }

    /// Lines accumulate into one curve per module.
    pub(super) fn parse_torque_curve(&mut self, line: &str) {
        let fields = split_on(line, &[',']);
        let sample = match fields.len() {
            1 => None,
            2 => Some((self.arg_float(&fields, 0), self.arg_float(&fields, 1))),
            _ => {
                self.report(Severity::Error, "Invalid line, too many arguments".to_owned());
                return;
            }
        };
        let found = self
            .entries_mut()
            .iter()
            .rposition(|e| matches!(e.record, Record::TorqueCurve(_)));
        if found.is_none() {
            self.push(Keyword::Torquecurve, Record::TorqueCurve(TorqueCurve::default()));
        }
        let at = found.unwrap_or(self.entries_mut().len() - 1);
        let Some(Record::TorqueCurve(curve)) = self.entries_mut().get_mut(at).map(|e| &mut e.record)
        else {
            return;
        };
        match sample {
            Some(s) => curve.samples.push(s),
            None => curve.predefined = Some(fields[0].to_owned()),
        }
    }

    pub(super) fn parse_brakes(&mut self, args: &[&str]) {
        if !self.check_args(args, 1) {
            return;
        }
        let brakes = Brakes {
            force: self.arg_float(args, 0),
            parking_force: self.opt_float(args, 1),
        };
        self.push(Keyword::Brakes, Record::Brakes(brakes));
    }

    pub(super) fn parse_axle(&mut self, line: &str) {
        let Some(re) = AXLE_PROPERTY.as_ref() else { return };
        let mut axle = Axle {
            wheels: [None, None],
            modes: Vec::new(),
        };
        for token in line.split(',') {
            let Some(caps) = re.captures(token) else {
                self.report(
                    Severity::Error,
                    "Invalid property, ignoring whole line...".to_owned(),
                );
                return;
            };
            if let (Some(w), Some(a), Some(b)) = (caps.get(1), caps.get(2), caps.get(3)) {
                let slot = usize::from(w.as_str() == "2");
                axle.wheels[slot] = Some([self.node_ref(a.as_str()), self.node_ref(b.as_str())]);
            } else if let Some(modes) = caps.get(4) {
                axle.modes.extend(diff_modes(modes.as_str()));
            }
        }
        self.push(Keyword::Axles, Record::Axle(axle));
    }

    pub(super) fn parse_interaxle(&mut self, line: &str) {
        let fields = split_on(line, &[',']);
        if !self.check_args(&fields, 3) {
            return;
        }
        let a1 = self.arg_i32(&fields, 0).saturating_sub(1);
        let a2 = self.arg_i32(&fields, 1).saturating_sub(1);
        let modes = match AXLE_PROPERTY.as_ref().and_then(|re| re.captures(fields[2])) {
            Some(caps) => caps.get(4).map(|m| diff_modes(m.as_str())).unwrap_or_default(),
            None => {
                self.report(
                    Severity::Error,
                    "Invalid property, ignoring whole line...".to_owned(),
                );
                return;
            }
        };
        self.push(Keyword::Interaxles, Record::InterAxle(InterAxle { a1, a2, modes }));
    }

    pub(super) fn parse_transfer_case(&mut self, args: &[&str]) {
        if !self.check_args(args, 2) {
            return;
        }
        let tc = TransferCase {
            a1: self.arg_i32(args, 0).saturating_sub(1),
            a2: self.arg_i32(args, 1).saturating_sub(1),
            has_2wd: self.opt_int(args, 2).is_some_and(|v| v != 0),
            has_2wd_lo: self.opt_int(args, 3).is_some_and(|v| v != 0),
            gear_ratios: (4..args.len()).map(|i| self.arg_float(args, i)).collect(),
        };
        self.push(Keyword::TransferCase, Record::TransferCase(tc));
    }

    /// `TractionControl force, slip, fade, pulse, mode: on&nodash`
    /// `AntiLockBrakes force, min_speed, pulse, mode: off`
    pub(super) fn parse_slip_control(&mut self, keyword: Keyword, line: &str) {
        let is_tc = keyword == Keyword::TractionControl;
        let rest = line.get(keyword.as_str().len()..).unwrap_or_default();
        let tokens = split_on(rest, &[',']);
        if tokens.len() < 2 {
            let message = if is_tc {
                "Too few arguments"
            } else {
                "Too few arguments for `AntiLockBrakes`"
            };
            self.report(Severity::Error, message.to_owned());
            return;
        }
        let mut sc = SlipControl {
            regulation_force: self.arg_float(&tokens, 0),
            threshold: 0.0,
            fade_speed: 0.0,
            pulse_per_sec: 0.0,
            is_on: !is_tc,
            no_dashboard: false,
            no_toggle: false,
        };
        let modes_from = if is_tc {
            sc.threshold = self.arg_float(&tokens, 1);
            if let Some(v) = self.opt_float(&tokens, 2) {
                sc.fade_speed = v;
            }
            if let Some(v) = self.opt_float(&tokens, 3) {
                sc.pulse_per_sec = v;
            }
            4
        } else {
            // Historical: the minimum speed is an integer, and the pulse rate
            // is only read when a mode token follows it.
            sc.threshold = self.arg_int(&tokens, 1) as f64;
            if tokens.len() > 3 {
                sc.pulse_per_sec = self.arg_float(&tokens, 2);
            }
            3
        };
        for token in tokens.iter().skip(modes_from) {
            let attrs = token
                .split_once(':')
                .filter(|(key, _)| key.trim().eq_ignore_ascii_case("mode"))
                .map(|(_, attrs)| attrs);
            let Some(attrs) = attrs else {
                let message = if is_tc {
                    "TractionControl Mode: missing"
                } else {
                    "Antilockbrakes Mode: missing"
                };
                self.report(Severity::Error, message.to_owned());
                sc.no_dashboard = false;
                sc.no_toggle = false;
                sc.is_on = true;
                continue;
            };
            for attr in attrs.split('&') {
                let attr = attr.trim().to_ascii_lowercase();
                if attr.starts_with("nodash") {
                    sc.no_dashboard = true;
                } else if attr.starts_with("notoggle") {
                    sc.no_toggle = true;
                } else if attr.starts_with("on") {
                    sc.is_on = true;
                } else if attr.starts_with("off") {
                    sc.is_on = false;
                }
            }
        }
        let record = if is_tc {
            Record::TractionControl(sc)
        } else {
            Record::AntiLockBrakes(sc)
        };
        self.push(keyword, record);
    }

    pub(super) fn parse_cruise_control(&mut self, args: &[&str]) {
        if !self.check_args(args, 3) {
            return;
        }
        let cc = CruiseControl {
            min_speed: self.arg_float(args, 1),
            autobrake: clamp_i32(self.arg_int(args, 2)),
        };
        self.push(Keyword::Cruisecontrol, Record::CruiseControl(cc));
    }

    pub(super) fn parse_speed_limiter(&mut self, args: &[&str]) {
        if !self.check_args(args, 2) {
            return;
        }
        let max_speed = self.arg_float(args, 1);
        if max_speed <= 0.0 {
            self.report(
                Severity::Warning,
                format!(
                    "Invalid 'max_speed' ({max_speed:.6}), must be > 0.0. Using it anyway (compatibility)"
                ),
            );
        }
        self.push(Keyword::Speedlimiter, Record::SpeedLimiter(max_speed));
    }

    pub(super) fn parse_slope_brake(&mut self, args: &[&str]) {
        let mut sb = SlopeBrake::default();
        if let Some(v) = self.opt_float(args, 1) {
            sb.regulating_force = v;
        }
        if let Some(v) = self.opt_float(args, 2) {
            sb.attach_angle = v;
        }
        if let Some(v) = self.opt_float(args, 3) {
            sb.release_angle = v;
        }
        self.push(Keyword::Slopebrake, Record::SlopeBrake(sb));
    }
}
