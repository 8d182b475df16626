//! Nodes, beams and the beam variants driven by input.

use std::sync::LazyLock;

use regex::Regex;
use sim_types::constants::{ROTATOR_FORCE, ROTATOR_TOLERANCE};
use sim_types::Severity;

use super::args::{arg_bool, arg_str};
use super::Parser;
use crate::document::{
    AeroSource, Animator, AnimatorSource, Beam, BeamOptions, Command, CommandCenterMode,
    EngineTriggerFunction, Hydro, Inertia, Node, NodeId, Record, Rotator, Shock, Shock2,
    Shock2Options, Shock3, ShockOptions, Trigger, TriggerAction, TriggerOptions,
};
use crate::error::ParseError;
use crate::keyword::Keyword;
use crate::tokenizer::{float_or_zero, split_on};

static AERO_SOURCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*(throttle|rpm|aerotorq|aeropit|aerostatus)([0-9])\s*$").ok());

impl Parser {
    pub(super) fn parse_node(&mut self, section: Keyword, args: &[&str]) {
        if !self.check_args(args, 4) {
            return;
        }
        let id = if section == Keyword::Nodes2 {
            let name = arg_str(args, 0);
            if !self.registry.add_named(&name) {
                let message = format!("Duplicate node name [{name}]. Ignoring node.");
                self.report_fatal(ParseError::duplicate_node_name(self.line, &name), message);
                return;
            }
            NodeId::Name(name)
        } else {
            let number = self.arg_u32(args, 0);
            if let Err(expected) = self.registry.add_numbered(number) {
                // One fatal diagnostic per gap; the nodes that continue the
                // broken run are dropped quietly.
                let continues_gap = self
                    .dropped_node
                    .is_some_and(|last| last.checked_add(1) == Some(number));
                self.dropped_node = Some(number);
                if continues_gap {
                    self.report(
                        Severity::Warning,
                        format!("Ignoring node [{number}] following an out-of-sync node"),
                    );
                } else {
                    let message = format!(
                        "Lost sync in node numbers, got numbered node [{number}], expected [{expected}]. Ignoring node."
                    );
                    self.report_fatal(
                        ParseError::node_out_of_sync(self.line, number, expected),
                        message,
                    );
                }
                return;
            }
            self.dropped_node = None;
            NodeId::Number(number)
        };
        let position = [
            self.arg_float(args, 1),
            self.arg_float(args, 2),
            self.arg_float(args, 3),
        ];
        let node = Node {
            id,
            position,
            options: arg_str(args, 4),
            load_weight: self.opt_float(args, 5),
        };
        self.push(section, Record::Node(node));
    }

    pub(super) fn parse_beam(&mut self, args: &[&str]) {
        if !self.check_args(args, 2) {
            return;
        }
        let nodes = self.arg_nodes::<2>(args, 0);
        let mut options = BeamOptions::default();
        for c in args.get(2).copied().unwrap_or_default().chars() {
            match c {
                'i' => options.invisible = true,
                'v' => options.invisible = false,
                'r' => {
                    options.rope = true;
                    options.support = false;
                }
                's' => {
                    options.support = true;
                    options.rope = false;
                }
                'n' => {}
                _ => self.report(
                    Severity::Warning,
                    format!("Ignoring invalid node option '{c}'"),
                ),
            }
        }
        let extension_break_limit = if options.support && args.len() > 3 {
            // Historical: the factor is read as an integer.
            Some((self.arg_int(args, 3) as f64).max(0.0))
        } else {
            None
        };
        self.push(
            Keyword::Beams,
            Record::Beam(Beam {
                nodes,
                options,
                extension_break_limit,
            }),
        );
    }

    fn shock_options(&mut self, text: &str, set: &mut dyn FnMut(char) -> bool) {
        for c in text.chars() {
            if matches!(c, 'n' | 'v') || set(c) {
                continue;
            }
            self.report(Severity::Warning, format!("Invalid option: '{c}', ignoring..."));
        }
    }

    pub(super) fn parse_shock(&mut self, args: &[&str]) {
        if !self.check_args(args, 7) {
            return;
        }
        let nodes = self.arg_nodes::<2>(args, 0);
        let mut shock = Shock {
            nodes,
            spring: self.arg_float(args, 2),
            damp: self.arg_float(args, 3),
            short_bound: self.arg_float(args, 4),
            long_bound: self.arg_float(args, 5),
            precompression: self.arg_float(args, 6),
            options: ShockOptions::default(),
        };
        let mut options = ShockOptions::default();
        self.shock_options(args.get(7).copied().unwrap_or_default(), &mut |c| options.set(c));
        shock.options = options;
        self.push(Keyword::Shocks, Record::Shock(shock));
    }

    pub(super) fn parse_shock2(&mut self, args: &[&str]) {
        if !self.check_args(args, 13) {
            return;
        }
        let nodes = self.arg_nodes::<2>(args, 0);
        let v: Vec<f64> = (2..13).map(|i| self.arg_float(args, i)).collect();
        let mut options = Shock2Options::default();
        self.shock_options(args.get(13).copied().unwrap_or_default(), &mut |c| options.set(c));
        let shock = Shock2 {
            nodes,
            spring_in: v[0],
            damp_in: v[1],
            progress_spring_in: v[2],
            progress_damp_in: v[3],
            spring_out: v[4],
            damp_out: v[5],
            progress_spring_out: v[6],
            progress_damp_out: v[7],
            short_bound: v[8],
            long_bound: v[9],
            precompression: v[10],
            options,
        };
        self.push(Keyword::Shocks2, Record::Shock2(shock));
    }

    pub(super) fn parse_shock3(&mut self, args: &[&str]) {
        if !self.check_args(args, 15) {
            return;
        }
        let nodes = self.arg_nodes::<2>(args, 0);
        let v: Vec<f64> = (2..15).map(|i| self.arg_float(args, i)).collect();
        let mut options = Shock2Options::default();
        self.shock_options(args.get(15).copied().unwrap_or_default(), &mut |c| {
            c != 's' && options.set(c)
        });
        let shock = Shock3 {
            nodes,
            spring_in: v[0],
            damp_in: v[1],
            damp_in_slow: v[2],
            split_vel_in: v[3],
            damp_in_fast: v[4],
            spring_out: v[5],
            damp_out: v[6],
            damp_out_slow: v[7],
            split_vel_out: v[8],
            damp_out_fast: v[9],
            short_bound: v[10],
            long_bound: v[11],
            precompression: v[12],
            options,
        };
        self.push(Keyword::Shocks3, Record::Shock3(shock));
    }

    pub(super) fn parse_hydro(&mut self, args: &[&str]) {
        if !self.check_args(args, 3) {
            return;
        }
        let hydro = Hydro {
            nodes: self.arg_nodes::<2>(args, 0),
            lengthening_factor: self.arg_float(args, 2),
            options: arg_str(args, 3),
            inertia: self.arg_inertia(args, 4),
        };
        self.push(Keyword::Hydros, Record::Hydro(hydro));
    }

    pub(super) fn parse_command(&mut self, section: Keyword, args: &[&str]) {
        let is_v2 = section == Keyword::Commands2;
        let required = if is_v2 { 8 } else { 7 };
        if !self.check_args(args, required) {
            return;
        }
        let nodes = self.arg_nodes::<2>(args, 0);
        let mut pos = 2;
        let shorten_rate = self.arg_float(args, pos);
        pos += 1;
        let lengthen_rate = if is_v2 {
            pos += 1;
            self.arg_float(args, pos - 1)
        } else {
            shorten_rate
        };
        let mut cmd = Command {
            format_version: if is_v2 { 2 } else { 1 },
            nodes,
            shorten_rate,
            lengthen_rate,
            max_contraction: self.arg_float(args, pos),
            max_extension: self.arg_float(args, pos + 1),
            contract_key: self.arg_u32(args, pos + 2),
            extend_key: self.arg_u32(args, pos + 3),
            invisible: false,
            rope: false,
            not_faster: false,
            center_mode: CommandCenterMode::None,
            description: String::new(),
            inertia: Inertia::default(),
            affect_engine: 1.0,
            needs_engine: true,
            plays_sound: true,
        };
        pos += 4;
        if args.len() <= pos {
            self.push(section, Record::Command(cmd));
            return;
        }

        self.command_options(&mut cmd, args[pos]);
        pos += 1;
        if let Some(d) = args.get(pos) {
            cmd.description = (*d).to_owned();
            pos += 1;
        }
        if args.len() > pos {
            cmd.inertia = self.arg_inertia(args, pos);
            pos += 4;
        }
        if let Some(v) = self.opt_float(args, pos) {
            cmd.affect_engine = v;
        }
        if args.len() > pos + 1 {
            cmd.needs_engine = arg_bool(args, pos + 1);
        }
        if args.len() > pos + 2 {
            cmd.plays_sound = arg_bool(args, pos + 2);
        }
        self.push(section, Record::Command(cmd));
    }

    /// Option letters of a command; the first centering letter wins.
    fn command_options(&mut self, cmd: &mut Command, text: &str) {
        let mut winner = None;
        let (mut auto_center, mut one_press, mut one_press_center) = (false, false, false);
        for c in text.chars() {
            if winner.is_none() && matches!(c, 'o' | 'p' | 'c') {
                winner = Some(c);
            }
            match c {
                'n' => {}
                'i' => cmd.invisible = true,
                'r' => cmd.rope = true,
                'f' => cmd.not_faster = true,
                'c' => auto_center = true,
                'p' => one_press = true,
                'o' => one_press_center = true,
                _ => self.report(Severity::Warning, format!("Ignoring unknown flag '{c}'")),
            }
        }
        let Some(winner) = winner else { return };
        if auto_center && winner != 'c' {
            self.report(
                Severity::Warning,
                "Command cannot be one-pressed and self centering at the same time, ignoring flag 'c'"
                    .to_owned(),
            );
        }
        let ignored = if one_press_center && winner != 'o' {
            Some('o')
        } else if one_press && winner != 'p' {
            Some('p')
        } else {
            None
        };
        if let Some(ignored) = ignored {
            let message = if winner == 'c' {
                format!(
                    "Command cannot be one-pressed and self centering at the same time, ignoring flag '{ignored}'"
                )
            } else {
                format!("Command already has a one-pressed c.mode, ignoring flag '{ignored}'")
            };
            self.report(Severity::Warning, message);
        }
        cmd.center_mode = match winner {
            'c' => CommandCenterMode::AutoCenter,
            'p' => CommandCenterMode::OnePress,
            _ => CommandCenterMode::OnePressCenter,
        };
    }

    pub(super) fn parse_animator(&mut self, line: &str) {
        let fields = split_on(line, &[',']);
        if !self.check_args(&fields, 4) {
            return;
        }
        let mut animator = Animator {
            nodes: [self.node_ref(fields[0]), self.node_ref(fields[1])],
            lengthening_factor: self.arg_float(&fields, 2),
            sources: Vec::new(),
            aero: None,
            visible: false,
            invisible: false,
            short_limit: None,
            long_limit: None,
        };
        for token in fields[3].split('|').map(str::trim) {
            if let Some(caps) = AERO_SOURCE.as_ref().and_then(|re| re.captures(token)) {
                let source = match &caps[1] {
                    "throttle" => AeroSource::Throttle,
                    "rpm" => AeroSource::Rpm,
                    "aerotorq" => AeroSource::Torque,
                    "aeropit" => AeroSource::Pitch,
                    _ => AeroSource::Status,
                };
                let engine = caps[2].parse::<u32>().unwrap_or(1).saturating_sub(1);
                animator.aero = Some((source, engine));
            } else if let Some(rest) = token.strip_prefix("shortlimit") {
                if let Some((_, v)) = rest.split_once(':') {
                    animator.short_limit = Some(float_or_zero(v.trim()));
                }
            } else if let Some(rest) = token.strip_prefix("longlimit") {
                if let Some((_, v)) = rest.split_once(':') {
                    animator.long_limit = Some(float_or_zero(v.trim()));
                }
            } else if token == "vis" {
                animator.visible = true;
            } else if token == "inv" {
                animator.invisible = true;
            } else if let Some((_, source)) =
                AnimatorSource::KEYWORDS.iter().find(|(k, _)| *k == token)
            {
                animator.sources.push(*source);
            }
        }
        self.push(Keyword::Animators, Record::Animator(animator));
    }

    pub(super) fn parse_trigger(&mut self, args: &[&str]) {
        if !self.check_args(args, 6) {
            return;
        }
        let nodes = self.arg_nodes::<2>(args, 0);
        let contraction_limit = self.arg_float(args, 2);
        let expansion_limit = self.arg_float(args, 3);
        let short_action = self.arg_int(args, 4);
        let long_action = self.arg_int(args, 5);
        let mut options = TriggerOptions::default();
        for c in args.get(6).copied().unwrap_or_default().chars() {
            if !options.set(c) {
                self.report(Severity::Warning, format!("Invalid trigger option: {c}"));
            }
        }
        let boundary_timer = self
            .opt_float(args, 7)
            .filter(|t| *t > 0.0)
            .unwrap_or(1.0);

        let action = if options.lock_hookgroups || options.unlock_hookgroups {
            TriggerAction::HookToggle {
                contract_group: short_action,
                extend_group: long_action,
            }
        } else if options.engine_trigger {
            match EngineTriggerFunction::from_code(short_action) {
                Some(function) => TriggerAction::Engine {
                    function,
                    motor: long_action,
                },
                None => {
                    self.report(
                        Severity::Error,
                        format!("Invalid engine trigger function: {short_action}, skipping line"),
                    );
                    return;
                }
            }
        } else {
            TriggerAction::CommandKeys {
                contract_key: short_action,
                extend_key: long_action,
            }
        };
        let trigger = Trigger {
            nodes,
            contraction_limit,
            expansion_limit,
            options,
            boundary_timer,
            action,
        };
        self.push(Keyword::Triggers, Record::Trigger(trigger));
    }

    pub(super) fn parse_rotator(&mut self, section: Keyword, args: &[&str]) {
        if !self.check_args(args, 13) {
            return;
        }
        let is_v2 = section == Keyword::Rotators2;
        if is_v2 && !self.check_args(args, 16) {
            return;
        }
        let mut rotator = Rotator {
            format_version: if is_v2 { 2 } else { 1 },
            axis: self.arg_nodes::<2>(args, 0),
            base_plate: self.arg_nodes::<4>(args, 2),
            rotating_plate: self.arg_nodes::<4>(args, 6),
            rate: self.arg_float(args, 10),
            spin_left_key: self.arg_u32(args, 11),
            spin_right_key: self.arg_u32(args, 12),
            force: ROTATOR_FORCE,
            tolerance: ROTATOR_TOLERANCE,
            description: String::new(),
            inertia: Inertia::default(),
            engine_coupling: 1.0,
            needs_engine: false,
        };
        let mut offset = 0;
        if is_v2 {
            rotator.force = self.arg_float(args, 13);
            rotator.tolerance = self.arg_float(args, 14);
            rotator.description = arg_str(args, 15);
            offset = 3;
        }
        rotator.inertia = self.arg_inertia(args, 13 + offset);
        if let Some(v) = self.opt_float(args, 17 + offset) {
            rotator.engine_coupling = v;
        }
        if args.len() > 18 + offset {
            rotator.needs_engine = arg_bool(args, 18 + offset);
        }
        self.push(section, Record::Rotator(rotator));
    }
}
