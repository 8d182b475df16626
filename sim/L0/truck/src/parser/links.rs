//! Hooks, ties, ropes and slide rails.

use sim_types::constants::{
    HOOK_FORCE_DEFAULT, HOOK_LOCK_TIMER_DEFAULT, HOOK_RANGE_DEFAULT, NODE_LOCKGROUP_DEFAULT,
    TIE_MAX_STRESS_DEFAULT,
};
use sim_types::Severity;

use super::args::{arg_char, clamp_i32};
use super::Parser;
use crate::document::{
    Hook, Lockgroup, Railgroup, Record, Ropable, Rope, SlideConstraints, SlideNode, Tie,
    TieOptions,
};
use crate::keyword::Keyword;
use crate::tokenizer::{float_or_zero, split_on};

impl Parser {
    pub(super) fn parse_hook(&mut self, args: &[&str]) {
        if !self.check_args(args, 1) {
            return;
        }
        let mut hook = Hook {
            node: self.arg_node(args, 0),
            range: HOOK_RANGE_DEFAULT,
            speed_coef: 1.0,
            max_force: HOOK_FORCE_DEFAULT,
            group: -1,
            lockgroup: NODE_LOCKGROUP_DEFAULT,
            timer: HOOK_LOCK_TIMER_DEFAULT,
            min_range: 0.0,
            self_lock: false,
            auto_lock: false,
            no_disable: false,
            no_rope: false,
            visible: false,
        };
        let mut i = 1;
        while i < args.len() {
            let attr = args[i].trim();
            let has_value = i + 1 < args.len();
            match attr {
                "hookrange" if has_value => {
                    i += 1;
                    hook.range = self.arg_float(args, i);
                }
                "speedcoef" if has_value => {
                    i += 1;
                    hook.speed_coef = self.arg_float(args, i);
                }
                "maxforce" if has_value => {
                    i += 1;
                    hook.max_force = self.arg_float(args, i);
                }
                "timer" if has_value => {
                    i += 1;
                    hook.timer = self.arg_float(args, i);
                }
                "hookgroup" | "hgroup" if has_value => {
                    i += 1;
                    hook.group = self.arg_i32(args, i);
                }
                "lockgroup" | "lgroup" if has_value => {
                    i += 1;
                    hook.lockgroup = self.arg_i32(args, i);
                }
                "shortlimit" | "short_limit" if has_value => {
                    i += 1;
                    hook.min_range = self.arg_float(args, i);
                }
                "selflock" | "self-lock" | "self_lock" => hook.self_lock = true,
                "autolock" | "auto-lock" | "auto_lock" => hook.auto_lock = true,
                "nodisable" | "no-disable" | "no_disable" => hook.no_disable = true,
                "norope" | "no-rope" | "no_rope" => hook.no_rope = true,
                "visible" | "vis" => hook.visible = true,
                _ => self.report(
                    Severity::Error,
                    format!("Ignoring invalid option: {attr}"),
                ),
            }
            i += 1;
        }
        self.push(Keyword::Hooks, Record::Hook(hook));
    }

    pub(super) fn parse_tie(&mut self, args: &[&str]) {
        if !self.check_args(args, 5) {
            return;
        }
        let root = self.arg_node(args, 0);
        let max_reach = self.arg_float(args, 1);
        let rate = self.arg_float(args, 2);
        let min_length = self.arg_float(args, 3);
        let max_length = self.arg_float(args, 4);
        let mut options = TieOptions::default();
        for c in args.get(5).copied().unwrap_or_default().chars() {
            if matches!(c, 'n' | 'v') || options.set(c) {
                continue;
            }
            self.report(Severity::Warning, format!("Invalid option: {c}, ignoring..."));
        }
        let tie = Tie {
            root,
            max_reach,
            rate,
            min_length,
            max_length,
            options,
            max_stress: self.opt_float(args, 6).unwrap_or(TIE_MAX_STRESS_DEFAULT),
            group: self.opt_int(args, 7).map_or(-1, clamp_i32),
        };
        self.push(Keyword::Ties, Record::Tie(tie));
    }

    pub(super) fn parse_rope(&mut self, args: &[&str]) {
        if !self.check_args(args, 2) {
            return;
        }
        let rope = Rope {
            root: self.arg_node(args, 0),
            end: self.arg_node(args, 1),
            invisible: arg_char(args, 2) == Some('i'),
        };
        self.push(Keyword::Ropes, Record::Rope(rope));
    }

    pub(super) fn parse_ropable(&mut self, args: &[&str]) {
        if !self.check_args(args, 1) {
            return;
        }
        let ropable = Ropable {
            node: self.arg_node(args, 0),
            group: self.opt_int(args, 1).map_or(-1, clamp_i32),
            multilock: self.opt_int(args, 2) == Some(1),
        };
        self.push(Keyword::Ropables, Record::Ropable(ropable));
    }

    pub(super) fn parse_railgroup(&mut self, line: &str) {
        let fields = split_on(line, &[',']);
        if fields.len() < 3 {
            self.report(Severity::Error, "Not enough parameters".to_owned());
            return;
        }
        let id = self.arg_i32(&fields, 0);
        let nodes = self.node_list(fields[1..].iter().copied());
        self.push(Keyword::Railgroups, Record::Railgroup(Railgroup { id, nodes }));
    }

    /// `node, rail..., [S|B|T|R|G|D]value..., C[a|f|s|n]...`
    ///
    /// Rail nodes end at the first attribute token.
    pub(super) fn parse_slidenode(&mut self, line: &str) {
        let fields = split_on(line, &[',', ' ']);
        if fields.len() < 2 {
            self.report(Severity::Error, "Too few arguments".to_owned());
            return;
        }
        let mut sn = SlideNode {
            node: self.node_ref(fields[0]),
            rail: Default::default(),
            spring_rate: None,
            break_force: None,
            tolerance: None,
            attachment_rate: None,
            railgroup: None,
            max_attach_dist: None,
            constraints: SlideConstraints::default(),
        };
        let mut rail_tokens = Vec::new();
        let mut in_rail = true;
        for token in &fields[1..] {
            let mut chars = token.chars();
            let Some(first) = chars.next() else { continue };
            let rest = chars.as_str();
            match first.to_ascii_uppercase() {
                'S' => sn.spring_rate = Some(float_or_zero(rest)),
                'B' => sn.break_force = Some(float_or_zero(rest)),
                'T' => sn.tolerance = Some(float_or_zero(rest)),
                'R' => sn.attachment_rate = Some(float_or_zero(rest)),
                // Historical: the group id is read as a float.
                'G' => sn.railgroup = Some(float_or_zero(rest) as i32),
                'D' => sn.max_attach_dist = Some(float_or_zero(rest)),
                'C' => {
                    let flag = rest.chars().next().unwrap_or(' ');
                    if !sn.constraints.set(flag) {
                        self.report(
                            Severity::Warning,
                            format!("Ignoring invalid option: {flag}"),
                        );
                    }
                }
                _ => {
                    if in_rail {
                        rail_tokens.push(*token);
                    }
                    continue;
                }
            }
            in_rail = false;
        }
        sn.rail = self.node_list(rail_tokens);
        self.push(Keyword::Slidenodes, Record::SlideNode(sn));
    }

    pub(super) fn parse_lockgroup(&mut self, args: &[&str]) {
        if !self.check_args(args, 2) {
            return;
        }
        let number = self.arg_i32(args, 0);
        let nodes = (1..args.len()).map(|i| self.arg_node(args, i)).collect();
        self.push(
            Keyword::Lockgroups,
            Record::Lockgroup(Lockgroup { number, nodes }),
        );
    }
}
