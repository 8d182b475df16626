//! Collision, aerodynamics and mass records.

use sim_types::Severity;

use super::args::arg_str;
use super::Parser;
use crate::document::{Cab, Exhaust, Flexbody, Fusedrag, Globals, Minimass, Record};
use crate::keyword::Keyword;
use crate::tokenizer::split_on;

const DEFAULT_AIRFOIL: &str = "NACA0009.afl";

impl Parser {
    pub(super) fn parse_contacter(&mut self, args: &[&str]) {
        if !self.check_args(args, 1) {
            return;
        }
        let node = self.arg_node(args, 0);
        self.push(Keyword::Contacters, Record::Contacter(node));
    }

    pub(super) fn parse_fixes(&mut self, args: &[&str]) {
        let node = self.arg_node(args, 0);
        self.push(Keyword::Fixes, Record::Fixes(node));
    }

    /// Only a fallback for nodes no `set_default_minimass` applies to.
    pub(super) fn parse_minimass(&mut self, args: &[&str]) {
        let mut minimass = Minimass {
            min_mass: self.arg_float(args, 0),
            skip_loaded: false,
        };
        for c in args.get(1).copied().unwrap_or_default().chars() {
            match c {
                'n' => {}
                'l' => minimass.skip_loaded = true,
                _ => self.report(Severity::Warning, format!("Unknown option: {c}")),
            }
        }
        self.push(Keyword::Minimass, Record::Minimass(minimass));
    }

    pub(super) fn parse_node_collision(&mut self, args: &[&str]) {
        if !self.check_args(args, 2) {
            return;
        }
        let node = self.arg_node(args, 0);
        let radius = self.arg_float(args, 1);
        self.push(Keyword::Nodecollision, Record::NodeCollision { node, radius });
    }

    pub(super) fn parse_collision_box(&mut self, line: &str) {
        let nodes = split_on(line, &[','])
            .into_iter()
            .map(|t| self.node_ref(t))
            .collect();
        self.push(Keyword::Collisionboxes, Record::CollisionBox(nodes));
    }

    pub(super) fn parse_cab(&mut self, args: &[&str]) {
        if !self.check_args(args, 3) {
            return;
        }
        let cab = Cab {
            nodes: self.arg_nodes::<3>(args, 0),
            options: arg_str(args, 3),
        };
        self.push(Keyword::Cab, Record::Cab(cab));
    }

    pub(super) fn parse_globals(&mut self, args: &[&str]) {
        if !self.check_args(args, 2) {
            return;
        }
        let globals = Globals {
            dry_mass: self.arg_float(args, 0),
            cargo_mass: self.arg_float(args, 1),
            material: args.get(2).map(|s| (*s).to_owned()),
        };
        self.push(Keyword::Globals, Record::Globals(globals));
    }

    /// `front, rear, width|autocalc [, coef], [airfoil]`
    pub(super) fn parse_fusedrag(&mut self, args: &[&str]) {
        if !self.check_args(args, 3) {
            return;
        }
        let mut drag = Fusedrag {
            front: self.arg_node(args, 0),
            rear: self.arg_node(args, 1),
            approximate_width: None,
            area_coefficient: 1.0,
            airfoil: DEFAULT_AIRFOIL.to_owned(),
        };
        let airfoil_at = if args[2] == "autocalc" {
            if let Some(coef) = self.opt_float(args, 3) {
                drag.area_coefficient = coef;
            }
            4
        } else {
            drag.approximate_width = Some(self.arg_float(args, 2));
            3
        };
        if let Some(name) = args.get(airfoil_at) {
            drag.airfoil = (*name).to_owned();
        }
        self.push(Keyword::Fusedrag, Record::Fusedrag(drag));
    }

    pub(super) fn parse_exhaust(&mut self, args: &[&str]) {
        if !self.check_args(args, 2) {
            return;
        }
        // Argument 3 is unused.
        let exhaust = Exhaust {
            reference: self.arg_node(args, 0),
            direction: self.arg_node(args, 1),
            particle: args.get(3).map(|s| (*s).to_owned()),
        };
        self.push(Keyword::Exhausts, Record::Exhaust(exhaust));
    }

    pub(super) fn parse_flexbody(&mut self, args: &[&str]) {
        if !self.check_args(args, 10) {
            return;
        }
        let flexbody = Flexbody {
            reference: self.arg_node(args, 0),
            x_axis: self.arg_node(args, 1),
            y_axis: self.arg_node(args, 2),
            offset: [
                self.arg_float(args, 3),
                self.arg_float(args, 4),
                self.arg_float(args, 5),
            ],
            rotation: [
                self.arg_float(args, 6),
                self.arg_float(args, 7),
                self.arg_float(args, 8),
            ],
            mesh: arg_str(args, 9),
            forset: Default::default(),
        };
        self.push(Keyword::Flexbodies, Record::Flexbody(flexbody));
    }

    /// `forset 1-5, 8, 12-14` attaches to the last flexbody of the module.
    pub(super) fn parse_forset(&mut self, line: &str) {
        let rest = line.get(Keyword::Forset.as_str().len()..).unwrap_or_default();
        let tokens = split_on(rest, &[',']);
        let list = self.node_list(tokens);
        let flexbody = self
            .entries_mut()
            .iter_mut()
            .rev()
            .find_map(|e| match &mut e.record {
                Record::Flexbody(f) => Some(f),
                _ => None,
            });
        match flexbody {
            Some(f) => f.forset.items.extend(list.items),
            None => self.report(
                Severity::Warning,
                "'forset' without a preceding flexbody, ignoring".to_owned(),
            ),
        }
    }
}
