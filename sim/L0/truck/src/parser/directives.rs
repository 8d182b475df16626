//! Directives: preset folding, flags and document metadata.

use sim_types::constants::{
    DEFAULT_COLLISION_RANGE, DEFAULT_DETACHER_GROUP, NODE_FRICTION_COEF_DEFAULT,
    NODE_LOADWEIGHT_DEFAULT, NODE_SURFACE_COEF_DEFAULT, NODE_VOLUME_COEF_DEFAULT,
};
use sim_types::Severity;

use super::args::{arg_str, clamp_i32};
use super::{snapshot, Parser};
use crate::document::{
    Author, BeamDefaultsArgs, BeamScale, DetacherGroup, ExtCamera, Fileinfo, Record,
};
use crate::keyword::Keyword;
use crate::tokenizer::split_on;

fn non_negative_or(value: f64, fallback: f64) -> f64 {
    if value < 0.0 {
        fallback
    } else {
        value
    }
}

impl Parser {
    pub(super) fn process_directive(&mut self, keyword: Keyword, line: &str, args: &[&str]) {
        match keyword {
            Keyword::AddAnimation => self.parse_add_animation(line),
            Keyword::AntiLockBrakes | Keyword::TractionControl => {
                self.parse_slip_control(keyword, line);
            }
            Keyword::Author => self.parse_author(args),
            Keyword::Backmesh => self.push(keyword, Record::Flag),
            Keyword::Cruisecontrol => self.parse_cruise_control(args),
            Keyword::DetacherGroup => self.parse_detacher_group(args),
            Keyword::Disabledefaultsounds
            | Keyword::Forwardcommands
            | Keyword::HideInChooser
            | Keyword::Importcommands
            | Keyword::Rescuer
            | Keyword::Rollon
            | Keyword::SlidenodeConnectInstant => self.push(keyword, Record::Flag),
            Keyword::EnableAdvancedDeformation => {
                let (tables, state) = self.tables();
                state.beam.advanced_deformation = true;
                state.refs.beam_defaults = snapshot(&mut tables.beam_defaults, &state.beam);
                self.push(keyword, Record::Flag);
            }
            Keyword::LockgroupDefaultNolock => {
                let (tables, state) = self.tables();
                state.node.lockgroup_nolock = true;
                state.refs.node_defaults = snapshot(&mut tables.node_defaults, &state.node);
                self.push(keyword, Record::Flag);
            }
            Keyword::Extcamera => self.parse_extcamera(args),
            Keyword::Fileformatversion => {
                if self.check_args(args, 2) {
                    let version = self.arg_int(args, 1).max(0);
                    self.push(keyword, Record::FileFormatVersion(version));
                }
            }
            Keyword::Fileinfo => self.parse_fileinfo(args),
            Keyword::Forset => self.parse_forset(line),
            Keyword::FlexbodyCameraMode | Keyword::PropCameraMode | Keyword::SubmeshGroundmodel => {
                if self.check_args(args, 2) {
                    self.push(keyword, Record::Raw(vec![arg_str(args, 1)]));
                }
            }
            Keyword::Guid => {
                if self.check_args(args, 2) {
                    self.doc.guid = Some(arg_str(args, 1));
                }
            }
            Keyword::Sectionconfig => {
                if self.check_args(args, 3) {
                    self.doc.sectionconfigs.push(arg_str(args, 2));
                }
            }
            Keyword::SetBeamDefaults => self.parse_set_beam_defaults(args),
            Keyword::SetBeamDefaultsScale => self.parse_set_beam_defaults_scale(args),
            Keyword::SetCollisionRange => {
                if self.check_args(args, 2) {
                    let range = non_negative_or(self.arg_float(args, 1), DEFAULT_COLLISION_RANGE);
                    let (tables, state) = self.tables();
                    state.collision_range = range;
                    state.refs.collision_range = snapshot(&mut tables.collision_range, &range);
                }
            }
            Keyword::SetDefaultMinimass => {
                if self.check_args(args, 2) {
                    let mass = self.arg_float(args, 1);
                    let (tables, state) = self.tables();
                    state.minimass = mass;
                    state.refs.minimass = snapshot(&mut tables.minimass, &mass);
                }
            }
            Keyword::SetInertiaDefaults => self.parse_set_inertia_defaults(args),
            Keyword::SetManagedmaterialsOptions => {
                if self.check_args(args, 2) {
                    let double_sided = self.arg_int(args, 1) != 0;
                    let (tables, state) = self.tables();
                    state.managed_mat_double_sided = double_sided;
                    state.refs.managed_mat =
                        snapshot(&mut tables.managed_mat_double_sided, &double_sided);
                }
            }
            Keyword::SetNodeDefaults => self.parse_set_node_defaults(args),
            Keyword::SetSkeletonSettings => {
                if self.check_args(args, 2) {
                    let range = self.arg_float(args, 1);
                    let thickness = self.opt_float(args, 2);
                    let (tables, state) = self.tables();
                    state.skeleton.visibility_range = range;
                    if let Some(t) = thickness {
                        state.skeleton.beam_thickness = t;
                    }
                    state.refs.skeleton = snapshot(&mut tables.skeleton, &state.skeleton);
                }
            }
            Keyword::Slopebrake => self.parse_slope_brake(args),
            Keyword::Speedlimiter => self.parse_speed_limiter(args),
            _ => {}
        }
    }

    fn parse_add_animation(&mut self, line: &str) {
        let rest = line.get(Keyword::AddAnimation.as_str().len()..).unwrap_or_default();
        let tokens = split_on(rest, &[',']);
        if tokens.len() < 4 {
            self.report(Severity::Error, "Not enough arguments, skipping...".to_owned());
            return;
        }
        let raw = tokens.into_iter().map(str::to_owned).collect();
        self.push(Keyword::AddAnimation, Record::Raw(raw));
    }

    fn parse_author(&mut self, args: &[&str]) {
        if !self.check_args(args, 2) {
            return;
        }
        let author = Author {
            kind: arg_str(args, 1),
            forum_id: self.opt_int(args, 2),
            name: arg_str(args, 3),
            email: arg_str(args, 4),
        };
        self.push(Keyword::Author, Record::Author(author));
    }

    fn parse_fileinfo(&mut self, args: &[&str]) {
        if !self.check_args(args, 2) {
            return;
        }
        let info = Fileinfo {
            unique_id: arg_str(args, 1).trim().to_owned(),
            category: self.opt_int(args, 2),
            version: self.opt_int(args, 3),
        };
        self.push(Keyword::Fileinfo, Record::Fileinfo(info));
    }

    fn parse_extcamera(&mut self, args: &[&str]) {
        if !self.check_args(args, 2) {
            return;
        }
        let mode = match args[1] {
            "cinecam" => ExtCamera::Cinecam,
            "node" if args.len() > 2 => ExtCamera::Node(self.arg_node(args, 2)),
            _ => ExtCamera::Classic,
        };
        self.push(Keyword::Extcamera, Record::ExtCamera(mode));
    }

    fn parse_detacher_group(&mut self, args: &[&str]) {
        if !self.check_args(args, 2) {
            return;
        }
        let group = if args[1] == "end" {
            DetacherGroup {
                group: DEFAULT_DETACHER_GROUP,
                end: true,
            }
        } else {
            DetacherGroup {
                group: clamp_i32(self.arg_int(args, 1)),
                end: false,
            }
        };
        let (tables, state) = self.tables();
        state.detacher = group;
        state.refs.detacher_group = snapshot(&mut tables.detacher_group, &group);
    }

    fn parse_set_beam_defaults(&mut self, args: &[&str]) {
        if !self.check_args(args, 2) {
            return;
        }
        let fold = BeamDefaultsArgs {
            spring: Some(self.arg_float(args, 1)),
            damp: self.opt_float(args, 2),
            deform: self.opt_float(args, 3),
            break_force: self.opt_float(args, 4),
            diameter: self.opt_float(args, 5),
            material: args.get(6).map(|s| (*s).to_owned()),
            plastic_coef: self.opt_float(args, 7),
        };
        let (tables, state) = self.tables();
        state.beam.apply(&fold);
        state.refs.beam_defaults = snapshot(&mut tables.beam_defaults, &state.beam);
    }

    fn parse_set_beam_defaults_scale(&mut self, args: &[&str]) {
        if !self.check_args(args, 5) {
            return;
        }
        let scale = BeamScale {
            spring: self.arg_float(args, 1),
            damp: self.arg_float(args, 2),
            deform: self.arg_float(args, 3),
            break_force: self.arg_float(args, 4),
        };
        let (tables, state) = self.tables();
        state.beam.scale = scale;
        state.refs.beam_defaults = snapshot(&mut tables.beam_defaults, &state.beam);
    }

    fn parse_set_node_defaults(&mut self, args: &[&str]) {
        if !self.check_args(args, 2) {
            return;
        }
        let load_weight = self.arg_float(args, 1);
        let friction = self.opt_float(args, 2);
        let volume = self.opt_float(args, 3);
        let surface = self.opt_float(args, 4);
        let options = args.get(5).map(|s| (*s).to_owned());
        let (tables, state) = self.tables();
        let node = &mut state.node;
        node.load_weight = non_negative_or(load_weight, NODE_LOADWEIGHT_DEFAULT);
        if let Some(v) = friction {
            node.friction = non_negative_or(v, NODE_FRICTION_COEF_DEFAULT);
        }
        if let Some(v) = volume {
            node.volume = non_negative_or(v, NODE_VOLUME_COEF_DEFAULT);
        }
        if let Some(v) = surface {
            node.surface = non_negative_or(v, NODE_SURFACE_COEF_DEFAULT);
        }
        match options {
            Some(o) => node.options = o,
            // Historical: options are cleared unless the surface coefficient
            // was given.
            None if args.len() <= 4 => node.options.clear(),
            None => {}
        }
        state.refs.node_defaults = snapshot(&mut tables.node_defaults, &state.node);
    }

    fn parse_set_inertia_defaults(&mut self, args: &[&str]) {
        if !self.check_args(args, 2) {
            return;
        }
        let start = self.arg_float(args, 1);
        let stop = self.opt_float(args, 2);
        let (tables, state) = self.tables();
        let inertia = &mut state.inertia;
        inertia.start_delay = start;
        if let Some(v) = stop {
            inertia.stop_delay = v;
        }
        if let Some(f) = args.get(3) {
            inertia.start_function = (*f).to_owned();
        }
        if let Some(f) = args.get(4) {
            inertia.stop_function = (*f).to_owned();
        }
        if inertia.start_delay < 0.0 || inertia.stop_delay < 0.0 {
            *inertia = crate::document::InertiaDefaults::default();
        }
        state.refs.inertia_defaults = snapshot(&mut tables.inertia_defaults, &state.inertia);
    }
}
