//! Wheels and cameras. Both generate nodes, so they register with the
//! node registry as they are read.

use super::args::arg_str;
use super::Parser;
use crate::document::{
    Camera, Cinecam, FlexBodyWheel, MeshWheel, Record, Wheel, Wheel2, WheelBase, WheelDetacher,
};
use crate::importer::NodeDetail;
use crate::keyword::Keyword;

impl Parser {
    /// Arguments shared by every wheel keyword.
    ///
    /// The seven arguments after the ray count are always node1, node2,
    /// rigidity node, braking, propulsion, arm node and mass.
    fn wheel_base(&mut self, args: &[&str], width_at: usize, rays_at: usize) -> WheelBase {
        let first = rays_at + 1;
        WheelBase {
            width: self.arg_float(args, width_at),
            rays: self.arg_u32(args, rays_at),
            nodes: self.arg_nodes::<2>(args, first),
            rigidity_node: self.arg_rigidity_node(args, first + 2),
            braking: self.arg_braking(args, first + 3),
            propulsion: self.arg_propulsion(args, first + 4),
            arm_node: self.arg_node(args, first + 5),
            mass: self.arg_float(args, first + 6),
        }
    }

    pub(super) fn parse_wheel(&mut self, args: &[&str]) {
        if !self.check_args(args, 14) {
            return;
        }
        let wheel = Wheel {
            radius: self.arg_float(args, 0),
            base: self.wheel_base(args, 1, 2),
            spring: self.arg_float(args, 10),
            damp: self.arg_float(args, 11),
            face_material: arg_str(args, 12),
            band_material: arg_str(args, 13),
        };
        self.registry.generate_wheel(Keyword::Wheels, wheel.base.rays);
        self.push(Keyword::Wheels, Record::Wheel(wheel));
    }

    pub(super) fn parse_wheel2(&mut self, args: &[&str]) {
        if !self.check_args(args, 17) {
            return;
        }
        let wheel = Wheel2 {
            rim_radius: self.arg_float(args, 0),
            tyre_radius: self.arg_float(args, 1),
            base: self.wheel_base(args, 2, 3),
            rim_spring: self.arg_float(args, 11),
            rim_damp: self.arg_float(args, 12),
            tyre_spring: self.arg_float(args, 13),
            tyre_damp: self.arg_float(args, 14),
            face_material: arg_str(args, 15),
            band_material: arg_str(args, 16),
        };
        self.registry.generate_wheel(Keyword::Wheels2, wheel.base.rays);
        self.push(Keyword::Wheels2, Record::Wheel2(wheel));
    }

    pub(super) fn parse_mesh_wheel(&mut self, section: Keyword, args: &[&str]) {
        if !self.check_args(args, 16) {
            return;
        }
        let wheel = MeshWheel {
            tyre_radius: self.arg_float(args, 0),
            rim_radius: self.arg_float(args, 1),
            base: self.wheel_base(args, 2, 3),
            spring: self.arg_float(args, 11),
            damp: self.arg_float(args, 12),
            side: self.arg_wheel_side(args, 13),
            mesh: arg_str(args, 14),
            material: arg_str(args, 15),
        };
        self.registry.generate_wheel(section, wheel.base.rays);
        self.push(section, Record::MeshWheel(wheel));
    }

    pub(super) fn parse_flexbody_wheel(&mut self, args: &[&str]) {
        if !self.check_args(args, 16) {
            return;
        }
        let wheel = FlexBodyWheel {
            tyre_radius: self.arg_float(args, 0),
            rim_radius: self.arg_float(args, 1),
            base: self.wheel_base(args, 2, 3),
            tyre_spring: self.arg_float(args, 11),
            tyre_damp: self.arg_float(args, 12),
            rim_spring: self.arg_float(args, 13),
            rim_damp: self.arg_float(args, 14),
            side: self.arg_wheel_side(args, 15),
            rim_mesh: arg_str(args, 16),
            tyre_mesh: arg_str(args, 17),
        };
        self.registry.generate_wheel(Keyword::Flexbodywheels, wheel.base.rays);
        self.push(Keyword::Flexbodywheels, Record::FlexBodyWheel(wheel));
    }

    pub(super) fn parse_wheel_detacher(&mut self, args: &[&str]) {
        if !self.check_args(args, 2) {
            return;
        }
        let detacher = WheelDetacher {
            wheel: self.arg_i32(args, 0),
            group: self.arg_i32(args, 1),
        };
        self.push(Keyword::Wheeldetachers, Record::WheelDetacher(detacher));
    }

    pub(super) fn parse_cinecam(&mut self, args: &[&str]) {
        if !self.check_args(args, 11) {
            return;
        }
        let position = [
            self.arg_float(args, 0),
            self.arg_float(args, 1),
            self.arg_float(args, 2),
        ];
        let nodes = self.arg_nodes::<8>(args, 3);
        let spring = self.opt_float(args, 11).unwrap_or(8000.0);
        let damp = self.opt_float(args, 12).unwrap_or(800.0);
        // Garbage such as a trailing pseudo-comment reads as 0 and is ignored.
        let node_mass = self
            .opt_float(args, 13)
            .filter(|m| *m > 0.0)
            .unwrap_or(20.0);
        self.registry.add_generated(Keyword::Cinecam, NodeDetail::Plain);
        self.push(
            Keyword::Cinecam,
            Record::Cinecam(Cinecam {
                position,
                nodes,
                spring,
                damp,
                node_mass,
            }),
        );
    }

    pub(super) fn parse_camera(&mut self, args: &[&str]) {
        if !self.check_args(args, 3) {
            return;
        }
        let camera = Camera {
            center: self.arg_node(args, 0),
            back: self.arg_node(args, 1),
            left: self.arg_node(args, 2),
        };
        self.push(Keyword::Cameras, Record::Camera(camera));
    }

    /// Each line adds one node to the rail opened by the section keyword.
    pub(super) fn parse_camera_rail(&mut self, args: &[&str]) {
        if !self.check_args(args, 1) {
            return;
        }
        let node = self.arg_node(args, 0);
        let rail = self
            .entries_mut()
            .iter_mut()
            .rev()
            .find_map(|e| match &mut e.record {
                Record::CameraRail(nodes) => Some(nodes),
                _ => None,
            });
        match rail {
            Some(nodes) => nodes.push(node),
            None => self.push(Keyword::Camerarail, Record::CameraRail(vec![node])),
        }
    }
}
