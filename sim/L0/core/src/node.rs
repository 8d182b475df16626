//! Point masses.

use sim_types::constants::{
    DEFAULT_COLLISION_RANGE, NODE_DEFAULT_MASS, NODE_FRICTION_COEF_DEFAULT, NODE_LOADWEIGHT_DEFAULT,
    NODE_LOCKGROUP_DEFAULT, NODE_SURFACE_COEF_DEFAULT, NODE_VOLUME_COEF_DEFAULT,
};
use sim_types::{NodeIdx, Vec3};

/// Option letters of a `nodes` line, plus flags the spawner sets on
/// generated nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct NodeFlags {
    /// `l`: carries part of the cargo mass.
    pub loaded: bool,
    /// Mass given explicitly by a load weight.
    pub override_mass: bool,
    /// `c`: never collides with the ground.
    pub no_ground_contact: bool,
    /// Collides with foreign cab triangles (contacter).
    pub contactable: bool,
    /// `h`: can be the end of a rope.
    pub hookable: bool,
    /// `b`: extra buoyancy.
    pub extra_buoyancy: bool,
    /// `m`: cannot be grabbed with the mouse.
    pub no_mouse_grab: bool,
    /// `p`: no particles.
    pub no_particles: bool,
    /// `f`: no sparks.
    pub no_sparks: bool,
    /// Generated rim node.
    pub rim: bool,
    /// Generated tyre node.
    pub tyre: bool,
    /// Generated by `cinecam`.
    pub cinecam: bool,
    /// Touched the ground in the last substep.
    pub ground_contact: bool,
}

impl NodeFlags {
    /// Parse the option string of a `nodes` line.
    #[must_use]
    pub fn from_options(options: &str) -> Self {
        let mut flags = Self::default();
        for c in options.chars() {
            match c {
                'l' => flags.loaded = true,
                'c' => flags.no_ground_contact = true,
                'h' => flags.hookable = true,
                'b' => flags.extra_buoyancy = true,
                'm' => flags.no_mouse_grab = true,
                'p' => flags.no_particles = true,
                'f' => flags.no_sparks = true,
                _ => {}
            }
        }
        flags
    }
}

/// A point mass of the soft body.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Index in the actor's node array.
    pub idx: NodeIdx,
    /// Name for `nodes2` nodes.
    pub name: Option<String>,
    /// Number the node was written with in `nodes`.
    pub number: Option<u32>,
    /// Document-space position, relative to the spawn origin.
    pub spawn_offset: Vec3,
    /// Position at spawn, after placement.
    pub initial_position: Vec3,
    /// Current position.
    pub position: Vec3,
    /// Current velocity.
    pub velocity: Vec3,
    /// Forces accumulated during the current substep.
    pub forces: Vec3,
    /// Mass in kg.
    pub mass: f64,
    /// Explicit load weight, negative when unset.
    pub load_weight: f64,
    /// Lower mass bound.
    pub minimass: f64,
    /// Ground friction multiplier.
    pub friction_coef: f64,
    /// Buoyancy multiplier.
    pub volume_coef: f64,
    /// Drag multiplier.
    pub surface_coef: f64,
    /// Buoyancy force.
    pub buoyancy: f64,
    /// Radius for ground and cab collision.
    pub collision_range: f64,
    /// Lockgroup, see `lockgroups`.
    pub lockgroup: i32,
    /// Option flags.
    pub flags: NodeFlags,
    /// Last ground slip velocity.
    pub last_slip: f64,
}

impl Node {
    /// Node at `position` with default coefficients.
    #[must_use]
    pub fn new(idx: NodeIdx, position: Vec3) -> Self {
        Self {
            idx,
            name: None,
            number: None,
            spawn_offset: position,
            initial_position: position,
            position,
            velocity: Vec3::zeros(),
            forces: Vec3::zeros(),
            mass: NODE_DEFAULT_MASS,
            load_weight: NODE_LOADWEIGHT_DEFAULT,
            minimass: 0.0,
            friction_coef: NODE_FRICTION_COEF_DEFAULT,
            volume_coef: NODE_VOLUME_COEF_DEFAULT,
            surface_coef: NODE_SURFACE_COEF_DEFAULT,
            buoyancy: 0.0,
            collision_range: DEFAULT_COLLISION_RANGE,
            lockgroup: NODE_LOCKGROUP_DEFAULT,
            flags: NodeFlags::default(),
            last_slip: 0.0,
        }
    }

    /// Kinetic energy `½·m·v²`.
    #[must_use]
    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass * self.velocity.norm_squared()
    }

    /// Add `impulse / mass` to the velocity.
    pub fn apply_impulse(&mut self, impulse: Vec3) {
        if self.mass > 0.0 {
            self.velocity += impulse / self.mass;
        }
    }

    /// Put the node back where it spawned, at rest.
    pub fn reset(&mut self) {
        self.position = self.initial_position;
        self.velocity = Vec3::zeros();
        self.forces = Vec3::zeros();
        self.flags.ground_contact = false;
        self.last_slip = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn option_letters() {
        let f = NodeFlags::from_options("nlhcx");
        assert!(f.loaded && f.hookable && f.no_ground_contact);
        assert!(!f.extra_buoyancy);
    }

    #[test]
    fn impulse_scales_with_mass() {
        let mut n = Node::new(NodeIdx(0), Vec3::zeros());
        n.mass = 20.0;
        n.apply_impulse(Vec3::new(100.0, 0.0, 0.0));
        assert_relative_eq!(n.velocity.x, 5.0);
        assert_relative_eq!(n.kinetic_energy(), 250.0);
    }

    #[test]
    fn reset_restores_spawn_position() {
        let mut n = Node::new(NodeIdx(3), Vec3::new(1.0, 2.0, 3.0));
        n.position.y = -7.0;
        n.velocity.x = 4.0;
        n.reset();
        assert_eq!(n.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(n.velocity, Vec3::zeros());
    }
}
