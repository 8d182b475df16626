//! Node mass resolution.
//!
//! The dry mass is spread over the soft body by beam length: every non
//! virtual beam hands half of its length-proportional share to each endpoint.
//! Loaded nodes additionally split the cargo mass, or keep their explicit
//! load weight. Tyre nodes keep the mass their wheel gave them.

use sim_types::NodeIdx;
use tracing::debug;

use crate::beam::{Beam, BeamType};
use crate::node::Node;

/// Mass assigned to the free end of every rope.
pub const ROPE_END_MASS: f64 = 100.0;

/// Actor-wide inputs of the mass pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MassSpec {
    /// Dry mass spread over the beams.
    pub dry_mass: f64,
    /// Cargo mass shared by loaded nodes without an override.
    pub load_mass: f64,
    /// Leave loaded nodes below their minimass alone.
    pub minimass_skip_loaded: bool,
    /// Rope end nodes.
    pub rope_ends: Vec<usize>,
    /// Cinecam nodes and their fixed masses.
    pub cinecams: Vec<(usize, f64)>,
}

/// Share of `dry_mass` each node receives, measuring beams with `length`.
///
/// Tyre nodes get nothing; virtual and inter-actor beams do not count.
pub fn dry_mass_shares(
    nodes: &[Node],
    beams: &[Beam],
    dry_mass: f64,
    length: impl Fn(&Beam) -> f64,
) -> Vec<f64> {
    let mut shares = vec![0.0; nodes.len()];
    let counted = || beams.iter().filter(|b| b.beam_type != BeamType::Virtual && b.remote.is_none());
    let takes = |end: NodeIdx| nodes.get(end.index()).is_some_and(|n| !n.flags.tyre);

    let mut total = 0.0;
    for beam in counted() {
        let half = length(beam) / 2.0;
        total += half * beam.nodes.iter().filter(|&&end| takes(end)).count() as f64;
    }
    if total <= 0.0 {
        return shares;
    }
    for beam in counted() {
        let half_mass = length(beam) * dry_mass / total / 2.0;
        for &end in &beam.nodes {
            if takes(end) {
                shares[end.index()] += half_mass;
            }
        }
    }
    shares
}

/// Recompute every node mass; returns the total.
///
/// Overridden nodes restart from their load weight, so repeated passes
/// give the same result.
pub fn recalculate_node_masses(nodes: &mut [Node], beams: &[Beam], spec: &MassSpec) -> f64 {
    let load_count = nodes
        .iter()
        .filter(|n| !n.flags.tyre && n.flags.loaded && !n.flags.override_mass)
        .count();
    for node in nodes.iter_mut().filter(|n| !n.flags.tyre) {
        if !node.flags.loaded {
            node.mass = 0.0;
        } else if node.flags.override_mass {
            node.mass = node.load_weight;
        } else {
            #[allow(clippy::cast_precision_loss)]
            let share = spec.load_mass / load_count as f64;
            node.mass = share;
        }
    }

    let shares = dry_mass_shares(nodes, beams, spec.dry_mass, |b| b.rest_length);
    for (node, share) in nodes.iter_mut().zip(shares) {
        node.mass += share;
    }

    for end in &spec.rope_ends {
        if let Some(n) = nodes.get_mut(*end) {
            n.mass = ROPE_END_MASS;
        }
    }
    for (node, mass) in &spec.cinecams {
        if let Some(n) = nodes.get_mut(*node) {
            n.mass = *mass;
        }
    }

    for (i, node) in nodes.iter_mut().enumerate() {
        if node.flags.tyre || (spec.minimass_skip_loaded && node.flags.loaded) {
            continue;
        }
        if node.mass < node.minimass {
            debug!(node = i, mass = node.mass, minimass = node.minimass, "node too light, raised to minimass");
            node.mass = node.minimass;
        }
    }

    let total: f64 = nodes.iter().map(|n| n.mass).sum();
    debug!(total, "actor mass");
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sim_types::{NodeIdx, Vec3};

    fn rig(n: usize) -> (Vec<Node>, Vec<Beam>) {
        let nodes: Vec<Node> = (0..n)
            .map(|i| Node::new(NodeIdx::at(i), Vec3::new(i as f64, 0.0, 0.0)))
            .collect();
        let beams = (1..n)
            .map(|i| {
                let mut b = Beam::new(NodeIdx::at(i - 1), NodeIdx::at(i));
                b.set_length(1.0);
                b
            })
            .collect();
        (nodes, beams)
    }

    #[test]
    fn dry_and_load_mass_add_up() {
        let (mut nodes, beams) = rig(4);
        nodes[3].flags.loaded = true;
        nodes[2].flags.loaded = true;
        let spec = MassSpec {
            dry_mass: 3000.0,
            load_mass: 500.0,
            ..MassSpec::default()
        };
        let total = recalculate_node_masses(&mut nodes, &beams, &spec);
        assert_relative_eq!(total, 3500.0, epsilon = 1e-9);
        // Inner nodes carry two half beams, outer ones one.
        assert_relative_eq!(nodes[0].mass, 500.0, epsilon = 1e-9);
        assert_relative_eq!(nodes[1].mass, 1000.0, epsilon = 1e-9);
        assert_relative_eq!(nodes[3].mass, 500.0 + 250.0, epsilon = 1e-9);
    }

    #[test]
    fn override_keeps_load_weight() {
        let (mut nodes, beams) = rig(2);
        nodes[1].flags.loaded = true;
        nodes[1].flags.override_mass = true;
        nodes[1].load_weight = 42.0;
        let spec = MassSpec {
            dry_mass: 100.0,
            load_mass: 1000.0,
            ..MassSpec::default()
        };
        recalculate_node_masses(&mut nodes, &beams, &spec);
        assert_relative_eq!(nodes[1].mass, 42.0 + 50.0);
    }

    #[test]
    fn repeated_passes_do_not_stack_overrides() {
        let (mut nodes, beams) = rig(3);
        nodes[2].flags.loaded = true;
        nodes[2].flags.override_mass = true;
        nodes[2].load_weight = 30.0;
        let spec = MassSpec {
            dry_mass: 100.0,
            ..MassSpec::default()
        };
        let first = recalculate_node_masses(&mut nodes, &beams, &spec);
        let second = recalculate_node_masses(&mut nodes, &beams, &spec);
        let third = recalculate_node_masses(&mut nodes, &beams, &spec);
        assert_relative_eq!(first, 130.0, epsilon = 1e-9);
        assert_relative_eq!(second, first, epsilon = 1e-9);
        assert_relative_eq!(third, first, epsilon = 1e-9);
        assert_relative_eq!(nodes[2].mass, 30.0 + 25.0, epsilon = 1e-9);
    }

    #[test]
    fn shares_follow_the_chosen_length() {
        let (nodes, mut beams) = rig(3);
        beams[1].rest_length = 3.0;
        let by_rest = dry_mass_shares(&nodes, &beams, 80.0, |b| b.rest_length);
        let by_spawn = dry_mass_shares(&nodes, &beams, 80.0, |b| b.ref_length);
        assert_relative_eq!(by_rest[2], 30.0, epsilon = 1e-9);
        assert_relative_eq!(by_spawn[2], 20.0, epsilon = 1e-9);
        assert_relative_eq!(by_rest.iter().sum::<f64>(), 80.0, epsilon = 1e-9);
    }

    #[test]
    fn minimass_floor_and_skip() {
        let (mut nodes, beams) = rig(2);
        for n in &mut nodes {
            n.minimass = 50.0;
        }
        nodes[1].flags.loaded = true;
        let spec = MassSpec {
            dry_mass: 10.0,
            load_mass: 0.0,
            minimass_skip_loaded: true,
            ..MassSpec::default()
        };
        let total = recalculate_node_masses(&mut nodes, &beams, &spec);
        assert_relative_eq!(nodes[0].mass, 50.0);
        assert_relative_eq!(nodes[1].mass, 5.0);
        assert_relative_eq!(total, 55.0);
    }

    #[test]
    fn tyres_virtual_beams_ropes_and_cinecams() {
        let (mut nodes, mut beams) = rig(4);
        nodes[3].flags.tyre = true;
        nodes[3].mass = 7.0;
        beams[0].beam_type = BeamType::Virtual;
        let spec = MassSpec {
            dry_mass: 100.0,
            rope_ends: vec![0],
            cinecams: vec![(1, 20.0)],
            ..MassSpec::default()
        };
        recalculate_node_masses(&mut nodes, &beams, &spec);
        assert_relative_eq!(nodes[3].mass, 7.0);
        assert_relative_eq!(nodes[0].mass, ROPE_END_MASS);
        assert_relative_eq!(nodes[1].mass, 20.0);
        // Only beam 1-2 counts, and node 3's half of beam 2-3 is dropped.
        assert_relative_eq!(nodes[2].mass, 100.0 * 2.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn beamless_actor_falls_back_to_minimass() {
        let (mut nodes, beams) = rig(1);
        nodes[0].minimass = 50.0;
        let total = recalculate_node_masses(&mut nodes, &beams, &MassSpec::default());
        assert_relative_eq!(total, 50.0);
    }
}
