//! Single-actor physics: spring-damper beams, breaking, support beams, mass
//! resolution, resting stability and detacher groups.

use approx::assert_relative_eq;
use sim_conformance_tests::{
    node_distance, run, run_with, spawn, steps_for, BOX, CHASSIS, FRAGILE_PAIR, PAIR, SUPPORT,
    UNDAMPED_PAIR,
};
use sim_core::Actor;
use sim_types::{FlatTerrain, NullTerrain, SimConfig, Vec3};

fn energy(actor: &Actor) -> f64 {
    let kinetic: f64 = actor
        .nodes
        .iter()
        .map(|n| 0.5 * n.mass * n.velocity.norm_squared())
        .sum();
    let beam = &actor.beams[0];
    let stretch = node_distance(actor, 0, 1) - beam.rest_length;
    kinetic + 0.5 * beam.k * stretch * stretch
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn minimal_actor_falls_without_stretching() {
    let config = SimConfig::deterministic();
    let mut actor = spawn(PAIR, Vec3::new(0.0, 1.0, 0.0), &config);
    assert_relative_eq!(actor.beams[0].k, 1000.0);
    assert_relative_eq!(actor.beams[0].d, 5.0);
    let start: Vec<f64> = actor.nodes.iter().map(|n| n.position.y).collect();

    let mut worst = (1.0_f64, 1.0_f64);
    run_with(&mut actor, &config, &NullTerrain, steps_for(1.0, &config), |_, a| {
        let len = node_distance(a, 0, 1);
        worst = (worst.0.min(len), worst.1.max(len));
    });
    assert!(worst.0 >= 0.9 && worst.1 <= 1.1, "length left [0.9, 1.1]: {worst:?}");
    for (node, y0) in actor.nodes.iter().zip(start) {
        assert!(node.position.y < y0 - 4.0, "node barely fell: {} from {y0}", node.position.y);
    }
}

#[test]
fn impulse_breaks_a_weak_beam_within_three_substeps() {
    let config = SimConfig::deterministic();
    let mut actor = spawn(FRAGILE_PAIR, Vec3::new(0.0, 1.0, 0.0), &config);
    assert_relative_eq!(actor.beams[0].strength, 10.0);

    // 10 kN on node 0 for one substep, pointing away from node 1.
    let away = (actor.nodes[0].position - actor.nodes[1].position).normalize();
    let mass = actor.nodes[0].mass;
    actor.nodes[0].velocity += away * (10_000.0 * config.physics_dt / mass);

    let mut broke_at = None;
    run_with(&mut actor, &config, &NullTerrain, 3, |step, a| {
        if broke_at.is_none() && a.beams[0].broken {
            broke_at = Some(step + 1);
        }
    });
    assert!(broke_at.is_some(), "beam survived the impulse");
    assert!(actor.beams[0].disabled);
}

#[test]
fn support_beam_breaks_only_past_its_long_bound() {
    let config = SimConfig::deterministic().zero_gravity().without_drag();
    let mut actor = spawn(SUPPORT, Vec3::zeros(), &config);
    assert_relative_eq!(actor.beams[0].rest_length, 1.0, epsilon = 1e-12);
    let anchor = actor.nodes[0].position;

    for length in [2.0, 4.9, 4.999] {
        actor.nodes[1].position = anchor + Vec3::new(length, 0.0, 0.0);
        run(&mut actor, &config, &NullTerrain, 1);
        assert!(!actor.beams[0].broken, "broke at {length}");
    }
    actor.nodes[1].position = anchor + Vec3::new(5.001, 0.0, 0.0);
    run(&mut actor, &config, &NullTerrain, 1);
    assert!(actor.beams[0].broken);
    assert!(actor.beams[0].disabled);
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn spawn_mass_is_dry_plus_load() {
    let actor = spawn(CHASSIS, Vec3::zeros(), &SimConfig::default());
    let sum: f64 = actor.nodes.iter().map(|n| n.mass).sum();
    assert_relative_eq!(actor.total_mass, sum, epsilon = 1e-9);
    assert_relative_eq!(actor.total_mass, 2000.0 + 500.0, epsilon = 1e-6);
    assert_relative_eq!(actor.initial_total_mass, actor.total_mass);
    // Both loaded nodes carry half the load on top of their dry share.
    assert!(actor.nodes[2].mass > 250.0 && actor.nodes[3].mass > 250.0);
}

#[test]
fn resting_actor_settles_on_flat_ground() {
    let config = SimConfig::deterministic();
    let ground = FlatTerrain::new(0.0);
    let mut actor = spawn(BOX, Vec3::zeros(), &config);
    run(&mut actor, &config, &ground, steps_for(2.0, &config));

    #[allow(clippy::cast_precision_loss)]
    let count = actor.nodes.len() as f64;
    let avg = actor.nodes.iter().map(|n| n.velocity).sum::<Vec3>() / count;
    assert!(avg.norm() < 0.1, "still moving at {}", avg.norm());
    assert!(actor.nodes.iter().all(|n| n.position.y > -0.1));
}

#[test]
fn undamped_pair_conserves_energy() {
    let config = SimConfig::deterministic().zero_gravity().without_drag();
    let mut actor = spawn(UNDAMPED_PAIR, Vec3::zeros(), &config);
    assert_relative_eq!(actor.beams[0].d, 0.0);
    let dir = (actor.nodes[1].position - actor.nodes[0].position).normalize();
    actor.nodes[1].position += dir * 0.1;
    let initial = energy(&actor);
    assert_relative_eq!(initial, 0.5 * 1000.0 * 0.01, epsilon = 1e-9);

    let mut drift = 0.0_f64;
    run_with(&mut actor, &config, &NullTerrain, steps_for(1.0, &config), |_, a| {
        drift = drift.max((energy(a) - initial).abs() / initial);
    });
    assert!(drift < 0.01, "energy drifted by {:.3}%", drift * 100.0);
}

#[test]
fn detacher_group_releases_beams_and_wheel_together() {
    let text = format!(
        "{CHASSIS}\
wheels
0.5, 0.3, 6, 0, 1, 9999, 1, 1, 4, 60, 50000, 100, face, band
set_beam_defaults -1, -1, -1, 10
detacher_group 2
beams
0, 3
1, 2
detacher_group end
wheeldetachers
0, 2
end
"
    );
    let config = SimConfig::deterministic().zero_gravity().without_drag();
    let mut actor = spawn(&text, Vec3::zeros(), &config);
    let group: Vec<usize> = (0..actor.beams.len())
        .filter(|&i| actor.beams[i].detacher_group == 2)
        .collect();
    assert_eq!(group.len(), 2);
    assert_eq!(actor.wheels[0].detacher_group, 2);

    // Stretch the weak 0-3 beam by a millimetre.
    let along = (actor.nodes[3].position - actor.nodes[0].position).normalize();
    actor.nodes[3].position += along * 0.001;
    run(&mut actor, &config, &NullTerrain, 1);
    assert!(group.iter().all(|&i| actor.beams[i].disabled));
    assert!(actor.wheels[0].detached);
    let untouched = actor
        .beams
        .iter()
        .filter(|b| b.detacher_group == 0)
        .all(|b| !b.broken);
    assert!(untouched);
}
