//! Live actor back to document text and into a fresh actor.

use approx::assert_relative_eq;
use sim_conformance_tests::{load, manager, spawn, spawn_awake, ARM, CHASSIS};
use sim_core::ExportOptions;
use sim_types::{SimConfig, Vec3};

#[test]
fn exported_actor_respawns_with_the_same_structure() {
    let config = SimConfig::deterministic();
    let mut m = manager(config.clone());
    let id = spawn_awake(&mut m, CHASSIS, Vec3::zeros());
    for _ in 0..3 {
        m.tick(0.02, Some(id));
    }

    let doc = m.export(id, &ExportOptions::default()).expect("export");
    let text = sim_truck::write(&doc);
    let respawned = spawn(&text, Vec3::zeros(), &config);
    let live = m.actor(id).expect("actor");

    assert_eq!(respawned.nodes.len(), live.nodes.len());
    assert_eq!(respawned.beams.len(), live.beams.len());
    assert_relative_eq!(respawned.total_mass, live.initial_total_mass, epsilon = 1e-6);
    for (a, b) in respawned.nodes.iter().zip(&live.nodes) {
        assert_eq!(a.flags.loaded, b.flags.loaded);
    }
}

#[test]
fn command_beams_survive_the_round_trip() {
    let config = SimConfig::deterministic();
    let mut m = manager(config.clone());
    let id = spawn_awake(&mut m, ARM, Vec3::zeros());
    let doc = m.export(id, &ExportOptions::default()).expect("export");
    let respawned = spawn(&sim_truck::write(&doc), Vec3::zeros(), &config);

    let original = spawn(ARM, Vec3::zeros(), &config);
    assert_eq!(respawned.command_keys[4].beams.len(), 1);
    let (a, b) = (&original.command_keys[4].beams[0], &respawned.command_keys[4].beams[0]);
    assert_relative_eq!(a.speed, b.speed, epsilon = 1e-9);
    assert_eq!(a.contraction, b.contraction);
}

#[test]
fn overriding_node_masses_keeps_the_edited_mass() {
    let config = SimConfig::deterministic();
    let mut m = manager(config.clone());
    let id = spawn_awake(&mut m, ARM, Vec3::zeros());
    m.set_node_mass(id, 1, 75.0).expect("set mass");
    let live: Vec<f64> = m.actor(id).expect("actor").nodes.iter().map(|n| n.mass).collect();

    let options = ExportOptions {
        override_all_node_masses: true,
    };
    let doc = m.export(id, &options).expect("export");
    let respawned = spawn(&sim_truck::write(&doc), Vec3::zeros(), &config);

    assert_relative_eq!(respawned.nodes[1].mass, 75.0, epsilon = 1e-9);
    for (node, mass) in respawned.nodes.iter().zip(&live) {
        assert_relative_eq!(node.mass, *mass, epsilon = 1e-6);
        assert!(node.flags.loaded);
    }
    // Every node now carries its own weight.
    let reloaded = load(&sim_truck::write(&doc));
    assert_eq!(reloaded.count(sim_truck::Keyword::Nodes), 3);
}
