//! Parsing, node reference resolution and wheel generation, end to end.

use std::collections::HashMap;

use approx::assert_relative_eq;
use sim_conformance_tests::{chassis_with, spawn, CHASSIS};
use sim_truck::importer::visit_refs;
use sim_truck::{parse, Keyword, ParseError, ParseOptions};
use sim_types::{NodeIdx, Severity, SimConfig, Vec3};

// ============================================================================
// Fixtures
// ============================================================================

const WHEEL: &str = "0.5, 0.3, 6, 0, 1, 9999, 1, 1, 4, 60, 50000, 100, face, band";
const WHEEL2: &str = "0.3, 0.5, 0.2, 6, 0, 1, 9999, 1, 1, 4, 60, 400000, 100, 50000, 50, face, band";

/// Every record family the parser resolves references for.
fn truck() -> String {
    format!(
        "{CHASSIS}\
wheels
{WHEEL}
nodes2
hub, 1.0, 0.5, 2.0
beams
hub, 1
hub, 3
set_beam_defaults 5000, 200
detacher_group 3
shocks
0, 3, 80000, 2000, 0.3, 0.3, 1.0
detacher_group end
hydros
hub, 4, 0.2
commands2
0, 4, 0.5, 0.25, 0.6, 1.4, 1, 2, c, Lift_arm
engine
1000, 2000, 500, 3.5, 8.0, 1.0, 4.0, 2.5, 1.5, -1
end
"
    )
}

// ============================================================================
// Parse determinism
// ============================================================================

#[test]
fn parsing_twice_gives_the_same_document() {
    let text = truck();
    let first = parse(&text, ParseOptions::default());
    let second = parse(&text, ParseOptions::default());
    assert!(first.fatal().is_none());
    assert_eq!(first.document, second.document);
    assert_eq!(first.diagnostics.all().len(), second.diagnostics.all().len());
    assert_eq!(first.nodes.len(), second.nodes.len());
}

// ============================================================================
// Importer
// ============================================================================

#[test]
fn every_reference_resolves_to_one_stable_node() {
    let out = parse(&truck(), ParseOptions::default());
    let mut seen: HashMap<String, NodeIdx> = HashMap::new();
    let mut conflicts = Vec::new();
    for entry in out.document.entries() {
        let mut record = entry.record.clone();
        visit_refs(&mut record, &mut |r| {
            let Some(idx) = r.resolved else {
                return;
            };
            if let Some(&prev) = seen.get(&r.text) {
                if prev != idx {
                    conflicts.push((r.text.clone(), prev, idx));
                }
            } else {
                seen.insert(r.text.clone(), idx);
            }
        });
    }
    assert!(conflicts.is_empty(), "{conflicts:?}");

    // Distinct references never share a node.
    let mut by_index: HashMap<NodeIdx, &str> = HashMap::new();
    for (text, idx) in &seen {
        if let Some(other) = by_index.insert(*idx, text) {
            panic!("{text} and {other} both resolve to {idx:?}");
        }
    }
    // Named nodes come right after the numbered ones, ahead of the wheel.
    assert_eq!(seen.get("hub"), Some(&NodeIdx(5)));
    assert_eq!(out.nodes.by_name("hub"), Some(NodeIdx(5)));
}

#[test]
fn gaps_in_numbering_are_fatal_once_each() {
    let text = "gappy\nnodes\n0,0,0,0\n1,1,0,0\n4,2,0,0\n2,2,0,0\n7,3,0,0\n3,3,0,0\n";
    let out = parse(text, ParseOptions::default());
    assert_eq!(out.diagnostics.count(Severity::Fatal), 2);
    assert_eq!(out.document.count(Keyword::Nodes), 4);
    assert!(matches!(
        out.fatal(),
        Some(ParseError::NodeOutOfSync { got: 4, expected: 2, .. })
    ));
    assert!(sim_truck::load(text).is_err());
}

// ============================================================================
// Wheels
// ============================================================================

#[test]
fn wheel_rays_become_alternating_tyre_nodes() {
    let actor = spawn(&chassis_with("wheels", WHEEL), Vec3::zeros(), &SimConfig::default());
    let wheel = &actor.wheels[0];
    assert_eq!(wheel.nodes.len(), 2 * 6);
    assert!(wheel.rim_nodes.is_empty());
    for (k, &n) in wheel.nodes.iter().enumerate() {
        let own = actor.nodes[wheel.axis[k % 2]].position;
        let other = actor.nodes[wheel.axis[(k + 1) % 2]].position;
        let p = actor.nodes[n].position;
        assert_relative_eq!((p - own).norm(), 0.5, epsilon = 1e-9);
        assert!((p - own).norm() < (p - other).norm());
    }
}

#[test]
fn wheels2_adds_an_alternating_rim_ring() {
    let actor = spawn(&chassis_with("wheels2", WHEEL2), Vec3::zeros(), &SimConfig::default());
    let wheel = &actor.wheels[0];
    assert_eq!(wheel.rim_nodes.len(), 2 * 6);
    assert_eq!(wheel.nodes.len(), 2 * 6);
    for (k, &n) in wheel.rim_nodes.iter().enumerate() {
        let hub = actor.nodes[wheel.axis[k % 2]].position;
        assert_relative_eq!((actor.nodes[n].position - hub).norm(), 0.3, epsilon = 1e-9);
        assert!(actor.nodes[n].flags.rim);
    }
    assert!(wheel.nodes.iter().all(|&n| actor.nodes[n].flags.tyre));
}

// ============================================================================
// Writer
// ============================================================================

#[test]
fn written_document_spawns_the_same_actor() {
    let text = truck();
    let first = sim_truck::load(&text).expect("fixture");
    let written = sim_truck::write(&first.document);
    let config = SimConfig::default();
    let a = spawn(&text, Vec3::zeros(), &config);
    let b = spawn(&written, Vec3::zeros(), &config);

    assert_eq!(a.nodes.len(), b.nodes.len());
    assert_eq!(a.beams.len(), b.beams.len());
    assert_eq!(a.shocks.len(), b.shocks.len());
    assert_eq!(a.hydros.len(), b.hydros.len());
    assert!(b.engine.is_some());
    for (x, y) in a.beams.iter().zip(&b.beams) {
        assert_relative_eq!(x.rest_length, y.rest_length, epsilon = 1e-9);
        assert_relative_eq!(x.k, y.k, epsilon = 1e-9);
        assert_eq!(x.detacher_group, y.detacher_group);
    }
    assert_relative_eq!(a.total_mass, b.total_mass, epsilon = 1e-6);
}
