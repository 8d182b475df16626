//! Several actors under one manager: sleeping, waking, hooks and deletion.

use sim_conformance_tests::{manager, spawn_awake, BOX, HOOK_POINT};
use sim_core::{ActorManager, ActorSpawnRequest, ActorState};
use sim_types::{ActorId, InputEvent, SimConfig, Vec3};

fn floating() -> SimConfig {
    SimConfig::deterministic().zero_gravity().without_drag()
}

fn state(m: &mut ActorManager, id: ActorId) -> ActorState {
    m.actor(id).expect("actor is alive").state
}

/// Two hook points half a metre apart, the first one locked onto the second.
fn hooked() -> (ActorManager, ActorId, ActorId) {
    let mut m = manager(floating());
    let a = spawn_awake(&mut m, HOOK_POINT, Vec3::zeros());
    let b = spawn_awake(&mut m, HOOK_POINT, Vec3::new(0.5, 0.0, 0.0));
    m.push_input(a, InputEvent::ToggleHooks).expect("input");
    m.tick(0.01, Some(a));
    (m, a, b)
}

// ============================================================================
// Sleep
// ============================================================================

#[test]
fn still_actor_sleeps_after_ten_seconds() {
    // 1/32 s frames add up to the timeout without rounding.
    const FRAME: f64 = 1.0 / 32.0;
    let mut m = manager(floating());
    let id = spawn_awake(&mut m, BOX, Vec3::zeros());
    for _ in 0..319 {
        m.tick(FRAME, None);
    }
    // 9.96875 s still.
    assert_eq!(state(&mut m, id), ActorState::LocalSimulated);
    m.tick(FRAME, None);
    assert_eq!(state(&mut m, id), ActorState::LocalSleeping);
}

#[test]
fn overlap_wakes_a_sleeper_on_the_first_frame() {
    let mut m = manager(floating());
    let awake = spawn_awake(&mut m, BOX, Vec3::zeros());
    let sleeper = m
        .spawn(
            sim_conformance_tests::load(BOX),
            ActorSpawnRequest::at(Vec3::new(0.25, 0.0, 0.0)).free_position(),
        )
        .expect("spawn");
    let far = m
        .spawn(
            sim_conformance_tests::load(BOX),
            ActorSpawnRequest::at(Vec3::new(50.0, 0.0, 0.0)).free_position(),
        )
        .expect("spawn");
    assert_eq!(state(&mut m, sleeper), ActorState::LocalSleeping);

    m.tick(0.01, Some(awake));
    assert_eq!(state(&mut m, sleeper), ActorState::LocalSimulated);
    assert_eq!(state(&mut m, far), ActorState::LocalSleeping);
}

// ============================================================================
// Hooks
// ============================================================================

#[test]
fn hook_lock_creates_an_inter_actor_beam() {
    let (m, a, b) = hooked();
    let beams: Vec<_> = m.inter_actor_beams().copied().collect();
    assert_eq!(beams.len(), 1);
    assert_eq!(beams[0].owner, a);
    assert_eq!(beams[0].target.actor, b);
    assert_eq!(m.linked_actors(a), vec![b]);
    assert_eq!(m.linked_actors(b), vec![a]);
}

#[test]
fn deleting_a_hooked_actor_drops_the_beam_before_stepping() {
    let (mut m, a, b) = hooked();
    let substeps = m.total_substeps();
    m.delete(b).expect("delete");
    // A zero-length frame runs the batch boundary but no substep.
    m.tick(0.0, Some(a));
    assert_eq!(m.total_substeps(), substeps);
    assert!(m.actor(b).is_none());
    assert_eq!(m.inter_actor_beams().count(), 0);
    assert!(m.linked_actors(a).is_empty());
    let actor = m.actor(a).expect("actor");
    assert!(actor.beams.iter().all(|beam| beam.remote.is_none()));
}

#[test]
fn coupling_forces_are_equal_opposite_and_collinear() {
    let (mut m, a, b) = hooked();
    for _ in 0..5 {
        m.tick(0.01, Some(a));
    }
    let beams: Vec<_> = m.inter_actor_beams().copied().collect();
    assert_eq!(beams.len(), 1);
    let link = beams[0];
    let owner = m.actor(a).expect("owner").nodes[link.node].clone();
    let target = m.actor(b).expect("target").nodes[link.target.node.index()].clone();

    let axis = owner.position - target.position;
    let force = link.force;
    assert!(
        force.cross(&axis).norm() <= 1e-6 * force.norm().max(1.0) * axis.norm().max(1.0),
        "force {force:?} is not along {axis:?}"
    );

    // Nothing else acts on the two nodes, so equal and opposite forces keep
    // the pair's momentum at zero.
    let momentum = owner.velocity * owner.mass + target.velocity * target.mass;
    let scale = (owner.velocity * owner.mass).norm().max(1e-9);
    assert!(momentum.norm() <= 1e-9 * scale.max(1.0), "momentum {momentum:?}");
}
