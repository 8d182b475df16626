//! Shared fixtures for the softbody integration tests.
//!
//! Actor documents live here as `&'static str` so every scenario starts from
//! the same text the parser sees in production. The helpers keep the tests
//! focused on behaviour: parse, spawn, step.

use std::sync::Arc;

use sim_core::actor::StepContext;
use sim_core::{spawn_actor, Actor, ActorManager, ActorSpawnRequest, ActorState, Collaborators};
use sim_truck::Document;
use sim_types::{ActorId, FlatTerrain, NullSound, SimConfig, TerrainQuery, Vec3};

// ============================================================================
// Documents
// ============================================================================

/// Two nodes one metre apart, one beam with k=1000, d=5.
pub const PAIR: &str = "\
pair
globals
100, 0
set_beam_defaults 1000, 5
nodes
0, 0.0, 1.0, 0.0
1, 1.0, 1.0, 0.0
beams
0, 1
end
";

/// The pair with a stiff, weak beam.
pub const FRAGILE_PAIR: &str = "\
fragile
globals
100, 0
set_beam_defaults 100000, 5, -1, 10
nodes
0, 0.0, 1.0, 0.0
1, 1.0, 1.0, 0.0
beams
0, 1
end
";

/// The pair with an undamped spring.
pub const UNDAMPED_PAIR: &str = "\
undamped
globals
100, 0
set_beam_defaults 1000, 0
nodes
0, 0.0, 1.0, 0.0
1, 1.0, 1.0, 0.0
beams
0, 1
end
";

/// One support beam that may stretch to five times its length.
pub const SUPPORT: &str = "\
support
globals
100, 0
nodes
0, 0.0, 0.0, 0.0
1, 1.0, 0.0, 0.0
beams
0, 1, s, 4
end
";

/// A rigid tetrahedron with default presets.
pub const BOX: &str = "\
box
globals
400, 0
nodes
0, 0.0, 0.0, 0.0
1, 1.0, 0.0, 0.0
2, 0.0, 0.0, 1.0
3, 0.0, 1.0, 0.0
beams
0, 1
0, 2
0, 3
1, 2
1, 3
2, 3
end
";

/// Four corner nodes and a roof node, braced; wheel sections go on top.
pub const CHASSIS: &str = "\
chassis
globals
2000, 500
nodes
0, 0.0, 0.5, 0.0
1, 0.0, 0.5, 1.0
2, 2.0, 0.5, 0.0, l
3, 2.0, 0.5, 1.0, l
4, 1.0, 1.0, 0.5
beams
0, 1
2, 3
0, 2
1, 3
0, 4
1, 4
2, 4
3, 4
";

/// An engine alone; the drivetrain has no wheels to load it.
pub const ENGINE: &str = "\
engine
globals
500, 0
nodes
0, 0.0, 0.0, 0.0
1, 1.0, 0.0, 0.0
2, 0.0, 1.0, 0.0
beams
0, 1
0, 2
1, 2
engine
400, 2000, 500, 3.0, -3, 0, 5, 4, 3, -1
engoption
10, t
end
";

/// A hydraulic arm: key 3 shortens, key 4 extends.
pub const ARM: &str = "\
arm
globals
200, 0
nodes
0, 0.0, 0.0, 0.0
1, 1.0, 0.0, 0.0
2, 0.0, 1.0, 0.0
beams
0, 1
0, 2
commands2
1, 2, 0.5, 0.25, 0.6, 1.4, 3, 4, n, Arm
end
";

/// A single hookable node that reaches 0.6 m.
pub const HOOK_POINT: &str = "\
hookpoint
globals
100, 0
nodes
0, 0.0, 0.0, 0.0, h
hooks
0, hookrange, 0.6
end
";

/// `CHASSIS` closed with one more section.
#[must_use]
pub fn chassis_with(section: &str, lines: &str) -> String {
    format!("{CHASSIS}{section}\n{lines}\nend\n")
}

// ============================================================================
// Helpers
// ============================================================================

/// Parse a fixture, failing the test on fatal input.
///
/// # Panics
///
/// When the document is rejected.
#[must_use]
pub fn load(text: &str) -> Arc<Document> {
    match sim_truck::load(text) {
        Ok(out) => Arc::new(out.document),
        Err(err) => panic!("fixture rejected: {err}"),
    }
}

/// Spawn a fixture as a simulated actor, node 0 at `at`.
///
/// # Panics
///
/// When the document is rejected or fails to spawn.
#[must_use]
pub fn spawn(text: &str, at: Vec3, config: &SimConfig) -> Actor {
    let doc = load(text);
    let request = ActorSpawnRequest::at(at).free_position();
    let mut actor = match spawn_actor(&doc, ActorId(1), &request, config, &FlatTerrain::new(-100.0)) {
        Ok(actor) => actor,
        Err(err) => panic!("spawn failed: {err}"),
    };
    actor.state = ActorState::LocalSimulated;
    actor
}

/// Run `steps` substeps, calling `each` after every one.
pub fn run_with(
    actor: &mut Actor,
    config: &SimConfig,
    terrain: &dyn TerrainQuery,
    steps: usize,
    mut each: impl FnMut(usize, &Actor),
) {
    let ctx = StepContext {
        config,
        terrain,
        sound: &NullSound,
        do_update: false,
        frame_dt: 0.0,
        player: None,
    };
    for step in 0..steps {
        actor.substep(&ctx);
        each(step, actor);
    }
}

/// Run `steps` substeps.
pub fn run(actor: &mut Actor, config: &SimConfig, terrain: &dyn TerrainQuery, steps: usize) {
    run_with(actor, config, terrain, steps, |_, _| {});
}

/// Substeps covering `seconds` at the configured rate.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn steps_for(seconds: f64, config: &SimConfig) -> usize {
    (seconds / config.physics_dt).round() as usize
}

/// Manager stepping inline over a ground plane far below the fixtures.
///
/// # Panics
///
/// When `config` is invalid.
#[must_use]
pub fn manager(config: SimConfig) -> ActorManager {
    let collab = Collaborators::default().with_terrain(Arc::new(FlatTerrain::new(-100.0)));
    match ActorManager::new(config.async_physics(false), collab) {
        Ok(m) => m,
        Err(err) => panic!("manager rejected its config: {err}"),
    }
}

/// Spawn into `m` at `at` and wake the actor.
///
/// # Panics
///
/// When the spawn fails.
pub fn spawn_awake(m: &mut ActorManager, text: &str, at: Vec3) -> ActorId {
    let id = match m.spawn(load(text), ActorSpawnRequest::at(at).free_position()) {
        Ok(id) => id,
        Err(err) => panic!("spawn failed: {err}"),
    };
    if let Err(err) = m.wake(id) {
        panic!("wake failed: {err}");
    }
    id
}

/// Distance between two nodes of `actor`.
#[must_use]
pub fn node_distance(actor: &Actor, a: usize, b: usize) -> f64 {
    (actor.nodes[a].position - actor.nodes[b].position).norm()
}
