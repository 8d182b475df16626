//! Engine start, automatic shifting and command-key actuation.

use approx::assert_relative_eq;
use sim_conformance_tests::{run, spawn, steps_for, ARM, ENGINE};
use sim_core::engine::{Engine, EngineFeedback, GearboxMode};
use sim_types::{InputEvent, NullSound, NullTerrain, SimConfig, Vec3};

/// Substeps per rendered frame in these tests.
const FRAME: usize = 40;

fn engine(config: &SimConfig) -> Engine {
    let actor = spawn(ENGINE, Vec3::zeros(), config);
    actor.engine.clone().expect("document declares an engine")
}

// ============================================================================
// Engine
// ============================================================================

#[test]
fn start_request_idles_in_first_gear() {
    let config = SimConfig::deterministic();
    let mut actor = spawn(ENGINE, Vec3::zeros(), &config);
    let idle = actor.engine.as_ref().map(Engine::idle_rpm).expect("engine");
    assert_relative_eq!(idle, 400.0);
    assert_eq!(actor.engine.as_ref().map(Engine::auto_mode), Some(GearboxMode::Automatic));

    actor.apply_input(InputEvent::StartEngine, &NullSound);
    run(&mut actor, &config, &NullTerrain, steps_for(2.0, &config));
    assert!(actor.rpm() > idle, "rpm {} at idle {idle}", actor.rpm());
    assert_eq!(actor.gear(), 1);
}

#[test]
fn redline_in_first_upshifts_at_the_next_frame() {
    let config = SimConfig::deterministic();
    let mut e = engine(&config);
    let dt = config.physics_dt;
    let feedback = EngineFeedback::default();
    e.start();
    e.set_acc(1.0);
    // Wheels turning at 1950 rpm through first gear, maxRPM is 2000.
    e.set_wheel_revolutions(1950.0 / e.ratio(1));

    e.update(dt, true, &feedback);
    assert!(e.is_shifting());
    // Set to 100 by the upshift and already counted down once.
    assert_eq!(e.kickdown_delay(), 99);
    for _ in 0..1000 {
        e.update(dt, false, &feedback);
    }
    assert_eq!(e.gear(), 2);
}

#[test]
fn steady_cruise_never_hunts_between_gears() {
    let config = SimConfig::deterministic();
    let mut e = engine(&config);
    let dt = config.physics_dt;
    let feedback = EngineFeedback::default();
    e.start();
    e.set_acc(0.4);
    let wheel = 1000.0 / e.ratio(1);

    let mut changes: Vec<(usize, i32)> = Vec::new();
    let mut gear = e.gear();
    for frame in 0..1500 {
        for sub in 0..FRAME {
            e.set_wheel_revolutions(wheel);
            e.update(dt, sub == FRAME - 1, &feedback);
        }
        if e.gear() != gear {
            changes.push((frame, e.gear() - gear));
            gear = e.gear();
        }
    }

    for pair in changes.windows(2) {
        let ((f0, d0), (f1, d1)) = (pair[0], pair[1]);
        if d0.signum() != d1.signum() {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let min_gap = (100.0 * e.shift_behaviour()).ceil() as usize;
            assert!(f1 - f0 >= min_gap, "gear hunted at frames {f0} and {f1}: {changes:?}");
        }
    }
    assert!(e.is_running());
}

// ============================================================================
// Commands
// ============================================================================

#[test]
fn held_command_moves_by_one_step_per_substep() {
    let config = SimConfig::deterministic().zero_gravity().without_drag();
    let mut actor = spawn(ARM, Vec3::zeros(), &config);
    let binding = actor.command_keys[4].beams[0].clone();
    assert!(!binding.contraction);
    let beam = binding.beam;
    let step = binding.speed * config.physics_dt;

    actor.apply_input(InputEvent::Command { key: 4, value: 1.0 }, &NullSound);
    let l0 = actor.beams[beam].rest_length;
    run(&mut actor, &config, &NullTerrain, 1);
    let l1 = actor.beams[beam].rest_length;
    run(&mut actor, &config, &NullTerrain, 1);
    let l2 = actor.beams[beam].rest_length;

    assert_relative_eq!(l1 - l0, step, epsilon = 1e-12);
    assert_relative_eq!(l2 - l1, step, epsilon = 1e-12);

    // Releasing the key stops the beam where it is.
    actor.apply_input(InputEvent::Command { key: 4, value: 0.0 }, &NullSound);
    run(&mut actor, &config, &NullTerrain, 1);
    assert_relative_eq!(actor.beams[beam].rest_length, l2, epsilon = 1e-12);
}
