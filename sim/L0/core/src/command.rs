//! Command keys, hydros and rotators.
//!
//! All three change beam geometry from control inputs rather than from
//! forces:
//!
//! - a **command key** owns command beams that lengthen or shorten while the
//!   key is held, plus rotators whose angle advances,
//! - a **hydro** follows the steering (and aerial) inputs,
//! - a **rotator** pulls two node plates to a target relative angle.
//!
//! Keys are 1-based; slot 0 exists so that key numbers index the table
//! directly.

use sim_types::constants::MAX_COMMANDS;
use sim_types::{ActorId, ModulationSource, SoundSink, SoundState, SoundTrigger, Vec3};
use nalgebra::{Unit, UnitQuaternion};
use std::f64::consts::FRAC_PI_2;

use crate::animator::{Animator, AnimatorFrame, AnimatorMemory};
use crate::beam::Beam;
use crate::inertia::KeyInertia;
use crate::node::Node;

// ==================== Command keys ====================

/// Runtime state of one command beam binding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandBeamState {
    /// Key held firmly enough to suppress auto-centering.
    pub auto_move_lock: bool,
    /// Auto-move direction and one-press phase, signed by direction.
    pub auto_moving_mode: i8,
    /// One-press-center passed the center on the way out.
    pub pressed_center_mode: bool,
}

/// A beam bound to a command key in one direction.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandBeam {
    /// Beam index.
    pub beam: usize,
    /// Shortens the beam while the key is held.
    pub contraction: bool,
    /// Length change per second.
    pub speed: f64,
    /// Limit as a fraction of the reference length.
    pub boundary: f64,
    /// Center as a fraction of the reference length.
    pub center: f64,
    /// `f`: never faster than the nominal speed.
    pub force_restricted: bool,
    /// `c`
    pub autocenter: bool,
    /// `p`
    pub one_press: bool,
    /// `o`
    pub one_press_center: bool,
    /// Only moves with the engine running.
    pub needs_engine: bool,
    /// Drives the linked command sound.
    pub plays_sound: bool,
    /// Share of the hydraulic work charged to the engine.
    pub engine_coupling: f64,
    /// Runtime state.
    pub state: CommandBeamState,
}

impl CommandBeam {
    fn direction(&self) -> i8 {
        if self.contraction {
            -1
        } else {
            1
        }
    }
}

/// A user command key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandKey {
    /// Value from the player, in `[0, 1]`.
    pub player_input: f64,
    /// Value from triggers this substep; cleared on use.
    pub trigger_input: f64,
    /// Merged value of the last substep.
    pub value: f64,
    /// 1 on the substep the key went down, -1 when it came up.
    pub value_state: i8,
    /// Held off by a key-blocking trigger.
    pub trigger_blocked: bool,
    /// Bound beams.
    pub beams: Vec<CommandBeam>,
    /// Bound rotators as signed 1-based indices; negative spins left.
    pub rotators: Vec<i32>,
    /// Filter applied to command beams.
    pub command_inertia: KeyInertia,
    /// Filter applied to rotators.
    pub rotator_inertia: KeyInertia,
    /// Text of the first binding that had one.
    pub description: String,
}

impl CommandKey {
    /// True when something is bound to the key.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        !self.beams.is_empty() || !self.rotators.is_empty()
    }
}

/// A full key table, indexed by key number.
#[must_use]
pub fn key_table() -> Vec<CommandKey> {
    vec![CommandKey::default(); MAX_COMMANDS + 1]
}

/// Engine figures the command pass reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HydraulicSupply {
    /// `Some(running)` when the actor has an engine.
    pub engine_running: Option<bool>,
    /// Engine above 95% of idle, or no engine.
    pub hydraulics_ready: bool,
    /// Engine crank factor, 1 without an engine.
    pub crank_factor: f64,
}

impl Default for HydraulicSupply {
    fn default() -> Self {
        Self {
            engine_running: None,
            hydraulics_ready: true,
            crank_factor: 1.0,
        }
    }
}

impl HydraulicSupply {
    fn blocks(&self, needs_engine: bool) -> bool {
        needs_engine && (self.engine_running == Some(false) || !self.hydraulics_ready)
    }
}

/// Hydraulic load of one command pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PumpLoad {
    /// Work done on engine-coupled beams.
    pub work: f64,
    /// Number of engine-coupled beams that moved.
    pub active: usize,
    /// Some coupled binding asked for power.
    pub requested: bool,
}

/// Advance every command key by one substep.
///
/// Merges player and trigger input, runs the auto-center and one-press
/// state machines, moves command beams and rotators, and reports the
/// hydraulic load for the engine.
#[allow(clippy::too_many_arguments)] // Pass state is spread over the actor.
pub fn update_commands(
    keys: &mut [CommandKey],
    beams: &mut [Beam],
    rotators: &mut [Rotator],
    supply: HydraulicSupply,
    dt: f64,
    sound: &dyn SoundSink,
    actor: ActorId,
) -> PumpLoad {
    let mut load = PumpLoad::default();
    let mut crank_factor = supply.crank_factor;

    for key in keys.iter_mut() {
        for cb in &mut key.beams {
            cb.state.auto_move_lock = false;
        }
    }

    for key in keys.iter_mut() {
        let old = key.value;
        key.value = key.player_input.max(key.trigger_input);
        key.trigger_input = 0.0;
        if key.value > 0.01 && old < 0.01 {
            key.value_state = 1;
        } else if key.value < 0.01 && old > 0.01 {
            key.value_state = -1;
        }
        if key.value >= 0.5 {
            for cb in &mut key.beams {
                cb.state.auto_move_lock = true;
                if cb.autocenter {
                    cb.state.auto_moving_mode = 0;
                }
            }
        }
    }

    for (key_no, key) in keys.iter_mut().enumerate() {
        let mut request_power = false;
        let linked = u16::try_from(key_no).unwrap_or(u16::MAX);

        for cb in &mut key.beams {
            let Some(beam) = beams.get_mut(cb.beam) else {
                continue;
            };
            let dir = cb.direction();
            // Historical: the restriction sticks for every later binding of the pass.
            if cb.force_restricted {
                crank_factor = crank_factor.min(1.0);
            }
            let mut v = key.value;

            if cb.autocenter && !cb.state.auto_move_lock {
                if beam.ref_length == 0.0 || beam.rest_length == 0.0 {
                    continue;
                }
                let current = beam.rest_length / beam.ref_length;
                if (current - cb.center).abs() < 1e-4 {
                    cb.state.auto_moving_mode = 0;
                } else {
                    let previous = cb.state.auto_moving_mode;
                    cb.state.auto_moving_mode = if current > cb.center { -1 } else { 1 };
                    if previous != 0 && previous != cb.state.auto_moving_mode {
                        beam.rest_length = cb.center * beam.ref_length;
                        cb.state.auto_moving_mode = 0;
                    }
                }
            }

            if beam.ref_length == 0.0 || beam.rest_length == 0.0 {
                continue;
            }
            let clen = beam.rest_length / beam.ref_length;
            let fdir = f64::from(dir);
            let within = (dir > 0 && clen < cb.boundary) || (dir < 0 && clen > cb.boundary);
            if !within {
                if (cb.one_press || cb.one_press_center) && dir * cb.state.auto_moving_mode > 0 {
                    cb.state.auto_moving_mode = 0;
                }
                continue;
            }

            let before = beam.rest_length;
            if cb.one_press_center {
                let moving_out = dir * cb.state.auto_moving_mode;
                let past_center = fdir * clen > fdir * cb.center;
                if moving_out > 0 && past_center && !cb.state.pressed_center_mode {
                    cb.state.pressed_center_mode = true;
                    cb.state.auto_moving_mode = 0;
                } else if moving_out < 0 && past_center && cb.state.pressed_center_mode {
                    cb.state.pressed_center_mode = false;
                }
            }
            if cb.one_press || cb.one_press_center {
                let held = v > 0.5;
                let mode = cb.state.auto_moving_mode;
                if dir * mode <= 0 && held {
                    cb.state.auto_moving_mode = dir;
                } else if mode == dir && !held {
                    cb.state.auto_moving_mode = dir * 2;
                } else if mode == dir * 2 && held {
                    cb.state.auto_moving_mode = dir * 3;
                } else if mode == dir * 3 && !held {
                    cb.state.auto_moving_mode = 0;
                }
            }

            v = key.command_inertia.apply(v, dt);
            if dir * cb.state.auto_moving_mode > 0 {
                v = 1.0;
            }
            if supply.blocks(cb.needs_engine) {
                continue;
            }
            if v > 0.0 && cb.engine_coupling > 0.0 {
                request_power = true;
            }

            if cb.plays_sound {
                match key.value_state {
                    1 => {
                        sound.trigger(actor, SoundTrigger::LinkedCommand(linked), SoundState::Start);
                        key.value_state = 0;
                    }
                    -1 => {
                        sound.trigger(actor, SoundTrigger::LinkedCommand(linked), SoundState::Stop);
                        key.value_state = 0;
                    }
                    _ => sound.modulate(actor, ModulationSource::LinkedCommandRate(linked), v),
                }
            }

            let cf = if cb.engine_coupling > 0.0 {
                crank_factor
            } else {
                1.0
            };
            let step = cb.speed * v * cf * dt / beam.rest_length;
            beam.rest_length *= 1.0 + fdir * step;
            let dl = (before - beam.rest_length).abs();
            if request_power {
                load.active += 1;
                load.work += beam.stress.abs() * dl * cb.engine_coupling;
            }
        }

        for &signed in &key.rotators {
            let Some(rot) = usize::try_from(signed.unsigned_abs())
                .ok()
                .and_then(|i| i.checked_sub(1))
                .and_then(|i| rotators.get_mut(i))
            else {
                continue;
            };
            if supply.blocks(rot.needs_engine) {
                continue;
            }
            let v = key.rotator_inertia.apply(key.value, dt);
            if v > 0.0 && rot.engine_coupling > 0.0 {
                request_power = true;
            }
            let cf = if rot.engine_coupling > 0.0 {
                crank_factor
            } else {
                1.0
            };
            let delta = rot.rate * v * cf * dt;
            if signed > 0 {
                rot.angle += delta;
            } else {
                rot.angle -= delta;
            }
        }

        if request_power {
            load.requested = true;
        }
    }
    load
}

// ==================== Hydros ====================

/// Input sources of a hydro, from its option letters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HydroFlags {
    /// `n`: steering.
    pub dir: bool,
    /// `s`: steering, fading out with speed.
    pub speed: bool,
    /// Aileron.
    pub aileron: bool,
    /// Rudder.
    pub rudder: bool,
    /// Elevator.
    pub elevator: bool,
    /// Inverted aileron.
    pub rev_aileron: bool,
    /// Inverted rudder.
    pub rev_rudder: bool,
    /// Inverted elevator.
    pub rev_elevator: bool,
}

impl HydroFlags {
    /// Parse hydro option letters.
    ///
    /// Returns the flags, the invisible flag and the letters that were not
    /// understood.
    #[must_use]
    pub fn parse(options: &str) -> (Self, bool, Vec<char>) {
        let mut flags = Self::default();
        let mut invisible = false;
        let mut unknown = Vec::new();
        if options.is_empty() {
            flags.dir = true;
            return (flags, invisible, unknown);
        }
        for c in options.chars() {
            match c {
                'i' => invisible = true,
                'n' => {
                    invisible = false;
                    flags.dir = true;
                }
                's' => flags.speed = true,
                'a' => flags.aileron = true,
                'r' => flags.rudder = true,
                'e' => flags.elevator = true,
                'u' => {
                    flags.aileron = true;
                    flags.elevator = true;
                }
                'v' => {
                    flags.rev_aileron = true;
                    flags.elevator = true;
                }
                'x' => {
                    flags.aileron = true;
                    flags.rudder = true;
                }
                'y' => {
                    flags.rev_aileron = true;
                    flags.rudder = true;
                }
                'g' => {
                    flags.elevator = true;
                    flags.rudder = true;
                }
                'h' => {
                    flags.rev_elevator = true;
                    flags.rudder = true;
                }
                other => unknown.push(other),
            }
            // Historical: checked inside the loop, so `i` only implies `n`
            // while no other input flag has been seen yet.
            if invisible && flags == Self::default() {
                flags.dir = true;
            }
        }
        (flags, invisible, unknown)
    }

    /// Option letters that [`parse`](Self::parse) reads back to `self`.
    #[must_use]
    pub fn letters(self, invisible: bool) -> String {
        let mut out = String::new();
        if self.dir {
            out.push('n');
        }
        if self.speed {
            out.push('s');
        }
        if self.aileron {
            out.push('a');
        }
        if self.rev_aileron {
            out.push(if self.elevator { 'v' } else { 'y' });
        } else if self.elevator {
            out.push('e');
        }
        if self.rev_elevator {
            out.push('h');
        }
        if self.rudder {
            out.push('r');
        }
        if invisible {
            out.push('i');
        }
        out
    }
}

/// Smoothed control states hydros read, in `[-1, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HydroInputs {
    /// Steering target.
    pub dir_command: f64,
    /// Smoothed steering.
    pub dir_state: f64,
    /// Aileron target.
    pub aileron_command: f64,
    /// Smoothed aileron.
    pub aileron_state: f64,
    /// Rudder target.
    pub rudder_command: f64,
    /// Smoothed rudder.
    pub rudder_state: f64,
    /// Elevator target.
    pub elevator_command: f64,
    /// Smoothed elevator.
    pub elevator_state: f64,
    /// Some hydro uses the `s` flag; steering rate then depends on speed.
    pub speed_coupling: bool,
    /// Last composed steering state, for the steering wheel display.
    pub wheel_display: f64,
}

fn chase_and_decay(state: &mut f64, command: f64, rate: f64, dt: f64) {
    if *state == 0.0 && command == 0.0 {
        return;
    }
    if command != 0.0 {
        if *state > command {
            *state -= dt * rate;
        } else {
            *state += dt * rate;
        }
    }
    if *state > dt {
        *state -= dt;
    } else if *state < -dt {
        *state += dt;
    } else {
        *state = 0.0;
    }
}

impl HydroInputs {
    /// Move every state one substep towards its command.
    pub fn advance(&mut self, dt: f64, wheel_speed: f64) {
        if self.dir_state != 0.0 || self.dir_command != 0.0 {
            if self.speed_coupling {
                let rate = (30.0 / (10.0 + (wheel_speed / 2.0).abs())).max(1.2);
                chase_and_decay(&mut self.dir_state, self.dir_command, rate, dt);
            } else {
                let diff = self.dir_command - self.dir_state;
                let rate = (-diff.abs().min(1.0)).exp() * diff;
                self.dir_state += 10.0 * dt * rate;
            }
        }
        chase_and_decay(&mut self.aileron_state, self.aileron_command, 4.0, dt);
        chase_and_decay(&mut self.rudder_state, self.rudder_command, 4.0, dt);
        chase_and_decay(&mut self.elevator_state, self.elevator_command, 4.0, dt);
    }
}

/// A hydro or animator beam.
#[derive(Debug, Clone, PartialEq)]
pub struct Hydro {
    /// Beam index.
    pub beam: usize,
    /// Input sources.
    pub flags: HydroFlags,
    /// Length change per unit of input, as a fraction of the reference.
    pub speed: f64,
    /// Rest length at spawn.
    pub ref_length: f64,
    /// Response filter.
    pub inertia: KeyInertia,
    /// Vehicle-state sources for animators.
    pub animator: Option<Animator>,
}

/// Recompute the rest length of every hydro.
pub fn update_hydros(
    hydros: &mut [Hydro],
    inputs: &mut HydroInputs,
    beams: &mut [Beam],
    frame: &AnimatorFrame,
    memory: &mut AnimatorMemory,
    dt: f64,
) {
    inputs.advance(dt, frame.wheel_speed);
    for hydro in hydros.iter_mut() {
        let f = hydro.flags;
        let mut state = 0.0;
        let mut div = 0u32;
        if f.speed {
            if frame.wheel_speed < 12.0 {
                state += inputs.dir_state * (12.0 - frame.wheel_speed) / 12.0;
            }
            div += 1;
        }
        for (on, value) in [
            (f.dir, inputs.dir_state),
            (f.aileron, inputs.aileron_state),
            (f.rudder, inputs.rudder_state),
            (f.elevator, inputs.elevator_state),
            (f.rev_aileron, -inputs.aileron_state),
            (f.rev_rudder, -inputs.rudder_state),
            (f.rev_elevator, -inputs.elevator_state),
        ] {
            if on {
                state += value;
                div += 1;
            }
        }
        state = state.clamp(-1.0, 1.0);
        if let Some(animator) = &hydro.animator {
            animator.contribute(frame, memory, dt, &mut state, &mut div);
        }
        if div == 0 {
            continue;
        }
        let Some(beam) = beams.get_mut(hydro.beam) else {
            continue;
        };
        state /= f64::from(div);
        state = hydro.inertia.apply(state, dt);
        if !f.speed && hydro.animator.is_none() {
            inputs.wheel_display = state;
        }
        let mut factor = 1.0 - state * hydro.speed;
        if hydro.animator.is_some() {
            factor = factor
                .max(1.0 - beam.short_bound)
                .min(1.0 + beam.long_bound);
        }
        beam.rest_length = hydro.ref_length * factor;
    }
}

// ==================== Rotators ====================

/// Two node plates held at a commanded angle around an axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Rotator {
    /// Axis endpoints.
    pub axis: [usize; 2],
    /// Base plate nodes.
    pub base: [usize; 4],
    /// Rotating plate nodes.
    pub rotating: [usize; 4],
    /// Commanded angle in radians.
    pub angle: f64,
    /// Angular speed at full input.
    pub rate: f64,
    /// Restoring force per radian of error.
    pub force: f64,
    /// Plate radius below which no force is applied.
    pub tolerance: f64,
    /// Share of the work charged to the engine.
    pub engine_coupling: f64,
    /// Only turns with the engine running.
    pub needs_engine: bool,
}

fn project(v: Vec3, normal: &Vec3) -> Vec3 {
    v - normal * normal.dot(&v)
}

impl Rotator {
    /// Accumulate the plate-aligning forces.
    pub fn apply_forces(&self, nodes: &mut [Node]) {
        let pos = |i: usize| nodes.get(i).map_or_else(Vec3::zeros, |n| n.position);
        let ax1 = pos(self.axis[0]);
        let ax2 = pos(self.axis[1]);
        let Some(axis) = Unit::try_new(ax1 - ax2, 1e-12) else {
            return;
        };
        let turn = UnitQuaternion::from_axis_angle(&axis, self.angle + FRAC_PI_2);
        let mut forces = [(0_usize, Vec3::zeros()); 8];
        for k in 0..2 {
            let mut ref1 = project(ax1 - pos(self.base[k]), &axis);
            let mut ref2 = project(ax2 - pos(self.rotating[k]), &axis);
            let mut len1 = ref1.norm();
            let mut len2 = ref2.norm();
            if len1 > 0.0 {
                ref1 /= len1;
            }
            if len2 > 0.0 {
                ref2 /= len2;
            }
            let th1 = turn * ref1;
            let error = th1.dot(&ref2).clamp(-1.0, 1.0).asin();
            let dir1 = ref1.cross(&axis);
            let dir2 = ref2.cross(&axis);
            if len1 <= self.tolerance {
                len1 = 0.0;
            }
            if len2 <= self.tolerance {
                len2 = 0.0;
            }
            let f1 = dir1 * (error * len1 * self.force);
            let f2 = dir2 * (error * len2 * self.force);
            forces[4 * k] = (self.base[k], f1);
            forces[4 * k + 1] = (self.rotating[k], -f2);
            forces[4 * k + 2] = (self.base[k + 2], -f1);
            forces[4 * k + 3] = (self.rotating[k + 2], f2);
        }
        for (idx, f) in forces {
            if let Some(n) = nodes.get_mut(idx) {
                n.forces += f;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sim_types::{NodeIdx, NullSound, RecordingSoundSink};

    const DT: f64 = 0.0005;

    fn command_beam(contraction: bool) -> CommandBeam {
        CommandBeam {
            beam: 0,
            contraction,
            speed: 0.5,
            boundary: if contraction { 0.5 } else { 1.5 },
            center: 1.0,
            force_restricted: false,
            autocenter: false,
            one_press: false,
            one_press_center: false,
            needs_engine: false,
            plays_sound: false,
            engine_coupling: 1.0,
            state: CommandBeamState::default(),
        }
    }

    fn rig(contraction: bool) -> (Vec<CommandKey>, Vec<Beam>) {
        let mut keys = key_table();
        keys[1].beams.push(command_beam(contraction));
        let mut beam = Beam::new(NodeIdx(0), NodeIdx(1));
        beam.set_length(2.0);
        (keys, vec![beam])
    }

    fn step(keys: &mut [CommandKey], beams: &mut [Beam]) -> PumpLoad {
        update_commands(
            keys,
            beams,
            &mut [],
            HydraulicSupply::default(),
            DT,
            &NullSound,
            ActorId(0),
        )
    }

    #[test]
    fn held_key_extends_at_speed() {
        let (mut keys, mut beams) = rig(false);
        keys[1].player_input = 1.0;
        step(&mut keys, &mut beams);
        assert_relative_eq!(beams[0].rest_length, 2.0 + 0.5 * DT, epsilon = 1e-12);
        step(&mut keys, &mut beams);
        assert_relative_eq!(beams[0].rest_length, 2.0 + 1.0 * DT, epsilon = 1e-12);
    }

    #[test]
    fn contraction_stops_at_boundary() {
        let (mut keys, mut beams) = rig(true);
        keys[1].player_input = 1.0;
        for _ in 0..20_000 {
            step(&mut keys, &mut beams);
        }
        let ratio = beams[0].rest_length / beams[0].ref_length;
        assert!(ratio <= 0.5 && ratio > 0.5 - 0.5 * DT, "ratio {ratio}");
    }

    #[test]
    fn trigger_input_merges_by_maximum() {
        let (mut keys, mut beams) = rig(false);
        keys[1].player_input = 0.2;
        keys[1].trigger_input = 0.7;
        step(&mut keys, &mut beams);
        assert_relative_eq!(keys[1].value, 0.7);
        assert_eq!(keys[1].trigger_input, 0.0);
    }

    #[test]
    fn value_state_marks_edges() {
        let (mut keys, mut beams) = rig(false);
        keys[1].player_input = 1.0;
        step(&mut keys, &mut beams);
        assert_eq!(keys[1].value_state, 1);
        keys[1].player_input = 0.0;
        step(&mut keys, &mut beams);
        assert_eq!(keys[1].value_state, -1);
    }

    #[test]
    fn sound_starts_then_modulates_then_stops() {
        let (mut keys, mut beams) = rig(false);
        keys[1].beams[0].plays_sound = true;
        let sink = RecordingSoundSink::new();
        let run = |keys: &mut Vec<CommandKey>, beams: &mut Vec<Beam>| {
            update_commands(
                keys,
                beams,
                &mut [],
                HydraulicSupply::default(),
                DT,
                &sink,
                ActorId(3),
            );
        };
        keys[1].player_input = 1.0;
        run(&mut keys, &mut beams);
        run(&mut keys, &mut beams);
        keys[1].player_input = 0.0;
        run(&mut keys, &mut beams);
        let cmd = SoundTrigger::LinkedCommand(1);
        assert_eq!(sink.count(cmd, SoundState::Start), 1);
        assert_eq!(sink.count(cmd, SoundState::Stop), 1);
        assert_eq!(sink.events().len(), 3);
    }

    #[test]
    fn autocenter_returns_to_center() {
        let (mut keys, mut beams) = rig(false);
        keys[1].beams[0].autocenter = true;
        beams[0].rest_length = 2.2;
        for _ in 0..2_000 {
            step(&mut keys, &mut beams);
        }
        // Extension binding only moves outward, so the beam stays put
        // until it is below center.
        assert_relative_eq!(beams[0].rest_length, 2.2, epsilon = 1e-9);

        beams[0].rest_length = 1.8;
        for _ in 0..2_000 {
            step(&mut keys, &mut beams);
        }
        assert_relative_eq!(beams[0].rest_length, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn one_press_runs_to_boundary_after_release() {
        let (mut keys, mut beams) = rig(false);
        keys[1].beams[0].one_press = true;
        keys[1].player_input = 1.0;
        step(&mut keys, &mut beams);
        keys[1].player_input = 0.0;
        for _ in 0..10_000 {
            step(&mut keys, &mut beams);
        }
        let ratio = beams[0].rest_length / beams[0].ref_length;
        assert!(ratio >= 1.5 - 1e-3, "ratio {ratio}");
        assert_eq!(keys[1].beams[0].state.auto_moving_mode, 0);
    }

    #[test]
    fn needs_engine_waits_for_running_engine() {
        let (mut keys, mut beams) = rig(false);
        keys[1].beams[0].needs_engine = true;
        keys[1].player_input = 1.0;
        let supply = HydraulicSupply {
            engine_running: Some(false),
            hydraulics_ready: false,
            crank_factor: 1.0,
        };
        update_commands(&mut keys, &mut beams, &mut [], supply, DT, &NullSound, ActorId(0));
        assert_relative_eq!(beams[0].rest_length, 2.0);
    }

    #[test]
    fn coupled_motion_charges_the_pump() {
        let (mut keys, mut beams) = rig(false);
        beams[0].stress = 1000.0;
        keys[1].player_input = 1.0;
        let load = step(&mut keys, &mut beams);
        assert!(load.requested);
        assert_eq!(load.active, 1);
        assert_relative_eq!(load.work, 1000.0 * 0.5 * DT, epsilon = 1e-9);
    }

    #[test]
    fn rotator_angle_follows_key() {
        let mut keys = key_table();
        keys[2].rotators = vec![1, -2];
        let mut rotators = vec![
            Rotator {
                axis: [0, 1],
                base: [0; 4],
                rotating: [0; 4],
                angle: 0.0,
                rate: 2.0,
                force: 1.0,
                tolerance: 0.0,
                engine_coupling: 0.0,
                needs_engine: false,
            };
            2
        ];
        keys[2].player_input = 1.0;
        update_commands(
            &mut keys,
            &mut [],
            &mut rotators,
            HydraulicSupply::default(),
            DT,
            &NullSound,
            ActorId(0),
        );
        assert_relative_eq!(rotators[0].angle, 2.0 * DT);
        assert_relative_eq!(rotators[1].angle, -2.0 * DT);
    }

    #[test]
    fn hydro_flags_invisible_first_implies_steering() {
        let (flags, invisible, _) = HydroFlags::parse("i");
        assert!(invisible);
        assert!(flags.dir);

        let (flags, _, _) = HydroFlags::parse("is");
        assert!(flags.dir && flags.speed);
    }

    #[test]
    fn hydro_flags_invisible_last_does_not_imply_steering() {
        // Historical: only the leading `i` adds steering.
        let (flags, invisible, _) = HydroFlags::parse("si");
        assert!(invisible);
        assert!(flags.speed);
        assert!(!flags.dir);
    }

    #[test]
    fn hydro_letters_parse_back() {
        for options in ["n", "s", "ae", "vr", "y", "hn", "ueri", "g"] {
            let (flags, invisible, unknown) = HydroFlags::parse(options);
            assert!(unknown.is_empty());
            let (again, inv_again, _) = HydroFlags::parse(&flags.letters(invisible));
            assert_eq!(again, flags, "{options}");
            assert_eq!(inv_again, invisible, "{options}");
        }
    }

    #[test]
    fn hydro_flags_empty_is_steering() {
        let (flags, invisible, unknown) = HydroFlags::parse("");
        assert!(flags.dir && !invisible && unknown.is_empty());
        let (_, _, unknown) = HydroFlags::parse("nq");
        assert_eq!(unknown, vec!['q']);
    }

    #[test]
    fn steering_state_converges_to_command() {
        let mut inputs = HydroInputs {
            dir_command: 1.0,
            ..HydroInputs::default()
        };
        for _ in 0..10_000 {
            inputs.advance(DT, 0.0);
        }
        assert_relative_eq!(inputs.dir_state, 1.0, epsilon = 1e-3);
    }

    #[test]
    fn aileron_decays_to_zero_when_released() {
        let mut inputs = HydroInputs {
            aileron_state: 0.5,
            ..HydroInputs::default()
        };
        for _ in 0..2_000 {
            inputs.advance(DT, 0.0);
        }
        assert_eq!(inputs.aileron_state, 0.0);
    }

    #[test]
    fn hydro_length_tracks_steering() {
        let mut beam = Beam::new(NodeIdx(0), NodeIdx(1));
        beam.set_length(1.0);
        let mut beams = vec![beam];
        let mut hydros = vec![Hydro {
            beam: 0,
            flags: HydroFlags {
                dir: true,
                ..HydroFlags::default()
            },
            speed: 0.2,
            ref_length: 1.0,
            inertia: KeyInertia::passthrough(),
            animator: None,
        }];
        let mut inputs = HydroInputs {
            dir_command: 1.0,
            dir_state: 1.0,
            ..HydroInputs::default()
        };
        update_hydros(
            &mut hydros,
            &mut inputs,
            &mut beams,
            &AnimatorFrame::default(),
            &mut AnimatorMemory::default(),
            DT,
        );
        assert_relative_eq!(beams[0].rest_length, 0.8, epsilon = 1e-9);
    }

    #[test]
    fn aligned_rotator_exerts_no_force() {
        // Axis along y with both arms pointing the same way: the target
        // direction is a quarter turn away, so the error sine is zero.
        let positions = [
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
            Vec3::new(-1.0, 0.0, 0.0),
        ];
        let mut nodes: Vec<Node> = positions
            .iter()
            .enumerate()
            .map(|(i, p)| Node::new(NodeIdx::at(i), *p))
            .collect();
        let rot = Rotator {
            axis: [0, 1],
            base: [2, 2, 2, 2],
            rotating: [3, 3, 3, 3],
            angle: 0.0,
            rate: 1.0,
            force: 100.0,
            tolerance: 0.0,
            engine_coupling: 0.0,
            needs_engine: false,
        };
        rot.apply_forces(&mut nodes);
        for n in &nodes {
            assert!(n.forces.norm() < 1e-9);
        }
    }

    #[test]
    fn turned_rotator_pushes_plates_without_net_force() {
        let positions = [
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
        ];
        let mut nodes: Vec<Node> = positions
            .iter()
            .enumerate()
            .map(|(i, p)| Node::new(NodeIdx::at(i), *p))
            .collect();
        let rot = Rotator {
            axis: [0, 1],
            base: [2, 2, 4, 4],
            rotating: [3, 3, 5, 5],
            angle: 0.3,
            rate: 1.0,
            force: 100.0,
            tolerance: 0.0,
            engine_coupling: 0.0,
            needs_engine: false,
        };
        rot.apply_forces(&mut nodes);
        assert!(nodes[3].forces.norm() > 1.0);
        assert_relative_eq!(nodes[2].forces, -nodes[4].forces, epsilon = 1e-9);
        assert_relative_eq!(nodes[3].forces, -nodes[5].forces, epsilon = 1e-9);
    }
}
