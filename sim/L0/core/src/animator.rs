//! Animator beams: hydros driven by vehicle state.
//!
//! Each source adds to (or overrides) the hydro's command state and counts
//! towards its divisor, in a fixed evaluation order. Aircraft and boat
//! sources read subsystems this crate does not simulate; they contribute a
//! neutral value so the divisor stays as authored.

use sim_truck::document::records::{AeroSource, AnimatorSource};
use sim_types::Vec3;

/// Vehicle state sampled once per substep for animators.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AnimatorFrame {
    /// Average wheel speed, m/s.
    pub wheel_speed: f64,
    /// Speedometer full scale, same unit as `wheel_speed`.
    pub speedo_max: f64,
    /// Brake input.
    pub brake: f64,
    /// Parking brake engaged, 0 or 1.
    pub parking_brake: f64,
    /// Engine figures when the actor has one.
    pub engine: Option<EngineFrame>,
    /// First wheel differential state: 0 open, 0.5 split, 1 locked.
    pub diff_lock: Option<f64>,
    /// Camera direction.
    pub camera_dir: Vec3,
    /// Camera roll vector.
    pub camera_roll: Vec3,
    /// Position of node 0.
    pub reference_position: Vec3,
    /// Velocity of node 0.
    pub reference_velocity: Vec3,
}

/// Engine part of [`AnimatorFrame`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineFrame {
    /// Engine RPM.
    pub rpm: f64,
    /// Max RPM.
    pub max_rpm: f64,
    /// Turbo pressure, psi.
    pub turbo_psi: f64,
    /// Accelerator.
    pub accel: f64,
    /// Clutch.
    pub clutch: f64,
    /// Current gear.
    pub gear: i32,
    /// Forward gear count.
    pub num_gears: i32,
    /// Crank factor.
    pub crank_factor: f64,
}

/// Animator state carried between substeps, one per actor.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AnimatorMemory {
    previous_crank: f64,
    previous_gear: i32,
    shift_timer: f64,
}

/// Source list of an animator hydro.
#[derive(Debug, Clone, PartialEq)]
pub struct Animator {
    /// Vehicle-state sources.
    pub sources: Vec<AnimatorSource>,
    /// Aircraft engine source.
    pub aero: Option<(AeroSource, u32)>,
}

impl Animator {
    fn has(&self, source: AnimatorSource) -> bool {
        self.sources.contains(&source)
    }

    /// Fold this animator's sources into `state`, counting each in `div`.
    pub fn contribute(
        &self,
        frame: &AnimatorFrame,
        memory: &mut AnimatorMemory,
        dt: f64,
        state: &mut f64,
        div: &mut u32,
    ) {
        use AnimatorSource as S;
        let mut acc = Fold {
            state: *state,
            div: *div,
        };

        // No screw propellers: the average of nothing is zero.
        if self.has(S::BoatRudder) {
            acc.set(0.0);
        }
        if self.has(S::BoatThrottle) {
            acc.set(0.0);
        }
        if self.has(S::DiffLock) {
            acc.set(frame.diff_lock.unwrap_or(0.5));
        }
        if let Some(engine) = frame.engine {
            if self.has(S::Torque) {
                let torque = engine.crank_factor.max(0.0);
                let mut v = acc.state;
                if torque >= memory.previous_crank {
                    v -= torque / 10.0;
                } else {
                    v = 0.0;
                }
                memory.previous_crank = torque;
                acc.set(v.max(-1.0));
            }
            if self.has(S::SequentialShift) {
                let mut v = acc.state;
                if engine.gear > memory.previous_gear {
                    v = 1.0;
                    memory.shift_timer = 0.2;
                }
                if engine.gear < memory.previous_gear {
                    v = -1.0;
                    memory.shift_timer = -0.2;
                }
                memory.previous_gear = engine.gear;
                if memory.shift_timer > 0.0 {
                    v = 1.0;
                    memory.shift_timer = (memory.shift_timer - dt).max(0.0);
                }
                if memory.shift_timer < 0.0 {
                    v = -1.0;
                    memory.shift_timer = (memory.shift_timer + dt).min(0.0);
                }
                acc.set(v);
            }
            if self.has(S::ShiftLeftRight) {
                let v = match engine.gear {
                    0 => -0.5,
                    g if g < 0 => 1.0,
                    g => acc.state - f64::from((g - 1) / 2),
                };
                acc.set(v);
            }
            if self.has(S::ShiftBackForth) {
                let v = match engine.gear {
                    0 => 0.5,
                    g if g < 0 => 1.0,
                    g => f64::from(g % 2),
                };
                acc.set(v);
            }
            if self.has(S::GearSelect) {
                let v = acc.state
                    - (f64::from(engine.gear) + 2.0) / (f64::from(engine.num_gears) + 2.0);
                acc.set(v);
            }
        }
        if self.has(S::Parking) {
            acc.set(acc.state - frame.parking_brake);
        }
        if self.has(S::Speedo) {
            let scale = if frame.speedo_max > 0.0 {
                frame.speedo_max
            } else {
                140.0
            };
            acc.set(acc.state - frame.wheel_speed / scale * 3.0);
        }
        if let Some(engine) = frame.engine {
            if self.has(S::Tacho) && engine.max_rpm > 0.0 {
                acc.set(acc.state - engine.rpm / engine.max_rpm);
            }
            if self.has(S::Turbo) {
                acc.set(acc.state - engine.turbo_psi * 3.34 / 67.0);
            }
        }
        if self.has(S::Brakes) {
            acc.set(acc.state - frame.brake);
        }
        if let Some(engine) = frame.engine {
            if self.has(S::Accel) {
                acc.set(acc.state - (engine.accel + 0.06));
            }
            if self.has(S::Clutch) {
                acc.set(acc.state - (1.0 - engine.clutch).abs());
            }
        }
        if self.has(S::Airspeed) {
            let altitude = frame.reference_position.y;
            let pressure = 101_325.0 * (1.0 - 0.0065 * altitude / 288.15).powf(5.24947);
            let density = pressure * 0.000_012_089_6;
            let knots = frame.reference_velocity.norm() * 1.9438 * (density / 1.225).sqrt();
            acc.set(acc.state - knots / 100.0);
        }
        if self.has(S::VerticalVelocity) {
            let vvi = frame.reference_velocity.y * 196.85;
            acc.set((acc.state - vvi / 6000.0).clamp(-1.0, 1.0));
        }
        if self.has(S::Altimeter1k) {
            let alt = frame.reference_position.y * 1.1811 / 360.0;
            acc.set(acc.state - alt.fract());
        }
        if self.has(S::Altimeter10k) {
            let alt = frame.reference_position.y * 1.1811 / 3600.0;
            acc.set((acc.state - alt.fract()).max(-1.0));
        }
        if self.has(S::Altimeter100k) {
            let alt = frame.reference_position.y * 1.1811 / 36000.0;
            acc.set((acc.state - alt).max(-1.0));
        }
        if self.has(S::AngleOfAttack) {
            // No wings: zero angle of attack.
            acc.set(acc.state.clamp(-1.0, 1.0));
        }
        if self.has(S::Roll) {
            let up = frame.camera_dir.cross(&-frame.camera_roll);
            let mut angle = frame.camera_roll.y.clamp(-1.0, 1.0).asin().to_degrees();
            if up.y < 0.0 {
                angle = 180.0 - angle;
            }
            let mut v = angle / 180.0;
            if v >= 1.0 {
                v -= 2.0;
            }
            acc.set(v);
        }
        if self.has(S::Pitch) {
            let angle = frame.camera_dir.y.clamp(-1.0, 1.0).asin().to_degrees();
            acc.set(angle / 90.0);
        }
        if self.has(S::AirBrake) {
            acc.set(acc.state);
        }
        if self.has(S::Flap) {
            acc.set(0.0);
        }
        *state = acc.state;
        *div = acc.div;
    }
}

struct Fold {
    state: f64,
    div: u32,
}

impl Fold {
    fn set(&mut self, value: f64) {
        self.state = value;
        self.div += 1;
    }
}
