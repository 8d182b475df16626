//! Collaborator interfaces consumed by the core.
//!
//! The integrator never talks to audio, input devices, the console or the
//! terrain directly. Each of those is a narrow trait here; the manager owns
//! one instance of each and hands references down to actors. Sound and
//! terrain are queried from worker threads, so they are `Send + Sync` and
//! take `&self`.

use std::sync::Mutex;

use crate::ids::ActorId;

// ---------------------------------------------------------------------------
// Sound
// ---------------------------------------------------------------------------

/// Sound triggers an actor can start, stop or fire once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundTrigger {
    /// A beam broke.
    Break,
    /// A beam creaked under load.
    Creak,
    /// Stabiliser air valves working.
    Air,
    /// Air tank purge.
    AirPurge,
    /// Engine starter motor.
    Starter,
    /// Engine running.
    Engine,
    /// Gear change while the clutch was engaged.
    GearSlide,
    /// Gear change.
    Shift,
    /// Turbo blow-off valve.
    TurboBov,
    /// Turbo wastegate flutter.
    TurboWastegate,
    /// Antilag backfire.
    TurboBackfire,
    /// Anti-lock brakes modulating.
    AlbActive,
    /// Traction control modulating.
    TcActive,
    /// Hydraulic pump.
    Pump,
    /// Sound bound to a command key (1-based key number).
    LinkedCommand(u16),
    /// Horn.
    Horn,
    /// Ignition switched on.
    Ignition,
    /// Blinker relay click.
    TurnSignal,
    /// Parking brake applied.
    Parking,
}

/// Sources that can modulate a running sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModulationSource {
    /// Engine rpm.
    Engine,
    /// Turbo rpm.
    Turbo,
    /// Stabiliser air flow.
    Air,
    /// Beam break energy.
    Break,
    /// Pump load.
    Pump,
    /// Rate of a command key (1-based key number).
    LinkedCommandRate(u16),
    /// Average wheel speed.
    WheelSpeed,
}

/// What to do with a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundState {
    /// Start a looping sound.
    Start,
    /// Stop a looping sound.
    Stop,
    /// Play once.
    Once,
}

/// Receiver of sound events.
pub trait SoundSink: Send + Sync {
    /// Start, stop or fire a trigger.
    fn trigger(&self, actor: ActorId, trigger: SoundTrigger, state: SoundState);

    /// Set a modulation value.
    fn modulate(&self, actor: ActorId, source: ModulationSource, value: f64);
}

/// Sound sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSound;

impl SoundSink for NullSound {
    fn trigger(&self, _: ActorId, _: SoundTrigger, _: SoundState) {}
    fn modulate(&self, _: ActorId, _: ModulationSource, _: f64) {}
}

/// One recorded sound call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SoundEvent {
    /// A [`SoundSink::trigger`] call.
    Trigger(ActorId, SoundTrigger, SoundState),
    /// A [`SoundSink::modulate`] call.
    Modulate(ActorId, ModulationSource, f64),
}

/// Sound sink that records every call, for tests.
#[derive(Debug, Default)]
pub struct RecordingSoundSink {
    events: Mutex<Vec<SoundEvent>>,
}

impl RecordingSoundSink {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<SoundEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Number of trigger calls matching `trigger` and `state`.
    #[must_use]
    pub fn count(&self, trigger: SoundTrigger, state: SoundState) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, SoundEvent::Trigger(_, t, s) if *t == trigger && *s == state))
            .count()
    }

    fn push(&self, event: SoundEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl SoundSink for RecordingSoundSink {
    fn trigger(&self, actor: ActorId, trigger: SoundTrigger, state: SoundState) {
        self.push(SoundEvent::Trigger(actor, trigger, state));
    }

    fn modulate(&self, actor: ActorId, source: ModulationSource, value: f64) {
        self.push(SoundEvent::Modulate(actor, source, value));
    }
}

// ---------------------------------------------------------------------------
// Terrain
// ---------------------------------------------------------------------------

/// Terrain and water queries used by ground contact and buoyancy.
pub trait TerrainQuery: Send + Sync {
    /// Ground height at `(x, z)`, `None` where there is no ground.
    fn ground_height(&self, x: f64, z: f64) -> Option<f64>;

    /// Water surface height at `(x, z)`, `None` without water.
    fn water_height(&self, _x: f64, _z: f64) -> Option<f64> {
        None
    }

    /// Coulomb friction coefficient of the ground.
    fn ground_friction(&self) -> f64 {
        0.8
    }
}

/// Empty world: no ground, no water.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTerrain;

impl TerrainQuery for NullTerrain {
    fn ground_height(&self, _: f64, _: f64) -> Option<f64> {
        None
    }
}

/// Infinite flat ground, optionally with a water plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatTerrain {
    /// Ground height.
    pub height: f64,
    /// Water height, if any.
    pub water: Option<f64>,
    /// Friction coefficient.
    pub friction: f64,
}

impl FlatTerrain {
    /// Dry flat ground at `height`.
    #[must_use]
    pub fn new(height: f64) -> Self {
        Self {
            height,
            water: None,
            friction: 0.8,
        }
    }

    /// Add a water plane.
    #[must_use]
    pub fn with_water(mut self, water: f64) -> Self {
        self.water = Some(water);
        self
    }
}

impl TerrainQuery for FlatTerrain {
    fn ground_height(&self, _: f64, _: f64) -> Option<f64> {
        Some(self.height)
    }

    fn water_height(&self, _: f64, _: f64) -> Option<f64> {
        self.water
    }

    fn ground_friction(&self) -> f64 {
        self.friction
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Blinker selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Blinker {
    /// Off.
    #[default]
    Off,
    /// Left.
    Left,
    /// Right.
    Right,
    /// Hazard lights.
    Warn,
}

/// A single input event delivered to an actor between ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Accelerator pedal [0, 1].
    Accelerator(f64),
    /// Brake pedal [0, 1].
    Brake(f64),
    /// Manual clutch pedal [0, 1] (1 = pressed).
    Clutch(f64),
    /// Steering [-1, 1].
    Steering(f64),
    /// Command key value; key is 1-based.
    Command {
        /// Key number.
        key: usize,
        /// Value [0, 1].
        value: f64,
    },
    /// Shift one gear up.
    ShiftUp,
    /// Shift one gear down.
    ShiftDown,
    /// Select a gear directly (-1 reverse, 0 neutral).
    SelectGear(i32),
    /// Cycle the auto-shift mode.
    ToggleShiftMode,
    /// Toggle ignition.
    ToggleContact,
    /// Switch on and start the engine at once, skipping the starter.
    StartEngine,
    /// Hold or release the starter.
    Starter(bool),
    /// Horn.
    Horn(bool),
    /// Toggle headlights.
    ToggleLights,
    /// Set blinkers.
    Blinker(Blinker),
    /// Toggle the parking brake.
    ToggleParkingBrake,
    /// Toggle hooks.
    ToggleHooks,
    /// Toggle ties.
    ToggleTies,
    /// Toggle ropes.
    ToggleRopes,
    /// Toggle slidenode locks.
    ToggleSlideNodes,
    /// Repair request.
    Repair,
    /// Pause toggle.
    TogglePause,
}

/// Source of per-actor input, polled once per tick on the main thread.
pub trait InputSource: Send {
    /// Take the events pending for `actor`.
    fn drain(&mut self, actor: ActorId) -> Vec<InputEvent>;
}

/// Input source without any device.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullInput;

impl InputSource for NullInput {
    fn drain(&mut self, _: ActorId) -> Vec<InputEvent> {
        Vec::new()
    }
}

// ---------------------------------------------------------------------------
// Log
// ---------------------------------------------------------------------------

/// Diagnostic severity, shared by the parser and the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational trace.
    Info,
    /// Tolerated anomaly.
    Warning,
    /// Unusable record, skipped.
    Error,
    /// Whole input rejected.
    Fatal,
}

/// Console sink for user-facing messages.
pub trait LogSink: Send + Sync {
    /// Emit one message.
    fn log(&self, severity: Severity, message: &str);
}

/// Log sink that forwards to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl LogSink for TracingLog {
    fn log(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => tracing::info!("{message}"),
            Severity::Warning => tracing::warn!("{message}"),
            Severity::Error | Severity::Fatal => tracing::error!("{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_counts_by_trigger_and_state() {
        let rec = RecordingSoundSink::new();
        let id = ActorId(1);
        rec.trigger(id, SoundTrigger::Break, SoundState::Once);
        rec.trigger(id, SoundTrigger::Break, SoundState::Once);
        rec.trigger(id, SoundTrigger::Air, SoundState::Start);
        rec.modulate(id, ModulationSource::Break, 3.0);
        assert_eq!(rec.count(SoundTrigger::Break, SoundState::Once), 2);
        assert_eq!(rec.count(SoundTrigger::Air, SoundState::Stop), 0);
        assert_eq!(rec.events().len(), 4);
    }

    #[test]
    fn flat_terrain_reports_height_and_water() {
        let t = FlatTerrain::new(1.5).with_water(0.5);
        assert_eq!(t.ground_height(10.0, -3.0), Some(1.5));
        assert_eq!(t.water_height(0.0, 0.0), Some(0.5));
        assert_eq!(NullTerrain.ground_height(0.0, 0.0), None);
    }

    #[test]
    fn severity_orders_by_gravity() {
        assert!(Severity::Fatal > Severity::Error);
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }
}
