//! Configuration types for the simulation.
//!
//! This module provides configuration types that control how the actor
//! manager runs: micro-timestep, gravity, sleep thresholds, command
//! forwarding policy, replay recording and the worker pool.

use crate::constants::{DEFAULT_GRAVITY, PHYSICS_DT};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Main configuration for a simulation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimConfig {
    /// Fixed micro-timestep for physics integration (seconds).
    pub physics_dt: f64,
    /// Gravity along the world Y axis (m/s², negative is down).
    pub gravity: f64,
    /// Simulation speed multiplier applied to wall-clock time.
    pub sim_speed: f64,
    /// Upper bound on wall-clock time consumed by a single tick (seconds).
    pub max_frame_dt: f64,
    /// Squared average node velocity below which an actor counts as resting.
    pub sleep_velocity_sq: f64,
    /// Resting time after which an actor falls asleep (seconds).
    pub sleep_timeout: f64,
    /// Forward commands only to directly linked actors.
    pub realistic_commands: bool,
    /// Apply viscous air drag to nodes.
    pub drag_enabled: bool,
    /// Add random turbulence on top of viscous drag.
    pub turbulence_enabled: bool,
    /// Replay recording.
    pub replay: ReplayConfig,
    /// Size of the bounded thread pool that fans out per-actor work.
    pub worker_threads: usize,
    /// Run the physics batch on a worker thread (joined on the next tick).
    /// When false the batch runs inline at the end of each tick.
    pub async_physics: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            physics_dt: PHYSICS_DT,
            gravity: DEFAULT_GRAVITY,
            sim_speed: 1.0,
            max_frame_dt: 1.0 / 20.0,
            sleep_velocity_sq: 0.01,
            sleep_timeout: 10.0,
            realistic_commands: false,
            drag_enabled: true,
            turbulence_enabled: true,
            replay: ReplayConfig::default(),
            worker_threads: 4,
            async_physics: true,
        }
    }
}

impl SimConfig {
    /// Configuration for deterministic headless runs: no turbulence, batch
    /// executed inline, single worker.
    #[must_use]
    pub fn deterministic() -> Self {
        Self {
            turbulence_enabled: false,
            async_physics: false,
            worker_threads: 1,
            ..Default::default()
        }
    }

    /// Set gravity (m/s² along Y).
    #[must_use]
    pub fn gravity(mut self, gravity: f64) -> Self {
        self.gravity = gravity;
        self
    }

    /// Disable gravity.
    #[must_use]
    pub fn zero_gravity(mut self) -> Self {
        self.gravity = 0.0;
        self
    }

    /// Disable all air drag and turbulence.
    #[must_use]
    pub fn without_drag(mut self) -> Self {
        self.drag_enabled = false;
        self.turbulence_enabled = false;
        self
    }

    /// Set the simulation speed multiplier.
    #[must_use]
    pub fn sim_speed(mut self, speed: f64) -> Self {
        self.sim_speed = speed;
        self
    }

    /// Forward commands only across hook/tie/rope/slidenode links.
    #[must_use]
    pub fn realistic_commands(mut self, on: bool) -> Self {
        self.realistic_commands = on;
        self
    }

    /// Set the replay configuration.
    #[must_use]
    pub fn replay(mut self, replay: ReplayConfig) -> Self {
        self.replay = replay;
        self
    }

    /// Set the worker pool size.
    #[must_use]
    pub fn worker_threads(mut self, n: usize) -> Self {
        self.worker_threads = n;
        self
    }

    /// Choose between the worker thread and inline batches.
    #[must_use]
    pub fn async_physics(mut self, on: bool) -> Self {
        self.async_physics = on;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.physics_dt.is_finite() || self.physics_dt <= 0.0 {
            return Err(crate::ConfigError::InvalidTimestep(self.physics_dt));
        }
        if self.physics_dt > self.max_frame_dt {
            return Err(crate::ConfigError::invalid(
                "physics_dt larger than max_frame_dt would never step",
            ));
        }
        if !self.sim_speed.is_finite() || self.sim_speed <= 0.0 {
            return Err(crate::ConfigError::InvalidSpeed(self.sim_speed));
        }
        if !self.gravity.is_finite() {
            return Err(crate::ConfigError::invalid("gravity must be finite"));
        }
        if self.worker_threads == 0 {
            return Err(crate::ConfigError::invalid("worker_threads must be >= 1"));
        }
        if !(self.sleep_timeout > 0.0) {
            return Err(crate::ConfigError::invalid("sleep_timeout must be > 0"));
        }
        self.replay.validate()?;
        Ok(())
    }

    /// Micro-steps per second.
    #[must_use]
    pub fn frequency(&self) -> f64 {
        1.0 / self.physics_dt
    }
}

/// Replay ring buffer settings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReplayConfig {
    /// Record replay frames.
    pub enabled: bool,
    /// Number of frames kept in the ring.
    pub length_frames: usize,
    /// Micro-steps between two recorded frames.
    pub steps_per_frame: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            length_frames: 200,
            steps_per_frame: 1000,
        }
    }
}

impl ReplayConfig {
    /// Enabled replay with the given depth and stepping.
    #[must_use]
    pub fn recording(length_frames: usize, steps_per_frame: usize) -> Self {
        Self {
            enabled: true,
            length_frames,
            steps_per_frame,
        }
    }

    /// Validate the replay settings.
    pub fn validate(&self) -> crate::Result<()> {
        if self.enabled && (self.length_frames == 0 || self.steps_per_frame == 0) {
            return Err(crate::ConfigError::invalid(
                "replay needs a non-zero depth and stepping",
            ));
        }
        Ok(())
    }
}
