//! Shared vocabulary for the soft-body vehicle core.
//!
//! This crate holds everything the document layer (`sim-truck`) and the
//! physics layer (`sim-core`) must agree on without depending on each other:
//!
//! - Typed indices: [`NodeIdx`], [`BeamIdx`], [`ActorId`]
//! - Physics constants ([`constants`]), including [`PHYSICS_DT`]
//! - Simulation configuration ([`SimConfig`], [`ReplayConfig`])
//! - Axis-aligned bounding boxes ([`Aabb`])
//! - Collaborator traits consumed by the integrator: [`SoundSink`],
//!   [`TerrainQuery`], [`InputSource`] and [`LogSink`]
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero engine dependencies**. Sound, terrain,
//! input and console are reached only through the traits in [`collab`];
//! tests plug in the no-op and recording fakes provided here.

#![doc(html_root_url = "https://docs.rs/sim-types/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn, // nalgebra constructors are not const
    clippy::doc_markdown,
)]

pub mod aabb;
pub mod collab;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;

pub use aabb::Aabb;
pub use collab::{
    Blinker, FlatTerrain, InputEvent, InputSource, LogSink, ModulationSource, NullInput, NullSound,
    NullTerrain, RecordingSoundSink, Severity, SoundEvent, SoundSink, SoundState, SoundTrigger,
    TerrainQuery, TracingLog,
};
pub use config::{ReplayConfig, SimConfig};
pub use constants::PHYSICS_DT;
pub use error::{ConfigError, Result};
pub use ids::{ActorId, BeamIdx, NodeIdx};

/// Re-export of the vector type used across the core.
pub type Vec3 = nalgebra::Vector3<f64>;
