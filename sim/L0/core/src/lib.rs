//! Soft-body actor simulation.
//!
//! This crate turns a parsed actor document into a live [`Actor`] (nodes
//! joined by spring-damper beams, plus the wheels, shocks, hydraulics,
//! drivetrain and links built on top of them) and steps many actors together
//! under an [`ActorManager`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     sim_truck::Document                     │
//! │  Static: records and preset snapshots, as written           │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │ spawn_actor
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Actor                              │
//! │  Dynamic: node positions and velocities, beam state         │
//! │  One substep: forces → integration → collisions             │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │ owned by
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       ActorManager                          │
//! │  Frame scheduling, sleep, links, inter-actor coupling,      │
//! │  command forwarding and network streams                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A running actor can be written back into its document with
//! [`export_actor`].
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero engine dependencies**. Terrain,
//! sound, input and console are reached through the collaborator traits of
//! `sim-types`; the headless fakes there are enough to drive every feature.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use sim_core::{ActorManager, ActorSpawnRequest, Collaborators, ExportOptions};
//! use sim_types::{SimConfig, Vec3};
//!
//! let doc = Arc::new(sim_truck::load(&text)?.document);
//! let mut manager = ActorManager::new(SimConfig::default(), Collaborators::default())?;
//! let id = manager.spawn(doc, ActorSpawnRequest::at(Vec3::new(0.0, 1.0, 0.0)))?;
//!
//! for _ in 0..600 {
//!     manager.tick(1.0 / 60.0, Some(id));
//! }
//! println!("{:?}", manager.actor(id).map(|a| a.bounds));
//! let edited = manager.export(id, &ExportOptions::default())?;
//! ```

#![doc(html_root_url = "https://docs.rs/sim-core/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,       // nalgebra constructors are not const
    clippy::suboptimal_flops,           // mul_add rewrites obscure the force terms
    clippy::too_many_lines,             // the substep and spawner dispatch are long by nature
    clippy::too_many_arguments,
    clippy::cast_precision_loss,        // counts and indices stay far below 2^52
    clippy::doc_markdown,
)]

// Soft body primitives
pub mod beam;
pub mod mass;
pub mod node;

// Actuators and control filters
pub mod animator;
pub mod command;
pub mod inertia;
pub mod shock;
pub mod trigger;

// Drivetrain
pub mod differential;
pub mod engine;
pub mod wheel;

// Contacts and links
pub mod collision;
pub mod links;
pub mod slidenode;

// Actor assembly and stepping
pub mod actor;
pub mod export;
pub mod spawner;

// Multi-actor orchestration
pub mod manager;
pub mod net;
pub mod replay;

pub mod error;

pub use actor::{Actor, ActorMetrics, ActorState, Controls, LinkRequest, ResetKind};
pub use beam::{Beam, BeamType, BoundedKind};
pub use engine::{Engine, EngineAttribute, GearboxMode};
pub use error::{Result, SimError, SpawnError};
pub use export::{export_actor, export_text, ExportOptions};
pub use manager::{ActorManager, BeamKey, Collaborators, InterActorBeam, SimAttribute};
pub use net::{ActorStreamUpdate, NetError, VehicleState};
pub use node::{Node, NodeFlags};
pub use spawner::{spawn_actor, ActorSpawnRequest};
