//! Integration tests for the softbody crates.
//!
//! These tests drive the whole pipeline the way a host does:
//! - Document text → parser → importer → typed records
//! - Records → spawner → live actor → substeps
//! - Several actors under one manager: sleep, hooks, deletion
//! - Live actor → exporter → text → a new actor

pub mod document_pipeline;
pub mod drivetrain;
pub mod export_pipeline;
pub mod multi_actor;
pub mod softbody;
