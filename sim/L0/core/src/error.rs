//! Error types for spawning and driving actors.

use sim_types::{ActorId, ConfigError};
use thiserror::Error;

/// Why a document could not be turned into a live actor.
///
/// Spawning is all-or-nothing: on error the partially built arrays are
/// dropped and the manager is left untouched.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpawnError {
    /// The request named a sectionconfig the document does not declare.
    #[error("unknown sectionconfig '{0}'")]
    UnknownSectionconfig(String),

    /// A record references a node that is not part of the spawned module set.
    #[error("line {line}: node reference '{reference}' does not name a live node")]
    UnresolvedNode {
        /// Source line of the record.
        line: usize,
        /// Reference as written.
        reference: String,
    },

    /// A beam would join a node to itself or to a coincident node.
    #[error("line {line}: beam between nodes {a} and {b} has zero length")]
    ZeroLengthBeam {
        /// Source line of the record.
        line: usize,
        /// First endpoint.
        a: u32,
        /// Second endpoint.
        b: u32,
    },

    /// A wheel whose axis or ray count cannot produce a ring of nodes.
    #[error("line {line}: degenerate wheel: {reason}")]
    DegenerateWheel {
        /// Source line of the record.
        line: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// The selected modules contain no nodes at all.
    #[error("document has no nodes")]
    NoNodes,
}

/// Runtime errors raised by the actor manager.
#[derive(Debug, Error)]
pub enum SimError {
    /// No actor with that id is alive.
    #[error("unknown actor {0}")]
    UnknownActor(ActorId),

    /// The actor is disposed or otherwise not accepting the request.
    #[error("actor {0} is busy")]
    Busy(ActorId),

    /// An argument was out of its valid range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Spawning failed.
    #[error(transparent)]
    Spawn(#[from] SpawnError),
}

/// Result alias for manager operations.
pub type Result<T> = std::result::Result<T, SimError>;
