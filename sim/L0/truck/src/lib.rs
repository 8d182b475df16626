//! Actor document (truck file) model, parser and writer.
//!
//! An actor document is a line-oriented text format: the first data line
//! names the actor, keyword lines open sections or act as directives, and
//! every other line is a record of the current section. This crate turns
//! such text into a typed [`Document`]:
//!
//! - [`tokenizer`]: argument splitting and lenient number reading
//! - [`keyword`]: the closed keyword table
//! - [`parser`]: per-keyword record parsers, presets and segments
//! - [`importer`]: sequential node numbering and reference resolution
//! - [`writer`]: serialization back to text
//!
//! Anomalies the format tolerates are returned as [`Diagnostic`]s next to
//! the document; only fatal conditions become a [`ParseError`].
//!
//! # Example
//!
//! ```
//! use sim_truck::{load, Keyword};
//!
//! let text = "box\nnodes\n0, 0, 0, 0\n1, 1, 0, 0\nbeams\n0, 1\nend\n";
//! let out = load(text).unwrap();
//! assert_eq!(out.document.name, "box");
//! assert_eq!(out.document.count(Keyword::Beams), 1);
//! ```
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero engine dependencies**. It knows
//! nothing about physics: node references are resolved to indices, but the
//! values are only interpreted by `sim-core` at spawn time.

#![doc(html_root_url = "https://docs.rs/sim-truck/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::cast_precision_loss,    // document integers are small
    clippy::cast_possible_truncation, // values are clamped before narrowing
    clippy::module_name_repetitions,
)]

pub mod diag;
pub mod document;
pub mod error;
pub mod importer;
pub mod keyword;
pub mod node_ref;
pub mod parser;
pub mod tokenizer;
pub mod writer;

use std::path::Path;

pub use diag::{Diagnostic, Diagnostics};
pub use document::{Document, Entry, Module, Record};
pub use error::{ParseError, Result};
pub use importer::{ImportOptions, NodeRegistry};
pub use keyword::{Keyword, KeywordKind};
pub use node_ref::{NodeList, NodeListItem, NodeRef};
pub use parser::{parse, ParseOptions, ParseOutput};
pub use writer::write;

/// Parse `text` with default options, rejecting fatal input.
///
/// # Errors
///
/// Returns the first fatal diagnostic as a [`ParseError`], or
/// [`ParseError::Empty`] when the text holds nothing at all.
pub fn load(text: &str) -> Result<ParseOutput> {
    parse(text, ParseOptions::default()).into_strict()
}

/// Parse raw bytes, replacing invalid UTF-8 sequences with `?`.
///
/// # Errors
///
/// Same as [`load`].
pub fn load_bytes(bytes: &[u8], options: ParseOptions) -> Result<ParseOutput> {
    let text = String::from_utf8_lossy(bytes).replace(char::REPLACEMENT_CHARACTER, "?");
    parse(&text, options).into_strict()
}

/// Read and parse a document from disk.
///
/// # Errors
///
/// [`ParseError::Io`] when the file cannot be read, otherwise as [`load`].
pub fn load_file(path: impl AsRef<Path>, options: ParseOptions) -> Result<ParseOutput> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "loading actor document");
    load_bytes(&bytes, options)
}
