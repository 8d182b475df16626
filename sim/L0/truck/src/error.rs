//! Error types for actor document loading.
//!
//! Only fatal conditions surface as [`ParseError`]. Everything the format
//! tolerates is reported as a [`Diagnostic`](crate::Diagnostic) next to the
//! parsed document instead.

use thiserror::Error;

/// Fatal errors that reject a whole document.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The input could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A numbered node did not follow its predecessor.
    #[error("line {line}: lost sync in node numbers, got numbered node [{got}], expected [{expected}]")]
    NodeOutOfSync {
        /// Line of the offending node.
        line: usize,
        /// Number written in the file.
        got: u32,
        /// Number the importer expected.
        expected: usize,
    },

    /// A named node reused an existing name.
    #[error("line {line}: duplicate node name [{name}]")]
    DuplicateNodeName {
        /// Line of the offending node.
        line: usize,
        /// The duplicated name.
        name: String,
    },

    /// Any other fatal diagnostic.
    #[error("line {line}: {message}")]
    Fatal {
        /// Line the diagnostic refers to.
        line: usize,
        /// Diagnostic text.
        message: String,
    },

    /// The input held no actor name.
    #[error("document is empty")]
    Empty,
}

impl ParseError {
    /// Create a [`ParseError::NodeOutOfSync`].
    #[must_use]
    pub fn node_out_of_sync(line: usize, got: u32, expected: usize) -> Self {
        Self::NodeOutOfSync {
            line,
            got,
            expected,
        }
    }

    /// Create a [`ParseError::DuplicateNodeName`].
    pub fn duplicate_node_name(line: usize, name: impl Into<String>) -> Self {
        Self::DuplicateNodeName {
            line,
            name: name.into(),
        }
    }

    /// Create a [`ParseError::Fatal`].
    pub fn fatal(line: usize, message: impl Into<String>) -> Self {
        Self::Fatal {
            line,
            message: message.into(),
        }
    }
}

/// Result type for document loading.
pub type Result<T> = std::result::Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_line() {
        let err = ParseError::node_out_of_sync(7, 3, 2);
        assert_eq!(
            err.to_string(),
            "line 7: lost sync in node numbers, got numbered node [3], expected [2]"
        );
        let err = ParseError::duplicate_node_name(9, "hub");
        assert_eq!(err.to_string(), "line 9: duplicate node name [hub]");
    }
}
