//! Node references as written in a document and as resolved by the importer.
//!
//! A reference is kept in its textual form together with the number it
//! parses to, if any. The parser never resolves anything; the
//! [`importer`](crate::importer) fills [`NodeRef::resolved`] once every node
//! of the document is known.

use std::fmt;

use sim_types::NodeIdx;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single node reference.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeRef {
    /// Reference as written, with a negative sign already dropped.
    pub text: String,
    /// Numeric reading of `text`, `None` for pure names.
    pub number: Option<u32>,
    /// Runtime node index, set by the importer.
    pub resolved: Option<NodeIdx>,
    /// 1-based source line, for diagnostics.
    pub line: usize,
}

impl NodeRef {
    /// Reference by number.
    #[must_use]
    pub fn numbered(number: u32) -> Self {
        Self {
            text: number.to_string(),
            number: Some(number),
            resolved: None,
            line: 0,
        }
    }

    /// Reference by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            text: name.into(),
            number: None,
            resolved: None,
            line: 0,
        }
    }

    /// Same reference, already resolved to `idx`.
    #[must_use]
    pub fn resolved_to(mut self, idx: NodeIdx) -> Self {
        self.resolved = Some(idx);
        self
    }

    /// Resolved index or node 0.
    ///
    /// The importer resolves every reference it can and maps the rest to
    /// node 0, so after a successful import this never hits the fallback.
    #[must_use]
    pub fn idx(&self) -> NodeIdx {
        self.resolved.unwrap_or_default()
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// An inclusive range of numbered nodes, or a single reference.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NodeListItem {
    /// One node.
    Single(NodeRef),
    /// `start-end`, both ends inclusive.
    Range(NodeRef, NodeRef),
}

/// A list of nodes given as singles and ranges (forset, rails, railgroups).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeList {
    /// Items as written.
    pub items: Vec<NodeListItem>,
    /// Expanded runtime indices, set by the importer.
    pub resolved: Vec<NodeIdx>,
}

impl NodeList {
    /// True when nothing was listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Display for NodeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match item {
                NodeListItem::Single(r) => write!(f, "{r}")?,
                NodeListItem::Range(a, b) => write!(f, "{a}-{b}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_falls_back_to_zero() {
        assert_eq!(NodeRef::named("hub").idx(), NodeIdx(0));
        assert_eq!(NodeRef::numbered(4).resolved_to(NodeIdx(9)).idx(), NodeIdx(9));
    }

    #[test]
    fn list_display() {
        let list = NodeList {
            items: vec![
                NodeListItem::Range(NodeRef::numbered(1), NodeRef::numbered(4)),
                NodeListItem::Single(NodeRef::named("tip")),
            ],
            resolved: Vec::new(),
        };
        assert_eq!(list.to_string(), "1-4, tip");
    }
}
