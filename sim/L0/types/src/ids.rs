//! Typed indices into actor arrays.
//!
//! Nodes and beams live in contiguous arrays owned by their actor; an index
//! is stable for the lifetime of that actor. Actor ids are stable instance
//! numbers handed out by the manager and never reused.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! typed_index {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub struct $name(pub u32);

        impl $name {
            /// Wrap a raw array position.
            #[must_use]
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Position in the owning array.
            #[must_use]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            /// Build from an array position, `None` if it does not fit in `u32`.
            #[must_use]
            pub fn from_usize(pos: usize) -> Option<Self> {
                u32::try_from(pos).ok().map(Self)
            }

            /// Build from a position inside a live array.
            ///
            /// Actor arrays never exceed `u32::MAX` entries; larger values
            /// saturate.
            #[must_use]
            pub fn at(pos: usize) -> Self {
                Self(u32::try_from(pos).unwrap_or(u32::MAX))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

typed_index!(
    /// Index of a node within its actor.
    NodeIdx,
    "n"
);

typed_index!(
    /// Index of a beam within its actor.
    BeamIdx,
    "b"
);

typed_index!(
    /// Stable instance id of an actor.
    ActorId,
    "actor#"
);
