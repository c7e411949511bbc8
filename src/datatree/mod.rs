//! Snapshot-isolated data trees.
//!
//! The configuration tree is versioned: every commit yields a new immutable
//! [`DataTreeSnapshot`], and changes are staged in a [`DataTreeModification`]
//! built on top of one. [`ModifiableDataTree`] owns the last committed state
//! and accepts a modification only if it was built against that state.
//!
//! ```text
//!   snapshot(c1) ──new_modification──► modification ──commit──► snapshot(c2)
//!        │                                                   ▲
//!        └── still readable, unaffected ─────────────────────┘
//! ```
//!
//! The operational tree has no stored state at all: it is a
//! [`ReadableDataTree`] answering every read from the live device.

mod modification;
mod snapshot;
mod tree;

pub use modification::{DataTreeModification, ModificationOp};
pub use snapshot::DataTreeSnapshot;
pub use tree::ModifiableDataTree;

use crate::data::{DataNode, DataPath};
use crate::translate::ReadFailed;

/// A read-only tree whose reads may query the device.
pub trait ReadableDataTree: Send + Sync {
    fn read(&self, path: &DataPath) -> Result<Option<DataNode>, ReadFailed>;
}
