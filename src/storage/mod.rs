//! storage layer for cfgsync
//!
//! this module persists configuration snapshots in a git repository.
//! The upper layers (data tree, transactions) use this API and never
//! touch git2 directly.
//!
//!  # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     GitRepository                           │
//! │  (High-level API: nodes, snapshots, publish)                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │    tree     │       │    blob     │       │    refs     │
//!  │  (nodes)    │       │ (attributes)│       │   (main)    │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//!         │                     │                     │
//!         └─────────────────────┼─────────────────────┘
//!                               │
//!                               ▼
//!                        ┌─────────────┐
//!                        │   commit    │
//!                        │  (history)  │
//!                        └─────────────┘
//!  ```
//!
//! # Usage
//!
//! ```ignore
//! use cfgsync::storage::{GitRepository, GitSignature};
//!
//! let repo = GitRepository::open_or_init("./state", GitSignature::agent())?;
//!
//! // stage a change on top of the current snapshot
//! let head = repo.head()?;
//! let tree = repo.tree_of(head)?;
//! let tree = repo.write_node(tree, &path, &node)?;
//!
//! // make it the next snapshot
//! let head = repo.publish(head, tree, "[SUBMIT] tx:...")?;
//! ```

mod blob;
mod commit;
mod errors;
mod refs;
mod repository;
mod tree;
mod types;

// Re-export public API
pub use blob::ATTRIBUTES_FILE;
pub use commit::{CommitInfo, CommitMessage};
pub use errors::{StorageError, StorageResult};
pub use repository::GitRepository;
pub use tree::TreeMutator;
pub use types::{BlobId, BranchName, CommitId, GitSignature, TreeId};
