//! Transactions over the configuration and operational trees.
//!
//! Every transaction reads one configuration snapshot, fixed when it opens.
//! Writes are staged into a modification of that snapshot and only become
//! visible to others once a submit has pushed them to the device and
//! committed them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        DataBroker                           │
//! │        (opens transactions, tracks the active ones)         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │  ReadOnly   │       │ ReadWrite   │       │   Write     │
//!  │ snapshot +  │◀──────│ (read half, │──────▶│ modification│
//!  │  device     │       │ write half) │       │ + submit    │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use cfgsync::transaction::{DataBroker, LogicalDatastoreType};
//!
//! let broker = DataBroker::new(tree, operational, registry);
//!
//! let mut tx = broker.new_write_only_transaction()?;
//! tx.put(LogicalDatastoreType::Configuration, &path, &node)?;
//!
//! // Push to the device and commit, or drop the changes
//! tx.submit()?;  // or tx.cancel();
//! ```

mod broker;
mod error;
mod read_only;
mod read_write;
mod write;

pub use broker::{DataBroker, TransactionKind, TransactionMetadata};
pub use error::{TransactionError, TransactionResult};
pub use read_only::{LogicalDatastoreType, ReadOnlyTransaction};
pub use read_write::ReadWriteTransaction;
pub use write::{TxAborted, TxActive, TxCommitted, WriteTransaction};
