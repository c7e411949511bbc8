//! Write transactions using the typestate pattern.
//!
//! The typestate pattern ensures at compile time that transactions
//! are used correctly:
//! - Only active transactions can stage changes or be submitted
//! - Submitted/cancelled transactions cannot be reused
//! - The broker stops tracking a transaction as soon as it leaves the active state

use std::fmt;

use tracing::{debug, info, warn};

use crate::data::{DataNode, DataPath};
use crate::datatree::{DataTreeModification, DataTreeSnapshot};
use crate::naming;
use crate::storage::CommitId;
use crate::transaction::broker::{ActiveEntry, DataBroker, TransactionMetadata};
use crate::transaction::error::{TransactionError, TransactionResult};
use crate::transaction::read_only::LogicalDatastoreType;
use crate::translate::AppliedChange;

/// State of a transaction still staging changes.
pub struct TxActive {
    modification: DataTreeModification,
    _entry: ActiveEntry,
}

/// State of a transaction whose changes reached the device and the tree.
#[derive(Debug)]
pub struct TxCommitted {
    snapshot: DataTreeSnapshot,
    applied: Vec<AppliedChange>,
}

/// State of a cancelled transaction.
#[derive(Debug)]
pub struct TxAborted;

/// A configuration write transaction.
///
/// Changes are staged into one modification over the snapshot the
/// transaction started from. [`submit`](WriteTransaction::submit) pushes them
/// to the device and, only if every device call succeeds, commits them.
pub struct WriteTransaction<State> {
    pub(crate) metadata: TransactionMetadata,
    broker: DataBroker,
    state: State,
}

impl<State> WriteTransaction<State> {
    /// Get the transaction ID.
    pub fn id(&self) -> &str {
        &self.metadata.tx_id
    }

    /// The commit the transaction started from.
    pub fn base_commit(&self) -> CommitId {
        self.metadata.base_commit
    }

    pub fn metadata(&self) -> &TransactionMetadata {
        &self.metadata
    }
}

impl WriteTransaction<TxActive> {
    pub(crate) fn new(
        broker: DataBroker,
        metadata: TransactionMetadata,
        base: &DataTreeSnapshot,
        entry: ActiveEntry,
    ) -> Self {
        Self {
            metadata,
            broker,
            state: TxActive {
                modification: base.new_modification(),
                _entry: entry,
            },
        }
    }

    fn check_store(store: LogicalDatastoreType, operation: &'static str) -> TransactionResult<()> {
        match store {
            LogicalDatastoreType::Configuration => Ok(()),
            LogicalDatastoreType::Operational => Err(TransactionError::InvalidStore { operation, store }),
        }
    }

    // mappings change only as a side effect of device writes
    fn check_region(path: &DataPath, node: &DataNode, operation: &'static str) -> TransactionResult<()> {
        if naming::reaches_mapping_region(path, node) {
            return Err(TransactionError::ReservedRegion {
                operation,
                path: path.clone(),
            });
        }
        Ok(())
    }

    /// Replace the node at `path`.
    pub fn put(&mut self, store: LogicalDatastoreType, path: &DataPath, node: &DataNode) -> TransactionResult<()> {
        Self::check_store(store, "put")?;
        Self::check_region(path, node, "put")?;
        self.state.modification.write(path, node)?;
        Ok(())
    }

    /// Overlay `node` onto the node at `path`.
    pub fn merge(&mut self, store: LogicalDatastoreType, path: &DataPath, node: DataNode) -> TransactionResult<()> {
        Self::check_store(store, "merge")?;
        Self::check_region(path, &node, "merge")?;
        self.state.modification.merge(path, node)?;
        Ok(())
    }

    /// Remove the subtree at `path`.
    pub fn delete(&mut self, store: LogicalDatastoreType, path: &DataPath) -> TransactionResult<()> {
        Self::check_store(store, "delete")?;
        Self::check_region(path, &DataNode::new(), "delete")?;
        self.state.modification.delete(path)?;
        Ok(())
    }

    /// Read the staged configuration, own writes included. Operational reads
    /// go to the device.
    pub fn read(&self, store: LogicalDatastoreType, path: &DataPath) -> TransactionResult<Option<DataNode>> {
        match store {
            LogicalDatastoreType::Configuration => Ok(self.state.modification.read(path)?),
            LogicalDatastoreType::Operational => Ok(self.broker.operational().read(path)?),
        }
    }

    /// True if nothing has been staged.
    pub fn is_unchanged(&self) -> bool {
        self.state.modification.is_unchanged()
    }

    /// Push the staged changes to the device and commit them.
    ///
    /// Fails with [`TransactionError::Conflict`] before any device call if
    /// another transaction committed first. On a device failure the tree is
    /// left as it was, but device calls made before the failure stay applied.
    pub fn submit(self) -> TransactionResult<WriteTransaction<TxCommitted>> {
        let WriteTransaction {
            metadata,
            broker,
            state,
        } = self;
        let TxActive {
            mut modification,
            _entry,
        } = state;
        let tx_id = metadata.tx_id.clone();

        let (snapshot, applied) = {
            let tree = broker.tree();
            let _guard = tree.lock_submit();

            if let Err(e) = tree.validate(&modification) {
                warn!("tx {}: rejected before touching the device: {}", tx_id, e);
                return Err(e.into());
            }

            let applied = broker.dispatcher().apply(&mut modification, &tx_id)?;
            let snapshot = tree.commit(modification, &tx_id)?;
            (snapshot, applied)
        };

        info!(
            "tx {}: submitted, {} device change(s), head {}",
            tx_id,
            applied.len(),
            snapshot.commit_id().short()
        );

        Ok(WriteTransaction {
            metadata,
            broker,
            state: TxCommitted { snapshot, applied },
        })
    }

    /// Drop the staged changes. Nothing reaches the device or the tree.
    pub fn cancel(self) -> WriteTransaction<TxAborted> {
        debug!("tx {}: cancelled", self.metadata.tx_id);
        WriteTransaction {
            metadata: self.metadata,
            broker: self.broker,
            state: TxAborted,
        }
    }
}

impl WriteTransaction<TxCommitted> {
    /// The snapshot the transaction committed.
    pub fn snapshot(&self) -> &DataTreeSnapshot {
        &self.state.snapshot
    }

    pub fn final_commit(&self) -> CommitId {
        self.state.snapshot.commit_id()
    }

    /// Device changes made by the submit, in the order they were issued.
    pub fn applied(&self) -> &[AppliedChange] {
        &self.state.applied
    }
}

impl WriteTransaction<TxAborted> {
    pub fn was_cancelled(&self) -> bool {
        true
    }
}

impl<State> fmt::Debug for WriteTransaction<State> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteTransaction")
            .field("tx_id", &self.metadata.tx_id)
            .field(
                "state",
                &std::any::type_name::<State>()
                    .rsplit("::")
                    .next()
                    .unwrap_or_default(),
            )
            .finish()
    }
}
