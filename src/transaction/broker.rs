//! Data broker - the entry point for transactions.
//!
//! The DataBroker hands out transactions over the configuration tree and the
//! operational (device) tree. It handles:
//! - Transaction creation for all three kinds
//! - Tracking active transactions
//! - Wiring submits to the write dispatcher
//! - Rejecting capabilities this agent does not offer

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use ulid::Ulid;

use crate::data::DataPath;
use crate::datatree::{DataTreeSnapshot, ModifiableDataTree, ReadableDataTree};
use crate::storage::CommitId;
use crate::transaction::error::{TransactionError, TransactionResult};
use crate::transaction::read_only::{LogicalDatastoreType, ReadOnlyTransaction};
use crate::transaction::read_write::ReadWriteTransaction;
use crate::transaction::write::{TxActive, TxCommitted, WriteTransaction};
use crate::translate::{CustomizerRegistry, WriteDispatcher};

/// The kind of an open transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

/// Transaction metadata tracked by the broker.
#[derive(Debug, Clone)]
pub struct TransactionMetadata {
    /// Unique transaction ID.
    pub tx_id: String,
    pub kind: TransactionKind,
    /// Commit the transaction's configuration view is based on.
    pub base_commit: CommitId,
    /// When the transaction started.
    pub started_at: chrono::DateTime<chrono::Utc>,
}

type ActiveMap = Arc<RwLock<HashMap<String, TransactionMetadata>>>;

/// Keeps a transaction listed as active until dropped.
pub(crate) struct ActiveEntry {
    tx_id: String,
    active: ActiveMap,
}

impl Drop for ActiveEntry {
    fn drop(&mut self) {
        self.active.write().remove(&self.tx_id);
    }
}

/// Transaction factory over the configuration and operational trees.
///
/// Thread-safe: can be shared across threads via Clone (uses Arc internally).
#[derive(Clone)]
pub struct DataBroker {
    inner: Arc<DataBrokerInner>,
}

struct DataBrokerInner {
    tree: ModifiableDataTree,
    operational: Arc<dyn ReadableDataTree>,
    dispatcher: WriteDispatcher,
    active: ActiveMap,
}

impl DataBroker {
    /// `operational` answers operational reads; `registry` holds the writers
    /// submits are pushed through.
    pub fn new(
        tree: ModifiableDataTree,
        operational: Arc<dyn ReadableDataTree>,
        registry: Arc<CustomizerRegistry>,
    ) -> Self {
        Self {
            inner: Arc::new(DataBrokerInner {
                tree,
                operational,
                dispatcher: WriteDispatcher::new(registry),
                active: Arc::new(RwLock::new(HashMap::new())),
            }),
        }
    }

    /// The configuration tree.
    pub fn tree(&self) -> &ModifiableDataTree {
        &self.inner.tree
    }

    pub(crate) fn operational(&self) -> &Arc<dyn ReadableDataTree> {
        &self.inner.operational
    }

    pub(crate) fn dispatcher(&self) -> &WriteDispatcher {
        &self.inner.dispatcher
    }

    fn register(&self, kind: TransactionKind, base: &DataTreeSnapshot) -> (TransactionMetadata, ActiveEntry) {
        let tx_id = Ulid::new().to_string().to_lowercase();
        let metadata = TransactionMetadata {
            tx_id: tx_id.clone(),
            kind,
            base_commit: base.commit_id(),
            started_at: chrono::Utc::now(),
        };
        self.inner.active.write().insert(tx_id.clone(), metadata.clone());
        debug!("tx {}: {:?} opened at {}", tx_id, kind, base.commit_id().short());

        let entry = ActiveEntry {
            tx_id,
            active: self.inner.active.clone(),
        };
        (metadata, entry)
    }

    /// Open a transaction reading the current configuration snapshot and the
    /// live device.
    pub fn new_read_only_transaction(&self) -> TransactionResult<ReadOnlyTransaction> {
        let snapshot = self.inner.tree.take_snapshot()?;
        let (metadata, entry) = self.register(TransactionKind::ReadOnly, &snapshot);
        Ok(ReadOnlyTransaction::new(
            metadata.tx_id,
            snapshot,
            self.inner.operational.clone(),
            Some(entry),
        ))
    }

    /// Open a transaction staging configuration changes.
    pub fn new_write_only_transaction(&self) -> TransactionResult<WriteTransaction<TxActive>> {
        let snapshot = self.inner.tree.take_snapshot()?;
        let (metadata, entry) = self.register(TransactionKind::WriteOnly, &snapshot);
        Ok(WriteTransaction::new(self.clone(), metadata, &snapshot, entry))
    }

    /// Open a transaction that reads and writes, both against the same
    /// configuration snapshot.
    pub fn new_read_write_transaction(&self) -> TransactionResult<ReadWriteTransaction> {
        let snapshot = self.inner.tree.take_snapshot()?;
        let (metadata, entry) = self.register(TransactionKind::ReadWrite, &snapshot);
        let read = ReadOnlyTransaction::new(
            metadata.tx_id.clone(),
            snapshot.clone(),
            self.inner.operational.clone(),
            None,
        );
        let write = WriteTransaction::new(self.clone(), metadata, &snapshot, entry);
        Ok(ReadWriteTransaction::new(read, write))
    }

    /// Run `f` in a write transaction, submitting it if `f` succeeds and
    /// cancelling it otherwise.
    pub fn with_transaction<F, T>(&self, f: F) -> TransactionResult<(T, WriteTransaction<TxCommitted>)>
    where
        F: FnOnce(&mut WriteTransaction<TxActive>) -> TransactionResult<T>,
    {
        let mut tx = self.new_write_only_transaction()?;

        match f(&mut tx) {
            Ok(result) => {
                let committed = tx.submit()?;
                Ok((result, committed))
            }
            Err(e) => {
                tx.cancel();
                Err(e)
            }
        }
    }

    /// Get the number of active transactions.
    pub fn active_count(&self) -> usize {
        self.inner.active.read().len()
    }

    /// List all active transaction IDs.
    pub fn active_transactions(&self) -> Vec<String> {
        self.inner.active.read().keys().cloned().collect()
    }

    /// Check if a transaction is active.
    pub fn is_active(&self, tx_id: &str) -> bool {
        self.inner.active.read().contains_key(tx_id)
    }

    /// Get metadata for an active transaction.
    pub fn get_transaction_info(&self, tx_id: &str) -> Option<TransactionMetadata> {
        self.inner.active.read().get(tx_id).cloned()
    }

    /// Change notifications are not offered.
    pub fn register_data_change_listener<F>(
        &self,
        _store: LogicalDatastoreType,
        _path: &DataPath,
        _listener: F,
    ) -> TransactionResult<()>
    where
        F: Fn(&DataPath) + Send + Sync + 'static,
    {
        Err(TransactionError::Unsupported("data change listeners"))
    }

    /// Transaction chains are not offered.
    pub fn create_transaction_chain(&self) -> TransactionResult<()> {
        Err(TransactionError::Unsupported("transaction chains"))
    }
}

impl std::fmt::Debug for DataBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataBroker")
            .field("active_count", &self.active_count())
            .finish()
    }
}
