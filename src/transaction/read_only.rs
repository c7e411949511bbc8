//! Read-only transactions.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::data::{DataNode, DataPath};
use crate::datatree::{DataTreeSnapshot, ReadableDataTree};
use crate::transaction::broker::ActiveEntry;
use crate::transaction::error::TransactionResult;

/// Which of the two trees a read or write addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalDatastoreType {
    /// The configuration tree: local, versioned, pushed to the device.
    Configuration,
    /// The operational tree: read live from the device.
    Operational,
}

impl fmt::Display for LogicalDatastoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalDatastoreType::Configuration => write!(f, "configuration"),
            LogicalDatastoreType::Operational => write!(f, "operational"),
        }
    }
}

impl std::str::FromStr for LogicalDatastoreType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "config" | "configuration" => Ok(LogicalDatastoreType::Configuration),
            "oper" | "operational" => Ok(LogicalDatastoreType::Operational),
            other => Err(format!("unknown datastore '{}'", other)),
        }
    }
}

/// Reads against one configuration snapshot and the live device.
///
/// Configuration reads are repeatable: the snapshot is fixed when the
/// transaction opens. Operational reads go to the device every time.
pub struct ReadOnlyTransaction {
    tx_id: String,
    config: DataTreeSnapshot,
    operational: Arc<dyn ReadableDataTree>,
    _entry: Option<ActiveEntry>,
}

impl ReadOnlyTransaction {
    pub(crate) fn new(
        tx_id: String,
        config: DataTreeSnapshot,
        operational: Arc<dyn ReadableDataTree>,
        entry: Option<ActiveEntry>,
    ) -> Self {
        Self {
            tx_id,
            config,
            operational,
            _entry: entry,
        }
    }

    pub fn id(&self) -> &str {
        &self.tx_id
    }

    /// The configuration snapshot this transaction reads.
    pub fn snapshot(&self) -> &DataTreeSnapshot {
        &self.config
    }

    pub fn read(&self, store: LogicalDatastoreType, path: &DataPath) -> TransactionResult<Option<DataNode>> {
        trace!("tx {}: read {} from {}", self.tx_id, path, store);
        match store {
            LogicalDatastoreType::Configuration => Ok(self.config.read(path)?),
            LogicalDatastoreType::Operational => Ok(self.operational.read(path)?),
        }
    }

    /// End the transaction. Dropping it has the same effect.
    pub fn close(self) {}
}

impl fmt::Debug for ReadOnlyTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOnlyTransaction")
            .field("tx_id", &self.tx_id)
            .field("commit", &self.config.commit_id())
            .finish()
    }
}
