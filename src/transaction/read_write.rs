//! Read-write transactions.

use crate::data::{DataNode, DataPath};
use crate::transaction::error::TransactionResult;
use crate::transaction::read_only::{LogicalDatastoreType, ReadOnlyTransaction};
use crate::transaction::write::{TxAborted, TxActive, TxCommitted, WriteTransaction};

/// A read-only and a write transaction opened on the same snapshot.
///
/// Reads go to the read half and writes to the write half. Configuration
/// reads therefore see the snapshot the transaction started from, not the
/// changes staged so far.
#[derive(Debug)]
pub struct ReadWriteTransaction {
    read: ReadOnlyTransaction,
    write: WriteTransaction<TxActive>,
}

impl ReadWriteTransaction {
    pub(crate) fn new(read: ReadOnlyTransaction, write: WriteTransaction<TxActive>) -> Self {
        Self { read, write }
    }

    pub fn id(&self) -> &str {
        self.write.id()
    }

    pub fn read(&self, store: LogicalDatastoreType, path: &DataPath) -> TransactionResult<Option<DataNode>> {
        self.read.read(store, path)
    }

    pub fn put(&mut self, store: LogicalDatastoreType, path: &DataPath, node: &DataNode) -> TransactionResult<()> {
        self.write.put(store, path, node)
    }

    pub fn merge(&mut self, store: LogicalDatastoreType, path: &DataPath, node: DataNode) -> TransactionResult<()> {
        self.write.merge(store, path, node)
    }

    pub fn delete(&mut self, store: LogicalDatastoreType, path: &DataPath) -> TransactionResult<()> {
        self.write.delete(store, path)
    }

    pub fn submit(self) -> TransactionResult<WriteTransaction<TxCommitted>> {
        self.read.close();
        self.write.submit()
    }

    pub fn cancel(self) -> WriteTransaction<TxAborted> {
        self.read.close();
        self.write.cancel()
    }
}
