//! Staged changes on top of a snapshot.

use tracing::trace;

use crate::data::{DataNode, DataPath};
use crate::datatree::snapshot::DataTreeSnapshot;
use crate::storage::{CommitId, StorageResult, TreeId};

/// Kind of a staged operation, as recorded in the commit message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModificationOp {
    Write,
    Merge,
    Delete,
}

impl ModificationOp {
    fn marker(&self) -> char {
        match self {
            ModificationOp::Write => '+',
            ModificationOp::Merge => '~',
            ModificationOp::Delete => '-',
        }
    }
}

/// A set of changes staged against a base snapshot.
///
/// Every operation produces a new working tree; the base is never touched,
/// so other readers of the base keep seeing it unchanged. Reads through the
/// modification see the staged state.
#[derive(Debug, Clone)]
pub struct DataTreeModification {
    base: DataTreeSnapshot,
    tree: TreeId,
    log: Vec<(ModificationOp, DataPath)>,
}

impl DataTreeModification {
    pub(crate) fn new(base: DataTreeSnapshot) -> Self {
        let tree = base.tree_id();
        Self {
            base,
            tree,
            log: Vec::new(),
        }
    }

    /// The snapshot these changes were staged against.
    pub fn base(&self) -> &DataTreeSnapshot {
        &self.base
    }

    pub fn base_commit(&self) -> CommitId {
        self.base.commit_id()
    }

    pub(crate) fn tree_id(&self) -> TreeId {
        self.tree
    }

    /// Replace whatever is at `path` with `node`.
    pub fn write(&mut self, path: &DataPath, node: &DataNode) -> StorageResult<()> {
        trace!("staging write of {}", path);
        self.tree = self.base.repo().write_node(self.tree, path, node)?;
        self.log.push((ModificationOp::Write, path.clone()));
        Ok(())
    }

    /// Overlay `node` onto whatever is at `path`.
    pub fn merge(&mut self, path: &DataPath, node: DataNode) -> StorageResult<()> {
        trace!("staging merge into {}", path);
        self.tree = self.base.repo().merge_node(self.tree, path, node)?;
        self.log.push((ModificationOp::Merge, path.clone()));
        Ok(())
    }

    /// Remove the subtree at `path`. Removing an absent node is a no-op.
    pub fn delete(&mut self, path: &DataPath) -> StorageResult<()> {
        trace!("staging delete of {}", path);
        self.tree = self.base.repo().delete_node(self.tree, path)?;
        self.log.push((ModificationOp::Delete, path.clone()));
        Ok(())
    }

    /// Read the staged state at `path`.
    pub fn read(&self, path: &DataPath) -> StorageResult<Option<DataNode>> {
        self.base.repo().read_node(self.tree, path)
    }

    /// True if the staged tree is identical to the base.
    pub fn is_unchanged(&self) -> bool {
        self.tree == self.base.tree_id()
    }

    /// Staged operations in order, one line each.
    pub fn describe(&self) -> Vec<String> {
        self.log
            .iter()
            .map(|(op, path)| format!("{} {}", op.marker(), path))
            .collect()
    }
}
