//! Immutable views of the configuration tree.

use crate::data::{DataNode, DataPath};
use crate::datatree::modification::DataTreeModification;
use crate::storage::{CommitId, GitRepository, StorageResult, TreeId};

/// The configuration tree as of one commit.
///
/// Cloning is cheap: a snapshot is a repository handle plus two object ids.
/// Nothing a later commit does can change what a snapshot reads.
#[derive(Debug, Clone)]
pub struct DataTreeSnapshot {
    repo: GitRepository,
    commit: CommitId,
    tree: TreeId,
}

impl DataTreeSnapshot {
    pub(crate) fn new(repo: GitRepository, commit: CommitId, tree: TreeId) -> Self {
        Self { repo, commit, tree }
    }

    /// The commit this snapshot was taken at.
    pub fn commit_id(&self) -> CommitId {
        self.commit
    }

    pub(crate) fn tree_id(&self) -> TreeId {
        self.tree
    }

    pub(crate) fn repo(&self) -> &GitRepository {
        &self.repo
    }

    /// Read the node at `path` with its whole subtree.
    pub fn read(&self, path: &DataPath) -> StorageResult<Option<DataNode>> {
        self.repo.read_node(self.tree, path)
    }

    /// Start staging changes on top of this snapshot.
    pub fn new_modification(&self) -> DataTreeModification {
        DataTreeModification::new(self.clone())
    }
}
