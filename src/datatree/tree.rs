//! The configuration tree owning the last committed snapshot.

use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::datatree::modification::DataTreeModification;
use crate::datatree::snapshot::DataTreeSnapshot;
use crate::storage::{
    CommitId, CommitInfo, CommitMessage, GitRepository, GitSignature, StorageError, StorageResult,
};

/// The versioned configuration tree.
///
/// Thread-safe: can be shared across threads via Clone (uses Arc internally).
/// Readers take snapshots without blocking; commits are optimistic and fail
/// with `StorageError::ConcurrentModification` when the tree advanced past the
/// modification's base.
#[derive(Clone)]
pub struct ModifiableDataTree {
    inner: Arc<ModifiableDataTreeInner>,
}

struct ModifiableDataTreeInner {
    repo: GitRepository,
    /// Serializes submits: conflict check, device calls and commit.
    submit_lock: Mutex<()>,
}

impl ModifiableDataTree {
    /// Open the tree persisted at `path`, creating an empty one if needed.
    pub fn open_or_init(path: impl AsRef<Path>, signature: GitSignature) -> StorageResult<Self> {
        let repo = GitRepository::open_or_init(path, signature)?;
        Ok(Self::from_repository(repo))
    }

    /// Open an existing tree.
    pub fn open(path: impl AsRef<Path>, signature: GitSignature) -> StorageResult<Self> {
        let repo = GitRepository::open(path, signature)?;
        Ok(Self::from_repository(repo))
    }

    pub fn from_repository(repo: GitRepository) -> Self {
        Self {
            inner: Arc::new(ModifiableDataTreeInner {
                repo,
                submit_lock: Mutex::new(()),
            }),
        }
    }

    pub fn repository(&self) -> &GitRepository {
        &self.inner.repo
    }

    /// The last committed snapshot.
    pub fn take_snapshot(&self) -> StorageResult<DataTreeSnapshot> {
        let head = self.inner.repo.head()?;
        self.snapshot_at(head)
    }

    /// A snapshot of any past commit.
    pub fn snapshot_at(&self, commit: CommitId) -> StorageResult<DataTreeSnapshot> {
        let tree = self.inner.repo.tree_of(commit)?;
        Ok(DataTreeSnapshot::new(self.inner.repo.clone(), commit, tree))
    }

    /// Current head, without opening its tree.
    pub fn head(&self) -> StorageResult<CommitId> {
        self.inner.repo.head()
    }

    /// Block other submits until the guard is dropped.
    pub fn lock_submit(&self) -> MutexGuard<'_, ()> {
        self.inner.submit_lock.lock()
    }

    /// Fail fast if the tree moved past `modification`'s base.
    pub fn validate(&self, modification: &DataTreeModification) -> StorageResult<()> {
        let head = self.inner.repo.head()?;
        let base = modification.base_commit();
        if head != base {
            return Err(StorageError::ConcurrentModification {
                branch: "main".to_string(),
                expected: base.short(),
                actual: head.short(),
            });
        }
        Ok(())
    }

    /// Make `modification` the next snapshot.
    ///
    /// `tx_id` only labels the commit. An unchanged modification commits
    /// nothing and returns the base snapshot.
    pub fn commit(
        &self,
        modification: DataTreeModification,
        tx_id: &str,
    ) -> StorageResult<DataTreeSnapshot> {
        self.validate(&modification)?;

        if modification.is_unchanged() {
            debug!("tx {} staged no changes, nothing to commit", tx_id);
            return Ok(modification.base().clone());
        }

        let message = CommitMessage::submit(tx_id, &modification.describe());
        let commit = self.inner.repo.publish(
            modification.base_commit(),
            modification.tree_id(),
            &message,
        )?;
        info!("tx {} committed as {}", tx_id, commit.short());

        Ok(DataTreeSnapshot::new(
            self.inner.repo.clone(),
            commit,
            modification.tree_id(),
        ))
    }

    /// Committed snapshots, newest first.
    pub fn history(&self, limit: Option<usize>) -> StorageResult<Vec<CommitInfo>> {
        let head = self.inner.repo.head()?;
        self.inner.repo.history(head, limit)
    }
}

impl std::fmt::Debug for ModifiableDataTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModifiableDataTree")
            .field("repo", &self.inner.repo)
            .finish()
    }
}
