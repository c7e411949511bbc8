//!   Core Git repository wrapper.
//!
//!  This is the central component of the storage layer. It wraps `git2::Repository`
//!   with thread-safe access and provides the node-level operations the data
//!  tree is built on: read a node at a tree, produce a new tree with a node
//!  written/merged/removed, and publish a tree as the next committed snapshot.
//!
//! All other storage modules use this for Git access.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use git2::Repository;
use parking_lot::Mutex;

use crate::data::{DataNode, DataPath};
use crate::storage::commit::{self, CommitBuilder, CommitInfo};
use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::refs::RefManager;
use crate::storage::tree::{TreeHandle, TreeMutator};
use crate::storage::types::{BranchName, CommitId, GitSignature, TreeId};

/// The main Git repository wrapper.
///
/// This provides thread-safe access to all Git operations.
/// Clone this to share across threads - it uses Arc internally.
#[derive(Clone)]
pub struct GitRepository {
    inner: Arc<GitRepositoryInner>,
}

struct GitRepositoryInner {
    // git2::Repository is Send but not Sync, so even readers take the lock
    repo: Mutex<Repository>,
    path: PathBuf,
    signature: GitSignature,
}

impl GitRepository {
    /// Open an existing repository.
    pub fn open(path: impl AsRef<Path>, signature: GitSignature) -> StorageResult<Self> {
        let path = path.as_ref();
        let repo =
            Repository::open(path).map_err(|_| StorageError::NotInitialized(path.to_path_buf()))?;

        let storage = Self::wrap(repo, path, signature);
        // a repository without main was never initialized by us
        storage.head()?;
        Ok(storage)
    }

    /// Initialize a new repository holding an empty configuration.
    pub fn init(path: impl AsRef<Path>, signature: GitSignature) -> StorageResult<Self> {
        let path = path.as_ref();
        let repo = Repository::init(path)?;

        let storage = Self::wrap(repo, path, signature);

        storage.with_repo(|repo| {
            let commit_id = commit::create_initial_commit(repo, &storage.inner.signature)?;
            RefManager::init_main_branch(repo, commit_id)?;
            Ok(())
        })?;

        Ok(storage)
    }

    /// Open or initialize a repository.
    pub fn open_or_init(path: impl AsRef<Path>, signature: GitSignature) -> StorageResult<Self> {
        let path = path.as_ref();
        if path.join(".git").exists() {
            Self::open(path, signature)
        } else {
            Self::init(path, signature)
        }
    }

    fn wrap(repo: Repository, path: &Path, signature: GitSignature) -> Self {
        Self {
            inner: Arc::new(GitRepositoryInner {
                repo: Mutex::new(repo),
                path: path.to_path_buf(),
                signature,
            }),
        }
    }

    /// Get the repository path.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Execute a function with exclusive access to the repository.
    pub fn with_repo<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Repository) -> StorageResult<T>,
    {
        let repo = self.inner.repo.lock();
        f(&repo)
    }

    // ==================== Snapshots ====================

    /// Get the current HEAD commit (tip of main branch).
    pub fn head(&self) -> StorageResult<CommitId> {
        self.with_repo(|repo| RefManager::resolve_branch(repo, &BranchName::main()))
    }

    /// Get information about a commit.
    pub fn get_commit(&self, id: CommitId) -> StorageResult<CommitInfo> {
        self.with_repo(|repo| commit::get_commit(repo, id))
    }

    /// Get the root tree of a commit.
    pub fn tree_of(&self, commit_id: CommitId) -> StorageResult<TreeId> {
        self.with_repo(|repo| Ok(commit::get_tree_at_commit(repo, commit_id)?.id()))
    }

    // ==================== Node Operations ====================

    /// Read the node at `path` (with its subtree) from a root tree.
    pub fn read_node(&self, tree: TreeId, path: &DataPath) -> StorageResult<Option<DataNode>> {
        self.with_repo(|repo| {
            let handle = TreeHandle::new(repo.find_tree(tree.raw())?);
            handle.read_node(repo, path)
        })
    }

    /// Apply a batch of edits to a root tree and return the resulting tree.
    ///
    /// The source tree is left untouched; unchanged subtrees are shared.
    pub fn edit_tree<F>(&self, tree: TreeId, edit: F) -> StorageResult<TreeId>
    where
        F: FnOnce(&Repository, &mut TreeMutator<'_>) -> StorageResult<()>,
    {
        self.with_repo(|repo| {
            let handle = TreeHandle::new(repo.find_tree(tree.raw())?);
            let mut mutator = TreeMutator::from_tree(repo, &handle);
            edit(repo, &mut mutator)?;
            mutator.write()
        })
    }

    /// Replace the subtree at `path`.
    pub fn write_node(&self, tree: TreeId, path: &DataPath, node: &DataNode) -> StorageResult<TreeId> {
        self.edit_tree(tree, |_, mutator| mutator.write_node(path, node))
    }

    /// Overlay `node` onto whatever is stored at `path`.
    pub fn merge_node(&self, tree: TreeId, path: &DataPath, node: DataNode) -> StorageResult<TreeId> {
        self.edit_tree(tree, |repo, mutator| {
            let handle = TreeHandle::new(repo.find_tree(tree.raw())?);
            let merged = match handle.read_node(repo, path)? {
                Some(mut existing) => {
                    existing.merge(node);
                    existing
                }
                None => node,
            };
            mutator.write_node(path, &merged)
        })
    }

    /// Remove the subtree at `path`; a missing node is not an error.
    pub fn delete_node(&self, tree: TreeId, path: &DataPath) -> StorageResult<TreeId> {
        self.edit_tree(tree, |_, mutator| mutator.delete_node(path))
    }

    // ==================== Publishing ====================

    /// Commit `tree` on top of `base` and move main to it.
    ///
    /// Fails with `ConcurrentModification` when main no longer points to
    /// `base`; the commit object is then unreachable and simply ignored.
    pub fn publish(&self, base: CommitId, tree: TreeId, message: &str) -> StorageResult<CommitId> {
        self.with_repo(|repo| {
            let commit_id = CommitBuilder::new(repo)
                .tree(tree)
                .parent(base)
                .message(message)
                .signature(self.inner.signature.clone())
                .commit()?;

            RefManager::update_branch_if_unchanged(repo, &BranchName::main(), base, commit_id)?;

            Ok(commit_id)
        })
    }

    /// Get commit history, newest first.
    pub fn history(&self, from: CommitId, limit: Option<usize>) -> StorageResult<Vec<CommitInfo>> {
        self.with_repo(|repo| {
            let iter = commit::history(repo, from)?;
            match limit {
                Some(n) => iter.take(n).collect(),
                None => iter.collect(),
            }
        })
    }
}

impl std::fmt::Debug for GitRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepository")
            .field("path", &self.inner.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn setup() -> (TempDir, GitRepository) {
        let dir = TempDir::new().unwrap();
        let repo = GitRepository::init(dir.path(), GitSignature::agent()).unwrap();
        (dir, repo)
    }

    fn path(s: &str) -> DataPath {
        s.parse().unwrap()
    }

    #[test]
    fn test_init_and_open() {
        let dir = TempDir::new().unwrap();

        let repo = GitRepository::init(dir.path(), GitSignature::agent()).unwrap();
        let head1 = repo.head().unwrap();

        drop(repo);
        let repo = GitRepository::open(dir.path(), GitSignature::agent()).unwrap();
        let head2 = repo.head().unwrap();

        assert_eq!(head1, head2);
    }

    #[test]
    fn test_open_or_init() {
        let dir = TempDir::new().unwrap();

        // First call inits
        let repo1 = GitRepository::open_or_init(dir.path(), GitSignature::agent()).unwrap();
        let head1 = repo1.head().unwrap();

        // Second call opens
        drop(repo1);
        let repo2 = GitRepository::open_or_init(dir.path(), GitSignature::agent()).unwrap();
        assert_eq!(head1, repo2.head().unwrap());
    }

    #[test]
    fn test_open_missing_repository() {
        let dir = TempDir::new().unwrap();
        let result = GitRepository::open(dir.path().join("nope"), GitSignature::agent());
        assert!(matches!(result, Err(StorageError::NotInitialized(_))));
    }

    #[test]
    fn test_node_crud() {
        let (_dir, repo) = setup();
        let head = repo.head().unwrap();
        let tree = repo.tree_of(head).unwrap();
        let bd = path("/vpp/bridge-domains/bridge-domain=bd1");

        // write
        let node = DataNode::new().with("name", "bd1").with("flood", true);
        let tree = repo.write_node(tree, &bd, &node).unwrap();
        assert_eq!(repo.read_node(tree, &bd).unwrap(), Some(node));

        // merge keeps untouched attributes
        let tree = repo
            .merge_node(tree, &bd, DataNode::new().with("learn", true))
            .unwrap();
        let merged = repo.read_node(tree, &bd).unwrap().unwrap();
        assert!(merged.get_bool("flood"));
        assert!(merged.get_bool("learn"));

        // delete
        let tree = repo.delete_node(tree, &bd).unwrap();
        assert!(repo.read_node(tree, &bd).unwrap().is_none());
    }

    #[test]
    fn test_publish_and_history() {
        let (_dir, repo) = setup();
        let base = repo.head().unwrap();
        let tree = repo.tree_of(base).unwrap();
        let tree = repo
            .write_node(tree, &path("/a"), &DataNode::new().with("v", 1))
            .unwrap();

        let next = repo.publish(base, tree, "[SUBMIT] tx:1").unwrap();
        assert_eq!(repo.head().unwrap(), next);
        assert_eq!(repo.tree_of(next).unwrap(), tree);

        let history = repo.history(next, Some(10)).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, next);
        assert_eq!(history[0].first_parent(), Some(base));
    }

    #[test]
    fn test_stale_publish_rejected() {
        let (_dir, repo) = setup();
        let base = repo.head().unwrap();
        let tree = repo.tree_of(base).unwrap();

        let first = repo
            .write_node(tree, &path("/a"), &DataNode::new())
            .unwrap();
        repo.publish(base, first, "first").unwrap();

        let second = repo
            .write_node(tree, &path("/b"), &DataNode::new())
            .unwrap();
        let result = repo.publish(base, second, "second");
        assert!(matches!(result, Err(StorageError::ConcurrentModification { .. })));

        // main still carries the first publish only
        let head_tree = repo.tree_of(repo.head().unwrap()).unwrap();
        assert!(repo.read_node(head_tree, &path("/a")).unwrap().is_some());
        assert!(repo.read_node(head_tree, &path("/b")).unwrap().is_none());
    }
}
