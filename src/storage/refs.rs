//!  Branch and reference management.
//!
//!  Git refs are pointers to commits. The configuration only ever lives on
//!  `refs/heads/main`; its value is the identity of the latest snapshot, and
//!  moving it is how a submit becomes visible.

use git2::Repository;

use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::types::{BranchName, CommitId};

/// Manages Git references (branches).
pub struct RefManager;

impl RefManager {
    /// Resolve a branch name to its current commit ID.
    pub fn resolve_branch(repo: &Repository, branch: &BranchName) -> StorageResult<CommitId> {
        let reference = repo
            .find_reference(&branch.as_ref_path())
            .map_err(|_| StorageError::RefNotFound(branch.to_string()))?;

        let commit = reference
            .peel_to_commit()
            .map_err(|_| StorageError::RefNotFound(branch.to_string()))?;

        Ok(CommitId::new(commit.id()))
    }

    /// Get the current HEAD commit (usually main branch).
    pub fn head_commit(repo: &Repository) -> StorageResult<CommitId> {
        let head = repo.head().map_err(|e| {
            if e.code() == git2::ErrorCode::UnbornBranch {
                StorageError::EmptyRepository
            } else {
                StorageError::Git(e)
            }
        })?;

        let commit = head.peel_to_commit()?;
        Ok(CommitId::new(commit.id()))
    }

    /// Check if a branch exists.
    pub fn branch_exists(repo: &Repository, branch: &BranchName) -> bool {
        repo.find_reference(&branch.as_ref_path()).is_ok()
    }

    /// Create a new branch pointing to the given commit.
    pub fn create_branch(repo: &Repository, branch: &BranchName, target: CommitId) -> StorageResult<()> {
        let commit = repo.find_commit(target.raw())?;
        repo.branch(branch.as_str(), &commit, false)?;

        Ok(())
    }

    /// Update a branch only if it still points to the expected commit.
    ///
    /// The compare-and-swap happens inside the ref database, so it holds
    /// against other processes sharing the repository as well.
    pub fn update_branch_if_unchanged(
        repo: &Repository,
        branch: &BranchName,
        expected: CommitId,
        new_target: CommitId,
    ) -> StorageResult<()> {
        let message = format!("update branch to {}", new_target.short());
        match repo.reference_matching(
            &branch.as_ref_path(),
            new_target.raw(),
            true,
            expected.raw(),
            &message,
        ) {
            Ok(_) => Ok(()),
            Err(e) => {
                let current = Self::resolve_branch(repo, branch)?;
                if current != expected {
                    return Err(StorageError::ConcurrentModification {
                        branch: branch.to_string(),
                        expected: expected.short(),
                        actual: current.short(),
                    });
                }
                Err(StorageError::Git(e))
            }
        }
    }

    /// Initialize the main branch if it doesn't exist.
    ///
    /// This should be called after creating the initial commit.
    /// Also ensures HEAD points to main.
    pub fn init_main_branch(repo: &Repository, initial_commit: CommitId) -> StorageResult<()> {
        let main = BranchName::main();

        if !Self::branch_exists(repo, &main) {
            Self::create_branch(repo, &main, initial_commit)?;
        }

        // Ensure HEAD points to main branch
        repo.set_head(&main.as_ref_path())?;

        Ok(())
    }
}
