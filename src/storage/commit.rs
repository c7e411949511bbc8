//!  Commit creation and history traversal
//!
//!  commits are the atomic units of change in Git. Here:
//! - every successful submit creates exactly one commit on main
//! - the commit's tree is the complete configuration snapshot, naming
//!   contexts included
//! - history is strictly linear (one parent per commit)
//!
//! this module handles commit creation and history walking

use chrono::{DateTime, TimeZone, Utc};
use git2::{Repository, Revwalk, Sort};

use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::tree::TreeHandle;
use crate::storage::types::{CommitId, GitSignature, TreeId};

/// information about a commit
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub id: CommitId,
    pub tree_id: TreeId,
    pub parent_ids: Vec<CommitId>,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
}

impl CommitInfo {
    /// create CommitInfo from a git2::Commit
    pub(crate) fn from_git2(commit: &git2::Commit<'_>) -> Self {
        let author = commit.author();
        let time = commit.time();
        let timestamp = Utc
            .timestamp_opt(time.seconds(), 0)
            .single()
            .unwrap_or_else(Utc::now);

        Self {
            id: CommitId::new(commit.id()),
            tree_id: TreeId::new(commit.tree_id()),
            parent_ids: commit.parent_ids().map(CommitId::new).collect(),
            message: commit.message().unwrap_or("").to_string(),
            author_name: author.name().unwrap_or("Unknown").to_string(),
            author_email: author.email().unwrap_or("unknown@unknown").to_string(),
            timestamp,
        }
    }

    /// get the first (or only) parent
    pub fn first_parent(&self) -> Option<CommitId> {
        self.parent_ids.first().copied()
    }

    /// get a short summary of the commit (first line of message)
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or(&self.message)
    }
}

/// builder for creating commits with a fluent interface
pub struct CommitBuilder<'a> {
    repo: &'a Repository,
    tree_id: Option<TreeId>,
    parents: Vec<CommitId>,
    message: String,
    signature: GitSignature,
    update_ref: Option<String>,
}

impl<'a> CommitBuilder<'a> {
    /// create a new CommitBuilder
    pub fn new(repo: &'a Repository) -> Self {
        Self {
            repo,
            tree_id: None,
            parents: Vec::new(),
            message: String::new(),
            signature: GitSignature::agent(),
            update_ref: None,
        }
    }

    /// set the tree for this commit
    pub fn tree(mut self, tree_id: TreeId) -> Self {
        self.tree_id = Some(tree_id);
        self
    }

    /// add a parent commit
    pub fn parent(mut self, parent: CommitId) -> Self {
        self.parents.push(parent);
        self
    }

    /// set the commit message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// set the author/committer signature
    pub fn signature(mut self, signature: GitSignature) -> Self {
        self.signature = signature;
        self
    }

    /// update a ref (branch) to point to this commit
    ///
    /// git itself refuses the update when the ref's current value is not the
    /// first parent, so this is only used for the root commit
    pub fn update_ref(mut self, refname: impl Into<String>) -> Self {
        self.update_ref = Some(refname.into());
        self
    }

    /// create the commit and return its ID
    pub fn commit(self) -> StorageResult<CommitId> {
        let tree_id = self
            .tree_id
            .ok_or_else(|| StorageError::Internal("commit requires a tree".to_string()))?;

        let tree = self.repo.find_tree(tree_id.raw())?;
        let sig = self.signature.to_git2_signature()?;

        // collect parent commits
        let parent_commits: Vec<git2::Commit<'_>> = self
            .parents
            .iter()
            .map(|id| self.repo.find_commit(id.raw()))
            .collect::<Result<_, _>>()?;

        let parent_refs: Vec<&git2::Commit<'_>> = parent_commits.iter().collect();

        let oid = self.repo.commit(
            self.update_ref.as_deref(),
            &sig,
            &sig,
            &self.message,
            &tree,
            &parent_refs,
        )?;

        Ok(CommitId::new(oid))
    }
}

/// get information about a commit
pub fn get_commit(repo: &Repository, id: CommitId) -> StorageResult<CommitInfo> {
    let commit = repo
        .find_commit(id.raw())
        .map_err(|_| StorageError::CommitNotFound(id.to_string()))?;

    Ok(CommitInfo::from_git2(&commit))
}

/// get the tree snapshot at a specific commit
pub fn get_tree_at_commit(repo: &Repository, commit_id: CommitId) -> StorageResult<TreeHandle<'_>> {
    let commit = repo
        .find_commit(commit_id.raw())
        .map_err(|_| StorageError::CommitNotFound(commit_id.to_string()))?;

    let tree = commit.tree()?;
    Ok(TreeHandle::new(tree))
}

/// create the initial (empty configuration) commit for a new repository
pub fn create_initial_commit(repo: &Repository, signature: &GitSignature) -> StorageResult<CommitId> {
    let tree_id = crate::storage::tree::create_empty_tree(repo)?;

    CommitBuilder::new(repo)
        .tree(tree_id)
        .message(CommitMessage::initialize())
        .signature(signature.clone())
        .update_ref("HEAD")
        .commit()
}

/// iterate over commit history starting from a commit
pub struct HistoryIterator<'repo> {
    repo: &'repo Repository,
    revwalk: Revwalk<'repo>,
}

impl<'repo> HistoryIterator<'repo> {
    /// create a new history iterator
    pub fn new(repo: &'repo Repository, start: CommitId) -> StorageResult<Self> {
        let mut revwalk = repo.revwalk()?;
        revwalk.push(start.raw())?;
        revwalk.set_sorting(Sort::TIME | Sort::TOPOLOGICAL)?;

        Ok(Self { repo, revwalk })
    }
}

impl<'repo> Iterator for HistoryIterator<'repo> {
    type Item = StorageResult<CommitInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.revwalk.next()? {
            Ok(oid) => match self.repo.find_commit(oid) {
                Ok(commit) => Some(Ok(CommitInfo::from_git2(&commit))),
                Err(e) => Some(Err(StorageError::Git(e))),
            },
            Err(e) => Some(Err(StorageError::Git(e))),
        }
    }
}

/// get history for a commit
pub fn history(repo: &Repository, start: CommitId) -> StorageResult<HistoryIterator<'_>> {
    HistoryIterator::new(repo, start)
}

/// message formatting for configuration commits
pub struct CommitMessage;

impl CommitMessage {
    /// message of the root commit
    pub fn initialize() -> String {
        "[INIT] Empty configuration".to_string()
    }

    /// format a message for a submitted write transaction
    ///
    /// the body lists every node touched by the submit, one per line
    pub fn submit(tx_id: &str, touched: &[String]) -> String {
        let mut message = format!("[SUBMIT] tx:{}", tx_id);
        if !touched.is_empty() {
            message.push_str("\n\n");
            message.push_str(&touched.join("\n"));
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tree::create_empty_tree;
    use tempfile::TempDir;

    fn setup_repo() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_initial_commit() {
        let (_dir, repo) = setup_repo();
        let sig = GitSignature::agent();

        let commit_id = create_initial_commit(&repo, &sig).unwrap();
        let info = get_commit(&repo, commit_id).unwrap();

        assert!(info.message.starts_with("[INIT]"));
        assert!(info.parent_ids.is_empty()); // initial commit has no parents
        assert_eq!(info.author_name, "cfgsync");
    }

    #[test]
    fn test_commit_builder() {
        let (_dir, repo) = setup_repo();
        let sig = GitSignature::agent();

        let initial = create_initial_commit(&repo, &sig).unwrap();

        let tree_id = create_empty_tree(&repo).unwrap();
        let second = CommitBuilder::new(&repo)
            .tree(tree_id)
            .parent(initial)
            .message(CommitMessage::submit("tx1", &["+ /a".to_string()]))
            .commit()
            .unwrap();

        let info = get_commit(&repo, second).unwrap();
        assert_eq!(info.first_parent(), Some(initial));
        assert_eq!(info.summary(), "[SUBMIT] tx:tx1");
        assert!(info.message.contains("+ /a"));
    }

    #[test]
    fn test_history_iteration() {
        let (_dir, repo) = setup_repo();
        let sig = GitSignature::agent();

        let c1 = create_initial_commit(&repo, &sig).unwrap();

        let tree_id = create_empty_tree(&repo).unwrap();
        let c2 = CommitBuilder::new(&repo)
            .tree(tree_id)
            .parent(c1)
            .message("Second")
            .commit()
            .unwrap();

        let c3 = CommitBuilder::new(&repo)
            .tree(tree_id)
            .parent(c2)
            .message("Third")
            .commit()
            .unwrap();

        let commits: Vec<_> = history(&repo, c3).unwrap().collect::<Result<_, _>>().unwrap();

        assert_eq!(commits.len(), 3);
        assert_eq!(commits[0].id, c3);
        assert_eq!(commits[1].id, c2);
        assert_eq!(commits[2].id, c1);
    }

    #[test]
    fn test_missing_commit() {
        let (_dir, repo) = setup_repo();
        let missing = CommitId::from_hex("0123456789abcdef0123456789abcdef01234567").unwrap();
        assert!(matches!(
            get_commit(&repo, missing),
            Err(StorageError::CommitNotFound(_))
        ));
    }

    #[test]
    fn test_commit_messages() {
        assert_eq!(CommitMessage::submit("tx001", &[]), "[SUBMIT] tx:tx001");
        assert_eq!(
            CommitMessage::submit("tx001", &["- /a".to_string(), "+ /b".to_string()]),
            "[SUBMIT] tx:tx001\n\n- /a\n+ /b"
        );
    }
}
