//!  tree operations for the node hierarchy.
//!
//! in Git, a tree is a directory. Here:
//! - every data node is a directory
//! - the node's leaf attributes live in its `_attrs.json` blob
//! - children are sub-directories named `name` (container) or `name=key` (list entry)
//!
//! ```text
//! <root>/
//!   vpp/
//!     bridge-domains/
//!       bridge-domain=bd1/
//!         _attrs.json          {"name": "bd1", "flood": true, ...}
//!   contexts/
//!     naming-context=bridge-domain-context/ ...
//! ```
//!
//! this module provides safe abstractions over Git's tree manipulation,
//! which is notoriously fiddly to get right.

use std::collections::BTreeMap;

use git2::{FileMode, ObjectType, Oid, Repository, Tree};

use crate::data::{DataNode, DataPath, PathArg};
use crate::storage::blob::{self, ATTRIBUTES_FILE};
use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::types::{BlobId, TreeId};

/// A read only handle to a git tree
///
/// this provides safe, immutable access to the tree structure.
/// think of it as a snapshot - it won't change even if new commits are made.
#[derive(Debug)]
pub struct TreeHandle<'repo> {
    tree: Tree<'repo>,
}

impl<'repo> TreeHandle<'repo> {
    /// create a TreeHandle from a git2::Tree
    pub(crate) fn new(tree: Tree<'repo>) -> Self {
        Self { tree }
    }

    /// get the tree ID
    pub fn id(&self) -> TreeId {
        TreeId::new(self.tree.id())
    }

    /// descend to the directory of the node at `path`
    ///
    /// returns None if any segment on the way is missing
    pub fn subtree(
        &self,
        repo: &'repo Repository,
        path: &DataPath,
    ) -> StorageResult<Option<TreeHandle<'repo>>> {
        let mut current = repo.find_tree(self.tree.id())?;

        for (depth, arg) in path.args().iter().enumerate() {
            let name = arg.to_string();
            let next = match current.get_name(&name) {
                Some(entry) if entry.kind() == Some(ObjectType::Tree) => entry.id(),
                Some(entry) => {
                    return Err(StorageError::CorruptedData {
                        path: DataPath::from_args(path.args()[..=depth].to_vec()),
                        reason: format!("expected a directory, found {:?}", entry.kind()),
                    })
                }
                None => return Ok(None),
            };
            current = repo.find_tree(next)?;
        }

        Ok(Some(TreeHandle::new(current)))
    }

    /// read the node at `path` together with its whole subtree
    pub fn read_node(&self, repo: &'repo Repository, path: &DataPath) -> StorageResult<Option<DataNode>> {
        match self.subtree(repo, path)? {
            Some(handle) => load_node(repo, &handle.tree, path).map(Some),
            None => Ok(None),
        }
    }
}

/// decode a node directory recursively
fn load_node(repo: &Repository, tree: &Tree<'_>, path: &DataPath) -> StorageResult<DataNode> {
    let mut attributes = BTreeMap::new();
    let mut children = Vec::new();

    for entry in tree.iter() {
        // non UTF-8 names were not written by us
        let Some(name) = entry.name() else { continue };

        match entry.kind() {
            Some(ObjectType::Blob) if name == ATTRIBUTES_FILE => {
                let bytes = blob::read_blob(repo, BlobId::new(entry.id()))?;
                attributes = blob::deserialize_attributes(&bytes, path)?;
            }
            Some(ObjectType::Tree) => {
                let arg: PathArg = name.parse()?;
                let child_path = path.join(arg.clone());
                let child_tree = repo.find_tree(entry.id())?;
                children.push((arg, load_node(repo, &child_tree, &child_path)?));
            }
            _ => {}
        }
    }

    let mut node = DataNode::from_attributes(attributes);
    for (arg, child) in children {
        node.insert_child(arg, child);
    }
    Ok(node)
}

/// a mutable tree builder for making changes
///
/// this adds up changes and produces a new root tree when it's final.
/// the original tree is not modified; every untouched subtree is shared
/// with it by object id.
///
/// # Usage Pattern
///
/// ```ignore
/// let mut mutator = TreeMutator::from_tree(repo, &tree);
/// mutator.write_node(&path, &node)?;
/// mutator.delete_node(&other)?;
/// let new_tree_id = mutator.write()?;
/// ```
pub struct TreeMutator<'repo> {
    repo: &'repo Repository,
    /// current root; None once everything has been deleted
    root: Option<Oid>,
}

impl<'repo> TreeMutator<'repo> {
    /// create a new TreeMutator from an existing tree
    pub fn from_tree(repo: &'repo Repository, tree: &TreeHandle<'_>) -> Self {
        Self {
            repo,
            root: Some(tree.tree.id()),
        }
    }

    /// create a new TreeMutator for an empty tree
    pub fn empty(repo: &'repo Repository) -> Self {
        Self { repo, root: None }
    }

    /// replace the subtree at `path` with `node`
    ///
    /// missing ancestors are created as attribute-less containers
    pub fn write_node(&mut self, path: &DataPath, node: &DataNode) -> StorageResult<()> {
        if path.is_root() {
            return Err(StorageError::RootModification);
        }
        let subtree = build_node_tree(self.repo, node)?;
        self.root = splice(self.repo, self.root, path.args(), Some(subtree))?;
        Ok(())
    }

    /// remove the subtree at `path`
    ///
    /// removing a missing node is a no-op. ancestors left without any entry
    /// are pruned as well.
    pub fn delete_node(&mut self, path: &DataPath) -> StorageResult<()> {
        if path.is_root() {
            return Err(StorageError::RootModification);
        }
        self.root = splice(self.repo, self.root, path.args(), None)?;
        Ok(())
    }

    /// write all changes and return the new root tree ID
    pub fn write(self) -> StorageResult<TreeId> {
        match self.root {
            Some(id) => Ok(TreeId::new(id)),
            None => create_empty_tree(self.repo),
        }
    }
}

/// serialize a node and its descendants as a fresh directory
fn build_node_tree(repo: &Repository, node: &DataNode) -> StorageResult<Oid> {
    let mut builder = repo.treebuilder(None)?;

    let blob_id = blob::write_blob(repo, node.attributes())?;
    builder.insert(ATTRIBUTES_FILE, blob_id.raw(), FileMode::Blob.into())?;

    for (arg, child) in node.children() {
        let child_id = build_node_tree(repo, child)?;
        builder.insert(arg.to_string(), child_id, FileMode::Tree.into())?;
    }

    Ok(builder.write()?)
}

/// rebuild the directories along `args`, placing `replacement` at the end.
///
/// this is where the magic happens: only the trees on the path are rewritten,
/// siblings keep their object ids.
fn splice(
    repo: &Repository,
    base: Option<Oid>,
    args: &[PathArg],
    replacement: Option<Oid>,
) -> StorageResult<Option<Oid>> {
    let Some((head, rest)) = args.split_first() else {
        return Ok(replacement);
    };

    let base_tree = base.map(|id| repo.find_tree(id)).transpose()?;
    let name = head.to_string();

    let existing = base_tree.as_ref().and_then(|tree| {
        tree.get_name(&name)
            .filter(|entry| entry.kind() == Some(ObjectType::Tree))
            .map(|entry| entry.id())
    });

    // deleting below a missing directory changes nothing
    if existing.is_none() && replacement.is_none() {
        return Ok(base);
    }

    let new_child = splice(repo, existing, rest, replacement)?;

    let mut builder = repo.treebuilder(base_tree.as_ref())?;
    match new_child {
        Some(id) => {
            builder.insert(name.as_str(), id, FileMode::Tree.into())?;
        }
        None => {
            if builder.get(name.as_str())?.is_some() {
                builder.remove(name.as_str())?;
            }
        }
    }

    if builder.len() == 0 {
        return Ok(None);
    }
    Ok(Some(builder.write()?))
}

/// helper function to create an empty root tree
pub fn create_empty_tree(repo: &Repository) -> StorageResult<TreeId> {
    let builder = repo.treebuilder(None)?;
    Ok(TreeId::new(builder.write()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn setup_repo() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    fn path(s: &str) -> DataPath {
        s.parse().unwrap()
    }

    fn handle(repo: &Repository, id: TreeId) -> TreeHandle<'_> {
        TreeHandle::new(repo.find_tree(id.raw()).unwrap())
    }

    #[test]
    fn test_write_and_read_node() {
        let (_dir, repo) = setup_repo();
        let node = DataNode::new().with("name", "bd1").with("flood", true);

        let mut mutator = TreeMutator::empty(&repo);
        mutator
            .write_node(&path("/vpp/bridge-domains/bridge-domain=bd1"), &node)
            .unwrap();
        let tree_id = mutator.write().unwrap();

        let tree = handle(&repo, tree_id);
        let read = tree
            .read_node(&repo, &path("/vpp/bridge-domains/bridge-domain=bd1"))
            .unwrap();
        assert_eq!(read, Some(node.clone()));

        // intermediate containers exist and carry the entry
        let domains = tree.read_node(&repo, &path("/vpp/bridge-domains")).unwrap().unwrap();
        assert!(domains.attributes().is_empty());
        assert_eq!(domains.children().len(), 1);

        assert!(tree.read_node(&repo, &path("/vpp/other")).unwrap().is_none());
    }

    #[test]
    fn test_unrelated_subtrees_are_shared() {
        let (_dir, repo) = setup_repo();

        let mut mutator = TreeMutator::empty(&repo);
        mutator.write_node(&path("/a/x"), &DataNode::new().with("v", 1)).unwrap();
        mutator.write_node(&path("/b/y"), &DataNode::new().with("v", 2)).unwrap();
        let first = mutator.write().unwrap();

        let mut mutator = TreeMutator::from_tree(&repo, &handle(&repo, first));
        mutator.write_node(&path("/a/x"), &DataNode::new().with("v", 3)).unwrap();
        let second = mutator.write().unwrap();

        let b_first = handle(&repo, first).subtree(&repo, &path("/b")).unwrap().unwrap();
        let b_second = handle(&repo, second).subtree(&repo, &path("/b")).unwrap().unwrap();
        assert_eq!(b_first.id(), b_second.id());
    }

    #[test]
    fn test_delete_prunes_empty_parents() {
        let (_dir, repo) = setup_repo();

        let mut mutator = TreeMutator::empty(&repo);
        mutator.write_node(&path("/a/b/c=1"), &DataNode::new()).unwrap();
        mutator.write_node(&path("/keep"), &DataNode::new().with("v", 1)).unwrap();
        mutator.delete_node(&path("/a/b/c=1")).unwrap();
        let tree_id = mutator.write().unwrap();

        let tree = handle(&repo, tree_id);
        assert!(tree.read_node(&repo, &path("/a")).unwrap().is_none());
        assert!(tree.read_node(&repo, &path("/keep")).unwrap().is_some());
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let (_dir, repo) = setup_repo();

        let mut mutator = TreeMutator::empty(&repo);
        mutator.write_node(&path("/a"), &DataNode::new().with("v", 1)).unwrap();
        let before = mutator.write().unwrap();

        let mut mutator = TreeMutator::from_tree(&repo, &handle(&repo, before));
        mutator.delete_node(&path("/missing/node")).unwrap();
        let after = mutator.write().unwrap();

        assert_eq!(before, after);
    }

    #[test]
    fn test_root_modification_rejected() {
        let (_dir, repo) = setup_repo();
        let mut mutator = TreeMutator::empty(&repo);
        assert!(matches!(
            mutator.write_node(&DataPath::root(), &DataNode::new()),
            Err(StorageError::RootModification)
        ));
        assert!(matches!(
            mutator.delete_node(&DataPath::root()),
            Err(StorageError::RootModification)
        ));
    }

    #[test]
    fn test_delete_everything_yields_empty_tree() {
        let (_dir, repo) = setup_repo();
        let mut mutator = TreeMutator::empty(&repo);
        mutator.write_node(&path("/a"), &DataNode::new()).unwrap();
        mutator.delete_node(&path("/a")).unwrap();
        let tree_id = mutator.write().unwrap();
        assert_eq!(tree_id, create_empty_tree(&repo).unwrap());
    }
}
