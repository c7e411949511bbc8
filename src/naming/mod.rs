//! Name to device index mappings.
//!
//! Device objects are identified by numeric indices the agent picks, while
//! the configuration uses human-chosen names. A [`NamingContext`] keeps the
//! two in sync, scoped by a context name. The mappings are ordinary nodes of
//! the configuration tree:
//!
//! ```text
//! /contexts/naming-context=bridge-domain-context/mappings/mapping=bd1
//!     { "name": "bd1", "index": 1 }
//! ```
//!
//! so they are versioned, isolated and committed together with the
//! configuration that caused them. A mapping added while a submit is in
//! flight lives in that submit's modification and disappears with it if the
//! submit fails.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::data::{DataNode, DataPath, InvalidPathError, ListKey, NodeName};
use crate::datatree::{DataTreeModification, DataTreeSnapshot};
use crate::storage::{StorageError, StorageResult};

const CONTEXTS: &str = "contexts";
const NAMING_CONTEXT: &str = "naming-context";
const MAPPINGS: &str = "mappings";
const MAPPING: &str = "mapping";
const NAME: &str = "name";
const INDEX: &str = "index";

/// First index handed out by [`NamingContext::allocate_index`].
pub const BASELINE_INDEX: u32 = 1;

#[derive(Debug, Error)]
pub enum NamingError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid name: {0}")]
    InvalidName(#[from] InvalidPathError),

    #[error("index {index} in {context} is already mapped to '{holder}'")]
    IndexInUse {
        context: String,
        index: u32,
        holder: String,
    },

    #[error("malformed mapping '{name}' in {context}")]
    Malformed { context: String, name: String },

    #[error("no free index left in {context}")]
    Exhausted { context: String },
}

pub type NamingResult<T> = Result<T, NamingError>;

/// True if `path` is the mapping region or lies inside it.
pub fn in_mapping_region(path: &DataPath) -> bool {
    path.args()
        .first()
        .is_some_and(|arg| arg.name().as_str() == CONTEXTS)
}

/// True if staging `node` at `path` would change any mapping.
pub fn reaches_mapping_region(path: &DataPath, node: &DataNode) -> bool {
    in_mapping_region(path)
        || (path.is_root() && node.children().keys().any(|arg| arg.name().as_str() == CONTEXTS))
}

/// Anything mappings can be read from.
pub trait MappingView {
    fn read_mappings(&self, path: &DataPath) -> StorageResult<Option<DataNode>>;
}

impl MappingView for DataTreeSnapshot {
    fn read_mappings(&self, path: &DataPath) -> StorageResult<Option<DataNode>> {
        self.read(path)
    }
}

impl MappingView for DataTreeModification {
    fn read_mappings(&self, path: &DataPath) -> StorageResult<Option<DataNode>> {
        self.read(path)
    }
}

/// A named registry of `name <-> index` pairs.
///
/// Within one context both names and indices are unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingContext {
    name: ListKey,
    region: DataPath,
}

impl NamingContext {
    pub fn new(name: &str) -> Result<Self, InvalidPathError> {
        let key = ListKey::new(name)?;
        let region = DataPath::root()
            .child(CONTEXTS)?
            .entry(NAMING_CONTEXT, name)?
            .child(MAPPINGS)?;
        Ok(Self { name: key, region })
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Where this context's mappings live in the tree.
    pub fn region(&self) -> &DataPath {
        &self.region
    }

    fn mapping_path(&self, name: &str) -> NamingResult<DataPath> {
        Ok(self.region.entry(MAPPING, name)?)
    }

    /// All mappings, by name.
    pub fn mappings(&self, view: &impl MappingView) -> NamingResult<BTreeMap<String, u32>> {
        let Some(region) = view.read_mappings(&self.region)? else {
            return Ok(BTreeMap::new());
        };

        let entry_name = NodeName::new(MAPPING)?;
        region
            .entries(&entry_name)
            .map(|(key, node)| -> NamingResult<(String, u32)> {
                let index = node
                    .get(INDEX)
                    .and_then(|v| v.as_u64())
                    .and_then(|v| u32::try_from(v).ok())
                    .ok_or_else(|| NamingError::Malformed {
                        context: self.name().to_string(),
                        name: key.to_string(),
                    })?;
                Ok((key.to_string(), index))
            })
            .collect()
    }

    pub fn get_index(&self, view: &impl MappingView, name: &str) -> NamingResult<Option<u32>> {
        let path = self.mapping_path(name)?;
        match view.read_mappings(&path)? {
            Some(node) => node
                .get(INDEX)
                .and_then(|v| v.as_u64())
                .and_then(|v| u32::try_from(v).ok())
                .map(Some)
                .ok_or_else(|| NamingError::Malformed {
                    context: self.name().to_string(),
                    name: name.to_string(),
                }),
            None => Ok(None),
        }
    }

    pub fn get_name(&self, view: &impl MappingView, index: u32) -> NamingResult<Option<String>> {
        Ok(self
            .mappings(view)?
            .into_iter()
            .find(|(_, i)| *i == index)
            .map(|(name, _)| name))
    }

    pub fn contains_name(&self, view: &impl MappingView, name: &str) -> NamingResult<bool> {
        Ok(self.get_index(view, name)?.is_some())
    }

    pub fn contains_index(&self, view: &impl MappingView, index: u32) -> NamingResult<bool> {
        Ok(self.mappings(view)?.values().any(|i| *i == index))
    }

    /// Pick the lowest index from [`BASELINE_INDEX`] up that is free both in
    /// the committed base and in the staged state.
    ///
    /// An index freed by a staged delete is therefore not reused before that
    /// delete is committed. Linear in the number of mappings.
    pub fn allocate_index(&self, modification: &DataTreeModification) -> NamingResult<u32> {
        let staged = self.mappings(modification)?;
        let committed = self.mappings(modification.base())?;

        let mut index = BASELINE_INDEX;
        while staged.values().chain(committed.values()).any(|i| *i == index) {
            index = index.checked_add(1).ok_or_else(|| NamingError::Exhausted {
                context: self.name().to_string(),
            })?;
        }
        Ok(index)
    }

    /// Stage a new mapping. Re-adding an identical mapping is a no-op.
    pub fn add_name(
        &self,
        modification: &mut DataTreeModification,
        index: u32,
        name: &str,
    ) -> NamingResult<()> {
        if let Some(holder) = self.get_name(modification, index)? {
            if holder == name {
                return Ok(());
            }
            return Err(NamingError::IndexInUse {
                context: self.name().to_string(),
                index,
                holder,
            });
        }

        let path = self.mapping_path(name)?;
        let node = DataNode::new().with(NAME, name).with(INDEX, index);
        modification.write(&path, &node)?;
        Ok(())
    }

    /// Stage removal of a mapping; removing an unknown name is a no-op.
    pub fn remove_name(&self, modification: &mut DataTreeModification, name: &str) -> NamingResult<()> {
        let path = self.mapping_path(name)?;
        modification.delete(&path)?;
        Ok(())
    }
}
