//! Configuration sync: diffing two trees and driving writer customizers.
//!
//! For every registered writer, instances of its node type are collected in
//! the state before and after the transaction. Each instance path is
//! classified by comparing the node's *own* data, i.e. its attributes and the
//! children no other writer is responsible for:
//!
//! ```text
//!   before   after    change
//!   ------   -----    ---------
//!   absent   absent   unchanged
//!   absent   node     created
//!   node     absent   deleted
//!   a        b        updated (a != b), unchanged otherwise
//! ```
//!
//! Changes are applied sequentially: deletes first, in reverse registration
//! order (children before parents), then creates and updates in
//! registration order (parents before children). The first failure stops
//! the sync. Device calls already made are not undone.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::data::{DataNode, DataPath, PathArg, SchemaPath};
use crate::datatree::DataTreeModification;
use crate::translate::context::WriteContext;
use crate::translate::error::{DispatchError, WriteFailed};
use crate::translate::registry::{CustomizerRegistry, WriterKind};
use crate::translate::spi::WriterCustomizer;

/// State of one node across a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Unchanged,
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn classify(before: Option<&DataNode>, after: Option<&DataNode>) -> Self {
        match (before, after) {
            (None, None) => ChangeKind::Unchanged,
            (None, Some(_)) => ChangeKind::Created,
            (Some(_), None) => ChangeKind::Deleted,
            (Some(b), Some(a)) if b == a => ChangeKind::Unchanged,
            (Some(_), Some(_)) => ChangeKind::Updated,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Unchanged => "unchanged",
            ChangeKind::Created => "create",
            ChangeKind::Updated => "update",
            ChangeKind::Deleted => "delete",
        };
        f.write_str(s)
    }
}

/// A change to push to the device.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeChange {
    Created {
        path: DataPath,
        after: DataNode,
    },
    Updated {
        path: DataPath,
        before: DataNode,
        after: DataNode,
    },
    Deleted {
        path: DataPath,
        before: DataNode,
    },
}

impl NodeChange {
    fn new(path: DataPath, before: Option<DataNode>, after: Option<DataNode>) -> Option<Self> {
        match ChangeKind::classify(before.as_ref(), after.as_ref()) {
            ChangeKind::Unchanged => None,
            _ => match (before, after) {
                (None, Some(after)) => Some(NodeChange::Created { path, after }),
                (Some(before), None) => Some(NodeChange::Deleted { path, before }),
                (Some(before), Some(after)) => Some(NodeChange::Updated { path, before, after }),
                (None, None) => None,
            },
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            NodeChange::Created { .. } => ChangeKind::Created,
            NodeChange::Updated { .. } => ChangeKind::Updated,
            NodeChange::Deleted { .. } => ChangeKind::Deleted,
        }
    }

    pub fn path(&self) -> &DataPath {
        match self {
            NodeChange::Created { path, .. }
            | NodeChange::Updated { path, .. }
            | NodeChange::Deleted { path, .. } => path,
        }
    }
}

/// A change the device has accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedChange {
    pub kind: ChangeKind,
    pub path: DataPath,
}

impl fmt::Display for AppliedChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.path)
    }
}

/// The changes of one writer's node type, in key order.
#[derive(Debug)]
pub struct WriterChanges {
    pub schema: SchemaPath,
    pub changes: Vec<NodeChange>,
}

/// Drives writer customizers for a staged modification.
#[derive(Clone)]
pub struct WriteDispatcher {
    registry: Arc<CustomizerRegistry>,
}

impl WriteDispatcher {
    pub fn new(registry: Arc<CustomizerRegistry>) -> Self {
        Self { registry }
    }

    /// Classify every writer instance between `before` and `after`, in
    /// writer registration order.
    pub fn plan(&self, before: &DataNode, after: &DataNode) -> Vec<WriterChanges> {
        self.registry
            .writers()
            .iter()
            .map(|(schema, writer)| {
                let mut old = self.instances(before, schema, writer);
                let new = self.instances(after, schema, writer);

                let mut changes = Vec::new();
                for (path, after) in new {
                    let before = old.remove(&path);
                    changes.extend(NodeChange::new(path, before, Some(after)));
                }
                for (path, before) in old {
                    changes.extend(NodeChange::new(path, Some(before), None));
                }
                changes.sort_by(|a, b| a.path().cmp(b.path()));

                WriterChanges {
                    schema: schema.clone(),
                    changes,
                }
            })
            .collect()
    }

    /// Push the difference between `modification` and its base to the
    /// device, returning the applied changes in order.
    ///
    /// Customizers may stage naming changes into `modification`.
    pub fn apply(
        &self,
        modification: &mut DataTreeModification,
        tx_id: &str,
    ) -> Result<Vec<AppliedChange>, DispatchError> {
        let before = modification.base().read(&DataPath::root())?.unwrap_or_default();
        let after = modification.read(&DataPath::root())?.unwrap_or_default();

        let plan = self.plan(&before, &after);
        let total: usize = plan.iter().map(|w| w.changes.len()).sum();
        debug!("tx {}: {} device change(s) to apply", tx_id, total);

        let deletes = plan.iter().enumerate().rev().flat_map(|(i, w)| {
            w.changes
                .iter()
                .filter(|c| c.kind() == ChangeKind::Deleted)
                .map(move |c| (i, c))
        });
        let writes = plan.iter().enumerate().flat_map(|(i, w)| {
            w.changes
                .iter()
                .filter(|c| c.kind() != ChangeKind::Deleted)
                .map(move |c| (i, c))
        });

        let mut ctx = WriteContext::new(modification, tx_id);
        let mut applied = Vec::with_capacity(total);

        for (index, change) in deletes.chain(writes) {
            let (_, writer) = &self.registry.writers()[index];
            if let Err(source) = invoke(writer, change, &mut ctx) {
                warn!(
                    "tx {}: {} failed, {} change(s) already applied and left in place: {}",
                    tx_id,
                    change.path(),
                    applied.len(),
                    source
                );
                return Err(DispatchError::Write { source, applied });
            }
            info!("tx {}: {} {}", tx_id, change.kind(), change.path());
            applied.push(AppliedChange {
                kind: change.kind(),
                path: change.path().clone(),
            });
        }

        Ok(applied)
    }

    /// All instances of `schema` under `root`, with their own data.
    fn instances(
        &self,
        root: &DataNode,
        schema: &SchemaPath,
        writer: &WriterKind,
    ) -> BTreeMap<DataPath, DataNode> {
        let mut found = BTreeMap::new();
        let Some((last, ancestors)) = schema.names().split_last() else {
            return found;
        };

        let mut parents: Vec<(DataPath, &DataNode)> = vec![(DataPath::root(), root)];
        for name in ancestors {
            parents = parents
                .into_iter()
                .flat_map(|(path, node)| {
                    node.children()
                        .iter()
                        .filter(move |(arg, _)| arg.name() == name)
                        .map(move |(arg, child)| (path.join(arg.clone()), child))
                })
                .collect();
        }

        for (parent_path, parent) in parents {
            match writer {
                WriterKind::List(list) => {
                    for (key, data) in list.extract(&parent_path, last, parent) {
                        let path = parent_path.join(PathArg::entry(last.clone(), key));
                        found.insert(path, self.own_data(schema, data));
                    }
                }
                WriterKind::Container(_) => {
                    let arg = PathArg::container(last.clone());
                    if let Some(child) = parent.child(&arg) {
                        found.insert(parent_path.join(arg), self.own_data(schema, child.clone()));
                    }
                }
            }
        }
        found
    }

    /// Drop the children some other writer is responsible for.
    fn own_data(&self, schema: &SchemaPath, mut node: DataNode) -> DataNode {
        let foreign: Vec<PathArg> = node
            .children()
            .keys()
            .filter(|arg| self.registry.is_writer_path(&schema.child(arg.name().clone())))
            .cloned()
            .collect();
        for arg in &foreign {
            node.remove_child(arg);
        }
        node
    }
}

fn invoke(writer: &WriterKind, change: &NodeChange, ctx: &mut WriteContext<'_>) -> Result<(), WriteFailed> {
    match writer {
        WriterKind::Container(w) => invoke_with(w.as_ref(), change, ctx),
        WriterKind::List(w) => invoke_with(w.as_ref(), change, ctx),
    }
}

fn invoke_with<W>(writer: &W, change: &NodeChange, ctx: &mut WriteContext<'_>) -> Result<(), WriteFailed>
where
    W: WriterCustomizer + ?Sized,
{
    match change {
        NodeChange::Created { path, after } => writer.write_current_attributes(path, after, ctx),
        NodeChange::Updated {
            path,
            before,
            after,
        } => writer.update_current_attributes(path, before, after, ctx),
        NodeChange::Deleted { path, before } => writer.delete_current_attributes(path, before, ctx),
    }
}
