//! Operational reads: composing a node from reader customizers.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::data::{DataNode, DataPath, PathArg, SchemaPath};
use crate::datatree::{ModifiableDataTree, ReadableDataTree};
use crate::translate::context::ReadContext;
use crate::translate::error::ReadFailed;
use crate::translate::registry::{CustomizerRegistry, ReaderKind};

/// The operational tree: every read is answered by the device.
///
/// A node is built top-down. Registered readers fill attributes, list
/// readers enumerate entries, and unregistered containers on the way to a
/// reader are structural. Nodes that end up empty are absent.
#[derive(Clone)]
pub struct OperationalReader {
    registry: Arc<CustomizerRegistry>,
    mappings: ModifiableDataTree,
}

impl OperationalReader {
    /// `mappings` is the configuration tree, read for naming lookups.
    pub fn new(registry: Arc<CustomizerRegistry>, mappings: ModifiableDataTree) -> Self {
        Self { registry, mappings }
    }

    /// Read `path` within an existing context, sharing its cache.
    pub fn read_with(&self, path: &DataPath, ctx: &mut ReadContext) -> Result<Option<DataNode>, ReadFailed> {
        let schema = path.schema_path();

        if let Some(ReaderKind::List(reader)) = self.registry.reader(&schema) {
            let Some(key) = path.last().and_then(PathArg::key) else {
                return Ok(None);
            };
            let parent = path.parent().unwrap_or_default();
            if !reader.get_all_ids(&parent, ctx)?.contains(key) {
                trace!("{} is not present on the device", path);
                return Ok(None);
            }
        }

        self.read_node(path, &schema, ctx)
    }

    fn read_node(
        &self,
        path: &DataPath,
        schema: &SchemaPath,
        ctx: &mut ReadContext,
    ) -> Result<Option<DataNode>, ReadFailed> {
        let is_entry = path.last().is_some_and(PathArg::is_entry);
        let mut node = DataNode::new();

        match self.registry.reader(schema) {
            Some(ReaderKind::List(reader)) => {
                reader.read_current_attributes(path, &mut node, ctx)?;
            }
            Some(ReaderKind::Container(reader)) => {
                if is_entry {
                    return Ok(None);
                }
                reader.read_current_attributes(path, &mut node, ctx)?;
            }
            None => {
                if is_entry || !self.registry.has_reader_at_or_below(schema) {
                    return Ok(None);
                }
            }
        }

        for name in self.registry.reader_child_names(schema) {
            let child_schema = schema.child(name.clone());

            let args = match self.registry.reader(&child_schema) {
                Some(ReaderKind::List(reader)) => reader
                    .get_all_ids(path, ctx)?
                    .into_iter()
                    .map(|key| PathArg::entry(name.clone(), key))
                    .collect(),
                _ => vec![PathArg::container(name)],
            };

            for arg in args {
                let child_path = path.join(arg.clone());
                if let Some(child) = self.read_node(&child_path, &child_schema, ctx)? {
                    node.insert_child(arg, child);
                }
            }
        }

        if node.is_empty() {
            return Ok(None);
        }
        Ok(Some(node))
    }
}

impl ReadableDataTree for OperationalReader {
    fn read(&self, path: &DataPath) -> Result<Option<DataNode>, ReadFailed> {
        debug!("operational read of {}", path);
        let snapshot = self
            .mappings
            .take_snapshot()
            .map_err(|e| ReadFailed::new(path, e))?;
        let mut ctx = ReadContext::new(snapshot);
        self.read_with(path, &mut ctx)
    }
}
