//! The customizer protocol.
//!
//! A customizer translates one node type of the model to device calls. It
//! plays one role (reader or writer) for one shape of node (a singleton
//! container or the entries of a keyed list):
//!
//! |            | container                | list                                   |
//! |------------|--------------------------|----------------------------------------|
//! | reader     | [`ReaderCustomizer`]     | [`ListReaderCustomizer`] (+`get_all_ids`) |
//! | writer     | [`WriterCustomizer`]     | [`ListWriterCustomizer`] (+`extract`)  |
//!
//! The dispatcher never looks inside a customizer; it only picks the right
//! [`Customizer`] variant for a path and calls it.

use std::fmt;
use std::sync::Arc;

use crate::data::{DataNode, DataPath, ListKey, NodeName};
use crate::translate::context::{ReadContext, WriteContext};
use crate::translate::error::{ReadFailed, WriteFailed};

/// Reads the live state of a node from the device.
pub trait ReaderCustomizer: Send + Sync {
    /// Fill `builder` with the attributes of the node at `path`.
    fn read_current_attributes(
        &self,
        path: &DataPath,
        builder: &mut DataNode,
        ctx: &mut ReadContext,
    ) -> Result<(), ReadFailed>;
}

/// Reads the entries of a keyed list.
pub trait ListReaderCustomizer: ReaderCustomizer {
    /// Keys of all entries currently present below `parent`, in device order.
    fn get_all_ids(&self, parent: &DataPath, ctx: &mut ReadContext) -> Result<Vec<ListKey>, ReadFailed>;
}

/// Pushes changes of a node to the device.
pub trait WriterCustomizer: Send + Sync {
    fn write_current_attributes(
        &self,
        path: &DataPath,
        after: &DataNode,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), WriteFailed>;

    fn update_current_attributes(
        &self,
        path: &DataPath,
        before: &DataNode,
        after: &DataNode,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), WriteFailed>;

    fn delete_current_attributes(
        &self,
        path: &DataPath,
        before: &DataNode,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), WriteFailed>;
}

/// Pushes changes of list entries to the device.
pub trait ListWriterCustomizer: WriterCustomizer {
    /// Pull the entries this writer handles out of a parent instance.
    ///
    /// By default every child entry named `entry` is taken.
    fn extract(&self, _parent: &DataPath, entry: &NodeName, data: &DataNode) -> Vec<(ListKey, DataNode)> {
        data.entries(entry)
            .map(|(key, node)| (key.clone(), node.clone()))
            .collect()
    }
}

/// One customizer with its capability tag.
#[derive(Clone)]
pub enum Customizer {
    ContainerReader(Arc<dyn ReaderCustomizer>),
    ListReader(Arc<dyn ListReaderCustomizer>),
    ContainerWriter(Arc<dyn WriterCustomizer>),
    ListWriter(Arc<dyn ListWriterCustomizer>),
}

impl Customizer {
    pub fn is_reader(&self) -> bool {
        matches!(self, Customizer::ContainerReader(_) | Customizer::ListReader(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Customizer::ListReader(_) | Customizer::ListWriter(_))
    }
}

impl fmt::Debug for Customizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Customizer::ContainerReader(_) => "ContainerReader",
            Customizer::ListReader(_) => "ListReader",
            Customizer::ContainerWriter(_) => "ContainerWriter",
            Customizer::ListWriter(_) => "ListWriter",
        };
        f.write_str(kind)
    }
}
