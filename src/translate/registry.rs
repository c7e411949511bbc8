//! The customizer table.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::debug;

use crate::data::{NodeName, SchemaPath};
use crate::translate::error::RegistryError;
use crate::translate::spi::{
    Customizer, ListReaderCustomizer, ListWriterCustomizer, ReaderCustomizer, WriterCustomizer,
};

/// A registered reader.
#[derive(Clone)]
pub enum ReaderKind {
    Container(Arc<dyn ReaderCustomizer>),
    List(Arc<dyn ListReaderCustomizer>),
}

/// A registered writer.
#[derive(Clone)]
pub enum WriterKind {
    Container(Arc<dyn WriterCustomizer>),
    List(Arc<dyn ListWriterCustomizer>),
}

/// Node type to customizer table.
///
/// Built once at startup and immutable afterwards; share it behind an `Arc`.
/// Writers keep their registration order, which is the order creates and
/// updates are issued in (deletes go the other way).
pub struct CustomizerRegistry {
    readers: BTreeMap<SchemaPath, ReaderKind>,
    writers: Vec<(SchemaPath, WriterKind)>,
}

impl CustomizerRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn reader(&self, path: &SchemaPath) -> Option<&ReaderKind> {
        self.readers.get(path)
    }

    pub fn writer(&self, path: &SchemaPath) -> Option<&WriterKind> {
        self.writers
            .iter()
            .find(|(registered, _)| registered == path)
            .map(|(_, writer)| writer)
    }

    /// Writers in registration order.
    pub fn writers(&self) -> &[(SchemaPath, WriterKind)] {
        &self.writers
    }

    /// True if a reader is registered at `path` or anywhere below it.
    pub fn has_reader_at_or_below(&self, path: &SchemaPath) -> bool {
        self.readers
            .keys()
            .any(|registered| registered == path || registered.is_descendant_of(path))
    }

    /// Distinct child names leading from `parent` towards registered readers.
    pub fn reader_child_names(&self, parent: &SchemaPath) -> Vec<NodeName> {
        let names: BTreeSet<NodeName> = self
            .readers
            .keys()
            .filter(|registered| registered.is_descendant_of(parent))
            .map(|registered| registered.names()[parent.len()].clone())
            .collect();
        names.into_iter().collect()
    }

    /// True if nodes of type `path` are handled by a writer, or lie on the
    /// way to one. Such children are not part of their parent's own data.
    pub fn is_writer_path(&self, path: &SchemaPath) -> bool {
        self.writers
            .iter()
            .any(|(registered, _)| registered == path || registered.is_descendant_of(path))
    }
}

impl std::fmt::Debug for CustomizerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomizerRegistry")
            .field("readers", &self.readers.keys().collect::<Vec<_>>())
            .field(
                "writers",
                &self.writers.iter().map(|(p, _)| p).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Collects registrations for a [`CustomizerRegistry`].
#[derive(Default)]
pub struct RegistryBuilder {
    readers: BTreeMap<SchemaPath, ReaderKind>,
    writers: Vec<(SchemaPath, WriterKind)>,
}

impl RegistryBuilder {
    /// Register `customizer` for nodes of type `path`.
    ///
    /// One reader and one writer may be registered per type. A writer must be
    /// registered before writers of its descendants.
    pub fn add(mut self, path: SchemaPath, customizer: Customizer) -> Result<Self, RegistryError> {
        if path.is_empty() {
            return Err(RegistryError::Root);
        }
        debug!("registering {:?} for {}", customizer, path);

        match customizer {
            Customizer::ContainerReader(r) => self.add_reader(path, ReaderKind::Container(r))?,
            Customizer::ListReader(r) => self.add_reader(path, ReaderKind::List(r))?,
            Customizer::ContainerWriter(w) => self.add_writer(path, WriterKind::Container(w))?,
            Customizer::ListWriter(w) => self.add_writer(path, WriterKind::List(w))?,
        }
        Ok(self)
    }

    fn add_reader(&mut self, path: SchemaPath, kind: ReaderKind) -> Result<(), RegistryError> {
        if self.readers.contains_key(&path) {
            return Err(RegistryError::Duplicate {
                path,
                role: "reader",
            });
        }
        self.readers.insert(path, kind);
        Ok(())
    }

    fn add_writer(&mut self, path: SchemaPath, kind: WriterKind) -> Result<(), RegistryError> {
        let clash = self
            .writers
            .iter()
            .find(|(p, _)| *p == path || p.is_descendant_of(&path))
            .map(|(p, _)| p.clone());

        match clash {
            Some(existing) if existing == path => Err(RegistryError::Duplicate {
                path,
                role: "writer",
            }),
            Some(descendant) => Err(RegistryError::OutOfOrder { path, descendant }),
            None => {
                self.writers.push((path, kind));
                Ok(())
            }
        }
    }

    pub fn build(self) -> CustomizerRegistry {
        CustomizerRegistry {
            readers: self.readers,
            writers: self.writers,
        }
    }
}
