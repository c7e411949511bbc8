//! Translation error types.
//!
//! Device-level failures never escape a customizer raw: they are wrapped
//! into [`ReadFailed`] or [`WriteFailed`] together with the path and the data
//! involved, so the caller can tell which subtree broke and how.

use std::fmt;

use thiserror::Error;

use crate::data::{DataNode, DataPath, InvalidPathError, SchemaPath};
use crate::naming::NamingError;
use crate::storage::StorageError;
use crate::translate::writer::AppliedChange;
use crate::vpp::VppError;

/// What went wrong underneath a customizer.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error(transparent)]
    Vpp(#[from] VppError),

    /// A name the device call needs has no index in its naming context.
    #[error("no mapping for '{name}' in {context}")]
    MissingMapping { context: String, name: String },

    #[error("naming context error: {0}")]
    Naming(#[from] NamingError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The data cannot be expressed as a device call.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl DeviceError {
    /// The device return code, when the failure came from a device reply.
    pub fn retval(&self) -> Option<i32> {
        match self {
            DeviceError::Vpp(e) => e.retval(),
            _ => None,
        }
    }
}

/// A read against the live device failed.
#[derive(Debug, Error)]
#[error("read of {path} failed: {source}")]
pub struct ReadFailed {
    pub path: DataPath,
    pub source: DeviceError,
}

impl ReadFailed {
    pub fn new(path: &DataPath, source: impl Into<DeviceError>) -> Self {
        Self {
            path: path.clone(),
            source: source.into(),
        }
    }
}

/// The phase of a write a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePhase {
    Create,
    Update,
    Delete,
}

impl fmt::Display for WritePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WritePhase::Create => write!(f, "create"),
            WritePhase::Update => write!(f, "update"),
            WritePhase::Delete => write!(f, "delete"),
        }
    }
}

/// A writer customizer could not apply a change to the device.
#[derive(Debug, Error)]
pub enum WriteFailed {
    #[error("create of {path} failed: {source}")]
    Create {
        path: DataPath,
        data: DataNode,
        source: DeviceError,
    },

    #[error("update of {path} failed: {source}")]
    Update {
        path: DataPath,
        before: DataNode,
        after: DataNode,
        source: DeviceError,
    },

    #[error("delete of {path} failed: {source}")]
    Delete {
        path: DataPath,
        before: DataNode,
        source: DeviceError,
    },
}

impl WriteFailed {
    pub fn create(path: &DataPath, data: &DataNode, source: impl Into<DeviceError>) -> Self {
        WriteFailed::Create {
            path: path.clone(),
            data: data.clone(),
            source: source.into(),
        }
    }

    pub fn update(
        path: &DataPath,
        before: &DataNode,
        after: &DataNode,
        source: impl Into<DeviceError>,
    ) -> Self {
        WriteFailed::Update {
            path: path.clone(),
            before: before.clone(),
            after: after.clone(),
            source: source.into(),
        }
    }

    pub fn delete(path: &DataPath, before: &DataNode, source: impl Into<DeviceError>) -> Self {
        WriteFailed::Delete {
            path: path.clone(),
            before: before.clone(),
            source: source.into(),
        }
    }

    pub fn phase(&self) -> WritePhase {
        match self {
            WriteFailed::Create { .. } => WritePhase::Create,
            WriteFailed::Update { .. } => WritePhase::Update,
            WriteFailed::Delete { .. } => WritePhase::Delete,
        }
    }

    pub fn path(&self) -> &DataPath {
        match self {
            WriteFailed::Create { path, .. }
            | WriteFailed::Update { path, .. }
            | WriteFailed::Delete { path, .. } => path,
        }
    }

    pub fn device_error(&self) -> &DeviceError {
        match self {
            WriteFailed::Create { source, .. }
            | WriteFailed::Update { source, .. }
            | WriteFailed::Delete { source, .. } => source,
        }
    }
}

/// Why a configuration sync stopped.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The trees to compare could not be read.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A customizer failed; `applied` lists what the device already accepted.
    #[error("{source}")]
    Write {
        source: WriteFailed,
        applied: Vec<AppliedChange>,
    },
}

/// Customizer table construction errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("a {role} is already registered for {path}")]
    Duplicate { path: SchemaPath, role: &'static str },

    #[error("customizers cannot be registered at the root")]
    Root,

    #[error("invalid node type: {0}")]
    InvalidPath(#[from] InvalidPathError),

    /// Writers run parents first, so a parent must be registered before its children.
    #[error("writer for {path} registered after writer for its descendant {descendant}")]
    OutOfOrder {
        path: SchemaPath,
        descendant: SchemaPath,
    },
}
