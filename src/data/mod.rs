//! Data model: paths and nodes of the configuration and operational trees.

mod node;
mod path;

pub use node::{DataNode, NodeFormatError};
pub use path::{DataPath, InvalidPathError, ListKey, NodeName, PathArg, SchemaPath};
