//!  Blob operations for node attributes.
//!
//! Every node directory may carry one JSON blob, `_attrs.json`, holding the
//! node's leaf attributes. Children are sibling directories, never part of
//! the blob, so an attribute change rewrites one small blob and the trees on
//! the path to the root; everything else stays shared.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::data::DataPath;
use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::types::BlobId;

/// file name of the attribute blob inside a node directory
pub const ATTRIBUTES_FILE: &str = "_attrs.json";

/// serialize node attributes to JSON bytes
///
/// BTreeMap keeps key ordering stable, so identical attributes always hash to
/// the same blob (important for git deduplication and cheap diffs)
pub fn serialize_attributes(attributes: &BTreeMap<String, Value>) -> StorageResult<Vec<u8>> {
    let bytes = serde_json::to_vec_pretty(attributes)?;
    Ok(bytes)
}

/// deserialize node attributes from JSON bytes
///
/// validates that no attribute is itself an object: objects are children and
/// must live in their own directory
pub fn deserialize_attributes(
    bytes: &[u8],
    path: &DataPath,
) -> StorageResult<BTreeMap<String, Value>> {
    let attributes: BTreeMap<String, Value> = serde_json::from_slice(bytes)?;

    if let Some((name, _)) = attributes.iter().find(|(_, v)| v.is_object()) {
        return Err(StorageError::CorruptedData {
            path: path.clone(),
            reason: format!("attribute '{}' holds an object", name),
        });
    }

    Ok(attributes)
}

/// write attributes as a blob to the repository
///
/// returns the blob ID (SHA-1 hash of the content)
pub fn write_blob(
    repo: &git2::Repository,
    attributes: &BTreeMap<String, Value>,
) -> StorageResult<BlobId> {
    let bytes = serialize_attributes(attributes)?;
    let oid = repo.blob(&bytes)?;
    Ok(BlobId::new(oid))
}

/// read a blob's content from the repository
pub fn read_blob(repo: &git2::Repository, blob_id: BlobId) -> StorageResult<Vec<u8>> {
    let blob = repo.find_blob(blob_id.raw())?;
    Ok(blob.content().to_vec())
}
