//! Per-operation contexts handed to customizers.

use std::any::Any;
use std::collections::HashMap;

use crate::datatree::{DataTreeModification, DataTreeSnapshot};

/// Scratch storage shared by all customizers taking part in one read.
///
/// Typically holds a device dump, so that listing ids and reading each entry
/// of a list cost one device call instead of one per entry.
#[derive(Default)]
pub struct ReadCache {
    entries: HashMap<String, Box<dyn Any + Send>>,
}

impl ReadCache {
    /// Return the cached value under `key`, computing it with `load` first
    /// if absent. A failed `load` caches nothing.
    pub fn get_or_try_insert_with<T, E, F>(&mut self, key: &str, load: F) -> Result<T, E>
    where
        T: Any + Send + Clone,
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(value) = self.entries.get(key).and_then(|v| v.downcast_ref::<T>()) {
            return Ok(value.clone());
        }
        let value = load()?;
        self.entries.insert(key.to_string(), Box::new(value.clone()));
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Context of one operational read.
///
/// Naming lookups go against the last committed configuration.
pub struct ReadContext {
    mappings: DataTreeSnapshot,
    cache: ReadCache,
}

impl ReadContext {
    pub fn new(mappings: DataTreeSnapshot) -> Self {
        Self {
            mappings,
            cache: ReadCache::default(),
        }
    }

    pub fn mappings(&self) -> &DataTreeSnapshot {
        &self.mappings
    }

    pub fn cache(&mut self) -> &mut ReadCache {
        &mut self.cache
    }
}

/// Context of one write transaction's device sync.
///
/// `modification` is the transaction's staged state; naming changes made by
/// customizers land there and are committed with the configuration. Reads of
/// the state before the transaction go through `before`.
pub struct WriteContext<'a> {
    modification: &'a mut DataTreeModification,
    tx_id: &'a str,
}

impl<'a> WriteContext<'a> {
    pub fn new(modification: &'a mut DataTreeModification, tx_id: &'a str) -> Self {
        Self {
            modification,
            tx_id,
        }
    }

    pub fn tx_id(&self) -> &str {
        self.tx_id
    }

    /// The committed state the transaction started from.
    pub fn before(&self) -> &DataTreeSnapshot {
        self.modification.base()
    }

    /// The staged state, including naming changes made so far.
    pub fn after(&self) -> &DataTreeModification {
        &*self.modification
    }

    pub fn after_mut(&mut self) -> &mut DataTreeModification {
        &mut *self.modification
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_loads_once() {
        let mut cache = ReadCache::default();
        let mut loads = 0;

        for _ in 0..3 {
            let value: Result<Vec<u32>, ()> = cache.get_or_try_insert_with("dump", || {
                loads += 1;
                Ok(vec![1, 2])
            });
            assert_eq!(value.unwrap(), vec![1, 2]);
        }
        assert_eq!(loads, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_skips_failures() {
        let mut cache = ReadCache::default();
        let failed: Result<u32, &str> = cache.get_or_try_insert_with("k", || Err("down"));
        assert!(failed.is_err());
        assert!(cache.is_empty());

        let ok: Result<u32, &str> = cache.get_or_try_insert_with("k", || Ok(5));
        assert_eq!(ok, Ok(5));
    }
}
