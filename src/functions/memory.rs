//! Process-wide append-only memory for `memory` function nodes.

use std::collections::HashMap;

use crate::{Result, ShareLock, common::Vars, functions::FunctionOutcome, utils};

const DEFAULT_KEY: &str = "default";
const ENTRY_SEPARATOR: &str = "\n";

/// One appended record under a memory key.
///
/// `output` is the full joined history as returned to the appending node.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryEntry {
    pub input: String,
    pub output: String,
    pub rid: String,
    pub timestamp: i64,
}

/// Keyed append-only log shared across runs.
///
/// The store is owned by the engine and injected into the function executor;
/// it outlives any single run. There is no eviction besides [`clear`].
///
/// [`clear`]: MemoryStore::clear
pub struct MemoryStore {
    entries: ShareLock<HashMap<String, Vec<MemoryEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: ShareLock::default(),
        }
    }

    /// Append `input` under `key` and return all entries for the key, oldest
    /// first, joined by newlines.
    pub fn append(
        &self,
        key: &str,
        input: &str,
        rid: &str,
    ) -> String {
        let mut entries = self.entries.write().unwrap();
        let log = entries.entry(key.to_string()).or_default();
        let joined = log
            .iter()
            .map(|e| e.input.as_str())
            .chain(std::iter::once(input))
            .collect::<Vec<_>>()
            .join(ENTRY_SEPARATOR);
        log.push(MemoryEntry {
            input: input.to_string(),
            output: joined.clone(),
            rid: rid.to_string(),
            timestamp: utils::time::time_millis(),
        });
        joined
    }

    pub fn entries(
        &self,
        key: &str,
    ) -> Vec<MemoryEntry> {
        self.entries.read().unwrap().get(key).cloned().unwrap_or_default()
    }

    /// Drop every entry under `key`. The only eviction path.
    pub fn clear(
        &self,
        key: &str,
    ) {
        self.entries.write().unwrap().remove(key);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn execute(
    store: &MemoryStore,
    config: &Vars,
    input: &str,
    rid: &str,
) -> Result<FunctionOutcome> {
    let key = config.get_str("memory_key").unwrap_or(DEFAULT_KEY.to_string());
    Ok(FunctionOutcome::text(store.append(&key, input, rid)))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_append_returns_full_history() {
        let store = MemoryStore::new();
        assert_eq!(store.append("k", "first", "r1"), "first");
        assert_eq!(store.append("k", "second", "r2"), "first\nsecond");

        let entries = store.entries("k");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].rid, "r2");
        assert_eq!(entries[0].output, "first");
        assert_eq!(entries[1].output, "first\nsecond");
    }

    #[test]
    fn test_keys_are_independent() {
        let store = MemoryStore::new();
        store.append("a", "one", "r1");
        store.append("b", "two", "r1");
        assert_eq!(store.entries("a").len(), 1);
        assert_eq!(store.entries("b").len(), 1);
    }

    #[test]
    fn test_clear_is_per_key() {
        let store = MemoryStore::new();
        store.append("a", "one", "r1");
        store.append("b", "two", "r1");
        store.clear("a");
        assert!(store.entries("a").is_empty());
        assert_eq!(store.append("b", "three", "r2"), "two\nthree");
    }

    #[test]
    fn test_execute_reads_configured_key() {
        let store = MemoryStore::new();
        let config = Vars::from(json!({"memory_key": "notes"}));
        let outcome = execute(&store, &config, "remember me", "r1").unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.primary(), "remember me");
        assert_eq!(store.entries("notes").len(), 1);
        assert!(store.entries(DEFAULT_KEY).is_empty());
    }
}
