//! in-memory store backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::Store;

/// an in-memory [`Store`] backend.
///
/// used in tests and single-process deployments; the sql backend lives
/// behind the same trait in the external driver.
#[derive(Debug, Default)]
pub struct MemStore {
    tables: RwLock<HashMap<String, BTreeMap<String, String>>>,
}

impl MemStore {
    /// create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemStore {
    fn insert(&self, table: &str, key: &str, value: &str) -> Result<()> {
        let mut tables = self.tables.write().unwrap();
        tables
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn fetch_record(&self, table: &str, key: &str) -> Result<String> {
        let tables = self.tables.read().unwrap();
        tables
            .get(table)
            .and_then(|records| records.get(key))
            .cloned()
            .ok_or_else(|| Error::empty_record(table, key))
    }

    fn fetch_records(&self, table: &str) -> Result<BTreeMap<String, String>> {
        let tables = self.tables.read().unwrap();
        match tables.get(table) {
            Some(records) if !records.is_empty() => Ok(records.clone()),
            _ => Err(Error::empty_record(table, "")),
        }
    }

    fn delete_record(&self, table: &str, key: &str) -> Result<()> {
        let mut tables = self.tables.write().unwrap();
        tables
            .get_mut(table)
            .and_then(|records| records.remove(key))
            .map(|_| ())
            .ok_or_else(|| Error::empty_record(table, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_fetch() {
        let store = MemStore::new();
        store.insert("acls", "mesh.web-db", "{}").unwrap();
        assert_eq!(store.fetch_record("acls", "mesh.web-db").unwrap(), "{}");
    }

    #[test]
    fn test_fetch_missing_is_empty_record() {
        let store = MemStore::new();
        let err = store.fetch_record("acls", "missing").unwrap_err();
        assert!(err.is_empty_record());
    }

    #[test]
    fn test_fetch_records_empty_table_is_empty_record() {
        let store = MemStore::new();
        let err = store.fetch_records("acls").unwrap_err();
        assert!(err.is_empty_record());
    }

    #[test]
    fn test_insert_replaces() {
        let store = MemStore::new();
        store.insert("acls", "k", "a").unwrap();
        store.insert("acls", "k", "b").unwrap();
        assert_eq!(store.fetch_record("acls", "k").unwrap(), "b");
    }

    #[test]
    fn test_delete_record() {
        let store = MemStore::new();
        store.insert("acls", "k", "a").unwrap();
        store.delete_record("acls", "k").unwrap();
        assert!(store.fetch_record("acls", "k").unwrap_err().is_empty_record());
    }

    #[test]
    fn test_delete_missing_is_empty_record() {
        let store = MemStore::new();
        let err = store.delete_record("acls", "missing").unwrap_err();
        assert!(err.is_empty_record());
    }

    #[test]
    fn test_tables_are_namespaced() {
        let store = MemStore::new();
        store.insert("acls", "k", "policy").unwrap();
        store.insert("user_groups", "k", "group").unwrap();

        assert_eq!(store.fetch_record("acls", "k").unwrap(), "policy");
        assert_eq!(store.fetch_record("user_groups", "k").unwrap(), "group");
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(MemStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for j in 0..50 {
                        let key = format!("k-{i}-{j}");
                        store.insert("acls", &key, "v").unwrap();
                        store.fetch_record("acls", &key).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.fetch_records("acls").unwrap().len(), 400);
    }
}
