use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use dashmap::DashMap;
use redb::{Database, ReadableTable, TableDefinition, TableError, TableHandle};

use crate::types::ProxyResponse;

/// Named caches of responses keyed by request path plus query.
pub trait CacheStorage: Send + Sync {
    fn namespaces(&self) -> Result<Vec<String>>;

    /// Store every entry or none of them.
    fn put_all(&self, namespace: &str, entries: &[(String, ProxyResponse)]) -> Result<()>;

    fn lookup(&self, namespace: &str, key: &str) -> Result<Option<ProxyResponse>>;

    /// Remove a namespace. Returns whether it existed.
    fn delete(&self, namespace: &str) -> Result<bool>;
}

fn table(namespace: &str) -> TableDefinition<'_, &'static str, &'static str> {
    TableDefinition::new(namespace)
}

/// redb-backed cache: one table per namespace, responses stored as JSON.
pub struct RedbCacheStorage {
    db: Database,
}

impl RedbCacheStorage {
    /// Open or create the cache database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create cache directory {}", parent.display())
                })?;
            }
        }
        let db = Database::create(path)
            .with_context(|| format!("Failed to open cache database {}", path.display()))?;
        Ok(Self { db })
    }
}

impl CacheStorage for RedbCacheStorage {
    fn namespaces(&self) -> Result<Vec<String>> {
        let read_txn = self.db.begin_read()?;
        let names = read_txn
            .list_tables()?
            .map(|handle| handle.name().to_string())
            .collect();
        Ok(names)
    }

    fn put_all(&self, namespace: &str, entries: &[(String, ProxyResponse)]) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(table(namespace))?;
            for (key, response) in entries {
                let value = serde_json::to_string(response)?;
                table.insert(key.as_str(), value.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn lookup(&self, namespace: &str, key: &str) -> Result<Option<ProxyResponse>> {
        let read_txn = self.db.begin_read()?;
        let table = match read_txn.open_table(table(namespace)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match table.get(key)? {
            Some(value) => {
                let response: ProxyResponse = serde_json::from_str(value.value())
                    .with_context(|| format!("Corrupt cache entry {}{}", namespace, key))?;
                Ok(Some(response))
            }
            None => Ok(None),
        }
    }

    fn delete(&self, namespace: &str) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = write_txn.delete_table(table(namespace))?;
        write_txn.commit()?;
        Ok(existed)
    }
}

/// In-process cache, for tests and `instant proxy serve --memory`.
#[derive(Default)]
pub struct MemoryCacheStorage {
    namespaces: DashMap<String, HashMap<String, ProxyResponse>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStorage for MemoryCacheStorage {
    fn namespaces(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.namespaces.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    fn put_all(&self, namespace: &str, entries: &[(String, ProxyResponse)]) -> Result<()> {
        let mut cache = self.namespaces.entry(namespace.to_string()).or_default();
        cache.extend(entries.iter().cloned());
        Ok(())
    }

    fn lookup(&self, namespace: &str, key: &str) -> Result<Option<ProxyResponse>> {
        Ok(self
            .namespaces
            .get(namespace)
            .and_then(|cache| cache.get(key).cloned()))
    }

    fn delete(&self, namespace: &str) -> Result<bool> {
        Ok(self.namespaces.remove(namespace).is_some())
    }
}
