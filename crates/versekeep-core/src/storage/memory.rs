//! In-process key-value backend
//!
//! Keeps every collection in a `BTreeMap` so key-range scans and id
//! ordering match the SQLite backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::{
    Collection, Index, KeyRange, KeyValueStore, Record, StorageError, StorageResult,
};

type Table = BTreeMap<String, Record>;

/// In-memory store, used for tests and when no persistent backend is wanted
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<Collection, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, HashMap<Collection, Table>>> {
        self.tables
            .lock()
            .map_err(|_| StorageError::unavailable("memory store lock poisoned"))
    }

    /// Records of `collection` ordered by (timestamp, id)
    fn by_timestamp(table: Option<&Table>) -> Vec<&Record> {
        let mut records: Vec<&Record> = table.map(|t| t.values().collect()).unwrap_or_default();
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        records
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, collection: Collection, id: &str) -> StorageResult<Option<Record>> {
        let tables = self.lock()?;
        Ok(tables.get(&collection).and_then(|t| t.get(id)).cloned())
    }

    fn get_all(
        &self,
        collection: Collection,
        range: Option<&KeyRange>,
    ) -> StorageResult<Vec<Record>> {
        let tables = self.lock()?;
        let Some(table) = tables.get(&collection) else {
            return Ok(Vec::new());
        };

        let records = match range {
            Some(range) if range.lower < range.upper => table
                .range(range.lower.clone()..range.upper.clone())
                .map(|(_, r)| r.clone())
                .collect(),
            Some(_) => Vec::new(),
            None => table.values().cloned().collect(),
        };
        Ok(records)
    }

    fn put(&self, collection: Collection, record: &Record) -> StorageResult<()> {
        let mut tables = self.lock()?;
        tables
            .entry(collection)
            .or_default()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn put_if_absent(&self, collection: Collection, record: &Record) -> StorageResult<bool> {
        let mut tables = self.lock()?;
        let table = tables.entry(collection).or_default();
        if table.contains_key(&record.id) {
            return Ok(false);
        }
        table.insert(record.id.clone(), record.clone());
        Ok(true)
    }

    fn delete(&self, collection: Collection, id: &str) -> StorageResult<()> {
        let mut tables = self.lock()?;
        if let Some(table) = tables.get_mut(&collection) {
            table.remove(id);
        }
        Ok(())
    }

    fn clear(&self, collection: Collection) -> StorageResult<()> {
        let mut tables = self.lock()?;
        tables.remove(&collection);
        Ok(())
    }

    fn count(&self, collection: Collection) -> StorageResult<u64> {
        let tables = self.lock()?;
        Ok(tables.get(&collection).map(|t| t.len() as u64).unwrap_or(0))
    }

    fn get_oldest_by_index(
        &self,
        collection: Collection,
        index: Index,
        n: usize,
    ) -> StorageResult<Vec<String>> {
        collection.require_index(index)?;
        let tables = self.lock()?;
        Ok(Self::by_timestamp(tables.get(&collection))
            .into_iter()
            .take(n)
            .map(|r| r.id.clone())
            .collect())
    }

    fn get_newest_by_index(
        &self,
        collection: Collection,
        index: Index,
        limit: usize,
        offset: usize,
    ) -> StorageResult<Vec<Record>> {
        collection.require_index(index)?;
        let tables = self.lock()?;
        Ok(Self::by_timestamp(tables.get(&collection))
            .into_iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}
