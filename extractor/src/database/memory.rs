//! In-memory store with the same conflict semantics as [`super::SqlStore`]

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::errors::{StoreError, StoreResult};
use super::queries::{key_string, Row, SqlValue, Table};
use super::store::Store;
use crate::models::OutPoint;

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<BTreeMap<Table, BTreeMap<String, Row>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, BTreeMap<Table, BTreeMap<String, Row>>>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::LockPoisoned("memory store"))
    }

    pub fn get(&self, table: Table, key: &[SqlValue]) -> Option<Row> {
        let tables = self.lock().ok()?;
        tables.get(&table)?.get(&key_string(key)).cloned()
    }

    /// Rows of a table ordered by natural key.
    pub fn rows(&self, table: Table) -> Vec<Row> {
        self.lock()
            .map(|tables| {
                tables
                    .get(&table)
                    .map(|rows| rows.values().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    pub fn count(&self, table: Table) -> usize {
        self.lock()
            .map(|tables| tables.get(&table).map(BTreeMap::len).unwrap_or(0))
            .unwrap_or(0)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert(&self, row: &Row) -> StoreResult<()> {
        let mut tables = self.lock()?;
        let rows = tables.entry(row.table()).or_default();
        let key = row.key_string();
        if rows.contains_key(&key) {
            return Err(StoreError::Conflict {
                table: row.table().name(),
                key,
            });
        }
        rows.insert(key, row.clone());
        Ok(())
    }

    async fn update(&self, row: &Row) -> StoreResult<()> {
        let mut tables = self.lock()?;
        // An UPDATE matching no row is not an error
        if let Some(existing) = tables
            .get_mut(&row.table())
            .and_then(|rows| rows.get_mut(&row.key_string()))
        {
            *existing = row.clone();
        }
        Ok(())
    }

    async fn delete(&self, row: &Row) -> StoreResult<()> {
        let mut tables = self.lock()?;
        if let Some(rows) = tables.get_mut(&row.table()) {
            rows.remove(&row.key_string());
        }
        Ok(())
    }

    async fn output_value(&self, outpoint: &OutPoint) -> StoreResult<Option<i64>> {
        let key = [
            SqlValue::from(outpoint.tx_id.as_str()),
            SqlValue::from(outpoint.vout_n),
        ];
        Ok(self
            .get(Table::Vouts, &key)
            .and_then(|row| row.get("value").and_then(SqlValue::as_i64)))
    }
}
