//! Store that prints statements instead of executing them

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use super::errors::{StoreError, StoreResult};
use super::queries::{Row, SqlValue, Statement, Table};
use super::store::Store;
use crate::models::OutPoint;

/// Prints every would-be statement to stdout. Output values it has printed
/// are remembered so fee resolution for later blocks behaves as it would
/// against a live database.
#[derive(Default)]
pub struct DryRunStore {
    outputs: Mutex<HashMap<OutPoint, i64>>,
    statements: AtomicU64,
}

impl DryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statement_count(&self) -> u64 {
        self.statements.load(Ordering::Relaxed)
    }

    fn emit(&self, statement: &Statement) {
        println!("{}", statement);
        info!("{}", statement);
        self.statements.fetch_add(1, Ordering::Relaxed);
    }

    fn remember_output(&self, row: &Row) -> StoreResult<()> {
        if row.table() != Table::Vouts {
            return Ok(());
        }
        let tx_id = row.get("tx_id").and_then(SqlValue::as_str);
        let vout_n = row.get("vout_n").and_then(SqlValue::as_i64);
        let value = row.get("value").and_then(SqlValue::as_i64);
        match (tx_id, vout_n, value) {
            (Some(tx_id), Some(vout_n), Some(value)) => {
                let vout_n = u32::try_from(vout_n)
                    .map_err(|_| StoreError::InvalidRow(format!("vout_n {} out of range", vout_n)))?;
                let outpoint = OutPoint { tx_id: tx_id.to_string(), vout_n };
                self.outputs
                    .lock()
                    .map_err(|_| StoreError::LockPoisoned("dry-run outputs"))?
                    .insert(outpoint, value);
                Ok(())
            }
            _ => Err(StoreError::InvalidRow(format!("incomplete vout row ({})", row.key_string()))),
        }
    }
}

#[async_trait]
impl Store for DryRunStore {
    async fn insert(&self, row: &Row) -> StoreResult<()> {
        self.emit(&row.insert_statement());
        self.remember_output(row)
    }

    async fn update(&self, row: &Row) -> StoreResult<()> {
        self.emit(&row.update_statement());
        self.remember_output(row)
    }

    fn is_dry_run(&self) -> bool {
        true
    }

    async fn delete(&self, row: &Row) -> StoreResult<()> {
        self.emit(&row.delete_statement());
        Ok(())
    }

    async fn output_value(&self, outpoint: &OutPoint) -> StoreResult<Option<i64>> {
        let outputs = self
            .outputs
            .lock()
            .map_err(|_| StoreError::LockPoisoned("dry-run outputs"))?;
        Ok(outputs.get(outpoint).copied())
    }
}
