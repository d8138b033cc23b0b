//! Storage abstraction and the insert-or-update policy

use async_trait::async_trait;
use tracing::{debug, error};

use super::errors::{StoreError, StoreResult};
use super::queries::Row;
use crate::models::OutPoint;

/// Outcome of [`Store::upsert_by_natural_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
}

/// A relational sink for decomposed block entities.
///
/// Implementations report a uniqueness violation on a row's natural key as
/// [`StoreError::Conflict`]; every other failure is fatal to the caller.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert(&self, row: &Row) -> StoreResult<()>;

    async fn update(&self, row: &Row) -> StoreResult<()>;

    /// Remove the row with the same natural key, if any.
    async fn delete(&self, row: &Row) -> StoreResult<()>;

    /// Whether writes only go to stdout. Without stored history a negative
    /// fee is then expected and must not stop the run.
    fn is_dry_run(&self) -> bool {
        false
    }

    /// Value in base units of a stored output, if one exists.
    async fn output_value(&self, outpoint: &OutPoint) -> StoreResult<Option<i64>>;

    /// Insert, falling back to an update on the same natural key when the
    /// row already exists. This absorbs transaction ids that legitimately
    /// appear in two blocks: the later occurrence replaces the earlier one.
    async fn upsert_by_natural_key(&self, row: &Row) -> StoreResult<Upsert> {
        match self.insert(row).await {
            Ok(()) => Ok(Upsert::Inserted),
            Err(StoreError::Conflict { table, key }) => {
                error!(table, key = %key, "Uniqueness constraint violated, doing an UPDATE instead of an INSERT");
                self.update(row).await?;
                Ok(Upsert::Updated)
            }
            Err(e) => Err(e),
        }
    }

    /// Insert unless the natural key exists; the first write wins.
    /// Returns whether a row was written.
    async fn insert_if_absent(&self, row: &Row) -> StoreResult<bool> {
        match self.insert(row).await {
            Ok(()) => Ok(true),
            Err(StoreError::Conflict { table, key }) => {
                debug!(table, key = %key, "Row already present, skipping");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
