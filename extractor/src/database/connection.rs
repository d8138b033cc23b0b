//! SQLite-backed store

use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePoolOptions};
use tracing::{debug, error};

use super::errors::{StoreError, StoreResult};
use super::queries::{Row, SqlValue, Statement};
use super::schema::MIGRATIONS;
use super::store::Store;
use crate::models::OutPoint;

/// Store over a single SQLite connection. Each statement commits on its own.
pub struct SqlStore {
    pool: sqlx::SqlitePool,
    statements: AtomicU64,
}

impl SqlStore {
    /// Open (creating if missing) the database behind a `sqlite:` URL or a
    /// plain file path.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let options = if url.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(url)?
        } else {
            SqliteConnectOptions::new().filename(url)
        };
        Self::connect_with(options.create_if_missing(true)).await
    }

    pub async fn open(database_path: &Path) -> StoreResult<Self> {
        // Ensure the database directory exists
        if let Some(parent) = database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Database(e.into()))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true);
        Self::connect_with(options).await
    }

    async fn connect_with(options: SqliteConnectOptions) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options.foreign_keys(true))
            .await?;

        Ok(Self {
            pool,
            statements: AtomicU64::new(0),
        })
    }

    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }

    /// Number of statements executed successfully so far.
    pub fn statement_count(&self) -> u64 {
        self.statements.load(Ordering::Relaxed)
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        for statement in MIGRATIONS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, sqlx::Error> {
        let mut query = sqlx::query(&statement.sql);
        for value in &statement.params {
            query = bind_value(query, value);
        }
        let result = query.execute(&self.pool).await?;

        let count = self.statements.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(statements = count, "{}", statement);
        Ok(result.rows_affected())
    }
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Integer(v) => query.bind(*v),
        SqlValue::Real(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.clone()),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Timestamp(v) => query.bind(*v),
    }
}

#[async_trait]
impl Store for SqlStore {
    async fn insert(&self, row: &Row) -> StoreResult<()> {
        let statement = row.insert_statement();
        match self.execute(&statement).await {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                // The caller decides whether a conflict is worth reporting
                debug!(query = %statement, "{}", e);
                Err(StoreError::Conflict {
                    table: row.table().name(),
                    key: row.key_string(),
                })
            }
            Err(e) => {
                error!(query = %statement, "Exception when running query: {}", e);
                Err(e.into())
            }
        }
    }

    async fn update(&self, row: &Row) -> StoreResult<()> {
        let statement = row.update_statement();
        self.execute(&statement).await.map_err(|e| {
            error!(query = %statement, "Exception when running query: {}", e);
            StoreError::from(e)
        })?;
        Ok(())
    }

    async fn delete(&self, row: &Row) -> StoreResult<()> {
        let statement = row.delete_statement();
        self.execute(&statement).await.map_err(|e| {
            error!(query = %statement, "Exception when running query: {}", e);
            StoreError::from(e)
        })?;
        Ok(())
    }

    async fn output_value(&self, outpoint: &OutPoint) -> StoreResult<Option<i64>> {
        let value = sqlx::query_scalar::<_, i64>(
            "SELECT value FROM vouts WHERE tx_id = ? AND vout_n = ?",
        )
        .bind(outpoint.tx_id.as_str())
        .bind(outpoint.vout_n as i64)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }
}
