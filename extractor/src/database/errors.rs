use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Uniqueness constraint violated in {table} for key ({key})")]
    Conflict { table: &'static str, key: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),

    #[error("Invalid row: {0}")]
    InvalidRow(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
