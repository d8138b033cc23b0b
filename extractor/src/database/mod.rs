//! Database module for the extractor

pub mod connection;
pub mod dry_run;
pub mod errors;
pub mod memory;
pub mod queries;
pub mod schema;
pub mod store;

pub use connection::SqlStore;
pub use dry_run::DryRunStore;
pub use errors::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use queries::{Row, SqlValue, Statement, Table, ToRow};
pub use store::{Store, Upsert};
