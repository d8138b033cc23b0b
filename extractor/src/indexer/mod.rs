//! Block decomposition: fee and volume computation plus per-entity persistence

pub mod block_indexer;
pub mod fee_resolver;
pub mod name_ops;
pub mod output_lookup;
pub mod script_indexer;
pub mod service;
pub mod transaction_indexer;
pub mod volume;

pub use fee_resolver::{FeeCalculation, FeeResolver};
pub use output_lookup::{LookupChain, OutputLookup};
pub use service::{BlockReport, ExtractorService, RunSummary, Stage};
