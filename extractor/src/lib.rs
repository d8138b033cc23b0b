//! Namecoin block extractor
//!
//! This crate decomposes block messages (header, parsed transactions and an
//! optional merge-mining proof) into relational records, computing per
//! transaction fees and per block volumes on integer base units.

pub mod amount;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod indexer;
pub mod logging;
pub mod models;
pub mod source;

pub use error::{ExtractorError, Result};
pub use indexer::ExtractorService;
