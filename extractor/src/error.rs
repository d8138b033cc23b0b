//! Error types for the extractor

use std::path::PathBuf;
use thiserror::Error;

use crate::database::StoreError;

#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Negative fee in transaction {tx_id}: inputs {inputs}, outputs {outputs}")]
    NegativeFee {
        tx_id: String,
        inputs: i64,
        outputs: i64,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Snapshot not found: {}", .0.display())]
    MissingSnapshot(PathBuf),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractorError {
    /// Whether the error invalidates the ledger state computed so far, as
    /// opposed to an I/O or storage failure.
    pub fn is_ledger_fault(&self) -> bool {
        matches!(self, ExtractorError::NegativeFee { .. })
    }
}

pub type Result<T> = std::result::Result<T, ExtractorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_fee_is_ledger_fault() {
        let err = ExtractorError::NegativeFee {
            tx_id: "ab".to_string(),
            inputs: 10,
            outputs: 20,
        };
        assert!(err.is_ledger_fault());
        assert_eq!(
            err.to_string(),
            "Negative fee in transaction ab: inputs 10, outputs 20"
        );

        let err = ExtractorError::Config("missing [db]".to_string());
        assert!(!err.is_ledger_fault());
    }
}
