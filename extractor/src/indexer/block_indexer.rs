//! Block and merge-mining proof persistence

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tracing::debug;

use crate::database::{Store, ToRow, Upsert};
use crate::error::{ExtractorError, Result};
use crate::models::{AuxPow, AuxPowRecord, BlockHeader, BlockRecord};

pub struct BlockIndexer<S: Store> {
    store: Arc<S>,
}

impl<S: Store> BlockIndexer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn index(&self, header: &BlockHeader, tx_volume: i64, tx_fees: i64) -> Result<Upsert> {
        let record = Self::block_record(header, tx_volume, tx_fees)?;
        debug!(block = %record.block_hash, height = record.block_index, "INSERT block");
        Ok(self.store.upsert_by_natural_key(&record.to_row()).await?)
    }

    /// The proof's coinbase transaction must already be stored.
    pub async fn index_auxpow(&self, auxpow: &AuxPow) -> Result<Upsert> {
        let record = AuxPowRecord {
            block_hash: auxpow.block_hash.clone(),
            chain_index: auxpow.chain_index,
            chain_merkle_branch: auxpow.chain_merkle_branch.clone(),
            index: auxpow.index,
            merkle_branch: auxpow.merkle_branch.clone(),
            parent_block: auxpow.parent_block.clone(),
            tx_id: auxpow.tx.txid.clone(),
        };
        Ok(self.store.upsert_by_natural_key(&record.to_row()).await?)
    }

    pub fn block_record(header: &BlockHeader, tx_volume: i64, tx_fees: i64) -> Result<BlockRecord> {
        let prev_block_hash = if header.height == 0 {
            None
        } else {
            Some(header.previous_block_hash.clone().ok_or_else(|| {
                ExtractorError::InvalidMessage(format!(
                    "block {} at height {} has no previous block hash",
                    header.hash, header.height
                ))
            })?)
        };

        let timestamp = Utc.timestamp_opt(header.time, 0).single().ok_or_else(|| {
            ExtractorError::InvalidMessage(format!(
                "block {} has an invalid timestamp {}",
                header.hash, header.time
            ))
        })?;

        Ok(BlockRecord {
            block_hash: header.hash.clone(),
            block_index: header.height,
            prev_block_hash,
            timestamp,
            median_time: header.median_time,
            difficulty: header.difficulty,
            bits: header.bits.clone(),
            nonce: header.nonce,
            size: header.size,
            version: header.version,
            tx_volume,
            tx_fees,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(height: i64, prev: Option<&str>) -> BlockHeader {
        BlockHeader {
            hash: format!("hash{}", height),
            height,
            previous_block_hash: prev.map(str::to_string),
            time: 1_303_000_000,
            median_time: 1_302_999_000,
            bits: "1c00ffff".to_string(),
            difficulty: 1.0,
            nonce: 7,
            size: 215,
            version: 1,
        }
    }

    #[test]
    fn test_genesis_has_no_previous_hash() {
        // Even if the message carries one
        let record = BlockIndexer::<crate::database::MemoryStore>::block_record(
            &header(0, Some("ignored")),
            5_000_000_000,
            5_000_000_000,
        )
        .unwrap();
        assert_eq!(record.prev_block_hash, None);
        assert_eq!(record.timestamp.timestamp(), 1_303_000_000);
    }

    #[test]
    fn test_non_genesis_requires_previous_hash() {
        let record =
            BlockIndexer::<crate::database::MemoryStore>::block_record(&header(5, Some("hash4")), 0, 0)
                .unwrap();
        assert_eq!(record.prev_block_hash.as_deref(), Some("hash4"));

        let err = BlockIndexer::<crate::database::MemoryStore>::block_record(&header(5, None), 0, 0)
            .unwrap_err();
        assert!(matches!(err, ExtractorError::InvalidMessage(_)));
    }
}
