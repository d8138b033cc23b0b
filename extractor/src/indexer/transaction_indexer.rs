//! Transaction, output and input persistence

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::amount::to_base_units;
use crate::database::{Store, ToRow, Upsert};
use crate::error::Result;
use crate::models::{InputRecord, OutputRecord, ParsedTx, TransactionRecord, TxInput};

pub struct TransactionIndexer<S: Store> {
    store: Arc<S>,
}

impl<S: Store> TransactionIndexer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Store the transaction row. `aux_block_header_hash` is only set for the
    /// coinbase transaction of a merge-mining proof.
    pub async fn index(
        &self,
        tx: &ParsedTx,
        fee: Option<i64>,
        aux_block_header_hash: Option<String>,
    ) -> Result<Upsert> {
        let record = TransactionRecord {
            tx_id: tx.txid.clone(),
            block_hash: tx.block_hash.clone(),
            tx_index: tx.tx_index as i64,
            lock_time: tx.locktime,
            size: tx.size,
            version: tx.version,
            fee,
            aux_block_header_hash,
        };
        debug!(tx = %record.tx_id, "INSERT TX");
        Ok(self.store.upsert_by_natural_key(&record.to_row()).await?)
    }

    pub async fn index_outputs(&self, tx: &ParsedTx) -> Result<()> {
        for vout in &tx.vout {
            let record = OutputRecord {
                tx_id: tx.txid.clone(),
                vout_n: vout.n as i64,
                value: to_base_units(vout.value),
            };
            self.store.upsert_by_natural_key(&record.to_row()).await?;
        }
        Ok(())
    }

    pub async fn index_inputs(&self, tx: &ParsedTx) -> Result<()> {
        for (vin_n, input) in tx.vin.iter().enumerate() {
            let record = Self::input_record(&tx.txid, vin_n as i64, input);
            self.store.upsert_by_natural_key(&record.to_row()).await?;
        }
        Ok(())
    }

    fn input_record(tx_id: &str, vin_n: i64, input: &TxInput) -> InputRecord {
        // Prefer the decoded signature script, fall back to its disassembly
        let script_sig = input.script_sig.as_ref().and_then(|sig| {
            sig.dec
                .clone()
                .or_else(|| sig.asm.clone().map(Value::String))
                .map(|v| v.to_string())
        });

        InputRecord {
            tx_id: tx_id.to_string(),
            vin_n,
            coinbase: input.coinbase.clone(),
            script_sig,
            ref_tx_id: input.txid.clone(),
            ref_vout_n: input.vout.map(i64::from),
            sequence: input.sequence,
        }
    }
}
