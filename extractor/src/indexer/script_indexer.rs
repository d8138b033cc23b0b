//! Output script, address and name-operation persistence

use std::sync::Arc;

use tracing::{debug, warn};

use super::name_ops::classify;
use crate::database::{Row, Store, Table, ToRow};
use crate::error::Result;
use crate::models::{AddressRecord, ParsedTx, ScriptRecord};

pub struct ScriptIndexer<S: Store> {
    store: Arc<S>,
}

impl<S: Store> ScriptIndexer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// `replaced` is set when the transaction id was already stored; name
    /// operations left behind by the earlier occurrence are then removed.
    pub async fn index(&self, tx: &ParsedTx, replaced: bool) -> Result<()> {
        for vout in &tx.vout {
            let spk = &vout.script_pub_key;

            // Addresses first; identity never changes so the first sighting wins
            for address in &spk.addresses {
                let is_valid = match tx.addresses_valid.get(address) {
                    Some(valid) => *valid,
                    None => {
                        warn!(tx = %tx.txid, address = %address, "No validity recorded for address, storing it as invalid");
                        false
                    }
                };
                let record = AddressRecord {
                    address: address.clone(),
                    block_first_seen: tx.block_hash.clone(),
                    is_valid,
                };
                self.store.insert_if_absent(&record.to_row()).await?;
            }

            let record = ScriptRecord {
                tx_id: tx.txid.clone(),
                vout_n: vout.n as i64,
                asm: spk.asm.clone(),
                hex: spk.hex.clone(),
                req_sigs: spk.req_sigs,
                script_type: spk.script_type.clone(),
                addresses: if spk.addresses.is_empty() {
                    None
                } else {
                    Some(spk.addresses.clone())
                },
            };
            self.store.upsert_by_natural_key(&record.to_row()).await?;

            let written = match &spk.name_op {
                Some(payload) => {
                    let operation = classify(payload);
                    debug!(tx = %tx.txid, vout = vout.n, op = operation.op(), "Name operation");
                    let row = operation.to_row(&tx.txid, vout.n, &tx.block_hash);
                    self.store.upsert_by_natural_key(&row).await?;
                    Some(row.table())
                }
                None => None,
            };

            if replaced {
                for table in [Table::NameOps, Table::RareNameOps] {
                    if written != Some(table) {
                        let key = Row::new(table)
                            .with("tx_id", tx.txid.as_str())
                            .with("vout_n", vout.n);
                        self.store.delete(&key).await?;
                    }
                }
            }
        }
        Ok(())
    }
}
