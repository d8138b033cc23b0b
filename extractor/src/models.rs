//! Data models for the extractor
//!
//! The first half mirrors the block message documents as they arrive from a
//! message source; the second half holds the records persisted to storage.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockMessage {
    pub block: BlockHeader,
    pub parsed_txs: BTreeMap<u32, ParsedTx>,
    #[serde(default)]
    pub auxpow: Option<AuxPow>,
}

impl BlockMessage {
    /// Transactions ordered by their declared index within the block.
    pub fn ordered_txs(&self) -> Vec<&ParsedTx> {
        let mut txs: Vec<&ParsedTx> = self.parsed_txs.values().collect();
        txs.sort_by_key(|tx| tx.tx_index);
        txs
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockHeader {
    pub hash: String,
    pub height: i64,
    #[serde(default, rename = "previousblockhash")]
    pub previous_block_hash: Option<String>,
    pub time: i64,
    #[serde(rename = "mediantime")]
    pub median_time: i64,
    pub bits: String,
    pub difficulty: f64,
    pub nonce: i64,
    pub size: i64,
    pub version: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedTx {
    pub txid: String,
    pub block_hash: String,
    pub tx_index: u32,
    pub locktime: i64,
    pub size: i64,
    pub version: i64,
    #[serde(default)]
    pub vin: Vec<TxInput>,
    #[serde(default)]
    pub vout: Vec<TxOutput>,
    #[serde(default)]
    pub addresses_valid: HashMap<String, bool>,
    /// Merge-mining block-header hash; only set on the auxpow coinbase.
    #[serde(default)]
    pub blockhash: Option<String>,
}

impl ParsedTx {
    /// Outpoints spent by this transaction, in input order.
    pub fn prevouts(&self) -> impl Iterator<Item = OutPoint> + '_ {
        self.vin.iter().filter_map(TxInput::prevout)
    }

    pub fn is_coinbase(&self) -> bool {
        self.prevouts().next().is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxInput {
    #[serde(default)]
    pub coinbase: Option<String>,
    #[serde(default, rename = "scriptSig")]
    pub script_sig: Option<ScriptSig>,
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub vout: Option<u32>,
    #[serde(default)]
    pub sequence: Option<i64>,
}

impl TxInput {
    pub fn prevout(&self) -> Option<OutPoint> {
        match (&self.txid, self.vout) {
            (Some(tx_id), Some(vout_n)) => Some(OutPoint {
                tx_id: tx_id.clone(),
                vout_n,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptSig {
    #[serde(default)]
    pub asm: Option<String>,
    #[serde(default)]
    pub hex: Option<String>,
    #[serde(default)]
    pub dec: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: f64,
    pub n: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: ScriptPubKey,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptPubKey {
    #[serde(default)]
    pub asm: String,
    #[serde(default)]
    pub hex: String,
    #[serde(default, rename = "reqSigs")]
    pub req_sigs: Option<i64>,
    #[serde(default, rename = "type")]
    pub script_type: String,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default, rename = "nameOp")]
    pub name_op: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuxPow {
    pub block_hash: String,
    #[serde(rename = "chainindex")]
    pub chain_index: i64,
    #[serde(rename = "chainmerklebranch")]
    pub chain_merkle_branch: Vec<String>,
    pub index: i64,
    #[serde(rename = "merklebranch")]
    pub merkle_branch: Vec<String>,
    #[serde(rename = "parentblock")]
    pub parent_block: String,
    pub tx: ParsedTx,
}

/// Reference to a previously created output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutPoint {
    pub tx_id: String,
    pub vout_n: u32,
}

impl std::fmt::Display for OutPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.vout_n)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockRecord {
    pub block_hash: String,
    pub block_index: i64,
    pub prev_block_hash: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub median_time: i64,
    pub difficulty: f64,
    pub bits: String,
    pub nonce: i64,
    pub size: i64,
    pub version: i64,
    pub tx_volume: i64,
    pub tx_fees: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub tx_id: String,
    pub block_hash: String,
    pub tx_index: i64,
    pub lock_time: i64,
    pub size: i64,
    pub version: i64,
    pub fee: Option<i64>,
    pub aux_block_header_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRecord {
    pub tx_id: String,
    pub vout_n: i64,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRecord {
    pub tx_id: String,
    pub vout_n: i64,
    pub asm: String,
    pub hex: String,
    pub req_sigs: Option<i64>,
    pub script_type: String,
    /// `None` when the script carries no address.
    pub addresses: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    pub address: String,
    pub block_first_seen: String,
    pub is_valid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRecord {
    pub tx_id: String,
    pub vin_n: i64,
    pub coinbase: Option<String>,
    pub script_sig: Option<String>,
    pub ref_tx_id: Option<String>,
    pub ref_vout_n: Option<i64>,
    pub sequence: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxPowRecord {
    pub block_hash: String,
    pub chain_index: i64,
    pub chain_merkle_branch: Vec<String>,
    pub index: i64,
    pub merkle_branch: Vec<String>,
    pub parent_block: String,
    pub tx_id: String,
}
