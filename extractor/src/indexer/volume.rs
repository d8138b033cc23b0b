//! Output sums and block volume

use crate::amount::to_base_units;
use crate::models::ParsedTx;

/// Sum of a transaction's outputs in base units.
pub fn output_sum(tx: &ParsedTx) -> i64 {
    tx.vout.iter().map(|vout| to_base_units(vout.value)).sum()
}

/// Sum of all outputs across a block's transactions.
pub fn aggregate_volume<'a>(txs: impl IntoIterator<Item = &'a ParsedTx>) -> i64 {
    txs.into_iter().map(output_sum).sum()
}
