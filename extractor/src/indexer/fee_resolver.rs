//! Transaction fee computation
//!
//! fee = sum(referenced outputs) - sum(outputs), all in base units. A
//! transaction without any input reference is a coinbase and its fee is its
//! output sum.

use tracing::{debug, error, info, warn};

use super::output_lookup::LookupChain;
use super::volume::output_sum;
use crate::error::{ExtractorError, Result};
use crate::models::{OutPoint, ParsedTx};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeCalculation {
    pub value_in: i64,
    pub value_out: i64,
    pub fee: i64,
    pub coinbase: bool,
    /// Inputs whose referenced output could not be found anywhere. They
    /// contributed nothing to `value_in`.
    pub unresolved: Vec<OutPoint>,
}

pub struct FeeResolver<'a> {
    lookup: LookupChain<'a>,
    abort_on_negative: bool,
}

impl<'a> FeeResolver<'a> {
    pub fn new(lookup: LookupChain<'a>) -> Self {
        Self {
            lookup,
            abort_on_negative: true,
        }
    }

    /// Report negative fees instead of failing on them. Used when there is
    /// no stored history to resolve inputs against.
    pub fn tolerate_negative(mut self, tolerate: bool) -> Self {
        self.abort_on_negative = !tolerate;
        self
    }

    pub async fn resolve(&self, tx: &ParsedTx) -> Result<FeeCalculation> {
        let value_out = output_sum(tx);
        debug!(tx = %tx.txid, value_out, "Sum of all outputs");

        let prevouts: Vec<OutPoint> = tx.prevouts().collect();
        if prevouts.is_empty() {
            return Ok(FeeCalculation {
                value_in: 0,
                value_out,
                fee: value_out,
                coinbase: true,
                unresolved: Vec::new(),
            });
        }

        let mut value_in = 0i64;
        let mut unresolved = Vec::new();
        for outpoint in prevouts {
            match self.lookup.resolve(&outpoint).await? {
                Some(resolved) => {
                    debug!(
                        tx = %tx.txid,
                        prevout = %outpoint,
                        value = resolved.value,
                        source = resolved.backend,
                        "Resolved input"
                    );
                    value_in += resolved.value;
                }
                None => {
                    warn!(
                        tx = %tx.txid,
                        prevout = %outpoint,
                        "Referenced output found neither in storage nor in the current block, counting it as zero"
                    );
                    unresolved.push(outpoint);
                }
            }
        }

        if value_in == 0 {
            info!(tx = %tx.txid, "Sum of all inputs is 0. That's unusual.");
        }

        let fee = value_in - value_out;
        if fee < 0 {
            error!(tx = %tx.txid, value_in, value_out, "Negative TX fee");
        }
        if fee < 0 && self.abort_on_negative {
            return Err(ExtractorError::NegativeFee {
                tx_id: tx.txid.clone(),
                inputs: value_in,
                outputs: value_out,
            });
        }

        debug!(tx = %tx.txid, fee, "Overall fee");
        Ok(FeeCalculation {
            value_in,
            value_out,
            fee,
            coinbase: false,
            unresolved,
        })
    }
}
