//! Resolution of spent outputs to their values
//!
//! Backends are consulted in order; the first one that knows the output wins.
//! The fee resolver only sees the chain, so new backends slot in without
//! touching it.

use async_trait::async_trait;

use crate::amount::to_base_units;
use crate::database::Store;
use crate::error::Result;
use crate::models::{OutPoint, ParsedTx};

#[async_trait]
pub trait OutputLookup: Send + Sync {
    fn name(&self) -> &'static str;

    /// Value of the output in base units, or `None` if this backend does not
    /// know it.
    async fn output_value(&self, outpoint: &OutPoint) -> Result<Option<i64>>;
}

/// Outputs already persisted.
pub struct StoreLookup<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: Store + ?Sized> StoreLookup<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<'a, S: Store + ?Sized> OutputLookup for StoreLookup<'a, S> {
    fn name(&self) -> &'static str {
        "storage"
    }

    async fn output_value(&self, outpoint: &OutPoint) -> Result<Option<i64>> {
        Ok(self.store.output_value(outpoint).await?)
    }
}

/// Outputs of the other transactions in the block being decomposed.
pub struct SiblingLookup<'a> {
    txs: &'a [&'a ParsedTx],
}

impl<'a> SiblingLookup<'a> {
    pub fn new(txs: &'a [&'a ParsedTx]) -> Self {
        Self { txs }
    }

    /// First matching output in block order.
    pub fn find(&self, outpoint: &OutPoint) -> Option<i64> {
        self.txs
            .iter()
            .filter(|tx| tx.txid == outpoint.tx_id)
            .flat_map(|tx| tx.vout.iter())
            .find(|vout| vout.n == outpoint.vout_n)
            .map(|vout| to_base_units(vout.value))
    }
}

#[async_trait]
impl<'a> OutputLookup for SiblingLookup<'a> {
    fn name(&self) -> &'static str {
        "current block"
    }

    async fn output_value(&self, outpoint: &OutPoint) -> Result<Option<i64>> {
        Ok(self.find(outpoint))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub value: i64,
    pub backend: &'static str,
}

#[derive(Default)]
pub struct LookupChain<'a> {
    backends: Vec<Box<dyn OutputLookup + 'a>>,
}

impl<'a> LookupChain<'a> {
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    pub fn with(mut self, backend: impl OutputLookup + 'a) -> Self {
        self.backends.push(Box::new(backend));
        self
    }

    /// Storage first, then the in-flight block.
    pub fn for_block<S: Store + ?Sized>(store: &'a S, siblings: &'a [&'a ParsedTx]) -> Self {
        Self::new()
            .with(StoreLookup::new(store))
            .with(SiblingLookup::new(siblings))
    }

    pub async fn resolve(&self, outpoint: &OutPoint) -> Result<Option<Resolved>> {
        for backend in &self.backends {
            if let Some(value) = backend.output_value(outpoint).await? {
                return Ok(Some(Resolved {
                    value,
                    backend: backend.name(),
                }));
            }
        }
        Ok(None)
    }
}
