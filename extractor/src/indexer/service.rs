//! Entity decomposition of block messages and the worker loop around it

use std::fmt;
use std::sync::Arc;

use tracing::{error, info};

use super::fee_resolver::FeeResolver;
use super::output_lookup::LookupChain;
use super::volume::{aggregate_volume, output_sum};
use crate::database::{Store, Upsert};
use crate::error::Result;
use crate::indexer::{
    block_indexer::BlockIndexer, script_indexer::ScriptIndexer,
    transaction_indexer::TransactionIndexer,
};
use crate::models::{BlockMessage, ParsedTx};
use crate::source::MessageSource;

/// Progress of one block message through decomposition. Stages only move
/// forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Received,
    BlockPersisted,
    TransactionsPersisted,
    AuxPowPersisted,
    OutputsPersisted,
    ScriptsAndNameOpsPersisted,
    InputsPersisted,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "RECEIVED",
            Stage::BlockPersisted => "BLOCK_PERSISTED",
            Stage::TransactionsPersisted => "TRANSACTIONS_PERSISTED",
            Stage::AuxPowPersisted => "AUXPOW_PERSISTED",
            Stage::OutputsPersisted => "OUTPUTS_PERSISTED",
            Stage::ScriptsAndNameOpsPersisted => "SCRIPTS_AND_NAMEOPS_PERSISTED",
            Stage::InputsPersisted => "INPUTS_PERSISTED",
            Stage::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// What happened to one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockReport {
    pub height: i64,
    pub hash: String,
    pub tx_count: usize,
    pub tx_volume: i64,
    pub fee_volume: i64,
    pub unresolved_inputs: usize,
    /// Transactions whose id was already stored and got updated in place.
    pub replaced_txs: usize,
    pub stages: Vec<Stage>,
}

/// Totals over a worker run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub blocks: u64,
    pub transactions: u64,
    pub tx_volume: i64,
    pub fee_volume: i64,
    pub unresolved_inputs: u64,
    pub replaced_txs: u64,
}

impl RunSummary {
    fn record(&mut self, report: &BlockReport) {
        self.blocks += 1;
        self.transactions += report.tx_count as u64;
        self.tx_volume += report.tx_volume;
        self.fee_volume += report.fee_volume;
        self.unresolved_inputs += report.unresolved_inputs as u64;
        self.replaced_txs += report.replaced_txs as u64;
    }
}

struct Progress {
    stages: Vec<Stage>,
}

impl Progress {
    fn new() -> Self {
        Self {
            stages: vec![Stage::Received],
        }
    }

    fn advance(&mut self, stage: Stage) {
        debug_assert!(self.current() < stage);
        self.stages.push(stage);
    }

    fn current(&self) -> Stage {
        self.stages.last().copied().unwrap_or(Stage::Received)
    }
}

pub struct ExtractorService<S: Store> {
    store: Arc<S>,
    block_indexer: BlockIndexer<S>,
    tx_indexer: TransactionIndexer<S>,
    script_indexer: ScriptIndexer<S>,
}

impl<S: Store> ExtractorService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store: store.clone(),
            block_indexer: BlockIndexer::new(store.clone()),
            tx_indexer: TransactionIndexer::new(store.clone()),
            script_indexer: ScriptIndexer::new(store),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Consume messages until the source runs dry. Each message is
    /// acknowledged only after it reached [`Stage::Done`]; on a ledger fault
    /// the source is closed before the error is returned.
    pub async fn start<M: MessageSource + ?Sized>(&self, source: &mut M) -> Result<RunSummary> {
        info!(source = %source.describe(), "Starting extractor service");
        let mut summary = RunSummary::default();

        while let Some(message) = source.next_message().await? {
            let report = match self.decompose(&message).await {
                Ok(report) => report,
                Err(e) => {
                    if e.is_ledger_fault() {
                        error!(height = message.block.height, "Ledger state cannot be trusted, closing the source");
                        source.close().await?;
                    }
                    return Err(e);
                }
            };
            source.acknowledge(&message).await?;
            summary.record(&report);
        }

        info!(
            blocks = summary.blocks,
            transactions = summary.transactions,
            tx_volume = summary.tx_volume,
            fee_volume = summary.fee_volume,
            unresolved_inputs = summary.unresolved_inputs,
            replaced_txs = summary.replaced_txs,
            "Source exhausted"
        );
        Ok(summary)
    }

    /// Decompose one block message into storage.
    pub async fn decompose(&self, message: &BlockMessage) -> Result<BlockReport> {
        let mut progress = Progress::new();
        match self.run_stages(message, &mut progress).await {
            Ok(report) => Ok(report),
            Err(e) => {
                error!(
                    block = %message.block.hash,
                    height = message.block.height,
                    stage = %progress.current(),
                    error = %e,
                    "Block decomposition aborted"
                );
                Err(e)
            }
        }
    }

    async fn run_stages(&self, message: &BlockMessage, progress: &mut Progress) -> Result<BlockReport> {
        let header = &message.block;
        let txs = message.ordered_txs();

        // Fees and volumes are known before anything is written
        let tx_volume = aggregate_volume(txs.iter().copied());
        let mut fees = Vec::with_capacity(txs.len());
        let mut unresolved_inputs = 0;
        {
            let resolver = FeeResolver::new(LookupChain::for_block(&*self.store, &txs))
                .tolerate_negative(self.store.is_dry_run());
            for tx in &txs {
                let calc = resolver.resolve(tx).await?;
                unresolved_inputs += calc.unresolved.len();
                fees.push(calc.fee);
            }
        }
        let fee_volume: i64 = fees.iter().sum();

        self.block_indexer.index(header, tx_volume, fee_volume).await?;
        progress.advance(Stage::BlockPersisted);

        let mut replaced = Vec::with_capacity(txs.len());
        for (tx, fee) in txs.iter().zip(&fees) {
            let upsert = self.tx_indexer.index(tx, Some(*fee), None).await?;
            replaced.push(upsert == Upsert::Updated);
        }
        let replaced_txs = replaced.iter().filter(|r| **r).count();
        progress.advance(Stage::TransactionsPersisted);

        if let Some(auxpow) = &message.auxpow {
            self.index_auxpow_coinbase(&auxpow.tx).await?;
            self.block_indexer.index_auxpow(auxpow).await?;
            progress.advance(Stage::AuxPowPersisted);
        }

        for tx in &txs {
            self.tx_indexer.index_outputs(tx).await?;
        }
        progress.advance(Stage::OutputsPersisted);

        for (tx, replaced) in txs.iter().zip(&replaced) {
            self.script_indexer.index(tx, *replaced).await?;
        }
        progress.advance(Stage::ScriptsAndNameOpsPersisted);

        for tx in &txs {
            self.tx_indexer.index_inputs(tx).await?;
        }
        progress.advance(Stage::InputsPersisted);
        progress.advance(Stage::Done);

        let report = BlockReport {
            height: header.height,
            hash: header.hash.clone(),
            tx_count: txs.len(),
            tx_volume,
            fee_volume,
            unresolved_inputs,
            replaced_txs,
            stages: progress.stages.clone(),
        };
        info!(
            height = report.height,
            block = %report.hash,
            txs = report.tx_count,
            tx_volume,
            fee_volume,
            unresolved_inputs,
            replaced_txs,
            "Block decomposed"
        );
        Ok(report)
    }

    /// The merge-mining coinbase has no resolvable inputs, so its fee is its
    /// output sum.
    async fn index_auxpow_coinbase(&self, tx: &ParsedTx) -> Result<Upsert> {
        let fee = output_sum(tx);
        self.tx_indexer.index(tx, Some(fee), tx.blockhash.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::indexer::volume::tests::tx_with_outputs;
    use crate::models::BlockHeader;
    use std::collections::BTreeMap;

    fn message(height: i64, txs: Vec<ParsedTx>) -> BlockMessage {
        let hash = format!("b{}", height);
        BlockMessage {
            block: BlockHeader {
                hash: hash.clone(),
                height,
                previous_block_hash: (height > 0).then(|| format!("b{}", height - 1)),
                time: 1_303_000_000 + height,
                median_time: 1_303_000_000,
                bits: "1c00ffff".to_string(),
                difficulty: 1.0,
                nonce: 0,
                size: 200,
                version: 1,
            },
            parsed_txs: txs
                .into_iter()
                .map(|mut tx| {
                    tx.block_hash = hash.clone();
                    (tx.tx_index, tx)
                })
                .collect::<BTreeMap<_, _>>(),
            auxpow: None,
        }
    }

    #[tokio::test]
    async fn test_stages_without_auxpow() {
        let service = ExtractorService::new(Arc::new(MemoryStore::new()));
        let report = service
            .decompose(&message(0, vec![tx_with_outputs("cb", 0, &[50.0])]))
            .await
            .unwrap();

        assert_eq!(
            report.stages,
            vec![
                Stage::Received,
                Stage::BlockPersisted,
                Stage::TransactionsPersisted,
                Stage::OutputsPersisted,
                Stage::ScriptsAndNameOpsPersisted,
                Stage::InputsPersisted,
                Stage::Done,
            ]
        );
        assert_eq!(report.tx_volume, 5_000_000_000);
        assert_eq!(report.fee_volume, 5_000_000_000);
    }

    #[tokio::test]
    async fn test_empty_block() {
        let service = ExtractorService::new(Arc::new(MemoryStore::new()));
        let report = service.decompose(&message(3, vec![])).await.unwrap();
        assert_eq!(report.tx_count, 0);
        assert_eq!(report.tx_volume, 0);
        assert_eq!(report.fee_volume, 0);
        assert_eq!(service.store().count(crate::database::Table::Blocks), 1);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::ScriptsAndNameOpsPersisted.to_string(), "SCRIPTS_AND_NAMEOPS_PERSISTED");
        assert!(Stage::BlockPersisted < Stage::Done);
    }
}
