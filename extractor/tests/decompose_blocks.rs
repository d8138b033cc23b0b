//! Whole blocks through the extractor service

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;

use nmc_extractor::database::{DryRunStore, MemoryStore, SqlStore, SqlValue, Table};
use nmc_extractor::models::{
    AuxPow, BlockHeader, BlockMessage, ParsedTx, ScriptPubKey, TxInput, TxOutput,
};
use nmc_extractor::source::MessageSource;
use nmc_extractor::{ExtractorError, ExtractorService, Result};

fn header(height: i64) -> BlockHeader {
    BlockHeader {
        hash: format!("block{}", height),
        height,
        previous_block_hash: (height > 0).then(|| format!("block{}", height - 1)),
        time: 1_303_000_000 + height * 600,
        median_time: 1_303_000_000,
        bits: "1b00b269".to_string(),
        difficulty: 94_037.96,
        nonce: 1_234,
        size: 1_024,
        version: 65_793,
    }
}

fn output(n: u32, value: f64, address: &str) -> TxOutput {
    TxOutput {
        value,
        n,
        script_pub_key: ScriptPubKey {
            asm: format!("OP_DUP OP_HASH160 {} OP_EQUALVERIFY OP_CHECKSIG", address),
            hex: "76a914".to_string(),
            req_sigs: Some(1),
            script_type: "pubkeyhash".to_string(),
            addresses: vec![address.to_string()],
            name_op: None,
        },
    }
}

fn coinbase(txid: &str, tx_index: u32, vout: Vec<TxOutput>) -> ParsedTx {
    tx(
        txid,
        tx_index,
        vec![TxInput {
            coinbase: Some("04b269001b0104".to_string()),
            sequence: Some(4_294_967_295),
            ..TxInput::default()
        }],
        vout,
    )
}

fn spend(prevouts: &[(&str, u32)]) -> Vec<TxInput> {
    prevouts
        .iter()
        .map(|(txid, vout)| TxInput {
            txid: Some(txid.to_string()),
            vout: Some(*vout),
            sequence: Some(4_294_967_295),
            ..TxInput::default()
        })
        .collect()
}

fn tx(txid: &str, tx_index: u32, vin: Vec<TxInput>, vout: Vec<TxOutput>) -> ParsedTx {
    let addresses_valid: HashMap<String, bool> = vout
        .iter()
        .flat_map(|o| o.script_pub_key.addresses.iter())
        .map(|a| (a.clone(), true))
        .collect();
    ParsedTx {
        txid: txid.to_string(),
        block_hash: String::new(),
        tx_index,
        locktime: 0,
        size: 250,
        version: 1,
        vin,
        vout,
        addresses_valid,
        blockhash: None,
    }
}

fn block(height: i64, txs: Vec<ParsedTx>) -> BlockMessage {
    let hdr = header(height);
    let parsed_txs: BTreeMap<u32, ParsedTx> = txs
        .into_iter()
        .map(|mut t| {
            t.block_hash = hdr.hash.clone();
            (t.tx_index, t)
        })
        .collect();
    BlockMessage {
        block: hdr,
        parsed_txs,
        auxpow: None,
    }
}

fn text(value: &SqlValue) -> Option<&str> {
    value.as_str()
}

/// Source over prepared messages that records what happened to them.
#[derive(Default)]
struct ScriptedSource {
    pending: VecDeque<BlockMessage>,
    acknowledged: Vec<i64>,
    closed: bool,
}

impl ScriptedSource {
    fn new(messages: Vec<BlockMessage>) -> Self {
        Self {
            pending: messages.into(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl MessageSource for ScriptedSource {
    fn describe(&self) -> String {
        "scripted".to_string()
    }

    async fn next_message(&mut self) -> Result<Option<BlockMessage>> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.pending.pop_front())
    }

    async fn acknowledge(&mut self, message: &BlockMessage) -> Result<()> {
        self.acknowledged.push(message.block.height);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[tokio::test]
async fn genesis_block_has_no_previous_hash() {
    let store = Arc::new(MemoryStore::new());
    let service = ExtractorService::new(store.clone());

    let mut genesis = block(0, vec![coinbase("gen", 0, vec![output(0, 50.0, "N1gen")])]);
    genesis.block.previous_block_hash = Some("0000".to_string());
    service.decompose(&genesis).await.unwrap();

    let row = store.get(Table::Blocks, &["block0".into()]).unwrap();
    assert!(row.get("prev_block_hash").unwrap().is_null());
    assert_eq!(row.get("tx_volume").and_then(SqlValue::as_i64), Some(5_000_000_000));
    assert_eq!(row.get("tx_fees").and_then(SqlValue::as_i64), Some(5_000_000_000));
}

#[tokio::test]
async fn spend_of_same_block_output_resolves_through_siblings() {
    let store = Arc::new(MemoryStore::new());
    let service = ExtractorService::new(store.clone());

    let msg = block(
        7,
        vec![
            coinbase("cb7", 0, vec![output(0, 50.0, "N1miner")]),
            tx("a", 1, spend(&[("cb7", 0)]), vec![output(0, 49.0, "N1a")]),
            tx("b", 2, spend(&[("a", 0)]), vec![output(0, 48.99, "N1b")]),
            tx("c", 3, spend(&[("ghost", 0)]), vec![]),
        ],
    );
    let report = service.decompose(&msg).await.unwrap();

    // "ghost:0" is unknown everywhere, the rest comes from the block itself
    assert_eq!(report.unresolved_inputs, 1);
    let a = store.get(Table::Transactions, &["a".into()]).unwrap();
    assert_eq!(a.get("fee").and_then(SqlValue::as_i64), Some(100_000_000));
    let b = store.get(Table::Transactions, &["b".into()]).unwrap();
    assert_eq!(b.get("fee").and_then(SqlValue::as_i64), Some(1_000_000));
    let c = store.get(Table::Transactions, &["c".into()]).unwrap();
    assert_eq!(c.get("fee").and_then(SqlValue::as_i64), Some(0));

    assert_eq!(report.tx_volume, 5_000_000_000 + 4_900_000_000 + 4_899_000_000);
    assert_eq!(store.count(Table::Vouts), 3);
    assert_eq!(store.count(Table::Vins), 4);
    assert_eq!(store.count(Table::Addresses), 3);
}

#[tokio::test]
async fn later_block_resolves_against_storage() {
    let store = Arc::new(MemoryStore::new());
    let service = ExtractorService::new(store.clone());

    service
        .decompose(&block(1, vec![coinbase("cb1", 0, vec![output(0, 50.0, "N1miner")])]))
        .await
        .unwrap();
    let report = service
        .decompose(&block(
            2,
            vec![
                coinbase("cb2", 0, vec![output(0, 50.01, "N1miner")]),
                tx(
                    "pay",
                    1,
                    spend(&[("cb1", 0)]),
                    vec![output(0, 30.0, "N1x"), output(1, 19.99, "N1miner")],
                ),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(report.unresolved_inputs, 0);
    let pay = store.get(Table::Transactions, &["pay".into()]).unwrap();
    assert_eq!(pay.get("fee").and_then(SqlValue::as_i64), Some(1_000_000));
    assert_eq!(report.fee_volume, 5_001_000_000 + 1_000_000);

    // First sighting of an address wins
    let miner = store.get(Table::Addresses, &["N1miner".into()]).unwrap();
    assert_eq!(miner.get("block_first_seen").and_then(text), Some("block1"));
}

#[tokio::test]
async fn reprocessing_a_block_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let service = ExtractorService::new(store.clone());
    let msg = block(
        3,
        vec![
            coinbase("cb3", 0, vec![output(0, 50.0, "N1miner")]),
            tx("t", 1, spend(&[("cb3", 0)]), vec![output(0, 49.5, "N1t")]),
        ],
    );

    let first = service.decompose(&msg).await.unwrap();
    let snapshot: Vec<_> = Table::ALL.iter().map(|t| store.rows(*t)).collect();

    let second = service.decompose(&msg).await.unwrap();
    let after: Vec<_> = Table::ALL.iter().map(|t| store.rows(*t)).collect();

    assert_eq!(first.replaced_txs, 0);
    assert_eq!(second.replaced_txs, 2);
    assert_eq!(first.fee_volume, second.fee_volume);
    assert_eq!(snapshot, after);
}

#[tokio::test]
async fn auxpow_coinbase_colliding_with_stored_tx_is_updated() {
    let store = Arc::new(MemoryStore::new());
    let service = ExtractorService::new(store.clone());

    service
        .decompose(&block(4, vec![coinbase("shared", 0, vec![output(0, 50.0, "N1miner")])]))
        .await
        .unwrap();

    let mut aux_tx = coinbase("shared", 0, vec![output(0, 25.0, "1Parent")]);
    aux_tx.block_hash = "block5".to_string();
    aux_tx.blockhash = Some("parentheader".to_string());

    let mut msg = block(5, vec![coinbase("cb5", 0, vec![output(0, 50.0, "N1miner")])]);
    msg.auxpow = Some(AuxPow {
        block_hash: "block5".to_string(),
        chain_index: 0,
        chain_merkle_branch: vec![],
        index: 0,
        merkle_branch: vec!["m1".to_string(), "m2".to_string()],
        parent_block: "0100000000".to_string(),
        tx: aux_tx,
    });

    let report = service.decompose(&msg).await.unwrap();
    assert!(report.stages.contains(&nmc_extractor::indexer::Stage::AuxPowPersisted));

    assert_eq!(store.count(Table::Transactions), 2);
    let shared = store.get(Table::Transactions, &["shared".into()]).unwrap();
    assert_eq!(shared.get("fee").and_then(SqlValue::as_i64), Some(2_500_000_000));
    assert_eq!(shared.get("aux_block_header_hash").and_then(text), Some("parentheader"));

    let auxpow = store.get(Table::AuxPow, &["block5".into()]).unwrap();
    assert_eq!(auxpow.get("tx_id").and_then(text), Some("shared"));
    assert_eq!(auxpow.get("merkle_branch").and_then(text), Some(r#"["m1","m2"]"#));

    // The proof's coinbase is only a transaction row
    assert!(store.get(Table::Vouts, &["shared".into(), 0i64.into()]).is_some());
    assert_eq!(store.count(Table::Vouts), 2);
}

#[tokio::test]
async fn name_operations_are_recorded() {
    let store = Arc::new(MemoryStore::new());
    let service = ExtractorService::new(store.clone());

    let mut register = output(0, 0.01, "N1owner");
    register.script_pub_key.name_op = Some(json!({
        "op": "name_firstupdate",
        "name": "d/example",
        "rand": "c0ffee",
        "value": {"ip": "192.0.2.1"}
    }));
    let mut odd = output(1, 0.01, "N1owner");
    odd.script_pub_key.name_op = Some(json!({"op": "name_doi", "blob": [1, 2, 3]}));

    let msg = block(
        9,
        vec![
            coinbase("cb9", 0, vec![output(0, 50.0, "N1miner")]),
            tx("names", 1, spend(&[("cb9", 0)]), vec![register, odd]),
        ],
    );
    service.decompose(&msg).await.unwrap();

    let op = store
        .get(Table::NameOps, &["names".into(), 0i64.into()])
        .unwrap();
    assert_eq!(op.get("op").and_then(text), Some("name_firstupdate"));
    assert_eq!(op.get("namespace").and_then(text), Some("d"));
    assert_eq!(op.get("name").and_then(text), Some("example"));
    assert_eq!(op.get("value").and_then(text), Some(r#"{"ip":"192.0.2.1"}"#));
    assert_eq!(op.get("block_hash").and_then(text), Some("block9"));

    let rare = store
        .get(Table::RareNameOps, &["names".into(), 1i64.into()])
        .unwrap();
    assert_eq!(rare.get("json_dump").and_then(text), Some(r#"{"blob":[1,2,3],"op":"name_doi"}"#));
}

#[tokio::test]
async fn negative_fee_closes_the_source() {
    let store = Arc::new(MemoryStore::new());
    let service = ExtractorService::new(store.clone());

    let good = block(1, vec![coinbase("cb1", 0, vec![output(0, 50.0, "N1miner")])]);
    let bad = block(
        2,
        vec![
            coinbase("cb2", 0, vec![output(0, 50.0, "N1miner")]),
            tx("greedy", 1, spend(&[("cb1", 0)]), vec![output(0, 60.0, "N1x")]),
        ],
    );
    let never = block(3, vec![coinbase("cb3", 0, vec![output(0, 50.0, "N1miner")])]);
    let mut source = ScriptedSource::new(vec![good, bad, never]);

    let err = service.start(&mut source).await.unwrap_err();
    assert!(matches!(err, ExtractorError::NegativeFee { ref tx_id, .. } if tx_id == "greedy"));
    assert!(source.closed);
    assert_eq!(source.acknowledged, vec![1]);

    // Nothing of the failing block was written
    assert!(store.get(Table::Blocks, &["block2".into()]).is_none());
    assert_eq!(store.count(Table::Blocks), 1);
}

#[tokio::test]
async fn dry_run_from_mid_chain_keeps_going() {
    let service = ExtractorService::new(Arc::new(DryRunStore::new()));

    // Spends an output from before the run; nothing can resolve it
    let mid_chain = block(
        500,
        vec![
            coinbase("cb500", 0, vec![output(0, 50.0, "N1miner")]),
            tx("t", 1, spend(&[("earlier", 0)]), vec![output(0, 1.0, "N1x")]),
        ],
    );
    let next = block(501, vec![coinbase("cb501", 0, vec![output(0, 50.0, "N1miner")])]);
    let mut source = ScriptedSource::new(vec![mid_chain, next]);

    let summary = service.start(&mut source).await.unwrap();
    assert_eq!(summary.blocks, 2);
    assert_eq!(summary.unresolved_inputs, 1);
    assert_eq!(summary.fee_volume, 5_000_000_000 - 100_000_000 + 5_000_000_000);
    assert_eq!(source.acknowledged, vec![500, 501]);
    assert!(!source.closed);
}

#[tokio::test]
async fn worker_acknowledges_every_block() {
    let service = ExtractorService::new(Arc::new(MemoryStore::new()));
    let mut source = ScriptedSource::new(vec![
        block(0, vec![coinbase("cb0", 0, vec![output(0, 50.0, "N1a")])]),
        block(1, vec![coinbase("cb1", 0, vec![output(0, 50.0, "N1b")])]),
    ]);

    let summary = service.start(&mut source).await.unwrap();
    assert_eq!(summary.blocks, 2);
    assert_eq!(summary.transactions, 2);
    assert_eq!(summary.fee_volume, 10_000_000_000);
    assert_eq!(source.acknowledged, vec![0, 1]);
    assert!(!source.closed);
}

#[tokio::test]
async fn sqlite_round_trip_with_reprocessing() {
    let dir = TempDir::new().unwrap();
    let store = SqlStore::open(&dir.path().join("namecoin.db")).await.unwrap();
    store.migrate().await.unwrap();
    let store = Arc::new(store);
    let service = ExtractorService::new(store.clone());

    let mut register = output(1, 0.01, "N1owner");
    register.script_pub_key.name_op = Some(json!({"op": "name_new", "hash": "0b4c5f"}));
    let genesis = block(0, vec![coinbase("cb0", 0, vec![output(0, 50.0, "N1miner")])]);
    let next = block(
        1,
        vec![
            coinbase("cb1", 0, vec![output(0, 50.0, "N1miner")]),
            tx(
                "spend",
                1,
                spend(&[("cb0", 0)]),
                vec![output(0, 49.98, "N1x"), register],
            ),
        ],
    );

    for msg in [&genesis, &next, &genesis, &next] {
        service.decompose(msg).await.unwrap();
    }

    let pool = store.pool();
    let count = |table: &'static str| {
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        async move { sqlx::query_scalar::<_, i64>(&sql).fetch_one(pool).await.unwrap() }
    };
    assert_eq!(count("blocks").await, 2);
    assert_eq!(count("transactions").await, 3);
    assert_eq!(count("vouts").await, 4);
    assert_eq!(count("vins").await, 3);
    assert_eq!(count("spks").await, 4);
    assert_eq!(count("name_ops").await, 1);
    assert_eq!(count("addresses").await, 3);

    let fee: i64 = sqlx::query_scalar("SELECT fee FROM transactions WHERE tx_id = 'spend'")
        .fetch_one(pool)
        .await
        .unwrap();
    assert_eq!(fee, 1_000_000);

    let prev: Option<String> =
        sqlx::query_scalar("SELECT prev_block_hash FROM blocks WHERE block_hash = 'block0'")
            .fetch_one(pool)
            .await
            .unwrap();
    assert!(prev.is_none());
}
