//! Database schema definitions
//!
//! Monetary columns hold integer base units. List-valued columns and opaque
//! name-operation payloads are JSON text.

pub const CREATE_BLOCKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS blocks (
    block_hash VARCHAR(64) PRIMARY KEY,
    block_index BIGINT NOT NULL,
    prev_block_hash VARCHAR(64),
    timestamp TIMESTAMP NOT NULL,
    median_time BIGINT NOT NULL,
    difficulty DOUBLE PRECISION NOT NULL,
    bits VARCHAR(8) NOT NULL,
    nonce BIGINT NOT NULL,
    size BIGINT NOT NULL,
    version BIGINT NOT NULL,
    tx_volume BIGINT NOT NULL,
    tx_fees BIGINT NOT NULL
)
"#;

pub const CREATE_BLOCKS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_blocks_block_index ON blocks(block_index)";

pub const CREATE_TRANSACTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    tx_id VARCHAR(64) PRIMARY KEY,
    block_hash VARCHAR(64) NOT NULL,
    tx_index INTEGER NOT NULL,
    lock_time BIGINT NOT NULL,
    size BIGINT NOT NULL,
    version BIGINT NOT NULL,
    fee BIGINT,
    aux_block_header_hash VARCHAR(64)
)
"#;

pub const CREATE_TRANSACTIONS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_transactions_block_hash ON transactions(block_hash)";

pub const CREATE_VOUTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS vouts (
    tx_id VARCHAR(64) NOT NULL REFERENCES transactions(tx_id),
    vout_n INTEGER NOT NULL,
    value BIGINT NOT NULL CHECK (value >= 0),
    PRIMARY KEY (tx_id, vout_n)
)
"#;

pub const CREATE_SPKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS spks (
    tx_id VARCHAR(64) NOT NULL REFERENCES transactions(tx_id),
    vout_n INTEGER NOT NULL,
    addresses TEXT,
    asm TEXT NOT NULL,
    hex TEXT NOT NULL,
    req_sigs INTEGER,
    type VARCHAR(32) NOT NULL,
    PRIMARY KEY (tx_id, vout_n)
)
"#;

pub const CREATE_NAME_OPS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS name_ops (
    tx_id VARCHAR(64) NOT NULL REFERENCES transactions(tx_id),
    vout_n INTEGER NOT NULL,
    block_hash VARCHAR(64) NOT NULL,
    op VARCHAR(32) NOT NULL,
    hash VARCHAR(64),
    namespace TEXT,
    name TEXT,
    rand TEXT,
    value TEXT,
    PRIMARY KEY (tx_id, vout_n)
)
"#;

pub const CREATE_NAME_OPS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_name_ops_name ON name_ops(namespace, name)";

pub const CREATE_RARE_NAME_OPS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS rare_name_ops (
    tx_id VARCHAR(64) NOT NULL REFERENCES transactions(tx_id),
    vout_n INTEGER NOT NULL,
    block_hash VARCHAR(64) NOT NULL,
    json_dump TEXT NOT NULL,
    PRIMARY KEY (tx_id, vout_n)
)
"#;

pub const CREATE_VINS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS vins (
    tx_id VARCHAR(64) NOT NULL REFERENCES transactions(tx_id),
    vin_n INTEGER NOT NULL,
    coinbase TEXT,
    script_sig TEXT,
    ref_tx_id VARCHAR(64),
    ref_vout_n INTEGER,
    sequence BIGINT,
    PRIMARY KEY (tx_id, vin_n)
)
"#;

pub const CREATE_VINS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_vins_ref ON vins(ref_tx_id, ref_vout_n)";

pub const CREATE_AUXPOW_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS auxpow (
    block_hash VARCHAR(64) PRIMARY KEY,
    chain_index BIGINT NOT NULL,
    chain_merkle_branch TEXT NOT NULL,
    "index" BIGINT NOT NULL,
    merkle_branch TEXT NOT NULL,
    parent_block TEXT NOT NULL,
    tx_id VARCHAR(64) NOT NULL REFERENCES transactions(tx_id)
)
"#;

pub const CREATE_ADDRESSES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS addresses (
    address VARCHAR(64) PRIMARY KEY,
    block_first_seen VARCHAR(64) NOT NULL,
    is_valid BOOLEAN NOT NULL
)
"#;

/// Statements run in order by [`crate::database::SqlStore::migrate`].
pub const MIGRATIONS: &[&str] = &[
    CREATE_BLOCKS_TABLE,
    CREATE_BLOCKS_INDEX,
    CREATE_TRANSACTIONS_TABLE,
    CREATE_TRANSACTIONS_INDEX,
    CREATE_VOUTS_TABLE,
    CREATE_SPKS_TABLE,
    CREATE_NAME_OPS_TABLE,
    CREATE_NAME_OPS_INDEX,
    CREATE_RARE_NAME_OPS_TABLE,
    CREATE_VINS_TABLE,
    CREATE_VINS_INDEX,
    CREATE_AUXPOW_TABLE,
    CREATE_ADDRESSES_TABLE,
];
