//! Rows and SQL statements
//!
//! Every persisted entity is lowered to a [`Row`]: a table plus an ordered
//! list of column values. Stores turn rows into INSERT / UPDATE statements
//! keyed on the table's natural key.

use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::{
    AddressRecord, AuxPowRecord, BlockRecord, InputRecord, OutputRecord, ScriptRecord,
    TransactionRecord,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Blocks,
    Transactions,
    Vouts,
    Spks,
    NameOps,
    RareNameOps,
    Vins,
    AuxPow,
    Addresses,
}

impl Table {
    pub const ALL: [Table; 9] = [
        Table::Blocks,
        Table::Transactions,
        Table::Vouts,
        Table::Spks,
        Table::NameOps,
        Table::RareNameOps,
        Table::Vins,
        Table::AuxPow,
        Table::Addresses,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Blocks => "blocks",
            Table::Transactions => "transactions",
            Table::Vouts => "vouts",
            Table::Spks => "spks",
            Table::NameOps => "name_ops",
            Table::RareNameOps => "rare_name_ops",
            Table::Vins => "vins",
            Table::AuxPow => "auxpow",
            Table::Addresses => "addresses",
        }
    }

    /// Columns carrying the uniqueness constraint the upsert policy keys on.
    pub fn natural_key(&self) -> &'static [&'static str] {
        match self {
            Table::Blocks | Table::AuxPow => &["block_hash"],
            Table::Transactions => &["tx_id"],
            Table::Vouts | Table::Spks | Table::NameOps | Table::RareNameOps => {
                &["tx_id", "vout_n"]
            }
            Table::Vins => &["tx_id", "vin_n"],
            Table::Addresses => &["address"],
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Integer(v) => write!(f, "{}", v),
            SqlValue::Real(v) => write!(f, "{}", v),
            SqlValue::Text(v) => write!(f, "'{}'", v.replace('\'', "''")),
            SqlValue::Bool(v) => f.write_str(if *v { "TRUE" } else { "FALSE" }),
            SqlValue::Timestamp(v) => write!(f, "'{}'", v.to_rfc3339()),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl From<Value> for SqlValue {
    fn from(v: Value) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Render natural-key values the way they appear in logs and in-memory keys.
pub fn key_string(values: &[SqlValue]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    table: Table,
    columns: Vec<(&'static str, SqlValue)>,
}

impl Row {
    pub fn new(table: Table) -> Self {
        Self {
            table,
            columns: Vec::new(),
        }
    }

    pub fn with(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.columns.push((column, value.into()));
        self
    }

    pub fn table(&self) -> Table {
        self.table
    }

    pub fn columns(&self) -> &[(&'static str, SqlValue)] {
        &self.columns
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }

    /// Natural-key values in key-column order; missing columns read as NULL.
    pub fn key(&self) -> Vec<SqlValue> {
        self.table
            .natural_key()
            .iter()
            .map(|column| self.get(column).cloned().unwrap_or(SqlValue::Null))
            .collect()
    }

    pub fn key_string(&self) -> String {
        key_string(&self.key())
    }

    fn is_key_column(&self, column: &str) -> bool {
        self.table.natural_key().contains(&column)
    }

    pub fn insert_statement(&self) -> Statement {
        let names: Vec<String> = self.columns.iter().map(|(name, _)| quote(name)).collect();
        let placeholders = vec!["?"; self.columns.len()].join(", ");
        Statement {
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table,
                names.join(", "),
                placeholders
            ),
            params: self.columns.iter().map(|(_, value)| value.clone()).collect(),
        }
    }

    /// UPDATE of every non-key column, matched on the natural key.
    pub fn update_statement(&self) -> Statement {
        let mut assignments = Vec::new();
        let mut params = Vec::new();
        for (name, value) in &self.columns {
            if !self.is_key_column(name) {
                assignments.push(format!("{} = ?", quote(name)));
                params.push(value.clone());
            }
        }

        params.extend(self.key());

        Statement {
            sql: format!(
                "UPDATE {} SET {} WHERE {}",
                self.table,
                assignments.join(", "),
                self.key_conditions()
            ),
            params,
        }
    }

    /// DELETE matched on the natural key; other columns are ignored.
    pub fn delete_statement(&self) -> Statement {
        Statement {
            sql: format!("DELETE FROM {} WHERE {}", self.table, self.key_conditions()),
            params: self.key(),
        }
    }

    fn key_conditions(&self) -> String {
        self.table
            .natural_key()
            .iter()
            .map(|column| format!("{} = ?", quote(column)))
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

fn quote(column: &str) -> String {
    format!("\"{}\"", column)
}

/// A SQL statement with positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl fmt::Display for Statement {
    /// Parameters are substituted inline for logging and dry runs only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut params = self.params.iter();
        for (i, part) in self.sql.split('?').enumerate() {
            if i > 0 {
                match params.next() {
                    Some(value) => write!(f, "{}", value)?,
                    None => f.write_str("?")?,
                }
            }
            f.write_str(part)?;
        }
        Ok(())
    }
}

pub trait ToRow {
    fn to_row(&self) -> Row;
}

impl ToRow for BlockRecord {
    fn to_row(&self) -> Row {
        Row::new(Table::Blocks)
            .with("block_hash", self.block_hash.as_str())
            .with("block_index", self.block_index)
            .with("prev_block_hash", self.prev_block_hash.clone())
            .with("timestamp", self.timestamp)
            .with("median_time", self.median_time)
            .with("difficulty", self.difficulty)
            .with("bits", self.bits.as_str())
            .with("nonce", self.nonce)
            .with("size", self.size)
            .with("version", self.version)
            .with("tx_volume", self.tx_volume)
            .with("tx_fees", self.tx_fees)
    }
}

impl ToRow for TransactionRecord {
    fn to_row(&self) -> Row {
        Row::new(Table::Transactions)
            .with("tx_id", self.tx_id.as_str())
            .with("block_hash", self.block_hash.as_str())
            .with("tx_index", self.tx_index)
            .with("lock_time", self.lock_time)
            .with("size", self.size)
            .with("version", self.version)
            .with("fee", self.fee)
            .with("aux_block_header_hash", self.aux_block_header_hash.clone())
    }
}

impl ToRow for OutputRecord {
    fn to_row(&self) -> Row {
        Row::new(Table::Vouts)
            .with("tx_id", self.tx_id.as_str())
            .with("vout_n", self.vout_n)
            .with("value", self.value)
    }
}

impl ToRow for ScriptRecord {
    fn to_row(&self) -> Row {
        Row::new(Table::Spks)
            .with("tx_id", self.tx_id.as_str())
            .with("vout_n", self.vout_n)
            .with("addresses", self.addresses.clone().map(Value::from))
            .with("asm", self.asm.as_str())
            .with("hex", self.hex.as_str())
            .with("req_sigs", self.req_sigs)
            .with("type", self.script_type.as_str())
    }
}

impl ToRow for AddressRecord {
    fn to_row(&self) -> Row {
        Row::new(Table::Addresses)
            .with("address", self.address.as_str())
            .with("block_first_seen", self.block_first_seen.as_str())
            .with("is_valid", self.is_valid)
    }
}

impl ToRow for InputRecord {
    fn to_row(&self) -> Row {
        Row::new(Table::Vins)
            .with("tx_id", self.tx_id.as_str())
            .with("vin_n", self.vin_n)
            .with("coinbase", self.coinbase.clone())
            .with("script_sig", self.script_sig.clone())
            .with("ref_tx_id", self.ref_tx_id.clone())
            .with("ref_vout_n", self.ref_vout_n)
            .with("sequence", self.sequence)
    }
}

impl ToRow for AuxPowRecord {
    fn to_row(&self) -> Row {
        Row::new(Table::AuxPow)
            .with("block_hash", self.block_hash.as_str())
            .with("chain_index", self.chain_index)
            .with("chain_merkle_branch", Value::from(self.chain_merkle_branch.clone()))
            .with("index", self.index)
            .with("merkle_branch", Value::from(self.merkle_branch.clone()))
            .with("parent_block", self.parent_block.as_str())
            .with("tx_id", self.tx_id.as_str())
    }
}
