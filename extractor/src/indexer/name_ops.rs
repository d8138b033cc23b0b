//! Name operations embedded in output scripts
//!
//! `name_new` commits to a hash, `name_firstupdate` registers a name and
//! `name_update` renews it. Anything else, or a known operation missing a
//! field it needs, is kept as an opaque JSON document for manual inspection.
//! No check is made that operations are consistent with each other.

use serde_json::Value;
use tracing::warn;

use crate::database::{Row, Table};

pub const NAME_NEW: &str = "name_new";
pub const NAME_FIRSTUPDATE: &str = "name_firstupdate";
pub const NAME_UPDATE: &str = "name_update";

#[derive(Debug, Clone, PartialEq)]
pub struct NameUpdate {
    pub namespace: String,
    pub name: String,
    pub rand: Option<String>,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NameOperation {
    New { hash: String },
    FirstUpdate(NameUpdate),
    Update(NameUpdate),
    Other(Value),
}

/// Split a raw name on its first `/`. Further separators are dropped from
/// the name; without any separator the namespace is empty.
pub fn split_name(raw: &str) -> (String, String) {
    match raw.split_once('/') {
        Some((namespace, rest)) => (namespace.to_string(), rest.replace('/', "")),
        None => (String::new(), raw.to_string()),
    }
}

fn parse_update(payload: &Value) -> Option<NameUpdate> {
    let (namespace, name) = split_name(payload.get("name")?.as_str()?);
    let value = payload.get("value")?.clone();
    let rand = payload
        .get("rand")
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(NameUpdate {
        namespace,
        name,
        rand,
        value,
    })
}

pub fn classify(payload: &Value) -> NameOperation {
    let op = payload.get("op").and_then(Value::as_str).unwrap_or_default();
    let parsed = match op {
        NAME_NEW => payload
            .get("hash")
            .and_then(Value::as_str)
            .map(|hash| NameOperation::New {
                hash: hash.to_string(),
            }),
        NAME_FIRSTUPDATE => parse_update(payload).map(NameOperation::FirstUpdate),
        NAME_UPDATE => parse_update(payload).map(NameOperation::Update),
        _ => return NameOperation::Other(payload.clone()),
    };

    parsed.unwrap_or_else(|| {
        warn!(op, "Name operation is missing required fields, storing it as a rare operation");
        NameOperation::Other(payload.clone())
    })
}

impl NameOperation {
    pub fn op(&self) -> &'static str {
        match self {
            NameOperation::New { .. } => NAME_NEW,
            NameOperation::FirstUpdate(_) => NAME_FIRSTUPDATE,
            NameOperation::Update(_) => NAME_UPDATE,
            NameOperation::Other(_) => "other",
        }
    }

    /// Row for `name_ops`, or `rare_name_ops` for [`NameOperation::Other`].
    pub fn to_row(&self, tx_id: &str, vout_n: u32, block_hash: &str) -> Row {
        match self {
            NameOperation::Other(payload) => Row::new(Table::RareNameOps)
                .with("tx_id", tx_id)
                .with("vout_n", vout_n)
                .with("block_hash", block_hash)
                .with("json_dump", payload.clone()),
            NameOperation::New { hash } => Row::new(Table::NameOps)
                .with("tx_id", tx_id)
                .with("vout_n", vout_n)
                .with("block_hash", block_hash)
                .with("op", self.op())
                .with("hash", hash.as_str())
                .with("namespace", None::<String>)
                .with("name", None::<String>)
                .with("rand", None::<String>)
                .with("value", None::<String>),
            NameOperation::FirstUpdate(update) | NameOperation::Update(update) => {
                Row::new(Table::NameOps)
                    .with("tx_id", tx_id)
                    .with("vout_n", vout_n)
                    .with("block_hash", block_hash)
                    .with("op", self.op())
                    .with("hash", None::<String>)
                    .with("namespace", update.namespace.as_str())
                    .with("name", update.name.as_str())
                    .with("rand", update.rand.clone())
                    .with("value", update.value.clone())
            }
        }
    }
}
