//! Read-only chain queries: balances and transaction lookups
//!
//! V1 nodes wrap results in `{"success": true, <name>: ...}` and use numbers
//! for amounts; V2 nodes wrap in `{"data": ...}` and often use strings.

use crate::config::ApiVersion;
use crate::error::{ClientError, Result};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    #[serde(deserialize_with = "flexible_u64")]
    pub balance: u64,
    #[serde(default, deserialize_with = "flexible_opt_u64")]
    pub unconfirmed_balance: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: String,
    #[serde(default, alias = "blockId")]
    pub blockid: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(deserialize_with = "flexible_u64")]
    pub amount: u64,
    #[serde(default, deserialize_with = "flexible_u64")]
    pub fee: u64,
    #[serde(default, alias = "sender")]
    pub sender_id: Option<String>,
    #[serde(default, alias = "recipient")]
    pub recipient_id: Option<String>,
    #[serde(default)]
    pub vendor_field: Option<String>,
    #[serde(default)]
    pub confirmations: Option<u64>,
    /// Seconds since the network epoch
    #[serde(default, deserialize_with = "epoch_seconds")]
    pub timestamp: Option<u64>,
}

pub fn parse_balance(api_version: ApiVersion, body: Value) -> Result<AccountBalance> {
    match api_version {
        ApiVersion::V1 => decode(check_v1(body)?, "balance"),
        ApiVersion::V2 => decode(unwrap_field(body, "data")?, "wallet"),
    }
}

pub fn parse_transaction(api_version: ApiVersion, body: Value) -> Result<TransactionRecord> {
    let inner = match api_version {
        ApiVersion::V1 => unwrap_field(check_v1(body)?, "transaction")?,
        ApiVersion::V2 => unwrap_field(body, "data")?,
    };
    decode(inner, "transaction")
}

pub fn parse_transactions(api_version: ApiVersion, body: Value) -> Result<Vec<TransactionRecord>> {
    let inner = match api_version {
        ApiVersion::V1 => unwrap_field(check_v1(body)?, "transactions")?,
        ApiVersion::V2 => unwrap_field(body, "data")?,
    };
    decode(inner, "transactions")
}

fn check_v1(body: Value) -> Result<Value> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        let message = body
            .get("error")
            .or_else(|| body.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("request failed");
        return Err(ClientError::MalformedResponse(message.to_string()));
    }
    Ok(body)
}

fn unwrap_field(mut body: Value, name: &str) -> Result<Value> {
    body.get_mut(name)
        .map(Value::take)
        .ok_or_else(|| ClientError::MalformedResponse(format!("missing `{}`", name)))
}

fn decode<T: DeserializeOwned>(value: Value, what: &str) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| ClientError::MalformedResponse(format!("{}: {}", what, e)))
}

fn value_to_u64<E: de::Error>(value: &Value) -> std::result::Result<u64, E> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| E::custom(format!("{} is not an unsigned integer", n))),
        Value::String(s) => s
            .parse()
            .map_err(|_| E::custom(format!("{:?} is not an unsigned integer", s))),
        other => Err(E::custom(format!("expected amount, got {}", other))),
    }
}

fn flexible_u64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    value_to_u64(&Value::deserialize(deserializer)?)
}

fn flexible_opt_u64<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<u64>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        value => value_to_u64(&value).map(Some),
    }
}

/// V1 sends a bare number, V2 an object with an `epoch` field.
fn epoch_seconds<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<u64>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Object(map) => map
            .get("epoch")
            .map(|epoch| value_to_u64::<D::Error>(epoch))
            .transpose(),
        value => value_to_u64(&value).map(Some),
    }
}
