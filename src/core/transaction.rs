//! Transaction records and their pre-validation counterpart.

use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt::Display;
use std::str::FromStr;

pub const DEFAULT_CATEGORY: &str = "other";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Cash,
    Stock,
    Crypto,
}

impl AssetType {
    pub const ALL: [AssetType; 3] = [AssetType::Cash, AssetType::Stock, AssetType::Crypto];

    /// Applies the casing convention for codes of this asset type.
    pub fn normalize_code(&self, code: &str) -> String {
        match self {
            AssetType::Cash => code.trim().to_lowercase(),
            AssetType::Stock | AssetType::Crypto => code.trim().to_uppercase(),
        }
    }
}

impl Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                AssetType::Cash => "cash",
                AssetType::Stock => "stock",
                AssetType::Crypto => "crypto",
            }
        )
    }
}

impl FromStr for AssetType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(AssetType::Cash),
            "stock" => Ok(AssetType::Stock),
            "crypto" => Ok(AssetType::Crypto),
            _ => Err(anyhow::anyhow!("Invalid asset type: {}", s)),
        }
    }
}

/// A validated transaction that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub name: String,
    pub amount: f64,
    pub date: i64,
    pub category: String,
    pub asset_type: AssetType,
    pub currency: String,
}

impl NewTransaction {
    pub fn with_id(self, id: impl Into<String>) -> Transaction {
        Transaction {
            id: id.into(),
            name: self.name,
            amount: self.amount,
            date: self.date,
            category: self.category,
            asset_type: self.asset_type,
            currency: self.currency,
        }
    }
}

/// A canonical, persisted transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub name: String,
    pub amount: f64,
    pub date: i64,
    pub category: String,
    pub asset_type: AssetType,
    pub currency: String,
}

/// Raw, untyped field set as it arrives from a parser or a JSON payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportCandidate {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub amount: Option<String>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", alias = "assettype")]
    pub asset_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub currency: Option<String>,
}

fn as_text(value: Option<Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    }
}

// JSON payloads carry amounts as numbers; keep them as text until validation.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(as_text(Option::<Value>::deserialize(deserializer)?))
}

// A numeric JSON date is epoch milliseconds of any sign; it is carried as an
// RFC 3339 timestamp so validation reads back the same instant.
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => {
            let timestamp = n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.round() as i64))
                .and_then(DateTime::from_timestamp_millis)
                .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true));
            Ok(timestamp.or_else(|| Some(n.to_string())))
        }
        other => Ok(as_text(other)),
    }
}
