//! Identifier fields in exported archives are not consistently typed: older
//! exports carry numeric folder ids, and the UI writes `0` for "no folder".
//! These helpers accept either form and normalize to strings.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};

pub fn loose<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, found {}",
            other
        ))),
    }
}

/// `null`, `0` and `""` all mean "no reference".
pub fn loose_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// A folder reference exactly as it was written. The UI stores `0` when a
/// conversation is dragged out of every folder; keeping the raw form lets
/// current archives pass through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FolderRef {
    Id(String),
    Number(Number),
}

impl FolderRef {
    /// The referenced id. `0` and `""` reference nothing.
    pub fn id(&self) -> Option<String> {
        match self {
            FolderRef::Id(s) if s.is_empty() => None,
            FolderRef::Id(s) => Some(s.clone()),
            FolderRef::Number(n) if n.as_f64() == Some(0.0) => None,
            FolderRef::Number(n) => Some(n.to_string()),
        }
    }
}

/// Records that merge layers deduplicate by id.
pub trait Identified {
    fn id(&self) -> &str;
}
