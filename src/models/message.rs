use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::id;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    /// Roles written by other clients, kept verbatim.
    #[serde(untagged)]
    Other(String),
}

impl Role {
    pub fn is_known(&self) -> bool {
        !matches!(self, Role::Other(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(
        default,
        deserialize_with = "id::loose_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    pub role: Role,
    pub content: String,
    /// Fields written by other clients (intermediate steps, feedback, ...),
    /// carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            role: Role::User,
            content: content.into(),
            extra: Map::new(),
        }
    }
}
