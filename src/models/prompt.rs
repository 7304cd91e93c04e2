use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::id::{self, FolderRef, Identified};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    #[serde(deserialize_with = "id::loose")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub folder_id: Option<FolderRef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Identified for Prompt {
    fn id(&self) -> &str {
        &self.id
    }
}
