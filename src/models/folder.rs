use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::id::{self, Identified};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderType {
    /// Folders written before folder types existed hold conversations.
    #[default]
    Chat,
    Prompt,
    #[serde(untagged)]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    #[serde(deserialize_with = "id::loose")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: FolderType,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Folder {
    pub fn chat(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: FolderType::Chat,
            extra: Map::new(),
        }
    }
}

impl Identified for Folder {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Folder shape written by exports that predate folder types. Ids were
/// numeric timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyFolder {
    #[serde(deserialize_with = "id::loose")]
    pub id: String,
    pub name: String,
}

impl From<LegacyFolder> for Folder {
    fn from(legacy: LegacyFolder) -> Self {
        Folder::chat(legacy.id, legacy.name)
    }
}
