use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::conversation::Conversation;
use super::folder::{Folder, LegacyFolder};
use super::prompt::Prompt;

pub const LATEST_VERSION: u32 = 4;

/// The canonical (version 4) export envelope. Every import converges here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestArchive {
    pub version: u32,
    #[serde(default)]
    pub history: Vec<Conversation>,
    #[serde(default)]
    pub folders: Vec<Folder>,
    #[serde(default)]
    pub prompts: Vec<Prompt>,
}

impl LatestArchive {
    pub fn new(history: Vec<Conversation>, folders: Vec<Folder>, prompts: Vec<Prompt>) -> Self {
        Self {
            version: LATEST_VERSION,
            history,
            folders,
            prompts,
        }
    }

    pub fn from_conversation(conversation: Conversation) -> Self {
        Self::new(vec![conversation], Vec::new(), Vec::new())
    }
}

impl Default for LatestArchive {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new(), Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ArchiveV3 {
    #[serde(default)]
    pub history: Vec<Conversation>,
    #[serde(default)]
    pub folders: Vec<Folder>,
}

/// A recognized archive, tagged by schema generation. V1 and V2 history is
/// kept as raw JSON because it must be sanitized before it can be typed.
#[derive(Debug, Clone, PartialEq)]
pub enum Archive {
    /// A bare array of conversations.
    V1(Vec<Value>),
    /// `{ history, folders }` with numeric folder ids and no version tag.
    V2 {
        history: Vec<Value>,
        folders: Vec<LegacyFolder>,
    },
    V3(ArchiveV3),
    V4(LatestArchive),
}

impl Archive {
    pub fn version(&self) -> u32 {
        match self {
            Archive::V1(_) => 1,
            Archive::V2 { .. } => 2,
            Archive::V3(_) => 3,
            Archive::V4(_) => 4,
        }
    }
}
