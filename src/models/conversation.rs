use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::id::{self, FolderRef, Identified};
use super::message::{Message, Role};

pub const DEFAULT_CONVERSATION_NAME: &str = "New Conversation";

fn default_name() -> String {
    DEFAULT_CONVERSATION_NAME.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(deserialize_with = "id::loose")]
    pub id: String,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Non-owning reference into the folder collection.
    #[serde(default)]
    pub folder_id: Option<FolderRef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Conversation {
    pub fn first_user_message(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.role == Role::User)
    }

    /// Case-insensitive match over the name and every message body.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        let mut searchable = self.name.to_lowercase();
        for message in &self.messages {
            searchable.push(' ');
            searchable.push_str(&message.content.to_lowercase());
        }
        searchable.contains(&term)
    }
}

impl Identified for Conversation {
    fn id(&self) -> &str {
        &self.id
    }
}
