use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::models::{Conversation, Folder, Prompt};

/// Keys of the session-scoped state. Values are JSON text.
pub mod keys {
    pub const CONVERSATION_HISTORY: &str = "conversationHistory";
    pub const SELECTED_CONVERSATION: &str = "selectedConversation";
    pub const FOLDERS: &str = "folders";
    pub const PROMPTS: &str = "prompts";
    pub const SHOW_CHATBAR: &str = "showChatbar";
    pub const IMPORT_SETTINGS: &str = "importSettings";
}

/// One write inside a [`SessionStore::transact`] batch.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    Set { key: String, value: String },
    Remove { key: String },
}

impl StoreOp {
    pub fn set_json<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<Self> {
        Ok(StoreOp::Set {
            key: key.to_string(),
            value: serde_json::to_string(value)?,
        })
    }

    pub fn remove(key: &str) -> Self {
        StoreOp::Remove {
            key: key.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            StoreOp::Set { key, .. } | StoreOp::Remove { key } => key,
        }
    }
}

/// Values of the keys a transaction asked for. Absent keys are left out.
pub type Snapshot = HashMap<String, String>;

/// Computes the writes of a transaction from the values it read.
pub type Update = Box<dyn FnOnce(&Snapshot) -> Result<Vec<StoreOp>> + Send>;

/// String-keyed storage with session lifetime.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>>;
    async fn set_item(&self, key: &str, value: &str) -> Result<()>;
    async fn remove_item(&self, key: &str) -> Result<()>;

    /// Read `keys`, run `update` on their values and apply the writes it
    /// returns, all as one unit. No other writer can change the keys in
    /// between, and either every write lands or none does. An error from
    /// `update` writes nothing.
    async fn transact(&self, keys: &[&str], update: Update) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.remove(key);
        Ok(())
    }

    async fn transact(&self, keys: &[&str], update: Update) -> Result<()> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot: Snapshot = keys
            .iter()
            .filter_map(|key| items.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect();

        for op in update(&snapshot)? {
            match op {
                StoreOp::Set { key, value } => {
                    items.insert(key, value);
                }
                StoreOp::Remove { key } => {
                    items.remove(&key);
                }
            }
        }
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw).with_context(|| format!("Stored value for '{}' is not valid", key))
}

/// Parse the JSON value of `key` out of a transaction snapshot.
pub fn snapshot_json<T: DeserializeOwned>(snapshot: &Snapshot, key: &str) -> Result<Option<T>> {
    snapshot.get(key).map(|raw| decode(key, raw)).transpose()
}

/// Typed access to the collections kept in a [`SessionStore`]. Every read
/// goes back to the store; nothing is cached here.
#[derive(Clone)]
pub struct SessionState {
    store: Arc<dyn SessionStore>,
}

impl SessionState {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.store.get_item(key).await? {
            Some(raw) => Ok(Some(decode(key, &raw)?)),
            None => Ok(None),
        }
    }

    pub async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.store
            .set_item(key, &json)
            .await
            .with_context(|| format!("Failed to persist '{}'", key))
    }

    /// Run `f` inside [`SessionStore::transact`] and hand back the value it
    /// computed next to its writes.
    pub async fn transact<T, F>(&self, keys: &[&str], f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Snapshot) -> Result<(Vec<StoreOp>, T)> + Send + 'static,
    {
        let slot = Arc::new(Mutex::new(None));
        let out = slot.clone();
        self.store
            .transact(
                keys,
                Box::new(move |snapshot: &Snapshot| {
                    let (ops, value) = f(snapshot)?;
                    let written: Vec<&str> = ops.iter().map(StoreOp::key).collect();
                    debug!("Writing session keys: {}", written.join(", "));
                    *out.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
                    Ok(ops)
                }),
            )
            .await
            .with_context(|| format!("Failed to update {}", keys.join(", ")))?;

        let value = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        value.ok_or_else(|| anyhow!("Session store skipped the update"))
    }

    pub async fn conversations(&self) -> Result<Vec<Conversation>> {
        Ok(self
            .read_json(keys::CONVERSATION_HISTORY)
            .await?
            .unwrap_or_default())
    }

    #[cfg(test)]
    pub async fn save_conversations(&self, conversations: &[Conversation]) -> Result<()> {
        self.write_json(keys::CONVERSATION_HISTORY, conversations).await
    }

    pub async fn folders(&self) -> Result<Vec<Folder>> {
        Ok(self.read_json(keys::FOLDERS).await?.unwrap_or_default())
    }

    #[cfg(test)]
    pub async fn save_folders(&self, folders: &[Folder]) -> Result<()> {
        self.write_json(keys::FOLDERS, folders).await
    }

    pub async fn prompts(&self) -> Result<Vec<Prompt>> {
        Ok(self.read_json(keys::PROMPTS).await?.unwrap_or_default())
    }

    pub async fn selected_conversation(&self) -> Result<Option<Conversation>> {
        self.read_json(keys::SELECTED_CONVERSATION).await
    }

    #[cfg(test)]
    pub async fn select_conversation(&self, conversation: &Conversation) -> Result<()> {
        self.write_json(keys::SELECTED_CONVERSATION, conversation).await
    }

    /// The chat bar is shown unless it was explicitly hidden.
    #[cfg(test)]
    pub async fn show_chatbar(&self) -> Result<bool> {
        Ok(self.read_json(keys::SHOW_CHATBAR).await?.unwrap_or(true))
    }

    #[cfg(test)]
    pub async fn set_show_chatbar(&self, show: bool) -> Result<()> {
        self.write_json(keys::SHOW_CHATBAR, &show).await
    }
}
