use std::collections::HashSet;

use anyhow::Result;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::models::{Conversation, Folder, FolderType, Identified, LatestArchive};
use crate::services::session::{keys, snapshot_json, SessionState, Snapshot, StoreOp};

/// Concatenate `existing` then `incoming`, keeping only the first record for
/// each id. Duplicates inside `incoming` are dropped too.
pub fn merge_by_id<T: Identified>(existing: Vec<T>, incoming: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    existing
        .into_iter()
        .chain(incoming)
        .filter(|item| seen.insert(item.id().to_string()))
        .collect()
}

/// The writes that make `history` current and select its last entry.
fn history_ops(history: &[Conversation]) -> Result<Vec<StoreOp>> {
    Ok(vec![
        StoreOp::set_json(keys::CONVERSATION_HISTORY, history)?,
        match history.last() {
            Some(last) => StoreOp::set_json(keys::SELECTED_CONVERSATION, last)?,
            None => StoreOp::remove(keys::SELECTED_CONVERSATION),
        },
    ])
}

fn stored<T: DeserializeOwned>(snapshot: &Snapshot, key: &str) -> Result<Vec<T>> {
    Ok(snapshot_json(snapshot, key)?.unwrap_or_default())
}

/// Operations over the session-persisted conversation history.
///
/// Every mutation is one store transaction: the affected keys are read,
/// recomputed and written back as a unit.
#[derive(Clone)]
pub struct HistoryService {
    state: SessionState,
}

impl HistoryService {
    pub fn new(state: SessionState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Merge an imported archive into the stored collections and select the
    /// last conversation of the merged history.
    ///
    /// A corrupt stored value aborts the merge before anything is written.
    pub async fn merge_import(&self, archive: LatestArchive) -> Result<LatestArchive> {
        let imported = (
            archive.history.len(),
            archive.folders.len(),
            archive.prompts.len(),
        );

        let merged = self
            .state
            .transact(
                &[keys::CONVERSATION_HISTORY, keys::FOLDERS, keys::PROMPTS],
                move |snapshot| {
                    let history = merge_by_id(
                        stored(snapshot, keys::CONVERSATION_HISTORY)?,
                        archive.history,
                    );
                    let folders = merge_by_id(stored(snapshot, keys::FOLDERS)?, archive.folders);
                    let prompts = merge_by_id(stored(snapshot, keys::PROMPTS)?, archive.prompts);

                    let mut ops = history_ops(&history)?;
                    ops.push(StoreOp::set_json(keys::FOLDERS, &folders)?);
                    ops.push(StoreOp::set_json(keys::PROMPTS, &prompts)?);
                    Ok((ops, LatestArchive::new(history, folders, prompts)))
                },
            )
            .await?;

        info!(
            "Merged import ({} conversations, {} folders, {} prompts); history now holds {}",
            imported.0,
            imported.1,
            imported.2,
            merged.history.len()
        );

        Ok(merged)
    }

    /// Drop every conversation and every chat folder. Prompt folders and
    /// prompts stay.
    pub async fn clear_conversations(&self) -> Result<()> {
        self.state
            .transact(&[keys::FOLDERS], |snapshot| {
                let kept: Vec<Folder> = stored::<Folder>(snapshot, keys::FOLDERS)?
                    .into_iter()
                    .filter(|f| f.kind != FolderType::Chat)
                    .collect();
                let ops = vec![
                    StoreOp::remove(keys::CONVERSATION_HISTORY),
                    StoreOp::remove(keys::SELECTED_CONVERSATION),
                    StoreOp::set_json(keys::FOLDERS, &kept)?,
                ];
                Ok((ops, ()))
            })
            .await?;
        info!("Cleared conversation history");
        Ok(())
    }

    /// Remove one conversation. The last remaining conversation becomes the
    /// selection; with none left the selection is cleared. Returns whether
    /// anything was removed.
    pub async fn delete_conversation(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.state
            .transact(&[keys::CONVERSATION_HISTORY], move |snapshot| {
                let history: Vec<Conversation> = stored(snapshot, keys::CONVERSATION_HISTORY)?;
                let before = history.len();
                let remaining: Vec<Conversation> =
                    history.into_iter().filter(|c| c.id != id).collect();
                if remaining.len() == before {
                    return Ok((Vec::new(), false));
                }
                Ok((history_ops(&remaining)?, true))
            })
            .await
    }

    pub async fn search(&self, term: &str) -> Result<Vec<Conversation>> {
        let history = self.state.conversations().await?;
        if term.is_empty() {
            return Ok(history);
        }
        Ok(history.into_iter().filter(|c| c.matches(term)).collect())
    }

    /// Flip chat bar visibility and return the new value.
    pub async fn toggle_chatbar(&self) -> Result<bool> {
        self.state
            .transact(&[keys::SHOW_CHATBAR], |snapshot| {
                let show = !snapshot_json::<bool>(snapshot, keys::SHOW_CHATBAR)?.unwrap_or(true);
                Ok((vec![StoreOp::set_json(keys::SHOW_CHATBAR, &show)?], show))
            })
            .await
    }
}
