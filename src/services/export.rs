use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use tracing::info;

use crate::models::LatestArchive;
use crate::services::session::SessionState;

/// Snapshot the session as a latest-version archive. Collections that were
/// never written export as empty.
pub async fn export_archive(state: &SessionState) -> Result<LatestArchive> {
    Ok(LatestArchive::new(
        state.conversations().await?,
        state.folders().await?,
        state.prompts().await?,
    ))
}

/// `chatbot_ui_history_{month}-{day}.json`, month and day without padding.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("chatbot_ui_history_{}-{}.json", date.month(), date.day())
}

/// Write the export as pretty-printed JSON into `dir`, named after today's
/// local date. Returns the written path.
pub async fn write_export(state: &SessionState, dir: &Path) -> Result<PathBuf> {
    let archive = export_archive(state).await?;
    let json = serde_json::to_string_pretty(&archive)?;

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(export_file_name(Local::now().date_naive()));
    tokio::fs::write(&path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!(
        "Exported {} conversations to {}",
        archive.history.len(),
        path.display()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::{Folder, LATEST_VERSION};
    use crate::services::archive::normalize;
    use crate::services::conversation::medical_report_conversation;
    use crate::services::session::MemoryStore;

    #[test]
    fn test_file_name_is_unpadded() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(export_file_name(date), "chatbot_ui_history_3-7.json");
        let date = NaiveDate::from_ymd_opt(2024, 12, 25).unwrap();
        assert_eq!(export_file_name(date), "chatbot_ui_history_12-25.json");
    }

    #[tokio::test]
    async fn test_empty_session_exports_empty_collections() {
        let state = SessionState::new(Arc::new(MemoryStore::new()));
        let archive = export_archive(&state).await.unwrap();
        assert_eq!(archive, LatestArchive::default());
        assert_eq!(archive.version, LATEST_VERSION);
    }

    #[tokio::test]
    async fn test_written_export_imports_back_unchanged() {
        let state = SessionState::new(Arc::new(MemoryStore::new()));
        state
            .save_conversations(&[medical_report_conversation("ALT 88 U/L", "liver.pdf")])
            .await
            .unwrap();
        state.save_folders(&[Folder::chat("f1", "Labs")]).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = write_export(&state, &dir.path().join("out")).await.unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("chatbot_ui_history_"));
        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(raw.contains("\n  \"version\": 4"));

        let reimported = normalize(serde_json::from_str(&raw).unwrap()).unwrap();
        assert_eq!(reimported, export_archive(&state).await.unwrap());
    }
}
