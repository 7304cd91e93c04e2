//! Recognition and upgrade of exported conversation archives.
//!
//! Four schema generations are in circulation. They overlap structurally, so
//! detection runs in a fixed order: bare array (V1), object with `folders`
//! and `history` but no `version` key (V2), `version == 3`, `version == 4`.
//! Whatever comes in leaves as a [`LatestArchive`].

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{
    Archive, ArchiveV3, Conversation, Folder, FolderRef, LatestArchive, LegacyFolder, Message,
    DEFAULT_CONVERSATION_NAME, LATEST_VERSION,
};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Unsupported data format")]
    UnsupportedFormat,

    #[error("Malformed version {version} archive: {source}")]
    Malformed {
        version: u32,
        #[source]
        source: serde_json::Error,
    },
}

pub fn detect(value: Value) -> Result<Archive, ArchiveError> {
    let mut obj = match value {
        Value::Array(items) => return Ok(Archive::V1(items)),
        Value::Object(obj) => obj,
        _ => return Err(ArchiveError::UnsupportedFormat),
    };

    if !obj.contains_key("version") && obj.contains_key("folders") && obj.contains_key("history") {
        return parse_v2(obj);
    }

    let version = obj.get("version").and_then(Value::as_f64);
    match version {
        Some(v) if v == 3.0 => typed(3, obj).map(Archive::V3),
        Some(v) if v == 4.0 => {
            // `4.0` is as good as `4`
            obj.insert("version".to_string(), Value::from(LATEST_VERSION));
            typed(4, obj).map(Archive::V4)
        }
        _ => Err(ArchiveError::UnsupportedFormat),
    }
}

fn typed<T: DeserializeOwned>(version: u32, obj: Map<String, Value>) -> Result<T, ArchiveError> {
    serde_json::from_value(Value::Object(obj))
        .map_err(|source| ArchiveError::Malformed { version, source })
}

fn parse_v2(mut obj: Map<String, Value>) -> Result<Archive, ArchiveError> {
    let history = match obj.remove("history") {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };
    let folders: Vec<LegacyFolder> = match obj.remove("folders") {
        None | Some(Value::Null) => Vec::new(),
        Some(folders) => serde_json::from_value(folders)
            .map_err(|source| ArchiveError::Malformed { version: 2, source })?,
    };
    Ok(Archive::V2 { history, folders })
}

/// Upgrade a recognized archive to the latest schema.
pub fn upgrade(archive: Archive) -> LatestArchive {
    match archive {
        Archive::V1(history) => LatestArchive::new(sanitize_history(history), Vec::new(), Vec::new()),
        Archive::V2 { history, folders } => LatestArchive::new(
            sanitize_history(history),
            folders.into_iter().map(Folder::from).collect(),
            Vec::new(),
        ),
        Archive::V3(ArchiveV3 { history, folders }) => {
            LatestArchive::new(history, folders, Vec::new())
        }
        Archive::V4(latest) => latest,
    }
}

/// Detect and upgrade in one step.
pub fn normalize(value: Value) -> Result<LatestArchive, ArchiveError> {
    let archive = detect(value)?;
    debug!("Detected archive version {}", archive.version());
    Ok(upgrade(archive))
}

/// Repair what can be repaired in legacy history and drop the rest.
///
/// - non-object entries are dropped
/// - a missing or empty id is replaced with a fresh UUID
/// - a missing name becomes "New Conversation"
/// - a missing `messages` array becomes empty; messages without a known role
///   or textual content are dropped
/// - `folderId` of `0`, `""` or absent means no folder; numeric ids become
///   strings to match the upgraded folders
pub fn sanitize_history(history: Vec<Value>) -> Vec<Conversation> {
    let total = history.len();
    let cleaned: Vec<Conversation> = history
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match sanitize_conversation(entry) {
            Some(conversation) => Some(conversation),
            None => {
                warn!("Dropping history entry {}: not a conversation object", index);
                None
            }
        })
        .collect();
    if cleaned.len() != total {
        debug!("Sanitized history: kept {} of {} entries", cleaned.len(), total);
    }
    cleaned
}

fn sanitize_conversation(entry: Value) -> Option<Conversation> {
    let Value::Object(mut obj) = entry else {
        return None;
    };

    let has_id = match obj.get("id") {
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(_)) => true,
        _ => false,
    };
    if !has_id {
        obj.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
    }

    if !matches!(obj.get("name"), Some(Value::String(_))) {
        obj.insert(
            "name".to_string(),
            Value::String(DEFAULT_CONVERSATION_NAME.to_string()),
        );
    }

    let messages = match obj.remove("messages") {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter(|m| {
                serde_json::from_value::<Message>(m.clone()).is_ok_and(|msg| msg.role.is_known())
            })
            .collect(),
        _ => Vec::new(),
    };
    obj.insert("messages".to_string(), Value::Array(messages));

    let folder = obj
        .get("folderId")
        .and_then(|v| serde_json::from_value::<FolderRef>(v.clone()).ok())
        .and_then(|f| f.id());
    obj.insert(
        "folderId".to_string(),
        folder.map_or(Value::Null, Value::String),
    );

    match serde_json::from_value(Value::Object(obj)) {
        Ok(conversation) => Some(conversation),
        Err(e) => {
            warn!("Conversation could not be repaired: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::{FolderType, Role};

    fn conversation(id: &str) -> Value {
        json!({
            "id": id,
            "name": format!("Chat {}", id),
            "messages": [{"role": "user", "content": "hi"}],
            "folderId": null,
        })
    }

    #[test]
    fn test_every_version_upgrades_to_latest() {
        let inputs = vec![
            json!([conversation("a")]),
            json!({"history": [conversation("a")], "folders": []}),
            json!({"version": 3, "history": [conversation("a")], "folders": []}),
            json!({"version": 4, "history": [conversation("a")], "folders": [], "prompts": []}),
        ];
        for input in inputs {
            let latest = normalize(input).unwrap();
            assert_eq!(latest.version, LATEST_VERSION);
            assert_eq!(latest.history.len(), 1);
            let serialized = serde_json::to_value(&latest).unwrap();
            assert_eq!(serialized["version"], 4);
            assert!(serialized["prompts"].is_array());
        }
    }

    #[test]
    fn test_detection_order() {
        assert_eq!(detect(json!([])).unwrap().version(), 1);
        assert_eq!(
            detect(json!({"history": [], "folders": [], "prompts": []}))
                .unwrap()
                .version(),
            2
        );
        assert_eq!(
            detect(json!({"version": 3, "history": [], "folders": []}))
                .unwrap()
                .version(),
            3
        );
        assert_eq!(
            detect(json!({"version": 4.0, "history": [], "folders": [], "prompts": []}))
                .unwrap()
                .version(),
            4
        );
    }

    #[test]
    fn test_unrecognized_shapes_are_unsupported() {
        for input in [
            json!({"version": 5, "history": []}),
            json!({"version": "4", "history": []}),
            json!({"history": []}),
            json!({"version": null, "folders": [], "history": []}),
            json!("history"),
            json!(null),
        ] {
            let err = normalize(input.clone()).unwrap_err();
            assert!(matches!(err, ArchiveError::UnsupportedFormat), "{input}");
            assert_eq!(err.to_string(), "Unsupported data format");
        }
    }

    #[test]
    fn test_v2_folders_are_stringified_and_typed_chat() {
        let latest = normalize(json!({
            "history": [conversation("a")],
            "folders": [{"id": 1687000000000u64, "name": "Labs"}, {"id": "x", "name": "Scans"}],
        }))
        .unwrap();

        assert_eq!(latest.folders.len(), 2);
        assert_eq!(latest.folders[0].id, "1687000000000");
        assert_eq!(latest.folders[0].kind, FolderType::Chat);
        assert_eq!(latest.folders[1].id, "x");
        assert!(latest.prompts.is_empty());
    }

    #[test]
    fn test_v2_null_history_defaults_to_empty() {
        let latest = normalize(json!({"history": null, "folders": null})).unwrap();
        assert!(latest.history.is_empty());
        assert!(latest.folders.is_empty());
    }

    #[test]
    fn test_v3_gains_empty_prompts() {
        let latest = normalize(json!({
            "version": 3,
            "history": [conversation("a")],
            "folders": [{"id": "f", "name": "Prompts", "type": "prompt"}],
        }))
        .unwrap();
        assert_eq!(latest.folders[0].kind, FolderType::Prompt);
        assert!(latest.prompts.is_empty());
    }

    #[test]
    fn test_v4_is_identity() {
        let input = json!({
            "version": 4,
            "history": [{
                "id": "a",
                "name": "Kept",
                "messages": [
                    {"role": "assistant", "content": "ok", "intermediateSteps": []},
                    {"role": "agent", "content": "lookup done"},
                ],
                "folderId": "f",
                "temperature": 0.5,
            }, {
                "id": "b",
                "name": "Unfiled",
                "messages": [],
                "folderId": 0,
            }],
            "folders": [{"id": "f", "name": "Custom", "type": "agent"}],
            "prompts": [{"id": "p", "name": "Summary", "description": "", "content": "Summarize", "folderId": null}],
        });
        let latest = normalize(input.clone()).unwrap();
        assert_eq!(latest.folders[0].kind, FolderType::Other("agent".to_string()));
        assert_eq!(latest.history[0].messages[1].role, Role::Other("agent".to_string()));
        assert_eq!(latest.history[1].folder_id.as_ref().and_then(FolderRef::id), None);
        assert_eq!(serde_json::to_value(&latest).unwrap(), input);
    }

    #[test]
    fn test_missing_folder_type_and_name_get_defaults() {
        let latest = normalize(json!({
            "version": 4,
            "history": [{"id": "a", "messages": []}],
            "folders": [{"id": "f", "name": "Labs"}],
            "prompts": [],
        }))
        .unwrap();
        assert_eq!(latest.folders[0].kind, FolderType::Chat);
        assert_eq!(latest.history[0].name, DEFAULT_CONVERSATION_NAME);

        let v3 = normalize(json!({
            "version": 3,
            "history": [{"id": "a", "messages": [], "folderId": 0}],
            "folders": [],
        }))
        .unwrap();
        assert_eq!(v3.history[0].name, DEFAULT_CONVERSATION_NAME);
        let serialized = serde_json::to_value(&v3).unwrap();
        assert_eq!(serialized["history"][0]["folderId"], 0);
    }

    #[test]
    fn test_malformed_v4_body() {
        let err = normalize(json!({"version": 4, "history": [{"name": "no id"}]})).unwrap_err();
        assert!(matches!(err, ArchiveError::Malformed { version: 4, .. }));
    }

    #[test]
    fn test_sanitize_repairs_legacy_history() {
        let history = sanitize_history(vec![
            json!("garbage"),
            json!({"name": "No id", "messages": [
                {"role": "user", "content": "keep"},
                {"role": "robot", "content": "drop"},
                {"role": "assistant"},
            ]}),
            json!({"id": 17, "folderId": 0}),
            json!({"id": 18, "folderId": 1687000000000u64}),
        ]);

        assert_eq!(history.len(), 3);
        assert!(!history[0].id.is_empty());
        assert_eq!(history[0].name, "No id");
        assert_eq!(history[0].messages.len(), 1);
        assert_eq!(history[0].messages[0].role, Role::User);
        assert_eq!(history[1].id, "17");
        assert_eq!(history[1].name, DEFAULT_CONVERSATION_NAME);
        assert!(history[1].messages.is_empty());
        assert!(history[1].folder_id.is_none());
        assert_eq!(
            history[2].folder_id,
            Some(FolderRef::Id("1687000000000".to_string()))
        );
    }
}
