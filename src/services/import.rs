use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::extraction::{ExtractionError, TextExtractor};
use crate::models::{Conversation, FileKind, ImportedFile, LatestArchive, Message};
use crate::services::archive::{self, ArchiveError};
use crate::services::conversation::medical_report_conversation;
use crate::services::history::HistoryService;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Unsupported file format. Please select a JSON, PDF, JPG, or PNG file.")]
    UnsupportedFileType(String),

    #[error("Invalid JSON file format: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("PDF processing failed: {0}")]
    Pdf(#[source] ExtractionError),

    #[error("Image OCR processing failed: {0}")]
    Image(#[source] ExtractionError),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to update session state: {0:#}")]
    Store(anyhow::Error),
}

impl ImportedFile {
    /// Dispatch on the file extension. JSON is parsed here, at the read
    /// boundary; binaries are carried as-is.
    pub fn from_bytes(file_name: &str, data: Bytes) -> Result<Self, ImportError> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(OsStr::to_str)
            .unwrap_or_default();
        let file_name = file_name.to_string();

        match FileKind::from_extension(ext) {
            Some(FileKind::Json) => {
                let data = serde_json::from_slice(&data).map_err(ImportError::InvalidJson)?;
                Ok(ImportedFile::Json { file_name, data })
            }
            Some(FileKind::Pdf) => Ok(ImportedFile::Pdf { file_name, data }),
            Some(FileKind::Image) => Ok(ImportedFile::Image { file_name, data }),
            None => Err(ImportError::UnsupportedFileType(ext.to_string())),
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self, ImportError> {
        let file_name = path
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or_default()
            .to_string();
        let ext = Path::new(&file_name)
            .extension()
            .and_then(OsStr::to_str)
            .unwrap_or_default();
        if FileKind::from_extension(ext).is_none() {
            return Err(ImportError::UnsupportedFileType(ext.to_string()));
        }

        let data = tokio::fs::read(path).await.map_err(|source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&file_name, Bytes::from(data))
    }
}

/// Turn an uploaded file into a canonical archive without touching session
/// state. Archives are normalized; reports become a single new conversation.
pub async fn import_file(
    extractor: &TextExtractor,
    file: ImportedFile,
    cancel: &CancellationToken,
) -> Result<LatestArchive, ImportError> {
    match file {
        ImportedFile::Json { data, .. } => Ok(archive::normalize(data)?),
        ImportedFile::Pdf { file_name, data } => {
            let text = extractor
                .extract_pdf(&file_name, &data, cancel)
                .await
                .map_err(ImportError::Pdf)?;
            Ok(LatestArchive::from_conversation(medical_report_conversation(
                &text, &file_name,
            )))
        }
        ImportedFile::Image { file_name, data } => {
            let text = extractor
                .extract_image(&data, cancel)
                .await
                .map_err(ImportError::Image)?;
            Ok(LatestArchive::from_conversation(medical_report_conversation(
                &text, &file_name,
            )))
        }
    }
}

/// Raised once an imported report is persisted and selected, for whatever
/// drives the chat model to pick up.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportEvent {
    AnalysisRequested {
        conversation_id: String,
        user_message: Message,
        conversation: Conversation,
    },
}

#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub kind: FileKind,
    /// What the file contributed, before merging.
    pub imported: LatestArchive,
    /// Session state after the merge.
    pub merged: LatestArchive,
}

impl ImportOutcome {
    pub fn selected(&self) -> Option<&Conversation> {
        self.merged.history.last()
    }
}

/// Full upload pipeline: read, extract or normalize, merge, notify.
///
/// Imports run one at a time. A second upload started while one is in
/// flight waits for the first to finish persisting.
pub struct ImportService {
    extractor: Arc<TextExtractor>,
    history: HistoryService,
    events: Option<mpsc::Sender<ImportEvent>>,
    in_flight: Mutex<()>,
}

impl ImportService {
    pub fn new(extractor: Arc<TextExtractor>, history: HistoryService) -> Self {
        Self {
            extractor,
            history,
            events: None,
            in_flight: Mutex::new(()),
        }
    }

    pub fn with_events(mut self, tx: mpsc::Sender<ImportEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub async fn import(
        &self,
        file: ImportedFile,
        cancel: &CancellationToken,
    ) -> Result<ImportOutcome, ImportError> {
        let _guard = self.in_flight.lock().await;
        let kind = file.kind();
        info!("Importing {} file '{}'", kind.as_str(), file.file_name());

        let imported = import_file(&self.extractor, file, cancel).await?;
        let merged = self
            .history
            .merge_import(imported.clone())
            .await
            .map_err(ImportError::Store)?;

        if kind.is_document() {
            if let Some(conversation) = imported.history.last() {
                self.request_analysis(conversation).await;
            }
        }

        Ok(ImportOutcome {
            kind,
            imported,
            merged,
        })
    }

    async fn request_analysis(&self, conversation: &Conversation) {
        let Some(tx) = &self.events else {
            return;
        };
        let Some(user_message) = conversation.first_user_message() else {
            warn!("No user message in conversation {}", conversation.id);
            return;
        };

        let event = ImportEvent::AnalysisRequested {
            conversation_id: conversation.id.clone(),
            user_message: user_message.clone(),
            conversation: conversation.clone(),
        };
        if tx.send(event).await.is_err() {
            warn!("Analysis listener is gone; conversation {} stays idle", conversation.id);
        }
    }
}
