use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::{Cli, Commands};
use crate::extraction::traits::PdfLoader;
use crate::extraction::{PopplerLoader, TesseractEngine, TextExtractor, UnavailablePdfLoader};
use crate::models::ImportedFile;
use crate::services::export;
use crate::services::import::ImportOutcome;
use crate::services::settings::ImportSettings;
use crate::services::{
    Database, HistoryService, ImportEvent, ImportService, MemoryStore, SessionState,
    SessionStore, SettingsService,
};

pub struct App {
    history: HistoryService,
    settings: ImportSettings,
}

impl App {
    pub async fn open(cli: &Cli) -> Result<Self> {
        let store: Arc<dyn SessionStore> = if cli.memory {
            Arc::new(MemoryStore::new())
        } else {
            let path = match &cli.store {
                Some(path) => path.clone(),
                None => Database::default_path()?,
            };
            info!("Using session store at {}", path.display());
            Arc::new(Database::open(&path)?)
        };
        Ok(Self::with_store(store).await)
    }

    pub async fn with_store(store: Arc<dyn SessionStore>) -> Self {
        let state = SessionState::new(store);
        let settings = SettingsService::load(&state).await;
        Self {
            history: HistoryService::new(state),
            settings,
        }
    }

    fn state(&self) -> &SessionState {
        self.history.state()
    }

    pub async fn run(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Import {
                file,
                no_pdf_engine,
            } => self.import(&file, !no_pdf_engine).await,
            Commands::Export { dir } => {
                let path = export::write_export(self.state(), &dir).await?;
                println!("Exported to {}", path.display());
                Ok(())
            }
            Commands::List { search } => self.list(search.as_deref().unwrap_or_default()).await,
            Commands::Delete { id } => {
                if self.history.delete_conversation(&id).await? {
                    println!("Deleted {}", id);
                } else {
                    println!("No conversation with id {}", id);
                }
                Ok(())
            }
            Commands::Clear => {
                self.history.clear_conversations().await?;
                println!("Conversation history cleared");
                Ok(())
            }
            Commands::ToggleChatbar => {
                let show = self.history.toggle_chatbar().await?;
                println!("Chat bar {}", if show { "shown" } else { "hidden" });
                Ok(())
            }
            Commands::Settings {
                max_ocr_pages,
                min_text_chars,
            } => self.update_settings(max_ocr_pages, min_text_chars).await,
        }
    }

    fn import_service(&self, pdf_engine: bool, events: mpsc::Sender<ImportEvent>) -> ImportService {
        let pdf_loader: Arc<dyn PdfLoader> = if pdf_engine {
            Arc::new(PopplerLoader::new())
        } else {
            Arc::new(UnavailablePdfLoader)
        };
        let extractor = TextExtractor::new(pdf_loader, Arc::new(TesseractEngine::new()))
            .with_options(self.settings.pdf_options(), self.settings.ocr_options());

        ImportService::new(Arc::new(extractor), self.history.clone()).with_events(events)
    }

    async fn import(&self, path: &Path, pdf_engine: bool) -> Result<()> {
        let (tx, mut rx) = mpsc::channel(4);
        let service = self.import_service(pdf_engine, tx);

        let cancel = CancellationToken::new();
        let ctrl_c = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, cancelling import");
                    cancel.cancel();
                }
            })
        };

        let file = ImportedFile::from_path(path).await?;
        let result = service.import(file, &cancel).await;
        ctrl_c.abort();
        drop(service);

        let outcome = result?;
        print_outcome(&outcome);

        while let Some(event) = rx.recv().await {
            match event {
                ImportEvent::AnalysisRequested {
                    conversation_id,
                    user_message,
                    ..
                } => println!(
                    "Analysis requested for {} ({} characters)",
                    conversation_id,
                    user_message.content.chars().count()
                ),
            }
        }
        Ok(())
    }

    async fn list(&self, term: &str) -> Result<()> {
        let selected = self.state().selected_conversation().await?.map(|c| c.id);
        let conversations = self.history.search(term).await?;
        if conversations.is_empty() {
            println!("No conversations");
        }
        for conversation in conversations {
            let marker = if selected.as_deref() == Some(conversation.id.as_str()) {
                "*"
            } else {
                " "
            };
            println!(
                "{} {}  {}  ({} messages)",
                marker,
                conversation.id,
                conversation.name,
                conversation.messages.len()
            );
        }
        Ok(())
    }

    async fn update_settings(
        &mut self,
        max_ocr_pages: Option<usize>,
        min_text_chars: Option<usize>,
    ) -> Result<()> {
        if max_ocr_pages.is_some() || min_text_chars.is_some() {
            if let Some(pages) = max_ocr_pages {
                self.settings.max_ocr_pages = pages;
            }
            if let Some(chars) = min_text_chars {
                self.settings.min_text_chars = chars;
            }
            SettingsService::save(self.state(), &self.settings).await?;
        }
        println!("{}", serde_json::to_string_pretty(&self.settings)?);
        Ok(())
    }
}

fn print_outcome(outcome: &ImportOutcome) {
    let imported = &outcome.imported;
    println!(
        "Imported {} file: {} conversations, {} folders, {} prompts",
        outcome.kind.as_str(),
        imported.history.len(),
        imported.folders.len(),
        imported.prompts.len()
    );
    if let Some(selected) = outcome.selected() {
        println!("Selected: {} ({})", selected.name, selected.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::session::keys;

    async fn memory_app() -> App {
        App::with_store(Arc::new(MemoryStore::new())).await
    }

    #[tokio::test]
    async fn test_import_json_then_delete() {
        let mut app = memory_app().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        tokio::fs::write(
            &path,
            r#"[{"id": "a", "name": "A", "messages": []}, {"id": "b", "name": "B", "messages": []}]"#,
        )
        .await
        .unwrap();

        app.run(Commands::Import {
            file: path,
            no_pdf_engine: false,
        })
        .await
        .unwrap();
        assert_eq!(app.state().conversations().await.unwrap().len(), 2);
        assert_eq!(app.state().selected_conversation().await.unwrap().unwrap().id, "b");

        app.run(Commands::Delete { id: "b".to_string() }).await.unwrap();
        assert_eq!(app.state().selected_conversation().await.unwrap().unwrap().id, "a");
    }

    #[tokio::test]
    async fn test_unsupported_file_is_rejected() {
        let mut app = memory_app().await;
        let err = app
            .run(Commands::Import {
                file: "notes.txt".into(),
                no_pdf_engine: false,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Unsupported file format"));
    }

    #[tokio::test]
    async fn test_pdf_without_engine_imports_guidance() {
        let mut app = memory_app().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Scan.PDF");
        tokio::fs::write(&path, b"%PDF-1.4").await.unwrap();

        app.run(Commands::Import {
            file: path,
            no_pdf_engine: true,
        })
        .await
        .unwrap();

        let selected = app.state().selected_conversation().await.unwrap().unwrap();
        assert_eq!(selected.name, "Medical Report Analysis: Scan.PDF");
        assert!(selected.messages[0]
            .content
            .starts_with("PDF Processing Notice:\n\nFile: Scan.PDF"));
    }

    #[tokio::test]
    async fn test_settings_persist_and_reload() {
        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        let mut app = App::with_store(store.clone()).await;
        app.run(Commands::Settings {
            max_ocr_pages: Some(2),
            min_text_chars: None,
        })
        .await
        .unwrap();

        assert!(store.get_item(keys::IMPORT_SETTINGS).await.unwrap().is_some());
        let reopened = App::with_store(store).await;
        assert_eq!(reopened.settings.max_ocr_pages, 2);
        assert_eq!(reopened.settings.min_text_chars, 100);
    }

    #[tokio::test]
    async fn test_export_writes_into_dir() {
        let mut app = memory_app().await;
        let dir = tempfile::tempdir().unwrap();
        app.run(Commands::Export {
            dir: dir.path().to_path_buf(),
        })
        .await
        .unwrap();

        let mut entries = std::fs::read_dir(dir.path()).unwrap();
        let name = entries.next().unwrap().unwrap().file_name();
        assert!(name.to_string_lossy().starts_with("chatbot_ui_history_"));
    }
}
