pub mod archive;
pub mod conversation;
pub mod database;
pub mod export;
pub mod history;
pub mod import;
pub mod session;
pub mod settings;

pub use database::Database;
pub use history::HistoryService;
pub use import::{ImportEvent, ImportService};
pub use session::{MemoryStore, SessionState, SessionStore};
pub use settings::SettingsService;
