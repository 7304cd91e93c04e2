pub mod archive;
pub mod conversation;
pub mod folder;
pub mod id;
pub mod imported_file;
pub mod message;
pub mod prompt;

pub use archive::{Archive, ArchiveV3, LatestArchive, LATEST_VERSION};
pub use conversation::{Conversation, DEFAULT_CONVERSATION_NAME};
pub use folder::{Folder, FolderType, LegacyFolder};
pub use id::{FolderRef, Identified};
pub use imported_file::{FileKind, ImportedFile};
pub use message::{Message, Role};
pub use prompt::Prompt;
