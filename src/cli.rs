use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "medchat")]
#[command(version)]
#[command(about = "Import medical reports and chat archives into a local session")]
pub struct Cli {
    /// Session store file (defaults to the XDG state directory)
    #[arg(long, global = true, conflicts_with = "memory")]
    pub store: Option<PathBuf>,

    /// Use a throwaway in-memory session
    #[arg(long, global = true)]
    pub memory: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import a chat archive (.json) or a medical report (.pdf, .jpg, .jpeg, .png)
    Import {
        file: PathBuf,

        /// Skip the PDF tools; PDFs yield a guidance message instead of text
        #[arg(long)]
        no_pdf_engine: bool,
    },

    /// Write the session to chatbot_ui_history_<month>-<day>.json
    Export {
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },

    /// List conversations, the selected one marked with *
    List {
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Delete one conversation
    Delete { id: String },

    /// Delete every conversation and chat folder
    Clear,

    /// Show or hide the chat bar
    #[command(name = "toggle-chatbar")]
    ToggleChatbar,

    /// Show import settings, updating any that are given
    Settings {
        #[arg(long)]
        max_ocr_pages: Option<usize>,

        #[arg(long)]
        min_text_chars: Option<usize>,
    },
}
