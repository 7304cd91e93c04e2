use std::path::PathBuf;

use anyhow::{Context, Result};

pub const APP_NAME: &str = "medchat";
pub const STORE_FILE_NAME: &str = "session.db";

/// `$XDG_STATE_HOME/medchat`, falling back to `~/.local/state/medchat`.
pub fn state_dir() -> Result<PathBuf> {
    let base = match std::env::var("XDG_STATE_HOME") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let home = std::env::var("HOME").context("HOME not set")?;
            PathBuf::from(home).join(".local/state")
        }
    };
    Ok(base.join(APP_NAME))
}
