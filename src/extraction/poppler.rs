//! PDF engine backed by the poppler command-line tools (`pdfinfo`,
//! `pdftotext`, `pdftoppm`).

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::{NamedTempFile, TempDir};
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::traits::{PdfDocument, PdfEngine, PdfLoader};
use super::types::PdfError;

const REQUIRED_TOOLS: [&str; 3] = ["pdfinfo", "pdftotext", "pdftoppm"];
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const POINTS_PER_INCH: f32 = 72.0;

pub struct PopplerLoader {
    timeout: Duration,
    available: OnceCell<bool>,
}

impl PopplerLoader {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            available: OnceCell::new(),
        }
    }

    async fn tools_available() -> bool {
        for tool in REQUIRED_TOOLS {
            let result = Command::new(tool)
                .arg("-v")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
            if let Err(e) = result {
                warn!("PDF tool '{}' is not usable: {}", tool, e);
                return false;
            }
        }
        info!("Poppler PDF tools available");
        true
    }
}

impl Default for PopplerLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PdfLoader for PopplerLoader {
    async fn try_load(&self) -> Option<Arc<dyn PdfEngine>> {
        let available = *self.available.get_or_init(Self::tools_available).await;
        if available {
            Some(Arc::new(PopplerEngine {
                timeout: self.timeout,
            }))
        } else {
            None
        }
    }
}

struct PopplerEngine {
    timeout: Duration,
}

#[async_trait]
impl PdfEngine for PopplerEngine {
    async fn open(&self, data: Bytes) -> Result<Box<dyn PdfDocument>, PdfError> {
        let file = tempfile::Builder::new()
            .prefix("medchat-")
            .suffix(".pdf")
            .tempfile()
            .map_err(|e| PdfError::Failed(format!("Failed to stage PDF: {}", e)))?;
        tokio::fs::write(file.path(), &data)
            .await
            .map_err(|e| PdfError::Failed(format!("Failed to stage PDF: {}", e)))?;

        let info = run(
            "pdfinfo",
            vec![file.path().into()],
            self.timeout,
        )
        .await?;
        let page_count = parse_page_count(&String::from_utf8_lossy(&info))
            .ok_or_else(|| PdfError::Failed("pdfinfo reported no page count".to_string()))?;
        debug!("Opened PDF with {} pages", page_count);

        Ok(Box::new(PopplerDocument {
            file,
            page_count,
            timeout: self.timeout,
        }))
    }
}

struct PopplerDocument {
    file: NamedTempFile,
    page_count: usize,
    timeout: Duration,
}

impl PopplerDocument {
    fn page_range(&self, page: usize) -> Vec<OsString> {
        vec![
            "-f".into(),
            page.to_string().into(),
            "-l".into(),
            page.to_string().into(),
        ]
    }
}

#[async_trait]
impl PdfDocument for PopplerDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    async fn text_items(&self, page: usize) -> Result<Vec<String>, PdfError> {
        let mut args = self.page_range(page);
        args.extend(["-enc".into(), "UTF-8".into(), self.file.path().into(), "-".into()]);
        let stdout = run("pdftotext", args, self.timeout).await?;

        Ok(String::from_utf8_lossy(&stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    async fn render_png(&self, page: usize, scale: f32) -> Result<Vec<u8>, PdfError> {
        let dir = TempDir::new()
            .map_err(|e| PdfError::Failed(format!("Failed to create render dir: {}", e)))?;
        let root: PathBuf = dir.path().join("page");
        let dpi = (POINTS_PER_INCH * scale).round() as u32;

        let mut args = self.page_range(page);
        args.extend([
            "-r".into(),
            dpi.to_string().into(),
            "-png".into(),
            "-singlefile".into(),
            self.file.path().into(),
            root.clone().into(),
        ]);
        run("pdftoppm", args, self.timeout).await?;

        tokio::fs::read(root.with_extension("png"))
            .await
            .map_err(|e| PdfError::Failed(format!("Rendered page {} is missing: {}", page, e)))
    }
}

async fn run(program: &str, args: Vec<OsString>, timeout: Duration) -> Result<Vec<u8>, PdfError> {
    let result = tokio::time::timeout(
        timeout,
        Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output(),
    )
    .await;

    match result {
        Ok(Ok(output)) if output.status.success() => Ok(output.stdout),
        Ok(Ok(output)) => Err(PdfError::Failed(format!(
            "{} exited with code {}: {}",
            program,
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stderr).trim()
        ))),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(PdfError::Unavailable(format!("{} not found", program)))
        }
        Ok(Err(e)) => Err(PdfError::Failed(format!("Failed to run {}: {}", program, e))),
        Err(_) => Err(PdfError::Timeout(timeout)),
    }
}

fn parse_page_count(info: &str) -> Option<usize> {
    info.lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|rest| rest.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page_count() {
        let info = "Title:          Lab Results\nProducer:       Skia/PDF\nPages:          3\nEncrypted:      no\n";
        assert_eq!(parse_page_count(info), Some(3));
        assert_eq!(parse_page_count("Title: x\n"), None);
    }
}
