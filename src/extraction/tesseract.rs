//! OCR through the `tesseract` CLI. Each recognition spawns a fresh process,
//! so a worker holds no engine state between calls.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::traits::{OcrEngine, OcrWorker};
use super::types::{OcrError, OcrOptions};

pub struct TesseractEngine {
    program: String,
}

impl TesseractEngine {
    pub fn new() -> Self {
        Self {
            program: "tesseract".to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn installed_languages(&self) -> Result<Vec<String>, OcrError> {
        let output = Command::new(&self.program)
            .arg("--list-langs")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| OcrError::Unavailable(format!("{}: {}", self.program, e)))?;

        // Older releases print the list on stderr.
        let mut listing = String::from_utf8_lossy(&output.stdout).into_owned();
        listing.push('\n');
        listing.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(parse_languages(&listing))
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn start(&self, options: &OcrOptions) -> Result<Box<dyn OcrWorker>, OcrError> {
        let installed = self.installed_languages().await?;
        let missing: Vec<&str> = options
            .languages
            .iter()
            .filter(|lang| !installed.contains(lang))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(OcrError::Unavailable(format!(
                "missing language data: {}",
                missing.join(", ")
            )));
        }

        debug!("Tesseract worker ready ({})", options.languages.join("+"));
        Ok(Box::new(TesseractWorker {
            program: self.program.clone(),
            args: recognize_args(options),
            timeout: options.timeout,
        }))
    }
}

struct TesseractWorker {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl TesseractWorker {
    async fn run(&self, image: &[u8]) -> Result<String, OcrError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OcrError::Unavailable(format!("{}: {}", self.program, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| OcrError::Failed("stdin not captured".to_string()))?;
        let image = image.to_vec();
        let writer = tokio::spawn(async move {
            let result = stdin.write_all(&image).await;
            drop(stdin);
            result
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| OcrError::Failed(e.to_string()))?;
        if let Ok(Err(e)) = writer.await {
            warn!("Failed to feed image to tesseract: {}", e);
        }

        if !output.status.success() {
            return Err(OcrError::Failed(format!(
                "tesseract exited with code {}: {}",
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl OcrWorker for TesseractWorker {
    async fn recognize(&mut self, image: &[u8]) -> Result<String, OcrError> {
        tokio::time::timeout(self.timeout, self.run(image))
            .await
            .map_err(|_| OcrError::Timeout(self.timeout))?
    }

    async fn terminate(self: Box<Self>) {
        debug!("Tesseract worker released");
    }
}

fn recognize_args(options: &OcrOptions) -> Vec<String> {
    vec![
        "stdin".to_string(),
        "stdout".to_string(),
        "-l".to_string(),
        options.languages.join("+"),
        "--psm".to_string(),
        options.page_segmentation.to_string(),
        "--oem".to_string(),
        options.engine_mode.to_string(),
    ]
}

fn parse_languages(listing: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("List of available languages"))
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognize_args() {
        let args = recognize_args(&OcrOptions::default());
        assert_eq!(
            args,
            vec!["stdin", "stdout", "-l", "eng+chi_sim", "--psm", "1", "--oem", "1"]
        );
    }

    #[test]
    fn test_parse_languages() {
        let listing = "List of available languages in \"/usr/share/tesseract-ocr/5/tessdata/\" (3):\nchi_sim\neng\nosd\n";
        assert_eq!(parse_languages(listing), vec!["chi_sim", "eng", "osd"]);
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let engine = TesseractEngine::with_program("medchat-no-such-tesseract");
        let err = engine.start(&OcrOptions::default()).await.err().unwrap();
        assert!(matches!(err, OcrError::Unavailable(_)));
    }
}
