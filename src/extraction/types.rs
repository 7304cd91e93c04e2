use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF engine unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Failed(String),

    #[error("PDF tool timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),

    #[error("Recognition failed: {0}")]
    Failed(String),

    #[error("Recognition timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Failed to extract text from image: {0}")]
    Image(String),

    #[error(
        "Failed to extract text from PDF ({0}). This might be a scanned document or contain \
         complex formatting. Please try converting to an image (JPG/PNG) format."
    )]
    Pdf(String),

    #[error("Extraction cancelled")]
    Cancelled,
}

/// Tesseract page segmentation mode: automatic with orientation and script
/// detection.
pub const PSM_AUTO_OSD: u8 = 1;
/// Tesseract engine mode: LSTM neural network only.
pub const OEM_LSTM_ONLY: u8 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct OcrOptions {
    pub languages: Vec<String>,
    pub page_segmentation: u8,
    pub engine_mode: u8,
    pub timeout: Duration,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            languages: vec!["eng".to_string(), "chi_sim".to_string()],
            page_segmentation: PSM_AUTO_OSD,
            engine_mode: OEM_LSTM_ONLY,
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PdfOptions {
    /// Below this many characters the text layer is treated as missing.
    pub min_text_chars: usize,
    /// OCR never looks past this page.
    pub max_ocr_pages: usize,
    pub render_scale: f32,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            min_text_chars: 100,
            max_ocr_pages: 10,
            render_scale: 2.0,
        }
    }
}
