use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::types::{OcrError, OcrOptions, PdfError};

/// Factory for an optional PDF capability. Returns `None` instead of failing
/// when the capability is missing from the host.
#[async_trait]
pub trait PdfLoader: Send + Sync {
    async fn try_load(&self) -> Option<Arc<dyn PdfEngine>>;
}

#[async_trait]
pub trait PdfEngine: Send + Sync {
    async fn open(&self, data: Bytes) -> Result<Box<dyn PdfDocument>, PdfError>;
}

/// Pages are 1-based.
#[async_trait]
pub trait PdfDocument: Send + Sync {
    fn page_count(&self) -> usize;

    /// The text runs of a page's text layer, in reading order.
    async fn text_items(&self, page: usize) -> Result<Vec<String>, PdfError>;

    /// Rasterize a page to PNG at `scale` times its natural size.
    async fn render_png(&self, page: usize, scale: f32) -> Result<Vec<u8>, PdfError>;
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Acquire a recognizer. Callers must `terminate` it when done.
    async fn start(&self, options: &OcrOptions) -> Result<Box<dyn OcrWorker>, OcrError>;
}

#[async_trait]
pub trait OcrWorker: Send {
    async fn recognize(&mut self, image: &[u8]) -> Result<String, OcrError>;

    async fn terminate(self: Box<Self>);
}
