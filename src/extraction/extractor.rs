use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::traits::{OcrEngine, OcrWorker, PdfDocument, PdfEngine, PdfLoader};
use super::types::{ExtractionError, OcrOptions, PdfOptions};

pub const NO_IMAGE_TEXT: &str = "No text content found in image";
pub const NO_PDF_OCR_TEXT: &str = "No text content found in PDF (OCR)";

/// A loader for hosts with no PDF support at all. PDFs then always resolve
/// to the guidance message.
pub struct UnavailablePdfLoader;

#[async_trait]
impl PdfLoader for UnavailablePdfLoader {
    async fn try_load(&self) -> Option<Arc<dyn PdfEngine>> {
        None
    }
}

/// Best-effort text extraction for uploaded reports.
///
/// Images go straight to OCR. PDFs walk a fallback chain: the embedded text
/// layer, then per-page rasterization + OCR, then a guidance message when no
/// PDF engine exists on the host.
pub struct TextExtractor {
    pdf_loader: Arc<dyn PdfLoader>,
    ocr: Arc<dyn OcrEngine>,
    pdf_options: PdfOptions,
    ocr_options: OcrOptions,
}

impl TextExtractor {
    pub fn new(pdf_loader: Arc<dyn PdfLoader>, ocr: Arc<dyn OcrEngine>) -> Self {
        Self {
            pdf_loader,
            ocr,
            pdf_options: PdfOptions::default(),
            ocr_options: OcrOptions::default(),
        }
    }

    pub fn with_options(mut self, pdf_options: PdfOptions, ocr_options: OcrOptions) -> Self {
        self.pdf_options = pdf_options;
        self.ocr_options = ocr_options;
        self
    }

    pub async fn extract_image(
        &self,
        data: &Bytes,
        cancel: &CancellationToken,
    ) -> Result<String, ExtractionError> {
        info!(
            "Starting image OCR ({} bytes, languages: {})",
            data.len(),
            self.ocr_options.languages.join("+")
        );
        if cancel.is_cancelled() {
            return Err(ExtractionError::Cancelled);
        }

        let mut worker = self
            .ocr
            .start(&self.ocr_options)
            .await
            .map_err(|e| ExtractionError::Image(e.to_string()))?;

        let result = tokio::select! {
            r = worker.recognize(data) => Some(r),
            _ = cancel.cancelled() => None,
        };
        worker.terminate().await;

        let text = match result {
            Some(r) => r.map_err(|e| ExtractionError::Image(e.to_string()))?,
            None => return Err(ExtractionError::Cancelled),
        };
        let text = text.trim();
        info!("Image OCR completed, extracted {} characters", text.chars().count());

        if text.is_empty() {
            Ok(NO_IMAGE_TEXT.to_string())
        } else {
            Ok(text.to_string())
        }
    }

    pub async fn extract_pdf(
        &self,
        file_name: &str,
        data: &Bytes,
        cancel: &CancellationToken,
    ) -> Result<String, ExtractionError> {
        info!(
            "Starting PDF text extraction for {} ({:.2} MB)",
            file_name,
            megabytes(data.len())
        );

        let Some(engine) = self.pdf_loader.try_load().await else {
            info!("No PDF engine at all, returning guidance message");
            return Ok(guidance_message(file_name, data.len()));
        };

        // The document opened for the text layer is reused for OCR.
        let doc = match engine.open(data.clone()).await {
            Ok(doc) => {
                if let Some(text) = self.text_layer(doc.as_ref(), cancel).await? {
                    return Ok(text);
                }
                info!("Text layer is missing or too short, trying OCR fallback");
                Some(doc)
            }
            Err(e) => {
                warn!("Text layer extraction failed, trying OCR fallback: {}", e);
                None
            }
        };

        self.ocr_fallback(engine.as_ref(), doc, data, cancel).await
    }

    /// `Ok(None)` means the text layer failed the quality gate.
    async fn text_layer(
        &self,
        doc: &dyn PdfDocument,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, ExtractionError> {
        let pages = doc.page_count();
        debug!("PDF loaded, {} pages", pages);

        let mut full_text = String::new();
        let mut total_chars = 0;

        for page in 1..=pages {
            if cancel.is_cancelled() {
                return Err(ExtractionError::Cancelled);
            }
            match doc.text_items(page).await {
                Ok(items) => {
                    let page_text = items.join(" ");
                    if !page_text.trim().is_empty() {
                        full_text.push_str(&format!("\n--- Page {} ---\n{}\n", page, page_text));
                        total_chars += page_text.chars().count();
                    }
                    debug!("Page {} processed, {} characters", page, page_text.chars().count());
                }
                Err(e) => warn!("Failed to extract text from page {}: {}", page, e),
            }
        }

        let text = full_text.trim();
        info!("Text layer extraction completed, {} characters", total_chars);

        if text.is_empty() || total_chars < self.pdf_options.min_text_chars {
            return Ok(None);
        }
        Ok(Some(text.to_string()))
    }

    async fn ocr_fallback(
        &self,
        engine: &dyn PdfEngine,
        doc: Option<Box<dyn PdfDocument>>,
        data: &Bytes,
        cancel: &CancellationToken,
    ) -> Result<String, ExtractionError> {
        let doc = match doc {
            Some(doc) => doc,
            None => engine
                .open(data.clone())
                .await
                .map_err(|e| ExtractionError::Pdf(format!("PDF OCR processing failed: {}", e)))?,
        };
        let mut worker = self
            .ocr
            .start(&self.ocr_options)
            .await
            .map_err(|e| ExtractionError::Pdf(format!("PDF OCR processing failed: {}", e)))?;

        let pages = doc.page_count().min(self.pdf_options.max_ocr_pages);
        if doc.page_count() > pages {
            info!(
                "OCR limited to the first {} of {} pages",
                pages,
                doc.page_count()
            );
        }

        let mut full_text = String::new();
        for page in 1..=pages {
            if cancel.is_cancelled() {
                worker.terminate().await;
                return Err(ExtractionError::Cancelled);
            }
            match self.ocr_page(doc.as_ref(), worker.as_mut(), page).await {
                Ok(text) => {
                    if !text.trim().is_empty() {
                        full_text.push_str(&format!("\n--- Page {} (OCR) ---\n{}\n", page, text));
                    }
                    debug!("OCR completed for page {}", page);
                }
                Err(e) => warn!("Failed to OCR page {}: {}", page, e),
            }
        }
        worker.terminate().await;

        let text = full_text.trim();
        if text.is_empty() {
            Ok(NO_PDF_OCR_TEXT.to_string())
        } else {
            Ok(text.to_string())
        }
    }

    async fn ocr_page(
        &self,
        doc: &dyn PdfDocument,
        worker: &mut dyn OcrWorker,
        page: usize,
    ) -> Result<String, String> {
        let image = doc
            .render_png(page, self.pdf_options.render_scale)
            .await
            .map_err(|e| e.to_string())?;
        worker.recognize(&image).await.map_err(|e| e.to_string())
    }
}

fn megabytes(len: usize) -> f64 {
    len as f64 / 1024.0 / 1024.0
}

/// Returned instead of an error when the host has no way to read PDFs.
pub fn guidance_message(file_name: &str, size: usize) -> String {
    format!(
        "PDF Processing Notice:

File: {} ({:.2} MB)

PDF text extraction is currently unavailable on this system.

To analyze your medical report, please try one of these alternatives:

1. RECOMMENDED: Convert your PDF to an image (JPG/PNG) and upload the image instead
   - Take a screenshot of each page
   - Use a PDF-to-image converter
   - Image OCR works well on scanned reports

2. Copy and paste the text directly into a new conversation
   - Open your PDF in a viewer
   - Select and copy the text content
   - Start a new conversation and paste the content

3. Try uploading again
   - The PDF tools may become available after a restart

Image uploads usually give the best results for medical reports.",
        file_name,
        megabytes(size)
    )
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::extraction::types::{OcrError, PdfError};

    #[derive(Clone, Default)]
    pub struct FakePage {
        pub items: Vec<String>,
        /// What OCR will "see" on the rendered page; `None` makes rendering fail.
        pub scanned: Option<String>,
        /// Makes reading the text layer of this page fail.
        pub corrupt_text: bool,
    }

    impl FakePage {
        pub fn text(items: &[&str]) -> Self {
            Self {
                items: items.iter().map(|s| s.to_string()).collect(),
                scanned: Some(items.join(" ")),
                corrupt_text: false,
            }
        }

        pub fn scanned(text: &str) -> Self {
            Self {
                items: Vec::new(),
                scanned: Some(text.to_string()),
                corrupt_text: false,
            }
        }

        pub fn corrupt(scanned: &str) -> Self {
            Self {
                corrupt_text: true,
                ..Self::scanned(scanned)
            }
        }
    }

    pub struct FakeDocument {
        pages: Vec<FakePage>,
        pub rendered: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PdfDocument for FakeDocument {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        async fn text_items(&self, page: usize) -> Result<Vec<String>, PdfError> {
            let page_data = &self.pages[page - 1];
            if page_data.corrupt_text {
                return Err(PdfError::Failed(format!("page {} has a broken content stream", page)));
            }
            Ok(page_data.items.clone())
        }

        async fn render_png(&self, page: usize, scale: f32) -> Result<Vec<u8>, PdfError> {
            assert_eq!(scale, 2.0);
            self.rendered.fetch_add(1, Ordering::SeqCst);
            self.pages[page - 1]
                .scanned
                .clone()
                .map(String::into_bytes)
                .ok_or_else(|| PdfError::Failed(format!("page {} does not render", page)))
        }
    }

    #[derive(Default)]
    pub struct FakePdf {
        pub pages: Vec<FakePage>,
        pub broken: bool,
        pub rendered: Arc<AtomicUsize>,
        pub opened: AtomicUsize,
    }

    #[async_trait]
    impl PdfEngine for FakePdf {
        async fn open(&self, _data: Bytes) -> Result<Box<dyn PdfDocument>, PdfError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            if self.broken {
                return Err(PdfError::Failed("Invalid PDF structure".to_string()));
            }
            Ok(Box::new(FakeDocument {
                pages: self.pages.clone(),
                rendered: self.rendered.clone(),
            }))
        }
    }

    pub struct FakeLoader(pub Option<Arc<FakePdf>>);

    #[async_trait]
    impl PdfLoader for FakeLoader {
        async fn try_load(&self) -> Option<Arc<dyn PdfEngine>> {
            self.0.clone().map(|pdf| pdf as Arc<dyn PdfEngine>)
        }
    }

    /// Recognizes an image by reading its bytes back as UTF-8. The literal
    /// image `unreadable` fails recognition.
    #[derive(Default)]
    pub struct FakeOcr {
        pub refuse_start: bool,
        pub started: AtomicUsize,
        pub terminated: Arc<AtomicUsize>,
    }

    struct FakeWorker {
        terminated: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl OcrEngine for FakeOcr {
        async fn start(&self, options: &OcrOptions) -> Result<Box<dyn OcrWorker>, OcrError> {
            assert_eq!(options.languages, vec!["eng", "chi_sim"]);
            if self.refuse_start {
                return Err(OcrError::Unavailable("no language data".to_string()));
            }
            self.started.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeWorker {
                terminated: self.terminated.clone(),
            }))
        }
    }

    #[async_trait]
    impl OcrWorker for FakeWorker {
        async fn recognize(&mut self, image: &[u8]) -> Result<String, OcrError> {
            if image == b"unreadable" {
                return Err(OcrError::Failed("garbled image".to_string()));
            }
            // Images prefixed with "slow:" take a while to recognize.
            if let Some(rest) = image.strip_prefix(b"slow:") {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                return Ok(String::from_utf8_lossy(rest).into_owned());
            }
            Ok(String::from_utf8_lossy(image).into_owned())
        }

        async fn terminate(self: Box<Self>) {
            self.terminated.fetch_add(1, Ordering::SeqCst);
        }
    }
}
