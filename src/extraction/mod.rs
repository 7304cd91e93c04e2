pub mod extractor;
pub mod poppler;
pub mod tesseract;
pub mod traits;
pub mod types;

pub use extractor::{TextExtractor, UnavailablePdfLoader};
pub use poppler::PopplerLoader;
pub use tesseract::TesseractEngine;
pub use types::ExtractionError;
