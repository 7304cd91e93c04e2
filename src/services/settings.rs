use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::session::{keys, SessionState};
use crate::extraction::types::{OcrOptions, PdfOptions, OEM_LSTM_ONLY, PSM_AUTO_OSD};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    pub min_text_chars: usize,
    pub max_ocr_pages: usize,
    pub render_scale: f32,
    pub ocr_languages: Vec<String>,
    pub ocr_timeout_secs: u64,
    pub page_segmentation: u8,
    pub engine_mode: u8,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            min_text_chars: 100,
            max_ocr_pages: 10,
            render_scale: 2.0,
            ocr_languages: vec!["eng".to_string(), "chi_sim".to_string()],
            ocr_timeout_secs: 120,
            page_segmentation: PSM_AUTO_OSD,
            engine_mode: OEM_LSTM_ONLY,
        }
    }
}

impl ImportSettings {
    pub fn pdf_options(&self) -> PdfOptions {
        PdfOptions {
            min_text_chars: self.min_text_chars,
            max_ocr_pages: self.max_ocr_pages,
            render_scale: self.render_scale,
        }
    }

    pub fn ocr_options(&self) -> OcrOptions {
        OcrOptions {
            languages: self.ocr_languages.clone(),
            page_segmentation: self.page_segmentation,
            engine_mode: self.engine_mode,
            timeout: Duration::from_secs(self.ocr_timeout_secs),
        }
    }
}

pub struct SettingsService;

impl SettingsService {
    pub async fn load(state: &SessionState) -> ImportSettings {
        match state.read_json(keys::IMPORT_SETTINGS).await {
            Ok(Some(settings)) => settings,
            Ok(None) => ImportSettings::default(),
            Err(e) => {
                warn!("Ignoring stored import settings: {:#}", e);
                ImportSettings::default()
            }
        }
    }

    pub async fn save(state: &SessionState, settings: &ImportSettings) -> Result<()> {
        state.write_json(keys::IMPORT_SETTINGS, settings).await
    }
}
