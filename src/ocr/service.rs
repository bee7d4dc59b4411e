use image::DynamicImage;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use super::engine::{RecognizeParams, TextRecognizer};
use super::enhance::enhance_for_ocr;
use super::lines::{best_attempt, filter_noise, split_lines};
use super::preprocess::{CleanupParams, clean_for_ocr};
use super::OcrError;
use crate::config::OcrConfig;

const ENHANCE_CONTRAST: f32 = 2.0;
const ENHANCE_SHARPNESS: f32 = 2.0;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EnhancedOutcome {
    pub lines: Vec<String>,
    /// Page-segmentation mode of the winning attempt.
    pub psm: u8,
}

#[derive(Clone)]
pub struct OcrService {
    recognizer: Arc<dyn TextRecognizer>,
    cfg: OcrConfig,
    cleanup: CleanupParams,
}

impl OcrService {
    pub fn new(recognizer: Arc<dyn TextRecognizer>, cfg: OcrConfig) -> Self {
        Self {
            recognizer,
            cfg,
            cleanup: CleanupParams::default(),
        }
    }

    /// Binarizing cleanup, one whitelisted pass.
    pub async fn read_card(&self, bytes: Vec<u8>) -> Result<Vec<String>, OcrError> {
        let cleanup = self.cleanup.clone();
        let cleaned = tokio::task::spawn_blocking(move || {
            let img = decode(&bytes)?;
            Ok::<_, OcrError>(clean_for_ocr(&img, &cleanup))
        })
        .await
        .map_err(|e| OcrError::Worker(e.to_string()))??;

        debug!(
            width = cleaned.image.width(),
            height = cleaned.image.height(),
            skew = cleaned.skew_degrees,
            rotated = cleaned.rotated,
            upscaled = cleaned.upscaled,
            "image cleaned for OCR"
        );

        let params = RecognizeParams {
            languages: self.cfg.languages.clone(),
            psm: self.cfg.psm,
            whitelist: Some(self.cfg.whitelist.clone()).filter(|w| !w.is_empty()),
        };
        let text = self.recognizer.recognize(&cleaned.image, &params).await?;
        Ok(split_lines(&text))
    }

    /// Contrast/sharpness boost, one pass per candidate PSM, richest output wins.
    pub async fn read_card_enhanced(
        &self,
        bytes: Vec<u8>,
        filter: bool,
    ) -> Result<EnhancedOutcome, OcrError> {
        let enhanced = tokio::task::spawn_blocking(move || {
            let img = decode(&bytes)?;
            Ok::<_, OcrError>(enhance_for_ocr(&img, ENHANCE_CONTRAST, ENHANCE_SHARPNESS))
        })
        .await
        .map_err(|e| OcrError::Worker(e.to_string()))??;

        let psms: Vec<u8> = if self.cfg.enhanced_psms.is_empty() {
            vec![self.cfg.psm]
        } else {
            self.cfg.enhanced_psms.clone()
        };

        let mut attempts: Vec<(u8, String)> = Vec::with_capacity(psms.len());
        let mut last_err = None;
        for psm in psms {
            let params = RecognizeParams {
                languages: self.cfg.languages.clone(),
                psm,
                whitelist: None,
            };
            match self.recognizer.recognize(&enhanced, &params).await {
                Ok(text) => attempts.push((psm, text)),
                Err(e) => {
                    warn!(psm, error = %e, "OCR attempt failed");
                    last_err = Some(e);
                }
            }
        }

        let Some(idx) = best_attempt(attempts.iter().map(|(_, t)| t.as_str())) else {
            return Err(last_err.unwrap_or_else(|| OcrError::Worker("no OCR attempts".into())));
        };
        let (psm, text) = attempts.swap_remove(idx);
        let mut lines = split_lines(&text);
        if filter {
            lines = filter_noise(lines);
        }
        debug!(psm, lines = lines.len(), "enhanced OCR finished");
        Ok(EnhancedOutcome { lines, psm })
    }
}

fn decode(bytes: &[u8]) -> Result<DynamicImage, OcrError> {
    Ok(image::load_from_memory(bytes)?)
}
