//! Business-card OCR: image cleanup, recognizer seam and line post-processing.
//!
//! Layout:
//! - `preprocess.rs`: binarizing cleanup pipeline and deskew
//! - `enhance.rs`: contrast/sharpness boost for the multi-pass variant
//! - `engine.rs`: `TextRecognizer` trait and the tesseract CLI engine
//! - `lines.rs`: line splitting, quality filter, best-attempt selection
//! - `service.rs`: the two OCR flows used by the HTTP handlers

pub mod engine;
pub mod enhance;
pub mod lines;
pub mod preprocess;
pub mod service;

use axum::http::StatusCode;
use thiserror::Error as ThisError;

pub use engine::{RecognizeParams, TesseractCli, TextRecognizer};
pub use preprocess::{CleanupParams, Cleaned};
pub use service::{EnhancedOutcome, OcrService};

#[derive(Debug, ThisError)]
pub enum OcrError {
    #[error("cannot decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("OCR engine unavailable: {0}")]
    EngineUnavailable(std::io::Error),

    #[error("OCR engine exited with {status}: {stderr}")]
    EngineFailed { status: String, stderr: String },

    #[error("OCR engine timed out after {0}s")]
    Timeout(u64),

    #[error("image processing task failed: {0}")]
    Worker(String),
}

impl OcrError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            OcrError::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            OcrError::EngineUnavailable(_)
            | OcrError::EngineFailed { .. }
            | OcrError::Timeout(_) => StatusCode::BAD_GATEWAY,
            OcrError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
