use async_trait::async_trait;
use image::{GrayImage, ImageFormat};
use std::io::Cursor;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::OcrError;
use crate::config::OcrConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizeParams {
    pub languages: String,
    pub psm: u8,
    pub whitelist: Option<String>,
}

/// An external text-recognition engine.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: &GrayImage, params: &RecognizeParams)
    -> Result<String, OcrError>;
}

/// Runs the `tesseract` binary, piping a PNG through stdin and reading text from stdout.
pub struct TesseractCli {
    binary: PathBuf,
    timeout: Duration,
}

impl TesseractCli {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn from_config(cfg: &OcrConfig) -> Self {
        Self::new(
            cfg.tesseract_bin.clone(),
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    fn command(&self, params: &RecognizeParams) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("stdin")
            .arg("stdout")
            .arg("-l")
            .arg(&params.languages)
            .arg("--psm")
            .arg(params.psm.to_string());
        if let Some(whitelist) = params.whitelist.as_deref() {
            cmd.arg("-c")
                .arg(format!("tessedit_char_whitelist={whitelist}"));
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl TextRecognizer for TesseractCli {
    async fn recognize(
        &self,
        image: &GrayImage,
        params: &RecognizeParams,
    ) -> Result<String, OcrError> {
        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

        let mut child = self
            .command(params)
            .spawn()
            .map_err(OcrError::EngineUnavailable)?;

        let run = async {
            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(&png)
                    .await
                    .map_err(OcrError::EngineUnavailable)?;
            }
            child
                .wait_with_output()
                .await
                .map_err(OcrError::EngineUnavailable)
        };

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| OcrError::Timeout(self.timeout.as_secs()))??;

        if !output.status.success() {
            return Err(OcrError::EngineFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(psm = params.psm, bytes = text.len(), "tesseract finished");
        Ok(text)
    }
}
