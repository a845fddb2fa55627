use super::ExtractionError;
use std::path::Path;
use tokio::process::Command;

/// Tesseract language pack used for recognition.
pub const OCR_LANGUAGE: &str = "por";

/// OCR engine backed by the tesseract command line tool.
///
/// Recognition is CPU heavy; running it as a child process keeps the async runtime free to
/// serve other requests while a scan is being read.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    binary: String,
}

impl TesseractOcr {
    /// Use the given executable (a bare name is resolved through `PATH`).
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Recognize Portuguese text in the image at `path`.
    pub async fn recognize(&self, path: &Path) -> Result<String, ExtractionError> {
        let output = Command::new(&self.binary)
            .arg(path)
            .arg("stdout")
            .arg("-l")
            .arg(OCR_LANGUAGE)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|error| {
                ExtractionError::Ocr(format!("failed to run {}: {error}", self.binary))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::Ocr(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
