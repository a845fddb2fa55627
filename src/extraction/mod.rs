//! Text extraction for uploaded contracts.
//!
//! PDFs are read through their embedded text layer; images go through OCR configured for
//! Portuguese. Image-only PDFs are not rasterized and yield whatever text layer they carry.

mod ocr;
mod pdf;

pub use ocr::TesseractOcr;
pub use pdf::PdfTextReader;

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Errors raised while turning a document into plain text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The input file could not be read.
    #[error("failed to read document: {0}")]
    Io(#[from] std::io::Error),
    /// The PDF text layer could not be parsed.
    #[error("failed to parse PDF: {0}")]
    Pdf(String),
    /// Optical character recognition failed or could not be started.
    #[error("OCR failed: {0}")]
    Ocr(String),
}

/// Media types accepted by the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaType {
    /// `application/pdf`.
    Pdf,
    /// Any `image/*` subtype, kept verbatim (lowercased, parameters removed).
    Image(String),
}

impl MediaType {
    /// Classify a declared media type, returning `None` for anything unsupported.
    pub fn parse(declared: &str) -> Option<Self> {
        let essence = declared
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if essence == "application/pdf" {
            Some(Self::Pdf)
        } else if essence.starts_with("image/") && essence.len() > "image/".len() {
            Some(Self::Image(essence))
        } else {
            None
        }
    }

    /// Guess a media type from a file extension, used when no type was declared.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        let declared = match extension.as_str() {
            "pdf" => "application/pdf",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "tif" | "tiff" => "image/tiff",
            "bmp" => "image/bmp",
            "webp" => "image/webp",
            "gif" => "image/gif",
            _ => return None,
        };
        Self::parse(declared)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pdf => f.write_str("application/pdf"),
            Self::Image(essence) => f.write_str(essence),
        }
    }
}

/// Interface implemented by document-to-text extractors.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Produce a best-effort transcription of the document at `path`.
    async fn extract(
        &self,
        path: &Path,
        media_type: &MediaType,
    ) -> Result<String, ExtractionError>;
}

/// Extractor dispatching on media type to the PDF reader or the OCR engine.
pub struct DocumentExtractor {
    pdf: PdfTextReader,
    ocr: TesseractOcr,
}

impl DocumentExtractor {
    /// Build an extractor that shells out to the given tesseract executable for images.
    pub fn new(tesseract_bin: impl Into<String>) -> Self {
        Self {
            pdf: PdfTextReader,
            ocr: TesseractOcr::new(tesseract_bin),
        }
    }
}

#[async_trait]
impl TextExtractor for DocumentExtractor {
    async fn extract(
        &self,
        path: &Path,
        media_type: &MediaType,
    ) -> Result<String, ExtractionError> {
        let text = match media_type {
            MediaType::Pdf => self.pdf.read(path).await?,
            MediaType::Image(_) => self.ocr.recognize(path).await?,
        };
        let text = text.trim().to_string();
        tracing::debug!(media_type = %media_type, chars = text.chars().count(), "Extracted text");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_media_types() {
        assert_eq!(MediaType::parse("application/pdf"), Some(MediaType::Pdf));
        assert_eq!(
            MediaType::parse("Application/PDF; charset=binary"),
            Some(MediaType::Pdf)
        );
        assert_eq!(
            MediaType::parse("image/png"),
            Some(MediaType::Image("image/png".into()))
        );
        assert_eq!(
            MediaType::parse("IMAGE/JPEG"),
            Some(MediaType::Image("image/jpeg".into()))
        );
    }

    #[test]
    fn rejects_unsupported_media_types() {
        for declared in [
            "text/plain",
            "application/pdfx",
            "application/x-pdf",
            "image/",
            "",
            "video/mp4",
        ] {
            assert_eq!(MediaType::parse(declared), None, "{declared}");
        }
    }

    #[test]
    fn infers_media_type_from_extension() {
        assert_eq!(
            MediaType::from_extension(Path::new("contrato.PDF")),
            Some(MediaType::Pdf)
        );
        assert_eq!(
            MediaType::from_extension(Path::new("scan.jpg")),
            Some(MediaType::Image("image/jpeg".into()))
        );
        assert_eq!(MediaType::from_extension(Path::new("notes.txt")), None);
        assert_eq!(MediaType::from_extension(Path::new("README")), None);
    }

    #[tokio::test]
    async fn document_extractor_reports_missing_pdf() {
        let extractor = DocumentExtractor::new("tesseract");
        let error = extractor
            .extract(Path::new("/nonexistent/contrato.pdf"), &MediaType::Pdf)
            .await
            .expect_err("missing file");
        assert!(matches!(error, ExtractionError::Io(_)));
    }
}
