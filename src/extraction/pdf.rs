use super::ExtractionError;
use std::path::Path;

/// Reads the embedded text layer of a PDF using `pdf-extract`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextReader;

impl PdfTextReader {
    /// Load the whole file and return its text in document order.
    ///
    /// Parsing runs on the blocking pool; a panic inside the parser surfaces as
    /// [`ExtractionError::Pdf`] instead of unwinding into the request task.
    pub async fn read(&self, path: &Path) -> Result<String, ExtractionError> {
        let bytes = tokio::fs::read(path).await?;
        tokio::task::spawn_blocking(move || Self::parse(&bytes))
            .await
            .map_err(|error| ExtractionError::Pdf(format!("parser aborted: {error}")))?
    }

    fn parse(bytes: &[u8]) -> Result<String, ExtractionError> {
        pdf_extract::extract_text_from_mem(bytes)
            .map_err(|error| ExtractionError::Pdf(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;
    use lopdf::{Document, Object, Stream};

    /// Build a single-page PDF whose text layer contains `text` (ASCII only).
    fn make_test_pdf(text: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.4");

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let content = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let resources = dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        };
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => resources,
        });
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        });
        if let Ok(Object::Dictionary(page)) = doc.get_object_mut(page_id) {
            page.set("Parent", pages_id);
        }
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).expect("serialize pdf");
        buf
    }

    #[tokio::test]
    async fn reads_text_layer_of_well_formed_pdf() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("contrato.pdf");
        std::fs::write(&path, make_test_pdf("Clausula 1: Rescisao imediata")).expect("write");

        let text = PdfTextReader.read(&path).await.expect("text");
        assert!(text.contains("Clausula"), "unexpected text: {text}");
    }

    #[tokio::test]
    async fn corrupted_pdf_is_an_extraction_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("corrompido.pdf");
        std::fs::write(&path, b"%PDF-1.4\nthis is not a pdf body").expect("write");

        let error = PdfTextReader.read(&path).await.expect_err("corrupted");
        assert!(matches!(error, ExtractionError::Pdf(_)));
    }
}
