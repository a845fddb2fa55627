//! Request pipelines: document analysis and clause classification.
//!
//! Both flows are strictly linear and every stage failure ends the request. The analysis flow
//! owns the uploaded file from the first line on and removes it on every exit path.

use crate::{
    analysis::{AnalysisClient, AnalysisRequest, AnalysisServiceError},
    extraction::{ExtractionError, MediaType, TextExtractor},
    prompts::{build_analysis_prompt, build_classification_prompt},
    reconcile::{ClassifiedSummary, ReconciliationError, parse_classification},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Input problems the caller can correct.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// No file was attached to the upload.
    #[error("no file was uploaded")]
    MissingFile,
    /// The uploaded file is neither a PDF nor an image.
    #[error("unsupported media type '{0}'")]
    UnsupportedMediaType(String),
    /// The classification request carried no clause text.
    #[error("clause text is missing or empty")]
    MissingClauses,
    /// The request body could not be decoded.
    #[error("malformed request: {0}")]
    MalformedRequest(String),
}

/// Errors ending a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input missing or unsupported.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Document content could not be turned into text.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    /// The generative-text service call failed.
    #[error(transparent)]
    Analysis(#[from] AnalysisServiceError),
    /// The model answered in a shape that could not be interpreted.
    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),
}

/// A file received by the upload layer, stored under a unique temporary name.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    /// Location of the stored upload.
    pub temporary_path: PathBuf,
    /// Media type declared by the client.
    pub declared_media_type: String,
    /// Stored size in bytes.
    pub size_bytes: u64,
    /// File name supplied by the client.
    pub original_name: String,
}

/// Owns a temporary upload and deletes it.
///
/// Normal exits call [`TempFileGuard::remove`], which deletes on the async runtime. `Drop`
/// covers cancelled or panicking requests with a synchronous unlink of one small file. A file
/// that is already gone is not an error; any other failure is logged and swallowed.
pub struct TempFileGuard {
    path: PathBuf,
}

impl TempFileGuard {
    /// Take ownership of the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the guarded file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release ownership without removing the file.
    pub fn into_path(mut self) -> PathBuf {
        std::mem::take(&mut self.path)
    }

    /// Delete the file now, without blocking the worker thread.
    pub async fn remove(self) {
        let path = self.into_path();
        let outcome = tokio::fs::remove_file(&path).await;
        report_removal(&path, outcome);
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.path.as_os_str().is_empty() {
            return;
        }
        report_removal(&self.path, std::fs::remove_file(&self.path));
    }
}

fn report_removal(path: &Path, outcome: std::io::Result<()>) {
    match outcome {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed temporary upload"),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => tracing::warn!(
            path = %path.display(),
            error = %error,
            "Failed to remove temporary upload"
        ),
    }
}

/// Sequences extraction, prompting, completion, and reconciliation.
///
/// Holds no per-request state; clone the `Arc`s freely and share one instance across requests.
#[derive(Clone)]
pub struct ContractPipeline {
    extractor: Arc<dyn TextExtractor>,
    analysis: Arc<dyn AnalysisClient>,
}

impl ContractPipeline {
    /// Build a pipeline over the given collaborators.
    pub fn new(extractor: Arc<dyn TextExtractor>, analysis: Arc<dyn AnalysisClient>) -> Self {
        Self {
            extractor,
            analysis,
        }
    }

    /// Explain an uploaded contract in plain language.
    ///
    /// The upload is deleted before this returns, whatever the outcome.
    pub async fn analyze(&self, document: UploadedDocument) -> Result<String, PipelineError> {
        let guard = TempFileGuard::new(document.temporary_path.clone());
        let outcome = self.analyze_stored(&document, guard.path()).await;
        guard.remove().await;
        outcome
    }

    async fn analyze_stored(
        &self,
        document: &UploadedDocument,
        path: &Path,
    ) -> Result<String, PipelineError> {
        let media_type = MediaType::parse(&document.declared_media_type).ok_or_else(|| {
            ValidationError::UnsupportedMediaType(document.declared_media_type.clone())
        })?;
        tracing::debug!(
            name = %document.original_name,
            media_type = %media_type,
            size_bytes = document.size_bytes,
            "Extracting contract text"
        );

        let text = self.extractor.extract(path, &media_type).await?;
        let request = AnalysisRequest::with_policy(build_analysis_prompt(&text));
        let analysis = self.analysis.complete(request).await?;

        tracing::info!(
            media_type = %media_type,
            text_chars = text.chars().count(),
            analysis_chars = analysis.chars().count(),
            "Contract analyzed"
        );
        Ok(analysis)
    }

    /// Split previously produced clause text into safe and risky clauses.
    pub async fn classify(&self, clause_text: &str) -> Result<ClassifiedSummary, PipelineError> {
        if clause_text.trim().is_empty() {
            return Err(ValidationError::MissingClauses.into());
        }

        let request = AnalysisRequest::with_policy(build_classification_prompt(clause_text));
        let raw = self.analysis.complete(request).await?;
        let summary = parse_classification(&raw)?;

        tracing::info!(
            safe = summary.safe_clauses.len(),
            risky = summary.risky_clauses.len(),
            "Clauses classified"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    struct StubExtractor {
        result: Result<String, String>,
        calls: AtomicUsize,
        saw_file: AtomicUsize,
    }

    impl StubExtractor {
        fn returning(text: &str) -> Arc<Self> {
            Arc::new(Self {
                result: Ok(text.into()),
                calls: AtomicUsize::new(0),
                saw_file: AtomicUsize::new(0),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                result: Err(message.into()),
                calls: AtomicUsize::new(0),
                saw_file: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TextExtractor for StubExtractor {
        async fn extract(
            &self,
            path: &Path,
            _media_type: &MediaType,
        ) -> Result<String, ExtractionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if path.exists() {
                self.saw_file.fetch_add(1, Ordering::SeqCst);
            }
            self.result.clone().map_err(ExtractionError::Pdf)
        }
    }

    struct StubAnalysis {
        reply: Result<String, String>,
        requests: Mutex<Vec<AnalysisRequest>>,
    }

    impl StubAnalysis {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err("service returned 503".into()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl AnalysisClient for StubAnalysis {
        async fn complete(
            &self,
            request: AnalysisRequest,
        ) -> Result<String, AnalysisServiceError> {
            self.requests.lock().await.push(request);
            self.reply
                .clone()
                .map_err(AnalysisServiceError::RequestFailed)
        }
    }

    fn upload(dir: &Path, media_type: &str) -> UploadedDocument {
        let path = dir.join(uuid::Uuid::new_v4().to_string());
        std::fs::write(&path, b"conteudo").expect("write upload");
        UploadedDocument {
            temporary_path: path,
            declared_media_type: media_type.into(),
            size_bytes: 8,
            original_name: "contrato.pdf".into(),
        }
    }

    #[tokio::test]
    async fn analyze_returns_model_text_and_removes_upload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let extractor = StubExtractor::returning("Cláusula 1: Rescisão");
        let analysis = StubAnalysis::replying("Explicação simples");
        let pipeline = ContractPipeline::new(extractor.clone(), analysis.clone());
        let document = upload(dir.path(), "application/pdf");
        let path = document.temporary_path.clone();

        let text = pipeline.analyze(document).await.expect("analysis");

        assert_eq!(text, "Explicação simples");
        assert!(!path.exists());
        assert_eq!(extractor.saw_file.load(Ordering::SeqCst), 1);
        let requests = analysis.requests.lock().await;
        assert_eq!(requests.len(), 1);
        assert!(requests[0].instructions.user.contains("Cláusula 1: Rescisão"));
    }

    #[tokio::test]
    async fn unsupported_media_type_skips_extraction_and_removes_upload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let extractor = StubExtractor::returning("unused");
        let analysis = StubAnalysis::replying("unused");
        let pipeline = ContractPipeline::new(extractor.clone(), analysis.clone());
        let document = upload(dir.path(), "text/plain");
        let path = document.temporary_path.clone();

        let error = pipeline.analyze(document).await.expect_err("validation");

        assert!(matches!(
            error,
            PipelineError::Validation(ValidationError::UnsupportedMediaType(ref declared)) if declared == "text/plain"
        ));
        assert!(!path.exists());
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
        assert!(analysis.requests.lock().await.is_empty());
    }

    #[tokio::test]
    async fn extraction_failure_removes_upload_and_skips_model() {
        let dir = tempfile::tempdir().expect("tempdir");
        let analysis = StubAnalysis::replying("unused");
        let pipeline =
            ContractPipeline::new(StubExtractor::failing("broken xref"), analysis.clone());
        let document = upload(dir.path(), "application/pdf");
        let path = document.temporary_path.clone();

        let error = pipeline.analyze(document).await.expect_err("extraction");

        assert!(matches!(error, PipelineError::Extraction(_)));
        assert!(!path.exists());
        assert!(analysis.requests.lock().await.is_empty());
    }

    #[tokio::test]
    async fn analysis_failure_removes_upload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pipeline = ContractPipeline::new(
            StubExtractor::returning("texto"),
            StubAnalysis::failing(),
        );
        let document = upload(dir.path(), "image/png");
        let path = document.temporary_path.clone();

        let error = pipeline.analyze(document).await.expect_err("analysis");

        assert!(matches!(error, PipelineError::Analysis(_)));
        assert!(!path.exists());
    }

    #[test]
    fn guard_tolerates_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let guard = TempFileGuard::new(dir.path().join("already-gone"));
        drop(guard);
    }

    #[tokio::test]
    async fn removing_guard_deletes_file_and_tolerates_missing_one() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("upload");
        std::fs::write(&path, b"%PDF").expect("write");

        TempFileGuard::new(&path).remove().await;
        assert!(!path.exists());

        TempFileGuard::new(&path).remove().await;
    }

    #[test]
    fn dropped_guard_deletes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("abandoned");
        std::fs::write(&path, b"x").expect("write");

        drop(TempFileGuard::new(&path));

        assert!(!path.exists());
    }

    #[test]
    fn released_guard_keeps_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("kept");
        std::fs::write(&path, b"x").expect("write");

        let released = TempFileGuard::new(&path).into_path();

        assert_eq!(released, path);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn classify_parses_fenced_payload() {
        let analysis = StubAnalysis::replying(
            "```json {\"seguras\":[{\"titulo\":\"A\",\"resumo\":\"B\"}],\"riscos\":[]} ```",
        );
        let pipeline = ContractPipeline::new(StubExtractor::returning("unused"), analysis.clone());

        let summary = pipeline
            .classify("Cláusula X resumo...")
            .await
            .expect("summary");

        assert_eq!(summary.safe_clauses.len(), 1);
        assert_eq!(summary.safe_clauses[0].title, "A");
        assert!(summary.risky_clauses.is_empty());
        let requests = analysis.requests.lock().await;
        assert!(requests[0].instructions.user.contains("Cláusula X resumo..."));
    }

    #[tokio::test]
    async fn classify_rejects_blank_input_without_calling_model() {
        let analysis = StubAnalysis::replying("unused");
        let pipeline = ContractPipeline::new(StubExtractor::returning("unused"), analysis.clone());

        let error = pipeline.classify("   \n").await.expect_err("blank");

        assert!(matches!(
            error,
            PipelineError::Validation(ValidationError::MissingClauses)
        ));
        assert!(analysis.requests.lock().await.is_empty());
    }

    #[tokio::test]
    async fn classify_surfaces_raw_text_when_unparseable() {
        let pipeline = ContractPipeline::new(
            StubExtractor::returning("unused"),
            StubAnalysis::replying("Não sei."),
        );

        let error = pipeline.classify("Cláusula X").await.expect_err("reconcile");

        match error {
            PipelineError::Reconciliation(inner) => assert_eq!(inner.raw, "Não sei."),
            other => panic!("unexpected error: {other}"),
        }
    }
}
