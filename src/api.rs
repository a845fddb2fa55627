//! HTTP surface for the contract analysis service.
//!
//! - `POST /api/analisar-contrato` – Multipart upload of a PDF or image (max 10 MB). Extracts
//!   the text, asks the model for a plain-language risk analysis, and returns `{ "clausulas" }`.
//! - `POST /api/resumir-clausulas` – JSON `{ "clausulas": "..." }` (max 2 MB). Returns the
//!   clauses split into `{ "seguras": [...], "riscos": [...] }`.
//! - `POST /api/create-checkout-session` – Create a hosted checkout session, returns `{ "url" }`.
//! - `GET /api/health`, `GET /api/metrics`, `GET /api/commands` – Liveness, counters, and a
//!   machine-readable endpoint catalog.
//!
//! Every failure is answered with a JSON body carrying an `error` field in plain Portuguese;
//! classification failures also echo the raw model output in `resposta`.

use crate::{
    analysis::OpenAiClient,
    config::Config,
    extraction::DocumentExtractor,
    metrics::{MetricsSnapshot, ServiceMetrics},
    payments::{PaymentGateway, PaymentServiceError, StripeCheckout},
    pipeline::{ContractPipeline, PipelineError, TempFileGuard, UploadedDocument, ValidationError},
    reconcile::ClassifiedSummary,
};
use anyhow::Context;
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tower_http::cors::{AllowOrigin, CorsLayer};
use uuid::Uuid;

/// Largest accepted contract upload.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
/// Largest accepted classification request body.
pub const MAX_CLASSIFY_BODY_BYTES: usize = 2 * 1024 * 1024;
/// Allowance for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared collaborators handed to every request.
pub struct AppState {
    /// Analysis and classification pipelines.
    pub pipeline: ContractPipeline,
    /// Checkout-session provider.
    pub payments: Arc<dyn PaymentGateway>,
    /// Directory receiving uploads for the lifetime of a request.
    pub upload_dir: PathBuf,
    /// Request outcome counters.
    pub metrics: ServiceMetrics,
}

impl AppState {
    /// Assemble the state from explicit collaborators.
    pub fn new(
        pipeline: ContractPipeline,
        payments: Arc<dyn PaymentGateway>,
        upload_dir: PathBuf,
    ) -> Self {
        Self {
            pipeline,
            payments,
            upload_dir,
            metrics: ServiceMetrics::new(),
        }
    }

    /// Build production collaborators from the loaded configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let extractor = Arc::new(DocumentExtractor::new(config.tesseract_bin.clone()));
        let analysis =
            Arc::new(OpenAiClient::new(config).context("failed to build analysis client")?);
        let payments =
            Arc::new(StripeCheckout::new(config).context("failed to build checkout client")?);
        if config.stripe_secret_key.is_none() {
            tracing::warn!("STRIPE_SECRET_KEY not set; checkout sessions will be refused");
        }
        Ok(Self::new(
            ContractPipeline::new(extractor, analysis),
            payments,
            config.upload_dir.clone(),
        ))
    }
}

/// Build the HTTP router exposing the service API.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/api/analisar-contrato",
            post(analyze_contract).layer(DefaultBodyLimit::max(
                MAX_UPLOAD_BYTES as usize + MULTIPART_OVERHEAD_BYTES,
            )),
        )
        .route(
            "/api/resumir-clausulas",
            post(classify_clauses).layer(DefaultBodyLimit::max(MAX_CLASSIFY_BODY_BYTES)),
        )
        .route("/api/create-checkout-session", post(create_checkout_session))
        .route("/api/health", get(health))
        .route("/api/metrics", get(get_metrics))
        .route("/api/commands", get(get_commands))
        .with_state(state)
}

/// CORS policy: a single allowed origin when configured, otherwise any origin.
pub fn cors_layer(allowed_origin: Option<&str>) -> anyhow::Result<CorsLayer> {
    let Some(origin) = allowed_origin else {
        return Ok(CorsLayer::permissive());
    };
    let origin = HeaderValue::from_str(origin)
        .with_context(|| format!("invalid CORS_ALLOWED_ORIGIN '{origin}'"))?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::exact(origin))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]))
}

/// Success response for `POST /api/analisar-contrato`.
#[derive(Serialize)]
struct AnalysisResponse {
    clausulas: String,
}

/// Analyze an uploaded contract.
///
/// The first multipart field carrying a file name is streamed to the upload directory under a
/// random name; the pipeline then owns and removes it.
async fn analyze_contract(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisResponse>, AppError> {
    let result = run_analysis(&state, multipart).await;
    match &result {
        Ok(_) => state.metrics.record_analysis(),
        Err(_) => state.metrics.record_failure(),
    }
    result
}

async fn run_analysis(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisResponse>, AppError> {
    let multipart = multipart.map_err(|_| ValidationError::MissingFile)?;
    let document = store_upload(&state.upload_dir, multipart)
        .await?
        .ok_or(ValidationError::MissingFile)?;
    let clausulas = state.pipeline.analyze(document).await?;
    Ok(Json(AnalysisResponse { clausulas }))
}

async fn store_upload(
    upload_dir: &Path,
    mut multipart: Multipart,
) -> Result<Option<UploadedDocument>, AppError> {
    while let Some(mut field) = multipart.next_field().await.map_err(AppError::from)? {
        let Some(original_name) = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
        else {
            continue;
        };
        let declared_media_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        tokio::fs::create_dir_all(upload_dir).await?;
        let guard = TempFileGuard::new(upload_dir.join(Uuid::new_v4().to_string()));
        let mut file = tokio::fs::File::create(guard.path()).await?;
        let mut size_bytes = 0u64;
        while let Some(chunk) = field.chunk().await.map_err(AppError::from)? {
            size_bytes += chunk.len() as u64;
            if size_bytes > MAX_UPLOAD_BYTES {
                return Err(AppError::PayloadTooLarge);
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        tracing::debug!(
            name = %original_name,
            media_type = %declared_media_type,
            size_bytes,
            "Stored upload"
        );
        return Ok(Some(UploadedDocument {
            temporary_path: guard.into_path(),
            declared_media_type,
            size_bytes,
            original_name,
        }));
    }
    Ok(None)
}

/// Request body for `POST /api/resumir-clausulas`.
#[derive(Deserialize)]
struct ClassifyRequest {
    #[serde(default)]
    clausulas: Option<String>,
}

/// Classify previously produced clause text into safe and risky clauses.
async fn classify_clauses(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ClassifyRequest>, JsonRejection>,
) -> Result<Json<ClassifiedSummary>, AppError> {
    let result = run_classification(&state, payload).await;
    match &result {
        Ok(_) => state.metrics.record_classification(),
        Err(_) => state.metrics.record_failure(),
    }
    result
}

async fn run_classification(
    state: &AppState,
    payload: Result<Json<ClassifyRequest>, JsonRejection>,
) -> Result<Json<ClassifiedSummary>, AppError> {
    let Json(request) = payload?;
    let clausulas = request.clausulas.unwrap_or_default();
    let summary = state.pipeline.classify(&clausulas).await?;
    Ok(Json(summary))
}

/// Response body for `POST /api/create-checkout-session`.
#[derive(Serialize)]
struct CheckoutResponse {
    url: String,
}

/// Create a hosted checkout session for the fixed product.
async fn create_checkout_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CheckoutResponse>, AppError> {
    match state.payments.create_checkout_session().await {
        Ok(session) => {
            state.metrics.record_checkout();
            tracing::info!("Checkout session issued");
            Ok(Json(CheckoutResponse { url: session.url }))
        }
        Err(error) => {
            state.metrics.record_failure();
            Err(error.into())
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /api/commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery by clients and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "analisar_contrato",
                method: "POST",
                path: "/api/analisar-contrato",
                description: "Multipart upload of a PDF or image contract (max 10 MB). Response returns { \"clausulas\": string } with a plain-language risk analysis.",
                request_example: None,
            },
            CommandDescriptor {
                name: "resumir_clausulas",
                method: "POST",
                path: "/api/resumir-clausulas",
                description: "Split clause text into safe and risky clauses. Response returns { \"seguras\": [...], \"riscos\": [...] } of { \"titulo\", \"resumo\" }.",
                request_example: Some(json!({
                    "clausulas": "Cláusula 1: Rescisão com multa de 3 aluguéis..."
                })),
            },
            CommandDescriptor {
                name: "create_checkout_session",
                method: "POST",
                path: "/api/create-checkout-session",
                description: "Create a hosted checkout session. Response returns { \"url\": string }.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/api/metrics",
                description: "Return request counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

/// JSON error body shared by every endpoint.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    resposta: Option<String>,
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Payment(#[from] PaymentServiceError),
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("failed to store upload: {0}")]
    Storage(#[from] std::io::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Pipeline(PipelineError::Validation(_)) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Pipeline(_) | Self::Payment(_) | Self::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn body(self) -> ErrorBody {
        let (error, resposta) = match self {
            Self::Pipeline(PipelineError::Validation(validation)) => {
                let message = match validation {
                    ValidationError::MissingFile => "Nenhum arquivo enviado.",
                    ValidationError::UnsupportedMediaType(_) => {
                        "Tipo de arquivo não suportado. Envie um PDF ou uma imagem."
                    }
                    ValidationError::MissingClauses => "Nenhuma cláusula enviada.",
                    ValidationError::MalformedRequest(_) => "Requisição inválida.",
                };
                (message, None)
            }
            Self::Pipeline(PipelineError::Extraction(_)) => {
                ("Não foi possível extrair o texto do documento.", None)
            }
            Self::Pipeline(PipelineError::Analysis(_)) => {
                ("Falha ao consultar o serviço de análise.", None)
            }
            Self::Pipeline(PipelineError::Reconciliation(error)) => (
                "Não foi possível interpretar a resposta da IA.",
                Some(error.raw),
            ),
            Self::Payment(_) => ("Não foi possível iniciar o pagamento.", None),
            Self::PayloadTooLarge => ("O conteúdo excede o tamanho máximo permitido.", None),
            Self::Storage(_) => ("Falha ao receber o arquivo.", None),
        };
        ErrorBody {
            error: error.to_string(),
            resposta,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(inner: ValidationError) -> Self {
        Self::Pipeline(inner.into())
    }
}

impl From<MultipartError> for AppError {
    fn from(inner: MultipartError) -> Self {
        if inner.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            ValidationError::MalformedRequest(inner.body_text()).into()
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(inner: JsonRejection) -> Self {
        if inner.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            ValidationError::MalformedRequest(inner.body_text()).into()
        }
    }
}
