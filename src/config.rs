use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_STRIPE_BASE_URL: &str = "https://api.stripe.com";
const DEFAULT_SUCCESS_URL: &str = "http://localhost:3000/sucesso.html";
const DEFAULT_CANCEL_URL: &str = "http://localhost:3000/cancelado.html";
const DEFAULT_TESSERACT_BIN: &str = "tesseract";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the contract analysis server.
///
/// Built once at process start and handed to the collaborators that need it; nothing reads
/// the environment after startup.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// API key used for the generative-text service.
    pub openai_api_key: String,
    /// Base URL of the OpenAI-compatible chat completions API.
    pub openai_base_url: String,
    /// Model identifier sent with every completion request.
    pub openai_model: String,
    /// Secret key for the payment provider; checkout is unavailable without it.
    pub stripe_secret_key: Option<String>,
    /// Base URL of the payment provider API.
    pub stripe_base_url: String,
    /// Redirect target after a completed checkout.
    pub checkout_success_url: String,
    /// Redirect target after an abandoned checkout.
    pub checkout_cancel_url: String,
    /// Directory receiving uploaded documents for the lifetime of a request.
    pub upload_dir: PathBuf,
    /// Path or name of the tesseract executable.
    pub tesseract_bin: String,
    /// Optional origin allowed by CORS; any origin is allowed when unset.
    pub cors_allowed_origin: Option<String>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required =
            |key: &str| optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()));

        Ok(Self {
            openai_api_key: required("OPENAI_API_KEY")?,
            openai_base_url: optional("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            openai_model: optional("OPENAI_MODEL")
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            stripe_secret_key: optional("STRIPE_SECRET_KEY"),
            stripe_base_url: optional("STRIPE_BASE_URL")
                .unwrap_or_else(|| DEFAULT_STRIPE_BASE_URL.to_string()),
            checkout_success_url: optional("CHECKOUT_SUCCESS_URL")
                .unwrap_or_else(|| DEFAULT_SUCCESS_URL.to_string()),
            checkout_cancel_url: optional("CHECKOUT_CANCEL_URL")
                .unwrap_or_else(|| DEFAULT_CANCEL_URL.to_string()),
            upload_dir: optional("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| env::temp_dir().join("contractlens-uploads")),
            tesseract_bin: optional("TESSERACT_BIN")
                .unwrap_or_else(|| DEFAULT_TESSERACT_BIN.to_string()),
            cors_allowed_origin: optional("CORS_ALLOWED_ORIGIN"),
            server_port: optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }
}

/// Read `.env` (when present) and load configuration from the process environment.
pub fn load_config() -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        openai_base_url = %config.openai_base_url,
        openai_model = %config.openai_model,
        checkout_enabled = config.stripe_secret_key.is_some(),
        upload_dir = %config.upload_dir.display(),
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    Ok(config)
}
