//! Hosted checkout sessions gating access to the service.
//!
//! Talks to Stripe's REST API directly with form-encoded requests; the product, price, and
//! redirect targets are fixed per deployment.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Currency charged at checkout.
pub const CHECKOUT_CURRENCY: &str = "brl";
/// Unit price in the currency's minor unit (centavos).
pub const CHECKOUT_UNIT_AMOUNT: u64 = 990;
/// Product name shown on the hosted checkout page.
pub const CHECKOUT_PRODUCT_NAME: &str = "Análise de contrato";

/// Errors raised while creating a checkout session.
#[derive(Debug, Error)]
pub enum PaymentServiceError {
    /// Checkout is not configured for this deployment.
    #[error("payment provider not configured")]
    NotConfigured,
    /// The provider could not be reached.
    #[error("payment provider unavailable: {0}")]
    Unavailable(String),
    /// The provider rejected the request.
    #[error("payment provider rejected the request: {0}")]
    Rejected(String),
    /// The provider response could not be interpreted.
    #[error("malformed payment provider response: {0}")]
    InvalidResponse(String),
}

/// A hosted checkout session the user can be redirected to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSession {
    /// Hosted checkout page URL.
    pub url: String,
}

/// Interface implemented by payment providers.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a checkout session for the fixed product.
    async fn create_checkout_session(&self) -> Result<CheckoutSession, PaymentServiceError>;
}

/// Stripe Checkout client.
pub struct StripeCheckout {
    http: Client,
    base_url: String,
    secret_key: Option<String>,
    success_url: String,
    cancel_url: String,
}

impl StripeCheckout {
    /// Build a client from the loaded configuration.
    pub fn new(config: &Config) -> Result<Self, PaymentServiceError> {
        let http = Client::builder()
            .user_agent("contractlens/checkout")
            .build()
            .map_err(|error| PaymentServiceError::Unavailable(error.to_string()))?;
        Ok(Self {
            http,
            base_url: config.stripe_base_url.clone(),
            secret_key: config.stripe_secret_key.clone(),
            success_url: config.checkout_success_url.clone(),
            cancel_url: config.checkout_cancel_url.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/checkout/sessions",
            self.base_url.trim_end_matches('/')
        )
    }

    fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("mode", "payment".to_string()),
            ("payment_method_types[0]", "card".to_string()),
            (
                "line_items[0][price_data][currency]",
                CHECKOUT_CURRENCY.to_string(),
            ),
            (
                "line_items[0][price_data][unit_amount]",
                CHECKOUT_UNIT_AMOUNT.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                CHECKOUT_PRODUCT_NAME.to_string(),
            ),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", self.success_url.clone()),
            ("cancel_url", self.cancel_url.clone()),
        ]
    }
}

#[derive(Debug, Deserialize)]
struct StripeSession {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: String,
}

#[async_trait]
impl PaymentGateway for StripeCheckout {
    async fn create_checkout_session(&self) -> Result<CheckoutSession, PaymentServiceError> {
        let secret_key = self
            .secret_key
            .as_deref()
            .ok_or(PaymentServiceError::NotConfigured)?;

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(secret_key)
            .form(&self.form_fields())
            .send()
            .await
            .map_err(|error| PaymentServiceError::Unavailable(error.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| PaymentServiceError::InvalidResponse(error.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<StripeErrorBody>(&body)
                .map(|parsed| parsed.error.message)
                .unwrap_or_else(|_| format!("status {status}"));
            return Err(PaymentServiceError::Rejected(message));
        }

        let session: StripeSession = serde_json::from_str(&body)
            .map_err(|error| PaymentServiceError::InvalidResponse(error.to_string()))?;
        let url = session.url.ok_or_else(|| {
            PaymentServiceError::InvalidResponse("checkout session has no url".into())
        })?;
        tracing::debug!("Checkout session created");
        Ok(CheckoutSession { url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn checkout_for(server: &MockServer, secret_key: Option<&str>) -> StripeCheckout {
        StripeCheckout {
            http: Client::new(),
            base_url: server.base_url(),
            secret_key: secret_key.map(str::to_string),
            success_url: "https://app.test/ok".into(),
            cancel_url: "https://app.test/cancel".into(),
        }
    }

    #[tokio::test]
    async fn creates_session_with_fixed_line_item() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/checkout/sessions")
                    .header("authorization", "Bearer sk_test_123")
                    .x_www_form_urlencoded_tuple("mode", "payment")
                    .x_www_form_urlencoded_tuple(
                        "line_items[0][price_data][currency]",
                        CHECKOUT_CURRENCY,
                    )
                    .x_www_form_urlencoded_tuple(
                        "line_items[0][price_data][unit_amount]",
                        "990",
                    )
                    .x_www_form_urlencoded_tuple("success_url", "https://app.test/ok")
                    .x_www_form_urlencoded_tuple("cancel_url", "https://app.test/cancel");
                then.status(200).json_body(json!({
                    "id": "cs_test_1",
                    "url": "https://checkout.stripe.com/c/pay/cs_test_1"
                }));
            })
            .await;

        let session = checkout_for(&server, Some("sk_test_123"))
            .create_checkout_session()
            .await
            .expect("session");

        mock.assert_async().await;
        assert_eq!(session.url, "https://checkout.stripe.com/c/pay/cs_test_1");
    }

    #[tokio::test]
    async fn provider_error_message_is_surfaced() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/checkout/sessions");
                then.status(400).json_body(json!({
                    "error": { "message": "Invalid API Key provided" }
                }));
            })
            .await;

        let error = checkout_for(&server, Some("sk_bad"))
            .create_checkout_session()
            .await
            .expect_err("rejected");
        assert!(
            matches!(&error, PaymentServiceError::Rejected(message) if message == "Invalid API Key provided"),
            "{error}"
        );
    }

    #[tokio::test]
    async fn missing_secret_key_skips_the_provider() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200);
            })
            .await;

        let error = checkout_for(&server, None)
            .create_checkout_session()
            .await
            .expect_err("not configured");

        assert!(matches!(error, PaymentServiceError::NotConfigured));
        mock.assert_hits_async(0).await;
    }
}
