//! Model gateway: the single choke point through which prompts reach the model.
//!
//! [`ModelGateway`] is the capability the rest of the crate depends on;
//! [`OllamaGateway`] implements it against an Ollama-compatible
//! `POST /api/generate` endpoint in non-streaming mode.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use minilangflow_shared::{FlowError, GenerationRequest, ModelConfig, Result};

/// User-Agent string for generation requests.
const USER_AGENT: &str = concat!("MiniLangFlow/", env!("CARGO_PKG_VERSION"));

/// Text generation capability.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Send one prompt and return the generated text verbatim.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Response body of a non-streaming `/api/generate` call. Other fields are ignored.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

// ---------------------------------------------------------------------------
// OllamaGateway
// ---------------------------------------------------------------------------

/// [`ModelGateway`] backed by an Ollama-compatible HTTP service.
#[derive(Debug, Clone)]
pub struct OllamaGateway {
    client: Client,
    endpoint: Url,
    model: String,
}

impl OllamaGateway {
    /// Build a gateway from the `[model]` config section.
    pub fn new(config: &ModelConfig) -> Result<Self> {
        Self::with_timeout(&config.base_url, &config.model, config.timeout())
    }

    /// Build a gateway for `model` at `base_url` with an explicit call timeout.
    pub fn with_timeout(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let endpoint = generate_endpoint(base_url)?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FlowError::Gateway(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            model: model.to_string(),
        })
    }

    /// Model identifier attached to every request.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Fully resolved generation URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ModelGateway for OllamaGateway {
    #[instrument(skip_all, fields(model = %self.model, prompt_chars = prompt.chars().count()))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = GenerationRequest::new(&self.model, prompt);

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    warn!(endpoint = %self.endpoint, "generation call timed out");
                    FlowError::Gateway(format!("generation call timed out: {e}"))
                } else {
                    FlowError::Gateway(format!("generation call failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(FlowError::Gateway(format!(
                "model service returned {status}: {}",
                detail.chars().take(200).collect::<String>()
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| FlowError::Gateway(format!("malformed response from model service: {e}")))?;

        debug!(response_chars = parsed.response.chars().count(), "generation complete");
        Ok(parsed.response)
    }
}

/// Resolve `{base_url}/api/generate`, keeping any path prefix of the base.
fn generate_endpoint(base_url: &str) -> Result<Url> {
    let mut base = Url::parse(base_url)
        .map_err(|e| FlowError::config(format!("invalid model base URL '{base_url}': {e}")))?;

    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    base.join("api/generate")
        .map_err(|e| FlowError::config(format!("invalid model base URL '{base_url}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway_for(server: &MockServer) -> OllamaGateway {
        OllamaGateway::with_timeout(&server.uri(), "llama3", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn endpoint_joins_api_path() {
        let url = generate_endpoint("http://localhost:11434").unwrap();
        assert_eq!(url.as_str(), "http://localhost:11434/api/generate");

        let url = generate_endpoint("http://proxy.local/ollama").unwrap();
        assert_eq!(url.as_str(), "http://proxy.local/ollama/api/generate");

        let url = generate_endpoint("http://proxy.local/ollama/").unwrap();
        assert_eq!(url.as_str(), "http://proxy.local/ollama/api/generate");
    }

    #[test]
    fn from_config_exposes_model_and_endpoint() {
        let config = ModelConfig {
            base_url: "http://gpu-box:11434/".into(),
            model: "mistral".into(),
            timeout_secs: 30,
        };
        let gateway = OllamaGateway::new(&config).unwrap();
        assert_eq!(gateway.model(), "mistral");
        assert_eq!(gateway.endpoint().as_str(), "http://gpu-box:11434/api/generate");
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        let err = OllamaGateway::with_timeout("::nope", "m", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, FlowError::Config { .. }));
    }

    #[tokio::test]
    async fn returns_response_field_verbatim() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama3",
                "prompt": "Le chat dort.",
                "stream": false,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "llama3",
                "response": "  Un chat qui dort.\n",
                "done": true,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = gateway_for(&server).generate("Le chat dort.").await.unwrap();
        assert_eq!(text, "  Un chat qui dort.\n");
    }

    #[tokio::test]
    async fn non_success_status_is_gateway_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
            .expect(1)
            .mount(&server)
            .await;

        let err = gateway_for(&server).generate("hi").await.unwrap_err();
        match err {
            FlowError::Gateway(msg) => {
                assert!(msg.contains("500"));
                assert!(msg.contains("model not loaded"));
            }
            other => panic!("expected Gateway, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_response_field_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"done": true})))
            .mount(&server)
            .await;

        let err = gateway_for(&server).generate("hi").await.unwrap_err();
        assert!(matches!(err, FlowError::Gateway(ref m) if m.contains("malformed")));
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"response": "late"}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let gateway =
            OllamaGateway::with_timeout(&server.uri(), "llama3", Duration::from_millis(100))
                .unwrap();
        let err = gateway.generate("hi").await.unwrap_err();
        assert!(matches!(err, FlowError::Gateway(ref m) if m.contains("timed out")));
    }

    #[tokio::test]
    async fn unreachable_service_is_gateway_error() {
        // Port 9 (discard) is almost never listening.
        let gateway =
            OllamaGateway::with_timeout("http://127.0.0.1:9", "llama3", Duration::from_secs(2))
                .unwrap();
        let err = gateway.generate("hi").await.unwrap_err();
        assert!(matches!(err, FlowError::Gateway(_)));
    }
}
