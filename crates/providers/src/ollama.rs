//! Ollama generation backend.
//!
//! Talks to the native Ollama HTTP API:
//! - `POST /api/generate`: blocking (`stream: false`) or NDJSON streaming
//! - `GET /api/tags`: health probe and model listing

use std::time::Duration;

use async_trait::async_trait;
use folio_config::BackendConfig;
use folio_core::provider::{Completion, GenerationBackend, GenerationOptions, TextStream};
use folio_core::GenerationError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ndjson::decode_stream;

/// A generation backend served by a local or remote Ollama instance.
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
    generate_timeout: Duration,
    health_timeout: Duration,
}

impl OllamaClient {
    /// Build a client from explicit backend settings.
    pub fn new(config: &BackendConfig) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| GenerationError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client,
            generate_timeout: config.generate_timeout(),
            health_timeout: config.health_timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn generate_body<'a>(
        prompt: &'a str,
        model: &'a str,
        options: &GenerationOptions,
        stream: bool,
    ) -> GenerateBody<'a> {
        GenerateBody {
            model,
            prompt,
            stream,
            options: WireOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
                top_k: options.top_k,
                top_p: options.top_p,
                repeat_penalty: options.repeat_penalty,
            },
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout(format!(
                "no response from {} within {}s",
                self.base_url,
                self.generate_timeout.as_secs()
            ))
        } else {
            GenerationError::Unavailable(e.to_string())
        }
    }

    async fn api_error(response: reqwest::Response) -> GenerationError {
        let status_code = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        warn!(status = status_code, body = %message, "Ollama returned error");
        GenerationError::Api {
            status_code,
            message,
        }
    }

    async fn fetch_tags(&self) -> Result<reqwest::Response, reqwest::Error> {
        self.client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(self.health_timeout)
            .send()
            .await
    }
}

#[async_trait]
impl GenerationBackend for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        options: &GenerationOptions,
    ) -> Result<Completion, GenerationError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = Self::generate_body(prompt, model, options, false);

        debug!(provider = "ollama", model, prompt_chars = prompt.len(), "Sending generate request");

        let response = self
            .client
            .post(&url)
            .timeout(self.generate_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.transport_error(e)
            } else {
                GenerationError::MalformedResponse(format!("failed to parse response: {e}"))
            }
        })?;

        let text = parsed.response.ok_or_else(|| {
            GenerationError::MalformedResponse("response body has no `response` field".into())
        })?;
        if text.trim().is_empty() {
            return Err(GenerationError::MalformedResponse("no response generated".into()));
        }

        Ok(Completion {
            text,
            model: parsed.model.unwrap_or_else(|| model.to_string()),
        })
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        model: &str,
        options: &GenerationOptions,
    ) -> Result<TextStream, GenerationError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = Self::generate_body(prompt, model, options, true);

        debug!(provider = "ollama", model, prompt_chars = prompt.len(), "Opening generate stream");

        // Bounds the wait for response headers only; the body may stream longer.
        let response = tokio::time::timeout(
            self.generate_timeout,
            self.client.post(&url).json(&body).send(),
        )
        .await
        .map_err(|_| {
            GenerationError::Timeout(format!(
                "no response from {} within {}s",
                self.base_url,
                self.generate_timeout.as_secs()
            ))
        })?
        .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        Ok(decode_stream(response.bytes_stream()))
    }

    async fn is_healthy(&self) -> bool {
        match self.fetch_tags().await {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(e) => {
                debug!(error = %e, "Ollama health check failed");
                false
            }
        }
    }

    async fn list_models(&self) -> Vec<String> {
        let response = match self.fetch_tags().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!(status = r.status().as_u16(), "Ollama model listing failed");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "Ollama model listing failed");
                return Vec::new();
            }
        };

        match response.json::<TagsResponse>().await {
            Ok(tags) => tags.models.into_iter().map(|m| m.name).collect(),
            Err(e) => {
                warn!(error = %e, "Ollama model listing returned an unexpected body");
                Vec::new()
            }
        }
    }
}

// --- Ollama API types ---

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: WireOptions,
}

#[derive(Debug, Serialize)]
struct WireOptions {
    temperature: f32,
    num_predict: u32,
    top_k: u32,
    top_p: f32,
    repeat_penalty: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OllamaClient {
        let config = BackendConfig {
            base_url: server.uri(),
            generate_timeout_secs: 1,
            health_timeout_secs: 1,
            ..BackendConfig::default()
        };
        OllamaClient::new(&config).unwrap()
    }

    #[test]
    fn new_trims_trailing_slash() {
        let config = BackendConfig {
            base_url: "http://localhost:11434/".into(),
            ..BackendConfig::default()
        };
        let client = OllamaClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
        assert_eq!(client.default_model(), "llama3.1");
        assert_eq!(client.name(), "ollama");
    }

    #[tokio::test]
    async fn generate_sends_sampling_options() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama3.1",
                "prompt": "Say hi",
                "stream": false,
                "options": {"num_predict": 500, "top_k": 40}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "llama3.1",
                "response": "  Hi there!  ",
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let completion = client
            .generate("Say hi", "llama3.1", &GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(completion.text, "  Hi there!  ");
        assert_eq!(completion.model, "llama3.1");
    }

    #[tokio::test]
    async fn missing_response_field_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"done": true})))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate("q", "llama3.1", &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn empty_response_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"response": "", "done": true})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate("q", "llama3.1", &GenerationOptions::default())
            .await
            .unwrap_err();
        match err {
            GenerationError::MalformedResponse(reason) => assert!(reason.contains("no response")),
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_success_status_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model 'nope' not found"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate("q", "nope", &GenerationOptions::default())
            .await
            .unwrap_err();
        match err {
            GenerationError::Api {
                status_code,
                message,
            } => {
                assert_eq!(status_code, 404);
                assert!(message.contains("not found"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"response": "late"}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate("q", "llama3.1", &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Timeout(_)));
    }

    #[tokio::test]
    async fn refused_connection_is_unavailable() {
        let config = BackendConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..BackendConfig::default()
        };
        let client = OllamaClient::new(&config).unwrap();
        let err = client
            .generate("q", "llama3.1", &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Unavailable(_)));
        assert!(!client.is_healthy().await);
        assert!(client.list_models().await.is_empty());
    }

    #[tokio::test]
    async fn stream_yields_decoded_deltas() {
        let server = MockServer::start().await;
        let body = concat!(
            "{\"response\":\"I \",\"done\":false}\n",
            "{\"response\":\"build \",\"done\":false}\n",
            "{\"response\":\"things.\",\"done\":false}\n",
            "{\"response\":\"\",\"done\":true}\n",
        );
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
            .mount(&server)
            .await;

        let stream = client_for(&server)
            .generate_stream("q", "llama3.1", &GenerationOptions::default())
            .await
            .unwrap();
        let deltas: Vec<String> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(deltas, vec!["I ", "build ", "things."]);
    }

    #[tokio::test]
    async fn stream_open_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .generate_stream("q", "llama3.1", &GenerationOptions::default())
            .await;
        assert!(matches!(
            result,
            Err(GenerationError::Api {
                status_code: 500,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn health_and_models_read_tags() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [
                    {"name": "llama3.1:latest", "size": 4661224676u64},
                    {"name": "mistral:7b"}
                ]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.is_healthy().await);
        assert_eq!(
            client.list_models().await,
            vec!["llama3.1:latest".to_string(), "mistral:7b".to_string()]
        );
    }

    #[tokio::test]
    async fn unhealthy_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(!client.is_healthy().await);
        assert!(client.list_models().await.is_empty());
    }
}
