//! Grok client over the OpenAI-compatible chat completions API.

use crate::config::LlmConfig;
use crate::error::{LlmError, Result};
use crate::llm::{CompletionRequest, LanguageModel};

use anyhow::Context as _;
use std::time::Duration;

/// HTTP client for the xAI API.
#[derive(Clone)]
pub struct XaiClient {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    image_model: String,
}

impl std::fmt::Debug for XaiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XaiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("image_model", &self.image_model)
            .finish_non_exhaustive()
    }
}

impl XaiClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .with_context(|| "failed to build HTTP client")?;

        Ok(Self {
            http_client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            image_model: config.image_model.clone(),
        })
    }

    async fn post(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> std::result::Result<serde_json::Value, LlmError> {
        let response = self
            .http_client
            .post(format!("{}/{endpoint}", self.base_url))
            .header("authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::Provider(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::Provider(format!("failed to read response body: {e}")))?;

        let response_body: serde_json::Value =
            serde_json::from_str(&text).unwrap_or(serde_json::Value::Null);

        if !status.is_success() {
            let message = response_body["error"]["message"]
                .as_str()
                .or_else(|| response_body["error"].as_str())
                .map(str::to_string)
                .unwrap_or_else(|| {
                    if text.is_empty() {
                        "unknown error".to_string()
                    } else {
                        text.clone()
                    }
                });
            return Err(error_for_status(status.as_u16(), message));
        }

        if response_body.is_null() {
            return Err(LlmError::Provider(format!(
                "error decoding response body: {text}"
            )));
        }

        Ok(response_body)
    }
}

/// Map an HTTP failure status to the error taxonomy.
pub fn error_for_status(status: u16, message: String) -> LlmError {
    match status {
        401 | 403 => LlmError::InvalidCredential(message),
        429 => LlmError::QuotaExceeded(message),
        400 | 404 | 413 | 422 => LlmError::MalformedRequest(message),
        _ => LlmError::Provider(format!("API error ({status}): {message}")),
    }
}

impl LanguageModel for XaiClient {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<String, LlmError> {
        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": request.system,
        })];

        messages.extend(request.history.iter().map(|turn| {
            serde_json::json!({
                "role": turn.role.as_str(),
                "content": turn.content,
            })
        }));

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "stream": false,
        });

        let response_body = self.post("chat/completions", &body).await?;

        let content = response_body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::trim)
            .unwrap_or_default();

        if content.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        tracing::debug!(
            model = %self.model,
            usage = %response_body["usage"],
            "completion received"
        );

        Ok(content.to_string())
    }

    async fn generate_image(&self, prompt: &str) -> std::result::Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.image_model,
            "prompt": prompt,
            "n": 1,
        });

        let response_body = self.post("images/generations", &body).await?;

        response_body["data"][0]["url"]
            .as_str()
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .ok_or(LlmError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{Role, Turn};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> LlmConfig {
        LlmConfig {
            api_key: "test-key".into(),
            base_url: base_url.into(),
            model: "grok-3-beta".into(),
            temperature: 0.7,
            max_response_tokens: 400,
            short_response_tokens: 70,
            image_model: "grok-2-image".into(),
            timeout_secs: 5,
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            system: "be brief".into(),
            history: vec![Turn {
                role: Role::User,
                content: "What is AI?".into(),
            }],
            max_tokens: 70,
            temperature: 0.7,
        }
    }

    #[tokio::test]
    async fn completion_sends_system_and_history() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "grok-3-beta",
                "max_tokens": 70,
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "What is AI?"},
                ],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "  Machines that learn.\n"}}],
            })))
            .mount(&server)
            .await;

        let client = XaiClient::new(&config(&server.uri())).unwrap();
        let reply = client.complete(request()).await.unwrap();
        assert_eq!(reply, "Machines that learn.");
    }

    #[tokio::test]
    async fn bad_credential_maps_to_invalid_credential() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Incorrect API key provided"},
            })))
            .mount(&server)
            .await;

        let client = XaiClient::new(&config(&server.uri())).unwrap();
        let error = client.complete(request()).await.unwrap_err();
        assert_eq!(
            error,
            LlmError::InvalidCredential("Incorrect API key provided".into())
        );
    }

    #[tokio::test]
    async fn rate_limit_maps_to_quota_exceeded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": "monthly quota reached",
            })))
            .mount(&server)
            .await;

        let client = XaiClient::new(&config(&server.uri())).unwrap();
        let error = client.complete(request()).await.unwrap_err();
        assert_eq!(error, LlmError::QuotaExceeded("monthly quota reached".into()));
    }

    #[tokio::test]
    async fn blank_content_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "   "}}],
            })))
            .mount(&server)
            .await;

        let client = XaiClient::new(&config(&server.uri())).unwrap();
        assert_eq!(
            client.complete(request()).await.unwrap_err(),
            LlmError::EmptyResponse
        );
    }

    #[tokio::test]
    async fn image_generation_returns_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/images/generations"))
            .and(body_partial_json(serde_json::json!({
                "model": "grok-2-image",
                "prompt": "draw a cat picture",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"url": "https://images.example.com/cat.png"}],
            })))
            .mount(&server)
            .await;

        let client = XaiClient::new(&config(&server.uri())).unwrap();
        let url = client.generate_image("draw a cat picture").await.unwrap();
        assert_eq!(url, "https://images.example.com/cat.png");
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            error_for_status(403, "x".into()),
            LlmError::InvalidCredential(_)
        ));
        assert!(matches!(
            error_for_status(400, "x".into()),
            LlmError::MalformedRequest(_)
        ));
        assert!(matches!(
            error_for_status(503, "x".into()),
            LlmError::Provider(_)
        ));
    }
}
