use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use fortec_core::config::ChatConfig;
use fortec_core::{Transcript, Turn};

use crate::error::UpstreamError;
use crate::http::{build_headers, RetryingCaller};
use crate::provider::ChatProvider;

/// Body of an OpenAI-compatible `chat/completions` request.
///
/// Built fresh for every call from an owned transcript snapshot, so later
/// changes to the session never leak into an in-flight request.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub model: String,
    pub messages: Vec<Turn>,
    pub stream: bool,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, transcript: Transcript) -> Self {
        Self {
            model: model.into(),
            messages: transcript.into(),
            stream: false,
        }
    }
}

/// Chat completion client for any OpenAI-compatible endpoint.
pub struct ChatClient {
    caller: RetryingCaller,
    endpoint: String,
    model: String,
    headers: HeaderMap,
    timeout: Duration,
}

impl ChatClient {
    pub fn new(config: &ChatConfig, caller: RetryingCaller) -> Self {
        Self {
            caller,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            headers: build_headers(config.api_key.as_deref(), &config.headers),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatProvider for ChatClient {
    fn name(&self) -> &str {
        "chat-completions"
    }

    async fn complete(&self, transcript: Transcript) -> Result<String, UpstreamError> {
        let request = GenerationRequest::new(self.model.clone(), transcript);
        debug!(model = %request.model, turns = request.messages.len(), "sending chat completion");

        let resp: ApiResponse = self
            .caller
            .post_json(&self.endpoint, &self.headers, &request, self.timeout)
            .await?;

        parse_response(resp)
    }
}

fn parse_response(resp: ApiResponse) -> Result<String, UpstreamError> {
    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| UpstreamError::Parse("response has no choices".to_string()))?;

    let content = choice
        .message
        .content
        .map(|c| c.trim().to_string())
        .unwrap_or_default();

    if content.is_empty() {
        return Err(UpstreamError::Parse("completion has no content".to_string()));
    }
    Ok(content)
}

// Response types (private, deserialization only)

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::RetryPolicy;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ChatClient {
        let config = ChatConfig {
            endpoint: format!("{}/v1/openai/chat/completions", server.uri()),
            api_key: Some("k".to_string()),
            model: "test-model".to_string(),
            ..ChatConfig::default()
        };
        ChatClient::new(
            &config,
            RetryingCaller::new(RetryPolicy::new(2, Duration::from_millis(1))),
        )
    }

    #[test]
    fn request_serialises_full_transcript() {
        let mut t = Transcript::new("sys");
        t.push(Turn::user("hi"));
        let req = GenerationRequest::new("m", t);
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "model": "m",
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "hi"}
                ],
                "stream": false
            })
        );
    }

    #[tokio::test]
    async fn complete_posts_transcript_and_trims_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/openai/chat/completions"))
            .and(header("authorization", "Bearer k"))
            .and(body_json(json!({
                "model": "test-model",
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "hello"}
                ],
                "stream": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "  Hi there!\n"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut t = Transcript::new("sys");
        t.push(Turn::user("hello"));
        let reply = client_for(&server).complete(t).await.unwrap();
        assert_eq!(reply, "Hi there!");
    }

    #[tokio::test]
    async fn empty_choices_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .complete(Transcript::new("sys"))
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Parse(_)));
    }

    #[tokio::test]
    async fn missing_content_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"choices": [{"message": {"content": null}}]})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .complete(Transcript::new("sys"))
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Parse(_)));
    }
}
