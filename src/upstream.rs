//! The chat-completion call.
//!
//! One attempt per inbound request, bounded by a [`Deadline`]. The whole exchange (connect,
//! send, read the body) runs inside `tokio::time::timeout_at`; when the deadline fires the future
//! is dropped, which closes the in-flight connection and frees the timer. Nothing keeps running
//! after the handler has answered.
use crate::auth::{ApiKeySource, bearer_header};
use crate::client::HttpClient;
use crate::models::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ResponseFormat, UpstreamErrorBody,
};
use axum::body::Body;
use axum::http::{
    Method, Request, StatusCode, Uri,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use bon::Builder;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, instrument, warn};
use url::Url;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Completion bodies are small JSON documents; anything past this is not a recipe.
const MAX_COMPLETION_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("no API key is configured for the completion provider")]
    MissingApiKey,
    #[error("completion provider did not answer within {0:?}")]
    Timeout(Duration),
    #[error("failed to build completion request: {0}")]
    Request(String),
    #[error("completion request failed: {0}")]
    Transport(Box<dyn std::error::Error + Send + Sync>),
    #[error("completion provider returned {status}")]
    Status {
        status: StatusCode,
        message: Option<String>,
    },
    #[error("completion provider returned a malformed body: {0}")]
    MalformedCompletion(#[source] serde_json::Error),
}

/// Settings for the completion call.
#[derive(Debug, Clone, Builder)]
pub struct UpstreamConfig {
    /// Full URL of the chat-completion endpoint.
    pub endpoint: Url,
    #[builder(into, default = DEFAULT_MODEL.to_string())]
    pub model: String,
    #[builder(default = DEFAULT_TEMPERATURE)]
    pub temperature: f64,
    /// Budget for the whole upstream exchange.
    #[builder(default = DEFAULT_TIMEOUT)]
    pub timeout: Duration,
}

/// The point in time by which the upstream call must have finished.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    pub fn instant(&self) -> Instant {
        self.at
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamClient<T: HttpClient> {
    http_client: T,
    config: Arc<UpstreamConfig>,
    api_key: Arc<dyn ApiKeySource>,
}

impl<T: HttpClient> UpstreamClient<T> {
    pub fn new(http_client: T, config: UpstreamConfig, api_key: Arc<dyn ApiKeySource>) -> Self {
        Self {
            http_client,
            config: Arc::new(config),
            api_key,
        }
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    /// Sends `prompt` as a single user message and returns the first choice's content.
    ///
    /// `Ok(None)` means the provider answered successfully but without any string content;
    /// deciding what that means is left to the caller.
    #[instrument(skip_all, fields(model = %self.config.model, budget = ?deadline.budget()))]
    pub async fn complete(
        &self,
        prompt: &str,
        deadline: Deadline,
    ) -> Result<Option<String>, UpstreamError> {
        let api_key = self.api_key.api_key().ok_or(UpstreamError::MissingApiKey)?;
        let request = self.build_request(prompt, &api_key)?;

        match tokio::time::timeout_at(deadline.instant(), self.send(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Completion request exceeded its deadline and was cancelled");
                Err(UpstreamError::Timeout(deadline.budget()))
            }
        }
    }

    fn build_request(&self, prompt: &str, api_key: &str) -> Result<Request<Body>, UpstreamError> {
        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![ChatMessage::user(prompt)],
            temperature: self.config.temperature,
            response_format: ResponseFormat::json_object(),
        };
        let body_bytes =
            serde_json::to_vec(&body).map_err(|e| UpstreamError::Request(e.to_string()))?;

        let uri = Uri::try_from(self.config.endpoint.as_str())
            .map_err(|e| UpstreamError::Request(format!("invalid endpoint: {e}")))?;
        // The error would only say the value was invalid; keep the key itself out of it.
        let authorization = bearer_header(api_key)
            .map_err(|_| UpstreamError::Request("API key is not a valid header value".into()))?;

        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, authorization)
            .body(Body::from(body_bytes))
            .map_err(|e| UpstreamError::Request(e.to_string()))
    }

    async fn send(&self, request: Request<Body>) -> Result<Option<String>, UpstreamError> {
        debug!("Sending completion request to {}", self.config.endpoint);
        let response = self.http_client.request(request).await.map_err(|e| {
            error!("Error sending completion request to {}: {}", self.config.endpoint, e);
            UpstreamError::Transport(e)
        })?;

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), MAX_COMPLETION_BYTES)
            .await
            .map_err(|e| UpstreamError::Transport(Box::new(e)))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<UpstreamErrorBody>(&body)
                .ok()
                .and_then(UpstreamErrorBody::into_message);
            error!(status = status.as_u16(), upstream_message = ?message, "Completion provider returned an error");
            return Err(UpstreamError::Status { status, message });
        }

        let completion: ChatCompletionResponse =
            serde_json::from_slice(&body).map_err(UpstreamError::MalformedCompletion)?;
        Ok(completion.into_content())
    }
}
