//! The single place where pipeline failures become HTTP responses.
//!
//! Every layer has its own error enum ([`ValidationError`], [`UpstreamError`], [`FormatError`]).
//! They all fold into [`RecipeError`], and its [`IntoResponse`] impl is the only code that picks a
//! status code and error code. The body is always `{"error", "code", "message"?}`.
use crate::recipe::FormatError;
use crate::upstream::UpstreamError;
use crate::validation::ValidationError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::any::Any;
use tracing::{error, warn};

pub const METHOD_NOT_ALLOWED: &str = "METHOD_NOT_ALLOWED";
pub const RATE_LIMITED: &str = "RATE_LIMITED";
pub const INVALID_JSON: &str = "INVALID_JSON";
pub const MISSING_INGREDIENTS: &str = "MISSING_INGREDIENTS";
pub const MISSING_API_KEY: &str = "MISSING_API_KEY";
pub const TIMEOUT: &str = "TIMEOUT";
pub const EMPTY_AI_RESPONSE: &str = "EMPTY_AI_RESPONSE";
pub const INVALID_RECIPE_FORMAT: &str = "INVALID_RECIPE_FORMAT";
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

#[derive(Debug, thiserror::Error)]
pub enum RecipeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("rate limit exceeded for client {0}")]
    RateLimited(String),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// The JSON body written for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RecipeError {
    pub fn status(&self) -> StatusCode {
        match self {
            RecipeError::Validation(ValidationError::MethodNotAllowed(_)) => {
                StatusCode::METHOD_NOT_ALLOWED
            }
            RecipeError::Validation(_) => StatusCode::BAD_REQUEST,
            RecipeError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            RecipeError::Upstream(_) | RecipeError::Format(_) | RecipeError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            RecipeError::Validation(ValidationError::MethodNotAllowed(_)) => METHOD_NOT_ALLOWED,
            RecipeError::Validation(ValidationError::InvalidJson(_)) => INVALID_JSON,
            RecipeError::Validation(ValidationError::MissingIngredients) => MISSING_INGREDIENTS,
            RecipeError::RateLimited(_) => RATE_LIMITED,
            RecipeError::Upstream(UpstreamError::MissingApiKey) => MISSING_API_KEY,
            RecipeError::Upstream(UpstreamError::Timeout(_)) => TIMEOUT,
            RecipeError::Upstream(_) => INTERNAL_ERROR,
            RecipeError::Format(FormatError::EmptyResponse) => EMPTY_AI_RESPONSE,
            RecipeError::Format(_) => INVALID_RECIPE_FORMAT,
            RecipeError::Internal(_) => INTERNAL_ERROR,
        }
    }

    /// Builds the client-facing body. Nothing from the server-side error chain is copied in
    /// unless it is safe to show: the caller's own parse error, the upstream provider's message,
    /// or the name of a missing recipe field.
    pub fn body(&self) -> ErrorBody {
        let (error, message) = match self {
            RecipeError::Validation(ValidationError::MethodNotAllowed(_)) => (
                "Method not allowed",
                Some("Use POST to generate a recipe".to_string()),
            ),
            RecipeError::Validation(ValidationError::InvalidJson(detail)) => {
                ("Invalid JSON", Some(detail.clone()))
            }
            RecipeError::Validation(ValidationError::MissingIngredients) => (
                "Missing ingredients",
                Some("Provide a non-empty `ingredients` string".to_string()),
            ),
            RecipeError::RateLimited(_) => (
                "Too many requests",
                Some("Please wait a minute before asking for another recipe".to_string()),
            ),
            RecipeError::Upstream(UpstreamError::MissingApiKey) => (
                "Server misconfigured",
                Some("The recipe service has no API credential configured".to_string()),
            ),
            RecipeError::Upstream(UpstreamError::Timeout(_)) => (
                "Recipe generation timed out",
                Some(
                    "The AI took too long to respond. Try again with fewer or simpler ingredients."
                        .to_string(),
                ),
            ),
            RecipeError::Upstream(UpstreamError::Status { message, .. }) => {
                ("Recipe generation failed", message.clone())
            }
            RecipeError::Upstream(_) => ("Recipe generation failed", None),
            RecipeError::Format(FormatError::EmptyResponse) => (
                "Empty AI response",
                Some("The AI did not return a recipe".to_string()),
            ),
            RecipeError::Format(e) => ("Invalid recipe format", Some(e.to_string())),
            RecipeError::Internal(_) => ("Internal server error", None),
        };
        ErrorBody {
            error: error.to_string(),
            code: self.code(),
            message,
        }
    }
}

impl IntoResponse for RecipeError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        if status.is_server_error() {
            error!(status = status.as_u16(), code, error = ?self, "Recipe request failed");
        } else {
            warn!(status = status.as_u16(), code, error = %self, "Recipe request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}

/// Panic hook for `CatchPanicLayer`: anything that escapes the handler still gets the JSON 500.
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    RecipeError::Internal(anyhow::anyhow!("handler panicked: {detail}")).into_response()
}
