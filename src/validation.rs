//! Inbound request validation.
//!
//! Split in two phases so the handler can put the rate limiter between them: the method check is
//! free and runs first, the body is only read and parsed once the client has quota left.
use crate::models::RecipeRequest;
use axum::http::Method;
use serde_json::Value;

/// The only verb the generate endpoint accepts.
pub const ACCEPTED_METHOD: Method = Method::POST;

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("method {0} is not allowed")]
    MethodNotAllowed(Method),
    #[error("request body is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("request body has no non-empty `ingredients` string")]
    MissingIngredients,
}

pub fn validate_method(method: &Method) -> Result<(), ValidationError> {
    if *method == ACCEPTED_METHOD {
        Ok(())
    } else {
        Err(ValidationError::MethodNotAllowed(method.clone()))
    }
}

/// Parses the body into a [`RecipeRequest`].
///
/// Anything that is JSON but not an object with a non-blank `ingredients` string (`[]`, `{}`,
/// `{"ingredients": 3}`) is a missing-ingredients error rather than a JSON error.
pub fn parse_recipe_request(body: &[u8]) -> Result<RecipeRequest, ValidationError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| ValidationError::InvalidJson(e.to_string()))?;

    let ingredients = value
        .get("ingredients")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|ingredients| !ingredients.is_empty())
        .ok_or(ValidationError::MissingIngredients)?;

    Ok(RecipeRequest {
        ingredients: ingredients.to_owned(),
    })
}
