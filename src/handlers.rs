/// Axum handler for the recipe endpoint
use crate::client::HttpClient;
use crate::errors::RecipeError;
use crate::models::Recipe;
use crate::upstream::Deadline;
use crate::validation::{self, ValidationError};
use crate::{AppState, prompt, recipe};
use axum::{
    Json,
    extract::{ConnectInfo, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use tracing::{Span, debug, info, instrument};

pub const GENERATE_PATH: &str = "/api/generate";

const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Request bodies are a single short string; anything larger is rejected as malformed.
const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Identity used when neither a forwarded address nor a peer address is available.
const UNKNOWN_CLIENT: &str = "unknown";

/// Handles every method on the generate path so that non-POST requests get the JSON 405 rather
/// than the router's empty one.
#[instrument(skip(state, req), fields(method = %req.method(), client = tracing::field::Empty))]
pub async fn generate_recipe_handler<T: HttpClient + Clone + 'static>(
    State(state): State<AppState<T>>,
    req: axum::extract::Request,
) -> Response {
    match generate_recipe(&state, req).await {
        Ok(recipe) => (StatusCode::OK, Json(recipe)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Admission order is method, then quota, then body. A request that fails one step never
/// reaches the later ones.
async fn generate_recipe<T: HttpClient>(
    state: &AppState<T>,
    req: axum::extract::Request,
) -> Result<Recipe, RecipeError> {
    validation::validate_method(req.method())?;

    let identity = client_identity(&req);
    Span::current().record("client", identity.as_str());
    if !state.rate_limiter.check_and_increment(&identity) {
        return Err(RecipeError::RateLimited(identity));
    }

    let body_bytes = axum::body::to_bytes(req.into_body(), MAX_REQUEST_BYTES)
        .await
        .map_err(|e| ValidationError::InvalidJson(e.to_string()))?;
    debug!("Received request body of size: {}", body_bytes.len());
    let request = validation::parse_recipe_request(&body_bytes)?;

    info!(ingredients = %request.ingredients, "Generating recipe");
    let prompt = prompt::build_prompt(&request.ingredients);
    let deadline = Deadline::after(state.upstream.config().timeout);
    let content = state.upstream.complete(&prompt, deadline).await?;

    let recipe = recipe::validate(content.as_deref())?;
    info!(title = %recipe.title, "Recipe generated");
    Ok(recipe)
}

/// The first hop of `x-forwarded-for` if present, otherwise the peer address.
pub fn client_identity(req: &axum::extract::Request) -> String {
    let forwarded = req
        .headers()
        .get(FORWARDED_FOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(forwarded) = forwarded {
        return forwarded.to_owned();
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;

    #[test]
    fn test_identity_prefers_first_forwarded_hop() {
        let req = Request::builder()
            .header("x-forwarded-for", " 203.0.113.7 , 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_identity(&req), "203.0.113.7");
    }

    #[test]
    fn test_identity_falls_back_to_peer_address() {
        let mut req = Request::builder().body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo("192.0.2.10:51234".parse::<SocketAddr>().unwrap()));
        assert_eq!(client_identity(&req), "192.0.2.10");

        let mut req = Request::builder()
            .header("x-forwarded-for", "")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo("192.0.2.10:51234".parse::<SocketAddr>().unwrap()));
        assert_eq!(client_identity(&req), "192.0.2.10");
    }

    #[test]
    fn test_identity_without_any_source() {
        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_identity(&req), UNKNOWN_CLIENT);
    }
}
