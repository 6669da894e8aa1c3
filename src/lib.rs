//! diabetic-chef - turns a list of ingredients into a diabetes-friendly recipe
//!
//! A single `POST /api/generate` endpoint takes `{"ingredients": "..."}`, asks an
//! OpenAI-compatible chat-completion provider for a low-GI recipe, checks that what came back is a
//! recipe-shaped JSON document and returns it. Every failure is answered with
//! `{"error", "code", "message"?}` and a fixed status code; see [`errors::RecipeError`].

use axum::Router;
use axum::routing::{any, get};
use axum_prometheus::{
    GenericMetricLayer, Handle, PrometheusMetricLayerBuilder,
    metrics_exporter_prometheus::PrometheusHandle,
};
use std::borrow::Cow;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{info, instrument};

pub mod auth;
pub mod client;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod prompt;
pub mod rate_limit;
pub mod recipe;
pub mod upstream;
pub mod validation;

use auth::ApiKeySource;
use client::{HttpClient, HyperClient, PoolConfig};
use handlers::{GENERATE_PATH, generate_recipe_handler};
use rate_limit::RateLimiter;
use upstream::{UpstreamClient, UpstreamConfig};

/// Shared state: the upstream adapter and the process-wide rate limiter.
#[derive(Clone, Debug)]
pub struct AppState<T: HttpClient> {
    pub upstream: UpstreamClient<T>,
    pub rate_limiter: RateLimiter,
}

impl AppState<HyperClient> {
    /// Create a new AppState backed by a pooled Hyper client
    pub fn new(
        upstream: UpstreamConfig,
        api_key: Arc<dyn ApiKeySource>,
        pool: PoolConfig,
    ) -> Self {
        Self::with_client(upstream, api_key, client::create_hyper_client(pool))
    }
}

impl<T: HttpClient> AppState<T> {
    /// Create a new AppState with a custom HTTP client (useful for testing)
    pub fn with_client(
        upstream: UpstreamConfig,
        api_key: Arc<dyn ApiKeySource>,
        http_client: T,
    ) -> Self {
        Self {
            upstream: UpstreamClient::new(http_client, upstream, api_key),
            rate_limiter: RateLimiter::new(),
        }
    }
}

/// Build the main router
/// This creates routes for:
/// - `/api/generate` - Generates a recipe (all methods are routed here; only POST succeeds)
#[instrument(skip(state))]
pub fn build_router<T: HttpClient + Clone + 'static>(state: AppState<T>) -> Router {
    info!("Building router");
    Router::new()
        .route(GENERATE_PATH, any(generate_recipe_handler::<T>))
        .layer(CatchPanicLayer::custom(errors::handle_panic))
        .with_state(state)
}

/// Builds a router for the metrics endpoint.
#[instrument(skip(handle))]
pub fn build_metrics_router(handle: PrometheusHandle) -> Router {
    info!("Building metrics router");
    Router::new().route("/metrics", get(move || async move { handle.render() }))
}

type MetricsLayerAndHandle = (
    GenericMetricLayer<'static, PrometheusHandle, Handle>,
    PrometheusHandle,
);

/// Builds a layer and handle for prometheus metrics collection.
///
/// `prefix` is prepended to every metric name, e.g. `diabetic_chef_http_requests_total`.
pub fn build_metrics_layer_and_handle(
    prefix: impl Into<Cow<'static, str>>,
) -> MetricsLayerAndHandle {
    info!("Building metrics layer");
    PrometheusMetricLayerBuilder::new()
        .with_prefix(prefix)
        .enable_response_body_size(true)
        .with_endpoint_label_type(axum_prometheus::EndpointLabel::Exact)
        .with_default_metrics()
        .build_pair()
}
