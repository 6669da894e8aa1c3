//! Integration tests for the recipe gateway
//!
//! These drive the public router end to end with a stub provider, including the peer-address
//! fallback for rate limiting that only exists once the router is served with connect info.

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use diabetic_chef::auth::StaticApiKey;
use diabetic_chef::client::HttpClient;
use diabetic_chef::upstream::UpstreamConfig;
use diabetic_chef::{AppState, build_router};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::util::ServiceExt; // for oneshot()

/// Answers every completion request with the same chat-completion body.
#[derive(Debug, Clone)]
struct StubProvider {
    content: String,
    calls: Arc<AtomicUsize>,
}

impl StubProvider {
    fn returning(content: &Value) -> Self {
        Self {
            content: content.to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for StubProvider {
    async fn request(
        &self,
        _req: axum::extract::Request,
    ) -> Result<axum::response::Response, Box<dyn std::error::Error + Send + Sync>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": self.content}}]
        });
        Ok(axum::response::Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))?)
    }
}

fn recipe() -> Value {
    json!({
        "title": "Olive Me, Olive You Broccoli",
        "ingredients": {
            "provided": ["2 cups broccoli florets (GI=15)", "1 tbsp olive oil"],
            "optional": ["1 clove garlic"]
        },
        "instructions": ["Toss broccoli in olive oil", "Roast at 220C for 15 minutes"],
        "nutrition": {"carbs": "9g", "fiber": "5g", "gl": 2, "calories": 180, "protein": "5g", "fat": "14g"},
        "tips": "Finish with lemon zest"
    })
}

fn app(provider: StubProvider) -> axum::Router {
    let upstream = UpstreamConfig::builder()
        .endpoint("https://provider.test/v1/chat/completions".parse().unwrap())
        .build();
    build_router(AppState::with_client(
        upstream,
        Arc::new(StaticApiKey::new("sk-integration")),
        provider,
    ))
}

fn generate_request(peer: &str, forwarded_for: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/generate")
        .header("content-type", "application/json");
    if let Some(forwarded_for) = forwarded_for {
        builder = builder.header("x-forwarded-for", forwarded_for);
    }
    let mut request = builder
        .body(Body::from(
            json!({"ingredients": "broccoli, olive oil"}).to_string(),
        ))
        .unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
    request
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_recipe_is_returned_verbatim() {
    let provider = StubProvider::returning(&recipe());
    let app = app(provider.clone());

    let response = app
        .oneshot(generate_request("192.0.2.1:40000", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, recipe());
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_peer_address_is_used_when_not_forwarded() {
    let provider = StubProvider::returning(&recipe());
    let app = app(provider.clone());

    // Same IP, different source ports: one client.
    for port in 40000..40005 {
        let response = app
            .clone()
            .oneshot(generate_request(&format!("192.0.2.1:{port}"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(generate_request("192.0.2.1:40005", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = json_body(response).await;
    assert_eq!(body["code"], "RATE_LIMITED");
    assert!(body["error"].is_string());

    // A different peer still gets through.
    let response = app
        .oneshot(generate_request("192.0.2.2:40000", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(provider.calls(), 6);
}

#[tokio::test]
async fn test_forwarded_address_takes_precedence_over_peer() {
    let app = app(StubProvider::returning(&recipe()));

    // Five requests through the same proxy, each on behalf of a different client.
    for client in 1..=5 {
        let forwarded = format!("203.0.113.{client}");
        let response = app
            .clone()
            .oneshot(generate_request("10.0.0.1:8080", Some(&forwarded)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(generate_request("10.0.0.1:8080", Some("203.0.113.99")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_model_output_without_required_fields_is_rejected() {
    let provider = StubProvider::returning(&json!({"title": "Just a title"}));
    let app = app(provider);

    let response = app
        .oneshot(generate_request("192.0.2.1:40000", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["code"], "INVALID_RECIPE_FORMAT");
    assert!(body["message"].as_str().unwrap().contains("ingredients.provided"));
}
