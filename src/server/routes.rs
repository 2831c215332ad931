//! Axum route handlers for the ACDL registry HTTP server.
//!
//! # Routes
//!
//! - `GET  /health`         — Returns `{"status": "ok", "version": ...}`
//! - `POST /acdl/register`  — Accepts an `AgentManifest`; 201 on success,
//!   400 with the validation check list on rejection, 409 on duplicate id
//! - `POST /acdl/discover`  — Accepts a `DiscoveryQuery`; 200 with scored
//!   hits (an empty result set is a 200, not an error)
//! - `POST /acdl/match`     — Accepts `{task, requirements}`; always 200

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tower_http::cors::CorsLayer;

use crate::discovery::{self, DiscoveryQuery};
use crate::error::RegistryError;
use crate::manifest::AgentManifest;
use crate::matching::{self, MatchRequest};
use crate::registry::Registry;

/// Shared application state for the HTTP server.
///
/// The registry is the only shared mutable state; handlers receive it by
/// handle rather than through any module-level singleton.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry::new()),
        }
    }

    pub fn with_registry(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/acdl/register", post(register_handler))
        .route("/acdl/discover", post(discover_handler))
        .route("/acdl/match", post(match_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /health — liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "acdl-registry",
    }))
}

/// POST /acdl/register — validate and register an agent manifest.
///
/// A body whose fields have the wrong types never reaches the validator, so
/// the deserialization failure is folded into the same rejected shape as a
/// semantic failure: one synthetic failed check in `validationResults`.
async fn register_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let manifest: AgentManifest = serde_json::from_value(body).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "status": "rejected",
                "validationResults": [{
                    "check": "manifest-shape",
                    "passed": false,
                    "message": format!("Manifest validation failed: {}", e),
                }],
            })),
        )
    })?;

    match state.registry.register(manifest) {
        Ok(registration) => Ok((
            StatusCode::CREATED,
            Json(serde_json::json!({
                "registrationId": registration.registration_id,
                "agentId": registration.agent_id(),
                "status": registration.status,
                "registeredAt": registration.registered_at,
                "expiresAt": registration.expires_at,
                "conformanceLevel": registration.conformance_level,
                "validationResults": registration.validation_results,
            })),
        )),
        Err(RegistryError::Rejected { validation_results }) => Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "status": "rejected",
                "validationResults": validation_results,
            })),
        )),
        Err(RegistryError::Conflict { agent_id }) => Err((
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "error": "Agent already registered",
                "agentId": agent_id,
            })),
        )),
        Err(other) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": other.to_string()})),
        )),
    }
}

/// POST /acdl/discover — run a discovery query.
///
/// The body is taken as raw JSON and converted explicitly so a malformed
/// query shape (e.g. `domains` not an array) yields a 400 whose error text
/// names the validation failure, rather than the extractor's opaque 422.
async fn discover_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let query: DiscoveryQuery = serde_json::from_value(body).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": format!("Query validation failed: {}", e),
            })),
        )
    })?;

    let snapshot = state.registry.snapshot();
    let response = discovery::discover(&snapshot, &query);
    Ok(Json(serde_json::to_value(response).unwrap_or_default()))
}

/// POST /acdl/match — score all registered agents for a task.
async fn match_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let request: MatchRequest = serde_json::from_value(body).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": format!("Match request validation failed: {}", e),
            })),
        )
    })?;

    let snapshot = state.registry.snapshot();
    let response = matching::run_match(&snapshot, &request, state.registry.now());
    Ok(Json(serde_json::to_value(response).unwrap_or_default()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn worker_manifest() -> Value {
        serde_json::json!({
            "agentId": "worker-test-v1.0.0",
            "agentType": "worker",
            "version": "1.0.0",
            "capabilities": {
                "domains": ["testing"],
                "operations": [{"name": "run-tests"}]
            },
            "protocols": {
                "supported": [{"name": "rest", "version": "1.1", "endpoint": "https://agents.local/worker"}]
            },
            "performance": {
                "throughput": {"requestsPerSecond": 40.0},
                "latency": {"p50": 20.0, "p95": 80.0, "p99": 150.0}
            }
        })
    }

    fn post(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_string(body).unwrap()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = app_router(AppState::new());
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "acdl-registry");
    }

    #[tokio::test]
    async fn test_register_returns_201_with_registration_fields() {
        let app = app_router(AppState::new());
        let response = app
            .oneshot(post("/acdl/register", &worker_manifest()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let json = json_body(response).await;
        assert_eq!(json["status"], "registered");
        assert_eq!(json["agentId"], "worker-test-v1.0.0");
        assert_eq!(json["conformanceLevel"], "bronze");
        assert!(json["registrationId"].as_str().is_some());
        assert!(json["validationResults"].as_array().is_some());
    }

    #[tokio::test]
    async fn test_register_invalid_manifest_returns_400_rejected() {
        let app = app_router(AppState::new());
        let mut manifest = worker_manifest();
        manifest["agentId"] = Value::String("Not A Valid Id".to_string());
        let response = app.oneshot(post("/acdl/register", &manifest)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = json_body(response).await;
        assert_eq!(json["status"], "rejected");
        let results = json["validationResults"].as_array().unwrap();
        assert!(results.iter().any(|c| c["passed"] == false));
    }

    #[tokio::test]
    async fn test_register_wrong_field_types_returns_rejected_shape() {
        let app = app_router(AppState::new());
        let mut manifest = worker_manifest();
        // A numeric version fails deserialization before the validator runs;
        // the response must still use the rejected contract.
        manifest["version"] = serde_json::json!(1.0);
        let response = app.oneshot(post("/acdl/register", &manifest)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = json_body(response).await;
        assert_eq!(json["status"], "rejected");
        let results = json["validationResults"].as_array().unwrap();
        assert_eq!(results[0]["check"], "manifest-shape");
        assert_eq!(results[0]["passed"], false);
    }

    #[tokio::test]
    async fn test_duplicate_register_returns_409() {
        let state = AppState::new();
        let app = app_router(state.clone());

        let first = app
            .clone()
            .oneshot(post("/acdl/register", &worker_manifest()))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = app
            .oneshot(post("/acdl/register", &worker_manifest()))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);

        let json = json_body(second).await;
        assert_eq!(json["error"], "Agent already registered");
    }

    #[tokio::test]
    async fn test_register_then_discover_round_trip() {
        let state = AppState::new();
        let app = app_router(state.clone());

        app.clone()
            .oneshot(post("/acdl/register", &worker_manifest()))
            .await
            .unwrap();

        let response = app
            .oneshot(post(
                "/acdl/discover",
                &serde_json::json!({"domains": ["testing"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["totalFound"], 1);
        assert_eq!(json["agents"][0]["agentId"], "worker-test-v1.0.0");
        assert!(json["queryTime"].as_u64().is_some());
    }

    #[tokio::test]
    async fn test_discover_empty_result_is_200() {
        let app = app_router(AppState::new());
        let response = app
            .oneshot(post(
                "/acdl/discover",
                &serde_json::json!({"domains": ["nothing-here"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["totalFound"], 0);
        assert_eq!(json["agents"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_discover_malformed_query_returns_400_validation_error() {
        let app = app_router(AppState::new());
        let response = app
            .oneshot(post(
                "/acdl/discover",
                &serde_json::json!({"domains": "testing"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = json_body(response).await;
        assert!(json["error"].as_str().unwrap().contains("validation"));
    }

    #[tokio::test]
    async fn test_match_always_returns_200_with_recommendation() {
        let state = AppState::new();
        let app = app_router(state.clone());

        app.clone()
            .oneshot(post("/acdl/register", &worker_manifest()))
            .await
            .unwrap();

        let body = serde_json::json!({
            "task": {"type": "testing", "description": "run the suite"},
            "requirements": {"capabilities": {"domains": ["testing"]}}
        });
        let response = app.oneshot(post("/acdl/match", &body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(
            json["recommendation"]["primaryAgent"],
            "worker-test-v1.0.0"
        );
        let compatibility = json["matches"][0]["compatibility"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&compatibility));
    }

    #[tokio::test]
    async fn test_match_with_no_candidates_is_200_with_null_primary() {
        let app = app_router(AppState::new());
        let body = serde_json::json!({
            "task": {"type": "testing"},
            "requirements": {"capabilities": {"domains": ["testing"]}}
        });
        let response = app.oneshot(post("/acdl/match", &body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert!(json["recommendation"]["primaryAgent"].is_null());
        assert_eq!(json["matches"].as_array().unwrap().len(), 0);
    }
}
