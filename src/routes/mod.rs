//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/clock", get(http::http_get_clock))
        .route("/api/v1/sessions", post(http::http_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(http::http_get_session).delete(http::http_end_session),
        )
        .route("/api/v1/sessions/:id/next", post(http::http_select_next))
        .route("/api/v1/sessions/:id/submission", put(http::http_update_submission))
        .route("/api/v1/sessions/:id/submission/reset", post(http::http_reset_submission))
        .route("/api/v1/sessions/:id/submit", post(http::http_submit))
        .route("/api/v1/sessions/:id/acknowledge", post(http::http_acknowledge))
        .route("/api/v1/sessions/:id/summary", get(http::http_get_summary))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::gateway::AiGateway;

    fn app() -> Router {
        build_router(Arc::new(AppState::with_gateway(AiGateway::offline())))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    #[tokio::test]
    async fn health_and_clock_respond() {
        let app = app();
        let (status, body) = call(&app, "GET", "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);

        let (status, body) = call(&app, "GET", "/api/v1/clock", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["now"].as_str().unwrap().contains('T'));
    }

    #[tokio::test]
    async fn registration_validation_maps_to_bad_request() {
        let app = app();
        let (status, body) =
            call(&app, "POST", "/api/v1/sessions", Some(json!({ "name": "  ", "participants": ["Asha"] }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Team name"));

        let (status, _) =
            call(&app, "POST", "/api/v1/sessions", Some(json!({ "name": "T", "participants": ["", " "] }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, "GET", "/api/v1/sessions/unknown", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn single_participant_session_over_http() {
        let app = app();
        let (status, created) = call(
            &app,
            "POST",
            "/api/v1/sessions",
            Some(json!({ "name": " Loom ", "participants": [" Asha ", ""] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["name"], "Loom");
        assert_eq!(created["participants"][0]["status"], "pending");
        let id = created["id"].as_str().unwrap().to_string();
        let base = format!("/api/v1/sessions/{id}");

        let (status, _) = call(&app, "POST", &format!("{base}/submit"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, v) = call(&app, "POST", &format!("{base}/next"), None).await;
        assert_eq!(v["phase"], "active");
        assert_eq!(v["currentParticipant"]["name"], "Asha");
        assert_eq!(v["turn"]["challenge"]["source"], "fallback");
        let buggy = v["turn"]["challenge"]["buggyCode"].clone();
        assert_eq!(v["turn"]["submission"], buggy);

        let (_, v) = call(&app, "PUT", &format!("{base}/submission"), Some(json!({ "code": "int main(){}" }))).await;
        assert_eq!(v["turn"]["submission"], "int main(){}");
        let (_, v) = call(&app, "POST", &format!("{base}/submission/reset"), None).await;
        assert_eq!(v["turn"]["submission"], buggy);

        let (status, _) = call(&app, "GET", &format!("{base}/summary"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, v) = call(&app, "POST", &format!("{base}/submit"), None).await;
        assert_eq!(v["phase"], "scored");
        assert_eq!(v["turn"]["result"]["isCorrect"], false);
        assert_eq!(v["turn"]["result"]["score"], 0);
        assert_eq!(v["participants"][0]["status"], "completed");

        let (_, ack) = call(&app, "POST", &format!("{base}/acknowledge"), None).await;
        assert_eq!(ack["session"]["phase"], "finished");
        assert_eq!(ack["completed"]["totalScore"], 0);
        assert_eq!(ack["completed"]["maxPossible"], 15);

        let (status, summary) = call(&app, "GET", &format!("{base}/summary"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["leaderboard"][0]["name"], "Asha");
    }

    #[tokio::test]
    async fn ended_sessions_are_removed_from_the_registry() {
        let state = Arc::new(AppState::with_gateway(AiGateway::offline()));
        let app = build_router(state.clone());

        let (_, first) =
            call(&app, "POST", "/api/v1/sessions", Some(json!({ "name": "A", "participants": ["Asha"] }))).await;
        let (_, second) =
            call(&app, "POST", "/api/v1/sessions", Some(json!({ "name": "B", "participants": ["Ravi"] }))).await;
        assert_eq!(state.sessions.read().await.len(), 2);

        let base = format!("/api/v1/sessions/{}", first["id"].as_str().unwrap());
        let (status, body) = call(&app, "DELETE", &base, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);
        assert_eq!(state.sessions.read().await.len(), 1);

        let (status, _) = call(&app, "GET", &base, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, "DELETE", &base, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let other = format!("/api/v1/sessions/{}", second["id"].as_str().unwrap());
        let (status, _) = call(&app, "GET", &other, None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
