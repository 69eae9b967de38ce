//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `POST /v1/chat/completions`  generate a completion, blocking JSON or SSE stream
//! - `GET  /v1/health_check`      liveness check

use std::convert::Infallible;

use axum::{
    Router,
    extract::{State, rejection::JsonRejection},
    response::sse::{Event as SseEvent, Sse},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Serialize;
use tokio_stream::StreamExt;
use tracing::info;

use ragstream_core::framing::WireEvent;
use ragstream_core::request::GenerationRequest;

use crate::SharedState;
use crate::assembler::{Assembled, WireStream};
use crate::error::GatewayError;

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/chat/completions", post(chat_completions_handler))
        .route("/health_check", get(health_check_handler))
        .with_state(state)
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn chat_completions_handler(
    State(state): State<SharedState>,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<Response, GatewayError> {
    let Json(request) = payload?;
    info!(
        streaming = request.streaming,
        documents = request.documents.len(),
        "v1/chat/completions request"
    );

    match state.assembler.assemble(request).await? {
        Assembled::Complete(doc) => Ok(Json(doc).into_response()),
        Assembled::Stream(events) => Ok(event_stream_response(events)),
    }
}

/// No keep-alive comments: the body carries only framed records.
fn event_stream_response(events: WireStream) -> Response {
    let stream = events.map(|event| Ok::<_, Infallible>(sse_event(&event)));
    Sse::new(stream).into_response()
}

fn sse_event(event: &WireEvent) -> SseEvent {
    let sse = SseEvent::default();
    let sse = match event.event() {
        Some(name) => sse.event(name),
        None => sse,
    };
    sse.data(event.payload())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

async fn health_check_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "ragstream",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use ragstream_config::AppConfig;
    use ragstream_core::backend::Backend;
    use ragstream_core::error::BackendError;
    use ragstream_core::request::GeneratedDoc;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::GatewayState;
    use crate::test_helpers::ScriptedBackend;

    fn test_state(backend: Arc<dyn Backend>) -> SharedState {
        Arc::new(GatewayState::new(backend, AppConfig::default()))
    }

    fn post_json(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/chat/completions")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn non_streaming_returns_text_and_prompt() {
        let backend = Arc::new(ScriptedBackend::text("Paris is the capital of France."));
        let app = v1_router(test_state(backend));

        let response = app
            .oneshot(post_json(serde_json::json!({
                "query": "What is the capital of France?",
                "streaming": false
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let doc: GeneratedDoc = serde_json::from_slice(&body).unwrap();
        assert_eq!(doc.prompt, "What is the capital of France?");
        assert!(doc.text.contains("Paris"));
    }

    #[tokio::test]
    async fn documents_land_in_prompt() {
        let backend = Arc::new(ScriptedBackend::text("Paris."));
        let app = v1_router(test_state(backend.clone()));

        let response = app
            .oneshot(post_json(serde_json::json!({
                "query": "What is the capital of France?",
                "documents": ["Paris is the capital of France."],
                "streaming": false
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let doc: GeneratedDoc = serde_json::from_slice(&body).unwrap();
        assert!(doc.prompt.contains("Paris is the capital of France."));
        assert_eq!(backend.prompts(), vec![doc.prompt]);
    }

    #[tokio::test]
    async fn streaming_body_is_exact() {
        let backend = Arc::new(ScriptedBackend::fragments(&["Hel", "lo", " ", "!"]));
        let app = v1_router(test_state(backend));

        let response = app
            .oneshot(post_json(serde_json::json!({"query": "Say hello"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-cache"
        );

        assert_eq!(
            body_string(response).await,
            "data: Hel\n\ndata: lo\n\ndata: @#$\n\ndata: !\n\ndata: [DONE]\n\n"
        );
    }

    #[tokio::test]
    async fn streaming_body_splits_lines_and_escapes_marker_text() {
        let backend = Arc::new(ScriptedBackend::fragments(&["a\r\nb", "[DONE]"]));
        let app = v1_router(test_state(backend));

        let response = app
            .oneshot(post_json(serde_json::json!({"query": "q"})))
            .await
            .unwrap();

        let body = body_string(response).await;
        assert_eq!(body, "data: a\ndata: b\n\ndata: b'[DONE]'\n\ndata: [DONE]\n\n");
        assert_eq!(body.matches("data: [DONE]\n").count(), 1);
    }

    #[tokio::test]
    async fn streaming_failure_still_ends_with_done() {
        let backend = Arc::new(ScriptedBackend::script(vec![
            Ok("Par".into()),
            Err(BackendError::StreamInterrupted("connection reset".into())),
        ]));
        let app = v1_router(test_state(backend));

        let response = app
            .oneshot(post_json(serde_json::json!({"query": "q"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_string(response).await;
        assert!(body.starts_with("data: Par\n\nevent: error\ndata: "));
        assert!(body.ends_with("data: [DONE]\n\n"));
        assert_eq!(body.matches("[DONE]").count(), 1);
    }

    #[tokio::test]
    async fn missing_query_is_bad_request() {
        let backend = Arc::new(ScriptedBackend::text("unused"));
        let app = v1_router(test_state(backend.clone()));

        let response = app
            .oneshot(post_json(serde_json::json!({"documents": []})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["type"], "invalid_request");
        assert!(backend.prompts().is_empty());
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let app = v1_router(test_state(Arc::new(ScriptedBackend::text("unused"))));

        let req = Request::builder()
            .method("POST")
            .uri("/chat/completions")
            .header("content-type", "application/json")
            .body(Body::from("{\"query\": "))
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn out_of_range_parameters_are_bad_request() {
        let app = v1_router(test_state(Arc::new(ScriptedBackend::text("unused"))));

        let response = app
            .oneshot(post_json(serde_json::json!({"query": "q", "top_p": 1.5})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn backend_failure_is_bad_gateway() {
        let backend = Arc::new(ScriptedBackend::failing(BackendError::Network(
            "connection refused".into(),
        )));
        let app = v1_router(test_state(backend));

        let response = app
            .oneshot(post_json(serde_json::json!({"query": "q", "streaming": false})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["type"], "backend_unavailable");
        assert!(json.get("text").is_none());
    }

    #[tokio::test]
    async fn backend_timeout_is_gateway_timeout() {
        let backend = Arc::new(ScriptedBackend::failing(BackendError::Timeout("120s".into())));
        let app = v1_router(test_state(backend));

        let response = app
            .oneshot(post_json(serde_json::json!({"query": "q", "streaming": false})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn health_check_reports_ok() {
        let app = v1_router(test_state(Arc::new(ScriptedBackend::text(""))));

        let req = Request::builder()
            .uri("/health_check")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "ragstream");
    }
}
