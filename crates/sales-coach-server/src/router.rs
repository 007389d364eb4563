use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health::index))
        .route("/health", get(handlers::health::health_check))
        .route("/api/chat", post(handlers::chat::chat_handler))
        .route("/api/results", get(handlers::results::results_handler))
        .route("/api/end-call", post(handlers::session::end_call_handler))
        .route("/api/reset", post(handlers::session::reset_handler))
        .route(
            "/api/workflows/{workflow_id}",
            get(handlers::workflows::workflow_status_handler),
        )
        .fallback(handlers::health::not_found)
        .method_not_allowed_fallback(handlers::health::not_found)
        .with_state(state)
        // CORS
        .layer(CorsLayer::permissive())
        // Tracing
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChatConfig, WorkflowConfig};
    use crate::models::ChatMessage;
    use crate::services::llm_service::{LlmProvider, MockLlmProvider};
    use crate::services::session::MemoryBackend;
    use crate::services::{ChatService, FinalizeWorkflow, SessionStore, WorkflowRunner};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, Response, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Semaphore;
    use tower::ServiceExt;

    const CHAT_REPLY: &str = r#"<json>{"reply": "We price per seat. Happy to build a quote.", "followUps": ["How many seats?", "What is your timeline?"]}</json>"#;

    fn app_with(llm: Arc<dyn LlmProvider>) -> Router {
        let store = Arc::new(SessionStore::new(Arc::new(MemoryBackend::new())));
        let chat_service = Arc::new(ChatService::new(store.clone(), llm.clone(), ChatConfig::default()));
        let workflow = Arc::new(FinalizeWorkflow::new(store.clone(), llm));
        let workflow_runner = Arc::new(WorkflowRunner::start(workflow, &WorkflowConfig::default()));

        build_router(AppState { store, chat_service, workflow_runner })
    }

    fn chat_llm() -> Arc<dyn LlmProvider> {
        let mut llm = MockLlmProvider::new();
        llm.expect_generate().returning(|_| Ok(CHAT_REPLY.to_string()));
        llm.expect_generate_with().returning(|_, _, _| Ok("no notes".to_string()));
        Arc::new(llm)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response<Body>) -> Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    /// Holds every model call until the test releases permits.
    struct GatedLlm {
        gate: Semaphore,
    }

    impl GatedLlm {
        async fn wait(&self) {
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
        }
    }

    #[async_trait]
    impl LlmProvider for GatedLlm {
        async fn generate(&self, _messages: &[ChatMessage]) -> anyhow::Result<String> {
            Ok(CHAT_REPLY.to_string())
        }

        async fn generate_with(
            &self,
            messages: &[ChatMessage],
            _max_tokens: usize,
            _temperature: f32,
        ) -> anyhow::Result<String> {
            self.wait().await;
            let system = messages.first().map(|m| m.content.as_str()).unwrap_or_default();
            if system.contains("summarize completed sales calls") {
                Ok(r#"<json>["1", "2", "3", "4", "5", "6", "7"]</json>"#.to_string())
            } else if system.contains("action items") {
                Ok(r#"<json>[{"owner": "Customer", "item": "Send org chart"}]</json>"#.to_string())
            } else {
                Ok("Hi Dana, great speaking today.".to_string())
            }
        }
    }

    #[tokio::test]
    async fn test_index_is_plaintext_usage() {
        let app = app_with(chat_llm());
        let response = app.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("POST /api/chat"));
    }

    #[tokio::test]
    async fn test_health_reports_version() {
        let app = app_with(chat_llm());
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = app_with(chat_llm());
        let response = app.oneshot(get("/api/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_wrong_method_on_known_path_is_404() {
        let app = app_with(chat_llm());

        let response = app.clone().oneshot(get("/api/chat")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("/api/chat"));

        let response = app
            .oneshot(post_json("/api/results?sessionId=s1", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_chat_requires_fields() {
        let app = app_with(chat_llm());

        let response = app
            .clone()
            .oneshot(post_json("/api/chat", json!({"sessionId": "s1"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("message"));

        let response = app
            .clone()
            .oneshot(post_json("/api/chat", json!({"sessionId": "", "message": "hi"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let malformed = Request::builder()
            .method(Method::POST)
            .uri("/api/chat")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(malformed).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_round_trip() {
        let app = app_with(chat_llm());

        let response = app
            .clone()
            .oneshot(post_json("/api/chat", json!({"sessionId": "s1", "message": "What's your pricing?"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["reply"], "We price per seat. Happy to build a quote.");
        assert_eq!(body["followUps"].as_array().unwrap().len(), 2);
        assert_eq!(body["userTurnCount"], 1);
        assert!(body["dealMemory"].is_object());
        assert_eq!(body["rollingSummary"], "");

        let response = app.oneshot(get("/api/results?sessionId=s1")).await.unwrap();
        let state = body_json(response).await;
        assert_eq!(state["messages"].as_array().unwrap().len(), 2);
        assert_eq!(state["messages"][0]["role"], "user");
        assert!(state.get("final").is_none());
    }

    #[tokio::test]
    async fn test_results_requires_session_id() {
        let app = app_with(chat_llm());
        let response = app.oneshot(get("/api/results")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reset_restores_defaults() {
        let app = app_with(chat_llm());

        for message in ["hello", "pricing?"] {
            app.clone()
                .oneshot(post_json("/api/chat", json!({"sessionId": "s1", "message": message})))
                .await
                .unwrap();
        }

        let response = app
            .clone()
            .oneshot(post_json("/api/reset", json!({"sessionId": "s1"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["ok"], true);

        let response = app.clone().oneshot(get("/api/results?sessionId=s1")).await.unwrap();
        let state = body_json(response).await;
        assert_eq!(state["messages"], json!([]));
        assert_eq!(state["userTurnCount"], 0);
        assert_eq!(state["rollingSummary"], "");
        assert_eq!(state["dealMemory"]["painPoints"], json!([]));
        assert!(state.get("final").is_none());

        let response = app.oneshot(post_json("/api/reset", json!({}))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_end_call_finalizes_asynchronously() {
        let llm = Arc::new(GatedLlm { gate: Semaphore::new(0) });
        let app = app_with(llm.clone());

        app.clone()
            .oneshot(post_json("/api/chat", json!({"sessionId": "s1", "message": "We need 40 seats"})))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(post_json("/api/end-call", json!({"sessionId": "s1"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["ok"], true);
        let workflow_id = body["workflowId"].as_str().unwrap().to_string();

        // Model calls are still gated, so nothing is final yet
        let response = app.clone().oneshot(get("/api/results?sessionId=s1")).await.unwrap();
        assert!(body_json(response).await.get("final").is_none());

        llm.gate.add_permits(3);

        let mut status = Value::Null;
        for _ in 0..200 {
            let response = app
                .clone()
                .oneshot(get(&format!("/api/workflows/{}", workflow_id)))
                .await
                .unwrap();
            status = body_json(response).await;
            if status["status"] == "complete" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status["status"], "complete");
        assert_eq!(status["sessionId"], "s1");

        let response = app.oneshot(get("/api/results?sessionId=s1")).await.unwrap();
        let state = body_json(response).await;
        let bullets = state["final"]["summaryBullets"].as_array().unwrap();
        assert_eq!(bullets.len(), 6);
        assert_eq!(state["final"]["actionItems"][0]["owner"], "Customer");
        assert_eq!(state["final"]["followupEmail"], "Hi Dana, great speaking today.");
    }

    #[tokio::test]
    async fn test_reset_during_finalization_keeps_defaults() {
        let llm = Arc::new(GatedLlm { gate: Semaphore::new(0) });
        let app = app_with(llm.clone());

        app.clone()
            .oneshot(post_json("/api/chat", json!({"sessionId": "s1", "message": "We need 40 seats"})))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(post_json("/api/end-call", json!({"sessionId": "s1"})))
            .await
            .unwrap();
        let workflow_id = body_json(response).await["workflowId"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(post_json("/api/reset", json!({"sessionId": "s1"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        llm.gate.add_permits(3);

        let mut status = Value::Null;
        for _ in 0..200 {
            let response = app
                .clone()
                .oneshot(get(&format!("/api/workflows/{}", workflow_id)))
                .await
                .unwrap();
            status = body_json(response).await;
            if status["status"] == "complete" || status["status"] == "failed" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status["status"], "failed");

        let response = app.oneshot(get("/api/results?sessionId=s1")).await.unwrap();
        let state = body_json(response).await;
        assert_eq!(state["userTurnCount"], 0);
        assert_eq!(state["messages"], json!([]));
        assert!(state.get("final").is_none());
    }

    #[tokio::test]
    async fn test_end_call_requires_session_id() {
        let app = app_with(chat_llm());
        let response = app.oneshot(post_json("/api/end-call", json!({}))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_workflow_is_404() {
        let app = app_with(chat_llm());
        let response = app
            .clone()
            .oneshot(get("/api/workflows/not-a-uuid"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(get(&format!("/api/workflows/{}", uuid::Uuid::new_v4())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
