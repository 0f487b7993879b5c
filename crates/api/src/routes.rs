use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::handlers::*;

pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/addChatGroup", post(add_chat_group))
        .route("/api/removeChatGroup", get(remove_chat_group))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use stakewatch_notifier::{ChannelCredential, Notifier};
    use stakewatch_storage::{InMemoryStorage, KeyValueStorageExt};
    use stakewatch_types::storage::SOCIAL_CHANNELS_KEY;
    use tower::ServiceExt;

    fn state() -> (Arc<ApiState>, Arc<InMemoryStorage>) {
        let storage = Arc::new(InMemoryStorage::new());
        let state = Arc::new(ApiState::new(
            Arc::new(Notifier::new("http://telegram.invalid")),
            storage.clone(),
        ));
        (state, storage)
    }

    async fn call(state: Arc<ApiState>, request: Request<Body>) -> (StatusCode, Value) {
        let response = create_router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn add_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/addChatGroup")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn remove_request(query: &str) -> Request<Body> {
        Request::builder()
            .uri(format!("/api/removeChatGroup{}", query))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_add_chat_group_registers_and_persists() {
        let (state, storage) = state();
        let (status, body) = call(state.clone(), add_request(r#"{"token": "123:abc", "chat_id": -1001}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(state.notifier.channel_ids(), vec![-1001]);

        let stored: Vec<ChannelCredential> = storage.get(SOCIAL_CHANNELS_KEY).unwrap();
        assert_eq!(
            stored,
            vec![ChannelCredential::Telegram {
                token: "123:abc".to_string(),
                chat_id: -1001
            }]
        );
    }

    #[tokio::test]
    async fn test_add_chat_group_malformed_body() {
        let (state, _) = state();
        let (status, body) = call(state, add_request(r#"{"token": 5}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_add_chat_group_duplicate_is_unprocessable() {
        let (state, _) = state();
        let body = r#"{"token": "t", "chat_id": 7}"#;
        call(state.clone(), add_request(body)).await;
        let (status, body) = call(state, add_request(body)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("already registered"));
    }

    #[tokio::test]
    async fn test_remove_chat_group() {
        let (state, storage) = state();
        state.notifier.register_telegram("t", 7).unwrap();

        let (status, _) = call(state.clone(), remove_request("?chat_id=7")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(state.notifier.is_empty());

        let stored: Vec<ChannelCredential> = storage.get(SOCIAL_CHANNELS_KEY).unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn test_remove_chat_group_errors() {
        let (state, _) = state();

        let (status, _) = call(state.clone(), remove_request("?chat_id=seven")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(state.clone(), remove_request("")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(state, remove_request("?chat_id=8")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_changes_persist_final_list() {
        let (state, storage) = state();
        for chat_id in 0..16 {
            state.notifier.register_telegram("t", chat_id).unwrap();
        }

        let mut tasks = Vec::new();
        for chat_id in 0..16 {
            let state = state.clone();
            tasks.push(tokio::spawn(async move {
                call(state.clone(), remove_request(&format!("?chat_id={}", chat_id))).await;
                let body = format!(r#"{{"token": "t", "chat_id": {}}}"#, 100 + chat_id);
                call(state, add_request(&body)).await
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap().0, StatusCode::OK);
        }

        let mut stored: Vec<i64> = storage
            .get::<Vec<ChannelCredential>>(SOCIAL_CHANNELS_KEY)
            .unwrap()
            .iter()
            .map(ChannelCredential::chat_id)
            .collect();
        stored.sort_unstable();
        let mut live = state.notifier.channel_ids();
        live.sort_unstable();

        assert_eq!(stored, live);
        assert_eq!(live, (100..116).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn test_health_reports_channels() {
        let (state, _) = state();
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (_, body) = call(state.clone(), request).await;
        assert_eq!(body["status"], "degraded");

        state.notifier.register_telegram("t", 1).unwrap();
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = call(state, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["channels"], 1);
    }
}
