use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::Stream;
use futures_util::stream;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use super::models::{ErrorResponse, LogWordRequest};
use super::state::ServerState;
use crate::settings::{SettingsPatch, SettingsStore, UserSettings};

/// Serves the settings-synchronization protocol: liveness, the settings
/// record, the word log, and a change feed for page contexts.
pub async fn run_server(store: SettingsStore, addr: String) -> Result<()> {
    let state = Arc::new(ServerState::new(store));
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind server address {}", addr))?;
    info!("settings server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route(
            "/settings",
            get(get_settings).post(update_settings).delete(clear_settings),
        )
        .route("/settings/reset", post(reset_settings))
        .route("/log-word", post(log_word))
        .route("/log-words", get(log_words))
        .route("/events", get(events))
        .with_state(state)
        .layer(axum::middleware::from_fn(cors_middleware))
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,DELETE,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type"),
    );
}

async fn ping() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn get_settings(State(state): State<Arc<ServerState>>) -> Json<UserSettings> {
    Json(state.store.get())
}

async fn update_settings(
    State(state): State<Arc<ServerState>>,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<UserSettings>, (StatusCode, Json<ErrorResponse>)> {
    let merged = state.store.update(&patch).map_err(internal_error)?;
    state.broadcast(&merged);
    Ok(Json(merged))
}

async fn reset_settings(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<UserSettings>, (StatusCode, Json<ErrorResponse>)> {
    let restored = state.store.reset().map_err(internal_error)?;
    state.broadcast(&restored);
    Ok(Json(restored))
}

async fn clear_settings(
    State(state): State<Arc<ServerState>>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    state.store.clear().map_err(internal_error)?;
    state.broadcast(&UserSettings::default());
    Ok(StatusCode::NO_CONTENT)
}

/// Fire-and-forget word log; no response body is part of the contract.
async fn log_word(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<LogWordRequest>,
) -> StatusCode {
    info!(
        "word looked up: {} -> {}",
        request.original_word, request.translated_word
    );
    state.record_logged_word(request);
    StatusCode::NO_CONTENT
}

async fn log_words(State(state): State<Arc<ServerState>>) -> Json<Vec<LogWordRequest>> {
    let words = state
        .logged_words
        .lock()
        .map(|words| words.clone())
        .unwrap_or_default();
    Json(words)
}

/// Server-sent `settings_changed` events for subscribed page contexts.
async fn events(
    State(state): State<Arc<ServerState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.changes.subscribe();
    let stream = stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(settings) => {
                    match Event::default().event("settings_changed").json_data(&settings) {
                        Ok(event) => return Some((Ok(event), receiver)),
                        Err(err) => {
                            warn!("failed to encode settings event: {}", err);
                            continue;
                        }
                    }
                }
                // A slow subscriber skips missed updates and keeps going.
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn internal_error(err: anyhow::Error) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Difficulty;

    fn test_state(dir: &std::path::Path) -> Arc<ServerState> {
        let store =
            SettingsStore::open(Some(&dir.join("settings.toml"))).expect("open store");
        Arc::new(ServerState::new(store))
    }

    #[tokio::test]
    async fn update_merges_and_broadcasts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_state(dir.path());
        let mut subscriber = state.changes.subscribe();

        let patch = SettingsPatch {
            difficulty: Some(Difficulty::Advanced),
            ..SettingsPatch::default()
        };
        let Json(merged) = update_settings(State(state.clone()), Json(patch))
            .await
            .expect("update");
        assert_eq!(merged.difficulty, Difficulty::Advanced);
        assert!(merged.is_enabled);

        let broadcasted = subscriber.recv().await.expect("broadcast");
        assert_eq!(broadcasted, merged);
        assert_eq!(state.store.get(), merged);
    }

    #[tokio::test]
    async fn reset_and_clear_restore_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_state(dir.path());
        update_settings(
            State(state.clone()),
            Json(SettingsPatch {
                is_enabled: Some(false),
                ..SettingsPatch::default()
            }),
        )
        .await
        .expect("update");

        let Json(restored) = reset_settings(State(state.clone())).await.expect("reset");
        assert_eq!(restored, UserSettings::default());

        let status = clear_settings(State(state.clone())).await.expect("clear");
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(state.store.get(), UserSettings::default());
    }

    #[tokio::test]
    async fn log_word_records_recent_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_state(dir.path());
        let request = LogWordRequest {
            original_word: "house".to_string(),
            translated_word: "casa".to_string(),
        };
        let status = log_word(State(state.clone()), Json(request.clone())).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let Json(words) = log_words(State(state)).await;
        assert_eq!(words, vec![request]);
    }

    #[test]
    fn log_word_wire_casing() {
        let request: LogWordRequest = serde_json::from_str(
            r#"{"originalWord": "house", "translatedWord": "casa"}"#,
        )
        .expect("parse");
        assert_eq!(request.original_word, "house");
        assert_eq!(request.translated_word, "casa");
    }
}
