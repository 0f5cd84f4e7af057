//! WebSocket stream of one session's realtime events.
//!
//! `GET /api/v1/sessions/{id}/live` upgrades to a WebSocket. The handler
//! subscribes to the in-process [`EventBus`](hourglass_core::event::EventBus)
//! and forwards every event whose session matches as a JSON text frame of
//! the form `{"name": ..., "data": ...}`, the same shape the hosted REST
//! publisher posts.
//!
//! A viewer that passes `?user_id=` is announced to the session with a
//! `presence` event while connected. `GET /api/v1/sessions/{id}/presence`
//! lists who is watching.
//!
//! Lagged receivers log a warning and keep going; the client misses the
//! skipped events and should re-fetch the session.

use axum::Json;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use hourglass_types::event::RealtimeEvent;
use hourglass_types::session::SessionId;

use super::parse_id;
use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

#[derive(Debug, Default, serde::Deserialize)]
pub struct LiveQuery {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Incoming frame from a viewer. Anything else is ignored.
#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    /// Server answers `{"type":"pong"}`.
    Ping,
}

pub async fn live_session(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LiveQuery>,
) -> Result<impl IntoResponse, AppError> {
    let session_id: SessionId = parse_id(&id)?;
    // 404 before upgrading for sessions that do not exist.
    state.engine.service().get_session(&session_id).await?;
    let viewer = query
        .user_id
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());
    Ok(ws.on_upgrade(move |socket| async move {
        if let Some(user_id) = &viewer {
            state.presence.enter(session_id, user_id);
        }
        stream_session(socket, &state, session_id).await;
        if let Some(user_id) = &viewer {
            state.presence.leave(session_id, user_id);
        }
    }))
}

/// GET /api/v1/sessions/{id}/presence
pub async fn session_presence(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<String>>>, AppError> {
    let timer = RequestTimer::start();
    let session_id: SessionId = parse_id(&id)?;
    state.engine.service().get_session(&session_id).await?;
    Ok(Json(timer.success(state.presence.present(&session_id))))
}

/// JSON text frame for `event`.
pub(crate) fn frame(event: &RealtimeEvent) -> Option<String> {
    let body = serde_json::json!({ "name": event.name(), "data": event });
    match serde_json::to_string(&body) {
        Ok(json) => Some(json),
        Err(err) => {
            tracing::warn!("Failed to serialize realtime event: {err}");
            None
        }
    }
}

async fn stream_session(socket: WebSocket, state: &AppState, session_id: SessionId) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut event_rx = state.event_bus.subscribe();
    tracing::debug!(%session_id, "live viewer connected");

    loop {
        tokio::select! {
            event_result = event_rx.recv() => {
                match event_result {
                    Ok(event) if event.session_id() == session_id => {
                        let Some(json) = frame(&event) else { continue };
                        if ws_sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(%session_id, skipped = n, "live viewer lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            msg_result = ws_receiver.next() => {
                match msg_result {
                    Some(Ok(Message::Text(text))) => {
                        let text: &str = &text;
                        match serde_json::from_str::<ClientFrame>(text) {
                            Ok(ClientFrame::Ping) => {
                                let pong = r#"{"type":"pong"}"#;
                                if ws_sender.send(Message::Text(pong.into())).await.is_err() {
                                    break;
                                }
                            }
                            Err(err) => {
                                tracing::debug!(raw = %text, error = %err, "ignoring malformed frame");
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!("WebSocket receive error: {err}");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::debug!(%session_id, "live viewer disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;
    use hourglass_types::session::CreateSessionRequest;

    #[test]
    fn test_frame_wraps_event_with_name() {
        let session_id = SessionId::new();
        let json = frame(&RealtimeEvent::SessionStarted { session_id }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["name"], "session_started");
        assert_eq!(value["data"]["session_id"], session_id.to_string());
    }

    #[test]
    fn test_ping_frame_parses() {
        assert!(matches!(
            serde_json::from_str::<ClientFrame>(r#"{"type":"ping"}"#),
            Ok(ClientFrame::Ping)
        ));
        assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"shout"}"#).is_err());
    }

    #[tokio::test]
    async fn test_presence_lists_connected_viewers() {
        let state = test_state().await;
        let detail = state
            .engine
            .create_session(CreateSessionRequest::new("host-1"))
            .await
            .unwrap();
        let session_id = detail.session.id;
        let mut rx = state.event_bus.subscribe();

        state.presence.enter(session_id, "kai");
        let Json(resp) = session_presence(State(state.clone()), Path(session_id.to_string()))
            .await
            .unwrap();
        assert_eq!(resp.data.unwrap(), vec!["kai"]);
        // Prompt notifications of the new session may be interleaved.
        let (user_id, present) = loop {
            if let RealtimeEvent::Presence {
                user_id, present, ..
            } = rx.recv().await.unwrap()
            {
                break (user_id, present);
            }
        };
        assert_eq!(user_id, "kai");
        assert!(present);

        state.presence.leave(session_id, "kai");
        let Json(resp) = session_presence(State(state.clone()), Path(session_id.to_string()))
            .await
            .unwrap();
        assert!(resp.data.unwrap().is_empty());

        let err = session_presence(State(state), Path(SessionId::new().to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status_and_code().0, axum::http::StatusCode::NOT_FOUND);
    }
}
