//! Turn HTTP handlers.
//!
//! Endpoints:
//! - GET  /api/v1/turns/{id}            - A single turn
//! - POST /api/v1/turns/{id}/submit     - Human submission
//! - POST /api/v1/turns/{id}/auto-fill  - Host override with fallback text
//! - POST /api/v1/turns/{id}/events     - Append a turn event (best-effort)
//! - GET  /api/v1/turns/{id}/events     - Turn events and reaction counts

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Serialize;

use hourglass_types::turn::{
    LogTurnEventRequest, ResolveTurnRequest, Turn, TurnEvent, TurnId, reaction_counts,
};

use super::parse_id;
use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct EventLogged {
    pub recorded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<TurnEvent>,
}

#[derive(Debug, Serialize)]
pub struct TurnEvents {
    pub events: Vec<TurnEvent>,
    pub reactions: BTreeMap<String, u32>,
}

/// GET /api/v1/turns/{id}
pub async fn get_turn(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Turn>>, AppError> {
    let timer = RequestTimer::start();
    let id: TurnId = parse_id(&id)?;
    let turn = state.engine.get_turn(&id).await?;
    Ok(Json(
        timer
            .success(turn)
            .with_link("self", &format!("/api/v1/turns/{id}")),
    ))
}

/// POST /api/v1/turns/{id}/submit
pub async fn submit_turn(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ResolveTurnRequest>,
) -> Result<Json<ApiResponse<Turn>>, AppError> {
    let timer = RequestTimer::start();
    let id: TurnId = parse_id(&id)?;
    let turn = state
        .engine
        .submit_turn(&id, &request.text, request.handle)
        .await?;
    let session_link = format!("/api/v1/sessions/{}", turn.session_id);
    Ok(Json(timer.success(turn).with_link("session", &session_link)))
}

/// POST /api/v1/turns/{id}/auto-fill
pub async fn auto_fill_turn(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ResolveTurnRequest>,
) -> Result<Json<ApiResponse<Turn>>, AppError> {
    let timer = RequestTimer::start();
    let id: TurnId = parse_id(&id)?;
    let turn = state
        .engine
        .auto_fill_turn(&id, &request.text, request.handle)
        .await?;
    Ok(Json(timer.success(turn)))
}

/// POST /api/v1/turns/{id}/events
///
/// Always 202: event logging never fails the caller.
pub async fn log_turn_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<LogTurnEventRequest>,
) -> Result<(StatusCode, Json<ApiResponse<EventLogged>>), AppError> {
    let timer = RequestTimer::start();
    let id: TurnId = parse_id(&id)?;
    if request.event_type.trim().is_empty() {
        return Err(AppError::BadRequest("event_type must not be empty".into()));
    }
    let event = state
        .engine
        .log_turn_event(&id, request.event_type.trim(), request.payload)
        .await;
    let logged = EventLogged {
        recorded: event.is_some(),
        event,
    };
    Ok((StatusCode::ACCEPTED, Json(timer.success(logged))))
}

/// GET /api/v1/turns/{id}/events
pub async fn list_turn_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<TurnEvents>>, AppError> {
    let timer = RequestTimer::start();
    let id: TurnId = parse_id(&id)?;
    let events = state.engine.list_turn_events(&id).await?;
    let reactions = reaction_counts(&events);
    Ok(Json(timer.success(TurnEvents { events, reactions })))
}
