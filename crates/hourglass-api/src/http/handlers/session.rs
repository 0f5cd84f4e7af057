//! Session HTTP handlers.
//!
//! Endpoints:
//! - POST /api/v1/sessions                              - Create a session with its turns
//! - GET  /api/v1/sessions                              - List sessions (?status, ?user_id, ?limit)
//! - GET  /api/v1/sessions/{id}                         - Session, turns and participants
//! - POST /api/v1/sessions/{id}/activate                - Draft -> active
//! - POST /api/v1/sessions/{id}/archive                 - Archive and stop all timers
//! - POST /api/v1/sessions/{id}/complete                - Freeze the story into the vault
//! - GET  /api/v1/sessions/{id}/vault                   - The vault entry of a completed session
//! - POST /api/v1/sessions/{id}/publish                 - Change the vault entry's visibility
//! - GET  /api/v1/sessions/{id}/participants            - Participants in turn order
//! - POST /api/v1/sessions/{id}/participants            - Invite more players
//! - POST /api/v1/sessions/{id}/participants/respond    - Accept, decline or leave
//! - GET  /api/v1/vault                                 - Public stories (?limit, ?offset)

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

use hourglass_types::session::{
    CompleteSessionRequest, CreateSessionRequest, FeedEntry, InviteParticipantsRequest,
    Participant, PublishVaultRequest, RespondInvitationRequest, Session, SessionDetail,
    SessionFilter, SessionId, SessionSummary, VaultEntry,
};

use super::parse_id;
use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// POST /api/v1/sessions
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SessionDetail>>), AppError> {
    let timer = RequestTimer::start();
    let detail = state.engine.create_session(request).await?;
    let id = detail.session.id;
    tracing::info!(session_id = %id, turns = detail.turns.len(), "session created");

    let resp = timer
        .success(detail)
        .with_link("self", &format!("/api/v1/sessions/{id}"))
        .with_link("complete", &format!("/api/v1/sessions/{id}/complete"));
    Ok((StatusCode::CREATED, Json(resp)))
}

/// GET /api/v1/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(filter): Query<SessionFilter>,
) -> Result<Json<ApiResponse<Vec<SessionSummary>>>, AppError> {
    let timer = RequestTimer::start();
    let sessions = state.engine.list_sessions(&filter).await?;
    Ok(Json(timer.success(sessions)))
}

/// GET /api/v1/sessions/{id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<SessionDetail>>, AppError> {
    let timer = RequestTimer::start();
    let id: SessionId = parse_id(&id)?;
    let detail = state.engine.get_session(&id).await?;
    Ok(Json(
        timer
            .success(detail)
            .with_link("self", &format!("/api/v1/sessions/{id}"))
            .with_link("live", &format!("/api/v1/sessions/{id}/live")),
    ))
}

/// POST /api/v1/sessions/{id}/activate
pub async fn activate_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Session>>, AppError> {
    let timer = RequestTimer::start();
    let id: SessionId = parse_id(&id)?;
    let session = state.engine.activate_session(&id).await?;
    Ok(Json(timer.success(session)))
}

/// POST /api/v1/sessions/{id}/archive
pub async fn archive_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Session>>, AppError> {
    let timer = RequestTimer::start();
    let id: SessionId = parse_id(&id)?;
    let session = state.engine.archive_session(&id).await?;
    Ok(Json(timer.success(session)))
}

/// POST /api/v1/sessions/{id}/complete
///
/// Every field of the body is optional; an empty body assembles the story
/// from the resolved turns.
pub async fn complete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<CompleteSessionRequest>>,
) -> Result<Json<ApiResponse<VaultEntry>>, AppError> {
    let timer = RequestTimer::start();
    let id: SessionId = parse_id(&id)?;
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let entry = state.engine.complete_session(&id, request).await?;
    Ok(Json(
        timer
            .success(entry)
            .with_link("vault", &format!("/api/v1/sessions/{id}/vault")),
    ))
}

/// GET /api/v1/sessions/{id}/vault
pub async fn get_vault_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<VaultEntry>>, AppError> {
    let timer = RequestTimer::start();
    let id: SessionId = parse_id(&id)?;
    let entry = state.engine.get_vault_entry(&id).await?;
    Ok(Json(timer.success(entry)))
}

/// POST /api/v1/sessions/{id}/publish
///
/// An empty body publishes publicly. A session without a vault entry is
/// completed first.
pub async fn publish_vault_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<PublishVaultRequest>>,
) -> Result<Json<ApiResponse<VaultEntry>>, AppError> {
    let timer = RequestTimer::start();
    let id: SessionId = parse_id(&id)?;
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let entry = state.engine.publish_vault_entry(&id, request).await?;
    tracing::info!(session_id = %id, visibility = %entry.visibility, "vault visibility changed");
    Ok(Json(
        timer
            .success(entry)
            .with_link("vault", &format!("/api/v1/sessions/{id}/vault"))
            .with_link("feed", "/api/v1/vault"),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

/// GET /api/v1/vault
pub async fn list_published_entries(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<ApiResponse<Vec<FeedEntry>>>, AppError> {
    let timer = RequestTimer::start();
    let entries = state
        .engine
        .list_published_entries(query.limit, query.offset)
        .await?;
    Ok(Json(timer.success(entries)))
}

/// GET /api/v1/sessions/{id}/participants
pub async fn list_participants(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Participant>>>, AppError> {
    let timer = RequestTimer::start();
    let id: SessionId = parse_id(&id)?;
    let participants = state.engine.list_participants(&id).await?;
    Ok(Json(timer.success(participants)))
}

/// POST /api/v1/sessions/{id}/participants
pub async fn invite_participants(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<InviteParticipantsRequest>,
) -> Result<Json<ApiResponse<Vec<Participant>>>, AppError> {
    let timer = RequestTimer::start();
    let id: SessionId = parse_id(&id)?;
    let participants = state
        .engine
        .invite_participants(&id, &request.participants)
        .await?;
    Ok(Json(timer.success(participants)))
}

/// POST /api/v1/sessions/{id}/participants/respond
pub async fn respond_to_invitation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RespondInvitationRequest>,
) -> Result<Json<ApiResponse<Participant>>, AppError> {
    let timer = RequestTimer::start();
    let id: SessionId = parse_id(&id)?;
    let participant = state
        .engine
        .respond_to_invitation(&id, &request.user_id, request.action)
        .await?;
    Ok(Json(timer.success(participant)))
}

#[cfg(test)]
mod tests {
    use hourglass_types::session::{
        BlankSpec, ContactPoints, InvitationAction, ParticipantInput, ParticipantStatus,
        SessionStatus, TemplateSource, VaultVisibility,
    };

    use super::*;
    use crate::http::handlers::turn::submit_turn;
    use crate::state::test_support::test_state;
    use hourglass_types::turn::ResolveTurnRequest;

    fn custom_request() -> CreateSessionRequest {
        let mut request = CreateSessionRequest::new("host-1");
        request.template_source = TemplateSource::Custom;
        request.template_text = Some("The [[ANIMAL_1::noun]] sings.".into());
        request.blanks = vec![BlankSpec {
            slot: "noun".into(),
            prompt: "An animal".into(),
            placeholder: Some("[[ANIMAL_1::noun]]".into()),
            nudge: None,
            response_window_minutes: None,
        }];
        request
    }

    #[tokio::test]
    async fn test_create_returns_201_with_turns() {
        let state = test_state().await;
        let (status, Json(resp)) = create_session(State(state.clone()), Json(custom_request()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        let detail = resp.data.unwrap();
        assert_eq!(detail.turns.len(), 1);
        assert_eq!(detail.session.status, SessionStatus::Draft);

        let Json(fetched) = get_session(State(state), Path(detail.session.id.to_string()))
            .await
            .unwrap();
        assert_eq!(fetched.data.unwrap().turns[0].id, detail.turns[0].id);
    }

    #[tokio::test]
    async fn test_invalid_request_is_400() {
        let state = test_state().await;
        let mut request = custom_request();
        request.blanks.clear();
        let err = create_session(State(state), Json(request)).await.unwrap_err();
        assert_eq!(err.status_and_code().0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_id_is_400_and_unknown_is_404() {
        let state = test_state().await;
        let err = get_session(State(state.clone()), Path("not-a-uuid".into()))
            .await
            .unwrap_err();
        assert_eq!(err.status_and_code().0, StatusCode::BAD_REQUEST);

        let err = get_session(State(state), Path(SessionId::new().to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status_and_code().0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_complete_requires_resolved_turns() {
        let state = test_state().await;
        let (_, Json(resp)) = create_session(State(state.clone()), Json(custom_request()))
            .await
            .unwrap();
        let detail = resp.data.unwrap();
        let session_id = detail.session.id.to_string();

        let err = complete_session(State(state.clone()), Path(session_id.clone()), None)
            .await
            .unwrap_err();
        assert_eq!(err.status_and_code().0, StatusCode::PRECONDITION_FAILED);

        submit_turn(
            State(state.clone()),
            Path(detail.turns[0].id.to_string()),
            Json(ResolveTurnRequest {
                text: "walrus".into(),
                handle: None,
            }),
        )
        .await
        .unwrap();

        let Json(resp) = complete_session(State(state.clone()), Path(session_id.clone()), None)
            .await
            .unwrap();
        assert_eq!(resp.data.unwrap().story_text, "The walrus sings.");

        let Json(vault) = get_vault_entry(State(state), Path(session_id)).await.unwrap();
        assert_eq!(vault.data.unwrap().story_text, "The walrus sings.");
    }

    #[tokio::test]
    async fn test_archive_then_activate_is_conflict() {
        let state = test_state().await;
        let (_, Json(resp)) = create_session(State(state.clone()), Json(custom_request()))
            .await
            .unwrap();
        let session_id = resp.data.unwrap().session.id.to_string();

        let Json(archived) = archive_session(State(state.clone()), Path(session_id.clone()))
            .await
            .unwrap();
        assert_eq!(archived.data.unwrap().status, SessionStatus::Archived);

        let err = activate_session(State(state), Path(session_id)).await.unwrap_err();
        assert_eq!(err.status_and_code(), (StatusCode::CONFLICT, "INVALID_TRANSITION"));
    }

    #[tokio::test]
    async fn test_invited_player_must_accept_before_start() {
        let state = test_state().await;
        let mut request = custom_request();
        request.participants = vec![ParticipantInput {
            user_id: "kai".into(),
            handle: None,
            contact: ContactPoints::default(),
        }];
        let (_, Json(resp)) = create_session(State(state.clone()), Json(request))
            .await
            .unwrap();
        let session_id = resp.data.unwrap().session.id.to_string();

        let Json(invited) = invite_participants(
            State(state.clone()),
            Path(session_id.clone()),
            Json(InviteParticipantsRequest {
                participants: vec![ParticipantInput {
                    user_id: "ana".into(),
                    handle: Some("@ana".into()),
                    contact: ContactPoints::default(),
                }],
            }),
        )
        .await
        .unwrap();
        assert_eq!(invited.data.unwrap().len(), 3);

        respond_to_invitation(
            State(state.clone()),
            Path(session_id.clone()),
            Json(RespondInvitationRequest {
                user_id: "host-1".into(),
                action: InvitationAction::Leave,
            }),
        )
        .await
        .unwrap();
        let err = activate_session(State(state.clone()), Path(session_id.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.status_and_code().0, StatusCode::PRECONDITION_FAILED);

        let Json(accepted) = respond_to_invitation(
            State(state.clone()),
            Path(session_id.clone()),
            Json(RespondInvitationRequest {
                user_id: "ana".into(),
                action: InvitationAction::Accept,
            }),
        )
        .await
        .unwrap();
        assert_eq!(accepted.data.unwrap().status, ParticipantStatus::Accepted);
        let Json(active) = activate_session(State(state.clone()), Path(session_id.clone()))
            .await
            .unwrap();
        assert_eq!(active.data.unwrap().status, SessionStatus::Active);

        let Json(roster) = list_participants(State(state.clone()), Path(session_id.clone()))
            .await
            .unwrap();
        let statuses: Vec<ParticipantStatus> =
            roster.data.unwrap().iter().map(|p| p.status).collect();
        assert_eq!(
            statuses,
            vec![
                ParticipantStatus::Left,
                ParticipantStatus::Invited,
                ParticipantStatus::Accepted
            ]
        );

        let Json(detail) = get_session(State(state.clone()), Path(session_id))
            .await
            .unwrap();
        assert_eq!(detail.data.unwrap().turns[0].assigned_handle.as_deref(), Some("@ana"));

        let Json(listed) = list_sessions(
            State(state),
            Query(SessionFilter {
                user_id: Some("ana".into()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(listed.data.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_publish_completes_and_lists_on_feed() {
        let state = test_state().await;
        let (_, Json(resp)) = create_session(State(state.clone()), Json(custom_request()))
            .await
            .unwrap();
        let detail = resp.data.unwrap();
        let session_id = detail.session.id.to_string();
        submit_turn(
            State(state.clone()),
            Path(detail.turns[0].id.to_string()),
            Json(ResolveTurnRequest {
                text: "walrus".into(),
                handle: None,
            }),
        )
        .await
        .unwrap();

        let Json(published) = publish_vault_entry(State(state.clone()), Path(session_id), None)
            .await
            .unwrap();
        let entry = published.data.unwrap();
        assert_eq!(entry.visibility, VaultVisibility::Public);
        assert_eq!(entry.story_text, "The walrus sings.");

        let Json(feed) = list_published_entries(State(state), Query(FeedQuery::default()))
            .await
            .unwrap();
        let feed = feed.data.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].entry.id, entry.id);
        assert_eq!(feed[0].host_id, "host-1");
    }
}
