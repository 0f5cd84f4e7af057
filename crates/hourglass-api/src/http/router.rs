//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/`, plus an unversioned `/health`.
//! Middleware: CORS, request tracing, request ids (outermost, so error
//! envelopes and the trace span share the id).

use axum::Router;
use axum::extract::State;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::http::middleware::request_meta;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Sessions
        .route(
            "/sessions",
            post(handlers::session::create_session).get(handlers::session::list_sessions),
        )
        .route("/sessions/{id}", get(handlers::session::get_session))
        .route(
            "/sessions/{id}/activate",
            post(handlers::session::activate_session),
        )
        .route(
            "/sessions/{id}/archive",
            post(handlers::session::archive_session),
        )
        .route(
            "/sessions/{id}/complete",
            post(handlers::session::complete_session),
        )
        .route("/sessions/{id}/vault", get(handlers::session::get_vault_entry))
        .route(
            "/sessions/{id}/publish",
            post(handlers::session::publish_vault_entry),
        )
        .route(
            "/sessions/{id}/participants",
            get(handlers::session::list_participants)
                .post(handlers::session::invite_participants),
        )
        .route(
            "/sessions/{id}/participants/respond",
            post(handlers::session::respond_to_invitation),
        )
        .route("/sessions/{id}/live", get(handlers::live::live_session))
        .route(
            "/sessions/{id}/presence",
            get(handlers::live::session_presence),
        )
        .route(
            "/vault",
            get(handlers::session::list_published_entries),
        )
        // Turns
        .route("/turns/{id}", get(handlers::turn::get_turn))
        .route("/turns/{id}/submit", post(handlers::turn::submit_turn))
        .route("/turns/{id}/auto-fill", post(handlers::turn::auto_fill_turn))
        .route(
            "/turns/{id}/events",
            get(handlers::turn::list_turn_events).post(handlers::turn::log_turn_event),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_meta))
        .with_state(state)
}

/// GET /health - liveness plus a database probe.
async fn health_check(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    let database = state.db_pool.ping().await;
    axum::Json(serde_json::json!({
        "status": if database { "ok" } else { "degraded" },
        "database": database,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
