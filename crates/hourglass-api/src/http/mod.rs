//! HTTP/REST API layer for Hourglass.
//!
//! Axum-based REST API at `/api/v1/` with an envelope response format,
//! CORS, request ids and request tracing.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod router;
