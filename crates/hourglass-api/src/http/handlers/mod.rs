//! HTTP request handlers for the REST API.

pub mod live;
pub mod session;
pub mod turn;

use std::str::FromStr;

use crate::http::error::AppError;

/// Parse an id path segment, returning a 400 error on invalid format.
pub(crate) fn parse_id<T: FromStr>(s: &str) -> Result<T, AppError> {
    s.parse::<T>()
        .map_err(|_| AppError::BadRequest(format!("Invalid id: {s}")))
}
