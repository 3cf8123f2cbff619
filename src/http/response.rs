//! Response helpers.
//!
//! # Responsibilities
//! - Map race outcomes to HTTP status codes
//! - Render JSON error bodies carrying the request id
//!
//! # Design Decisions
//! - Timeouts result in 504 Gateway Timeout
//! - Cancellation by shutdown results in 503 Service Unavailable
//! - Failures of the remote dependency result in 502 Bad Gateway
//! - Storage conflicts result in 409 Conflict

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt::Display;

use crate::resilience::RaceError;
use crate::storage::StorageError;

/// JSON body returned on errors.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub request_id: String,
}

pub fn error_response(status: StatusCode, error: impl Into<String>, request_id: String) -> Response {
    (
        status,
        Json(ErrorBody {
            error: error.into(),
            request_id,
        }),
    )
        .into_response()
}

/// Status code for a race that did not complete.
pub fn race_status<E>(err: &RaceError<E>) -> StatusCode {
    match err {
        RaceError::TimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
        RaceError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        RaceError::OperationFailed(_) => StatusCode::BAD_GATEWAY,
        RaceError::Aborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn storage_status(err: &StorageError) -> StatusCode {
    match err {
        StorageError::Conflict(_) => StatusCode::CONFLICT,
        StorageError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        StorageError::Disposed => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn race_error_response<E: Display>(err: &RaceError<E>, request_id: String) -> Response {
    error_response(race_status(err), err.to_string(), request_id)
}
