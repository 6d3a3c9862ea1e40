//! Application error taxonomy and HTTP response mapping.
//!
//! Internal components raise classified failures; the webhook handler is the
//! sole translation point from failures to caller-visible status codes.

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::config::Stage;

/// Classified application failure.
///
/// Unclassified errors fall through to `Internal` via the `anyhow` conversion.
#[derive(Debug, Error)]
pub enum AppError {
    /// Caller fault: missing or wrong credential. Deliberately carries no
    /// detail so responses cannot leak what was submitted or expected.
    #[error("unauthorized")]
    Unauthorized,

    /// Caller fault: the request itself is unusable.
    #[error("{0}")]
    BadRequest(String),

    /// Server fault: an infrastructure dependency failed. The detail string
    /// is internal and only surfaces outside production.
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether resending a corrected request can succeed without operator
    /// intervention. `Internal` failures need an operator.
    pub fn is_operational(&self) -> bool {
        !matches!(self, AppError::Internal(_))
    }

    /// Short caller-facing message, safe for any stage.
    pub fn public_message(&self) -> &str {
        match self {
            AppError::Unauthorized => "unauthorized",
            AppError::BadRequest(message) => message,
            AppError::Internal(_) => "internal server error",
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{err:#}"))
    }
}

/// Error response body.
#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
    /// Internal detail, present only outside production.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Map a classified failure to its HTTP response.
///
/// The detail string of an `Internal` failure is attached only outside
/// production; 401 bodies never echo anything the caller submitted.
pub fn error_response(err: &AppError, stage: Stage) -> (StatusCode, Json<ErrorBody>) {
    let detail = match err {
        AppError::Internal(detail) if !stage.is_production() => Some(detail.clone()),
        _ => None,
    };

    (
        err.status_code(),
        Json(ErrorBody {
            error: err.public_message().to_string(),
            detail,
        }),
    )
}
