use affinity_common::{ErrorBody, ErrorDetail, IdError, ParseRelationTypeError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use crate::relationships::RelationError;

#[derive(Debug)]
pub enum Error {
    // Auth Errors
    Unauthenticated,
    AuthFailTokenWrongFormat,

    // Relationship Errors
    NotFound { id: String },
    Validation(String),

    // Generic
    StoreUnavailable(String),
    Internal(String),
}

pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Error::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            Error::AuthFailTokenWrongFormat => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            Error::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_FAILED"),
            Error::StoreUnavailable(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_UNAVAILABLE"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match self {
            Error::Unauthenticated => "Authentication required".to_string(),
            Error::AuthFailTokenWrongFormat => "Auth token wrong format".to_string(),
            Error::NotFound { id } => format!("Target not found: {}", id),
            Error::Validation(msg) => msg,
            Error::StoreUnavailable(msg) => {
                error!("Store unavailable: {}", msg);
                "Store unavailable".to_string()
            }
            Error::Internal(msg) => {
                error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
        };

        let body = Json(ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}

impl From<RelationError> for Error {
    fn from(err: RelationError) -> Self {
        match err {
            RelationError::NotFound(id) => Error::NotFound { id },
            RelationError::Validation(msg) => Error::Validation(msg),
            RelationError::StoreUnavailable(e) => Error::StoreUnavailable(e.to_string()),
        }
    }
}

impl From<IdError> for Error {
    fn from(err: IdError) -> Self {
        Error::Validation(err.to_string())
    }
}

impl From<ParseRelationTypeError> for Error {
    fn from(err: ParseRelationTypeError) -> Self {
        Error::Validation(err.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal(err.to_string())
    }
}
