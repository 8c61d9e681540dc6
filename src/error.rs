use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::store::aggregate::AggregateError;
use crate::store::StoreError;

/// Stable, machine readable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    NotFound,
    Conflict,
    ConsistencyError,
    TransientError,
    Unauthorized,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::ConsistencyError => "consistency_error",
            ErrorKind::TransientError => "transient_error",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::InternalError => "internal_error",
        }
    }
}

/// Errors returned by the service layer.
///
/// `Internal` keeps the underlying cause for logs but its message is fixed, so
/// driver text never reaches a caller.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Consistency(String),
    #[error("{0}")]
    Transient(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("internal server error")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::ValidationError,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::Consistency(_) => ErrorKind::ConsistencyError,
            AppError::Transient(_) => ErrorKind::TransientError,
            AppError::Unauthorized(_) => ErrorKind::Unauthorized,
            AppError::Internal(_) => ErrorKind::InternalError,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn internal(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        AppError::Internal(Box::new(err))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            StoreError::AlreadyFriends => AppError::Conflict("already friends".to_string()),
            StoreError::NotFriends => AppError::Consistency("not friend".to_string()),
            StoreError::SelfFriendship => {
                AppError::Validation("cannot add yourself as friend".to_string())
            }
            StoreError::Duplicate(_) => AppError::Conflict("user already exists".to_string()),
            StoreError::Timeout => AppError::Transient("operation timed out".to_string()),
            StoreError::Busy => AppError::Transient("database is busy, try again".to_string()),
            StoreError::Unavailable => {
                AppError::Transient("database connection unavailable".to_string())
            }
            other => AppError::internal(other),
        }
    }
}

impl From<AggregateError> for AppError {
    fn from(err: AggregateError) -> Self {
        AppError::internal(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::internal(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    kind: ErrorKind,
    message: String,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::ConsistencyError => StatusCode::BAD_REQUEST,
            ErrorKind::TransientError => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let AppError::Internal(source) = self {
            log::error!("internal error: {}", source);
        }
        HttpResponse::build(self.status_code()).json(ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
        })
    }
}
