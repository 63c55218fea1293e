use axum::http::StatusCode;

use crate::db::StoreError;
use crate::error::{ErrorMessage, HttpError};
use crate::models::ApplicationStatus;

/// Every failure a service can report. Submission blockers are refinements
/// of invalid input and map to 400 like it; only `Server` carries internal
/// detail, which is logged and never sent.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Unauthorized(ErrorMessage),
    #[error("{}", ErrorMessage::PermissionDenied)]
    Forbidden,
    #[error("{0}")]
    NotFound(ErrorMessage),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    InvalidDateRange(&'static str),
    #[error("{}", ErrorMessage::InternshipClosed)]
    Closed,
    #[error("{}", ErrorMessage::DeadlinePassed)]
    DeadlinePassed,
    #[error("{}", ErrorMessage::AlreadyApplied)]
    AlreadyApplied,
    #[error("{}", ErrorMessage::CapacityReached)]
    CapacityReached,
    #[error("{}", ErrorMessage::ResumeRequired)]
    ResumeRequired,
    #[error("Cannot change application status from {from} to {to}")]
    IllegalTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("{}", ErrorMessage::InvalidOrExpiredResetToken)]
    InvalidOrExpired,
    #[error("{0}")]
    Server(String),
}

impl ServiceError {
    pub fn server(detail: impl std::fmt::Display) -> Self {
        ServiceError::Server(detail.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) | ServiceError::AlreadyApplied => StatusCode::CONFLICT,
            ServiceError::InvalidInput(_)
            | ServiceError::InvalidDateRange(_)
            | ServiceError::Closed
            | ServiceError::DeadlinePassed
            | ServiceError::CapacityReached
            | ServiceError::ResumeRequired
            | ServiceError::IllegalTransition { .. }
            | ServiceError::InvalidOrExpired => StatusCode::BAD_REQUEST,
            ServiceError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(constraint) => {
                tracing::warn!(constraint = %constraint, "Unique constraint violated");
                ServiceError::Conflict(ErrorMessage::DuplicateValue.to_string())
            }
            StoreError::NotFound => ServiceError::NotFound(ErrorMessage::RouteNotFound),
            StoreError::Sqlx(e) => ServiceError::server(e),
        }
    }
}

impl From<ServiceError> for HttpError {
    fn from(err: ServiceError) -> Self {
        let status = err.status();
        match err {
            ServiceError::Server(detail) => {
                tracing::error!(error = %detail, "Internal error");
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
            other => HttpError::new(other.to_string(), status),
        }
    }
}

/// Password helpers report input problems and hashing failures through the
/// same enum; only the former are the caller's fault.
pub(crate) fn password_error(err: ErrorMessage) -> ServiceError {
    match err {
        ErrorMessage::EmptyPassword | ErrorMessage::ExceededMaxPasswordLength(_) => {
            ServiceError::InvalidInput(err.to_string())
        }
        other => ServiceError::server(other),
    }
}
