use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error response structure sent to clients
///
/// Every failure leaves the API in the same envelope:
/// ```json
/// { "success": false, "error": "Internship not found" }
/// ```
///
/// Kept separate from `HttpError` so internal context never reaches the
/// wire; only the stable message does.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Stable, user-facing error messages
///
/// Handlers and services pick a variant instead of writing ad-hoc strings so
/// the same condition always produces the same text.
#[derive(Debug, PartialEq)]
pub enum ErrorMessage {
    // Password validation errors
    EmptyPassword,
    ExceededMaxPasswordLength(usize),
    InvalidHashFormat,
    HashingError,

    // Authentication errors
    InvalidCredentials,
    InvalidToken,
    TokenNotProvided,
    UserNotAuthenticated,
    UserNoLongerExist,
    AccountDeactivated,
    AccountLocked,
    WrongPassword,
    InvalidOrExpiredResetToken,

    // Authorization errors
    PermissionDenied,

    // Lookup errors
    UserNotFound,
    InternshipNotFound,
    ApplicationNotFound,
    RouteNotFound,

    // Uniqueness errors
    EmailExist,
    DuplicateValue,
    AlreadyApplied,

    // Submission blockers
    InternshipClosed,
    DeadlinePassed,
    CapacityReached,
    ResumeRequired,

    //Else
    ServerError,
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ErrorMessage::EmptyPassword => "Password cannot be empty".to_string(),
            ErrorMessage::HashingError => "Error while hashing password".to_string(),
            ErrorMessage::InvalidHashFormat => "Invalid password hash format".to_string(),
            ErrorMessage::ExceededMaxPasswordLength(max_length) => {
                format!("Password must not be more than {} characters", max_length)
            }
            ErrorMessage::InvalidCredentials => "Invalid credentials".to_string(),
            ErrorMessage::InvalidToken => "Token is invalid or expired".to_string(),
            ErrorMessage::TokenNotProvided => "Not authorized to access this route".to_string(),
            ErrorMessage::UserNotAuthenticated => {
                "Authentication required. Please log in.".to_string()
            }
            ErrorMessage::UserNoLongerExist => {
                "The user belonging to this token no longer exists".to_string()
            }
            ErrorMessage::AccountDeactivated => "Your account has been deactivated".to_string(),
            ErrorMessage::AccountLocked => {
                "Account is temporarily locked. Please try again later".to_string()
            }
            ErrorMessage::WrongPassword => "Password is incorrect".to_string(),
            ErrorMessage::InvalidOrExpiredResetToken => "Invalid or expired token".to_string(),
            ErrorMessage::PermissionDenied => {
                "You are not allowed to perform this action".to_string()
            }
            ErrorMessage::UserNotFound => "User not found".to_string(),
            ErrorMessage::InternshipNotFound => "Internship not found".to_string(),
            ErrorMessage::ApplicationNotFound => "Application not found".to_string(),
            ErrorMessage::RouteNotFound => "Resource not found".to_string(),
            ErrorMessage::EmailExist => "User already exists with this email".to_string(),
            ErrorMessage::DuplicateValue => "Duplicate field value entered".to_string(),
            ErrorMessage::AlreadyApplied => {
                "You have already applied to this internship".to_string()
            }
            ErrorMessage::InternshipClosed => {
                "This internship is no longer accepting applications".to_string()
            }
            ErrorMessage::DeadlinePassed => "Application deadline has passed".to_string(),
            ErrorMessage::CapacityReached => {
                "Maximum number of applications reached for this internship".to_string()
            }
            ErrorMessage::ResumeRequired => "Resume file is required".to_string(),
            ErrorMessage::ServerError => "Server Error. Please try again later".to_string(),
        };
        write!(f, "{}", message)
    }
}

/// Internal HTTP error type used by handlers and middleware
///
/// Bundles the client-facing message with its status code; axum turns it
/// into a response through `IntoResponse`.
#[derive(Debug, Clone)]
pub struct HttpError {
    pub message: String,
    pub status: StatusCode,
}

impl HttpError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        HttpError {
            message: message.into(),
            status,
        }
    }

    /// 500: unexpected failures (storage, hashing, mail transport).
    pub fn server_error(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 400: validation failures and domain rules the request violates.
    pub fn bad_request(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    /// 401: no valid identity (missing, invalid or expired credential).
    pub fn unauthorized(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::UNAUTHORIZED,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::NOT_FOUND,
        }
    }

    pub fn into_http_response(self) -> Response {
        let json_response = Json(ErrorResponse {
            success: false,
            error: self.message.clone(),
        });

        (self.status, json_response).into_response()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HttpError: message: {}, status: {}",
            self.message, self.status
        )
    }
}

impl std::error::Error for HttpError {}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        self.into_http_response()
    }
}

// Malformed bodies and query strings are client errors in the usual envelope.
impl From<JsonRejection> for HttpError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::error!("Rejected JSON body: {}", rejection.body_text());
        HttpError::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for HttpError {
    fn from(rejection: QueryRejection) -> Self {
        tracing::error!("Rejected query string: {}", rejection.body_text());
        HttpError::bad_request(rejection.body_text())
    }
}
