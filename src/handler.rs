use std::collections::HashMap;

use axum::extract::{DefaultBodyLimit, FromRequest, FromRequestParts, Multipart};
use uuid::Uuid;
use validator::ValidationErrors;

use crate::error::{ErrorMessage, HttpError};
use crate::upload::{FileUpload, MAX_UPLOAD_BYTES, UploadKind, validate_upload};

pub mod applications;
pub mod auth;
pub mod internships;
pub mod users;

/// `Json` whose rejections use the error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(HttpError))]
pub struct AppJson<T>(pub T);

/// `Query` whose rejections use the error envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(HttpError))]
pub struct AppQuery<T>(pub T);

/// Body limit for multipart routes: one file plus the text fields.
pub fn upload_body_limit() -> DefaultBodyLimit {
    DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 1024 * 1024)
}

/// Path ids that do not parse can never match a row.
pub fn parse_id(raw: &str, missing: ErrorMessage) -> Result<Uuid, HttpError> {
    Uuid::parse_str(raw).map_err(|_| HttpError::not_found(missing.to_string()))
}

/// Log a validator failure and turn it into a 400 carrying the first message.
pub fn validation_error(context: &str, errors: ValidationErrors) -> HttpError {
    tracing::error!("Invalid {} input: {}", context, errors);
    let message = errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .find_map(|err| err.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| errors.to_string());
    HttpError::bad_request(message)
}

/// Text fields of a multipart form plus at most one validated file.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub file: Option<FileUpload>,
}

impl MultipartForm {
    pub fn take(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name).filter(|value| !value.is_empty())
    }
}

/// Drain `multipart`, validating the part named after `kind` as a file.
pub async fn read_multipart(
    mut multipart: Multipart,
    kind: UploadKind,
) -> Result<MultipartForm, HttpError> {
    let mut form = MultipartForm::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Multipart error: {}", e);
        HttpError::bad_request(e.body_text())
    })? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        if name == kind.field_name() {
            let file_name = field.file_name().unwrap_or_default().to_owned();
            let content_type = field.content_type().unwrap_or_default().to_owned();
            let bytes = field.bytes().await.map_err(|e| {
                tracing::error!("Multipart error, reading {}: {}", name, e);
                HttpError::bad_request(e.body_text())
            })?;
            let upload = validate_upload(kind, &file_name, &content_type, bytes)
                .map_err(|e| HttpError::bad_request(e.to_string()))?;
            form.file = Some(upload);
        } else {
            let text = field.text().await.map_err(|e| {
                tracing::error!("Multipart error, reading {}: {}", name, e);
                HttpError::bad_request(e.body_text())
            })?;
            form.fields.insert(name, text);
        }
    }

    Ok(form)
}
