use axum::body::Bytes;
use chrono::{DateTime, Duration, Utc};

use crate::config::AuthSettings;
use crate::upload::{FileUpload, UploadKind, validate_upload};

pub fn auth_settings() -> AuthSettings {
    AuthSettings {
        jwt_secret: "service-test-secret".to_string(),
        jwt_maxage: 3600,
        cookie_secure: false,
    }
}

pub fn resume() -> FileUpload {
    validate_upload(
        UploadKind::Resume,
        "cv.pdf",
        "application/pdf",
        Bytes::from_static(b"%PDF-1.4 resume"),
    )
    .unwrap()
}

pub fn days(n: i64) -> DateTime<Utc> {
    Utc::now() + Duration::days(n)
}
