use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// How long a password-reset token stays valid.
pub const RESET_TOKEN_TTL_MINUTES: i64 = 10;

const RESET_TOKEN_BYTES: usize = 20;

/// A freshly issued reset token: the raw value goes to the user exactly once,
/// only the digest is persisted.
#[derive(Debug)]
pub struct IssuedResetToken {
    pub raw: String,
    pub digest: String,
    pub expires_at: DateTime<Utc>,
}

pub fn issue(now: DateTime<Utc>) -> IssuedResetToken {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let raw = hex::encode(bytes);

    IssuedResetToken {
        digest: digest(&raw),
        raw,
        expires_at: now + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
    }
}

/// SHA-256 of the raw token, hex encoded. This is the value looked up in storage.
pub fn digest(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}
