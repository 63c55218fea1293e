use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::ServiceError;
use super::error::password_error;
use crate::config::AuthSettings;
use crate::db::{NewUser, ProfilePatch, StoreError, UserExt};
use crate::dtos::{RegisterUserDto, UpdateDetailsDto};
use crate::error::ErrorMessage;
use crate::models::{User, UserRole};
use crate::upload::{BlobStore, FileUpload};
use crate::utils::{password, reset_token, token};

/// Consecutive failed logins before the account is locked.
pub const MAX_LOGIN_ATTEMPTS: i32 = 5;
pub const LOCK_DURATION_HOURS: i64 = 2;

/// A signed session for `user`.
#[derive(Debug)]
pub struct Session {
    pub token: String,
    pub user: User,
}

fn open_session(auth: &AuthSettings, user: User) -> Result<Session, ServiceError> {
    let token = token::create_token(&user.id, auth.jwt_secret.as_bytes(), auth.jwt_maxage)
        .map_err(ServiceError::server)?;
    Ok(Session { token, user })
}

fn email_conflict(err: StoreError) -> ServiceError {
    match err {
        StoreError::Conflict(_) => ServiceError::Conflict(ErrorMessage::EmailExist.to_string()),
        other => other.into(),
    }
}

pub async fn register<D: UserExt>(
    db: &D,
    auth: &AuthSettings,
    body: RegisterUserDto,
) -> Result<Session, ServiceError> {
    let role = body.role.unwrap_or(UserRole::Student);
    if role == UserRole::Admin {
        return Err(ServiceError::InvalidInput(
            "Role must be student or company".to_string(),
        ));
    }

    let password_hash = password::hash(&body.password).map_err(password_error)?;

    let user = db
        .save_user(&NewUser {
            name: body.name.trim().to_string(),
            email: body.email.trim().to_lowercase(),
            password_hash,
            role,
        })
        .await
        .map_err(email_conflict)?;

    tracing::info!(user_id = %user.id, role = user.role.to_str(), "User registered");
    open_session(auth, user)
}

pub async fn login<D: UserExt>(
    db: &D,
    auth: &AuthSettings,
    email: &str,
    candidate: &str,
    now: DateTime<Utc>,
) -> Result<Session, ServiceError> {
    let user = db
        .get_user(None, Some(email.trim()))
        .await?
        .ok_or(ServiceError::Unauthorized(ErrorMessage::InvalidCredentials))?;

    if user.is_locked(now) {
        return Err(ServiceError::Unauthorized(ErrorMessage::AccountLocked));
    }

    let matched = match password::compare(candidate, &user.password) {
        Ok(matched) => matched,
        Err(ErrorMessage::EmptyPassword | ErrorMessage::ExceededMaxPasswordLength(_)) => false,
        Err(other) => return Err(ServiceError::server(other)),
    };

    if !matched {
        let lock_until = (user.login_attempts + 1 >= MAX_LOGIN_ATTEMPTS)
            .then(|| now + Duration::hours(LOCK_DURATION_HOURS));
        db.record_failed_login(user.id, lock_until).await?;
        if lock_until.is_some() {
            tracing::warn!(user_id = %user.id, "Account locked after repeated failed logins");
        }
        return Err(ServiceError::Unauthorized(ErrorMessage::InvalidCredentials));
    }

    if !user.is_active {
        return Err(ServiceError::Unauthorized(ErrorMessage::AccountDeactivated));
    }

    db.record_login(user.id, now).await?;
    open_session(auth, user)
}

/// Resolve a bearer token to a live, active account.
pub async fn authenticate<D: UserExt>(
    db: &D,
    auth: &AuthSettings,
    raw_token: &str,
) -> Result<User, ServiceError> {
    let user_id = token::decode_token(raw_token, auth.jwt_secret.as_bytes())
        .map_err(|_| ServiceError::Unauthorized(ErrorMessage::InvalidToken))?;

    let user = db
        .get_user(Some(user_id), None)
        .await?
        .ok_or(ServiceError::Unauthorized(ErrorMessage::UserNoLongerExist))?;

    if !user.is_active {
        return Err(ServiceError::Unauthorized(ErrorMessage::AccountDeactivated));
    }

    Ok(user)
}

pub async fn update_details<D: UserExt>(
    db: &D,
    user: &User,
    body: UpdateDetailsDto,
) -> Result<User, ServiceError> {
    if user.role == UserRole::Company && body.has_student_fields() {
        return Err(ServiceError::InvalidInput(
            "Student profile fields cannot be set on a company account".to_string(),
        ));
    }
    if user.role == UserRole::Student && body.has_company_fields() {
        return Err(ServiceError::InvalidInput(
            "Company profile fields cannot be set on a student account".to_string(),
        ));
    }

    let patch = ProfilePatch {
        name: body.name,
        email: body.email.map(|email| email.trim().to_lowercase()),
        location: body.location,
        phone: body.phone,
        avatar: None,
        university: body.university,
        study_level: body.study_level,
        study_field: body.study_field,
        graduation_year: body.graduation_year,
        company_name: body.company_name,
        company_size: body.company_size,
        industry: body.industry,
        website: body.website,
        description: body.description,
    };

    db.update_user_profile(user.id, &patch)
        .await
        .map_err(email_conflict)
}

pub async fn update_password<D: UserExt>(
    db: &D,
    auth: &AuthSettings,
    user: &User,
    current: &str,
    new_password: &str,
) -> Result<Session, ServiceError> {
    let matched = password::compare(current, &user.password).map_err(password_error)?;
    if !matched {
        return Err(ServiceError::Unauthorized(ErrorMessage::WrongPassword));
    }

    let password_hash = password::hash(new_password).map_err(password_error)?;
    let user = db.update_user_password(user.id, &password_hash).await?;

    open_session(auth, user)
}

pub async fn update_avatar<D: UserExt, B: BlobStore>(
    db: &D,
    blobs: &B,
    user: &User,
    upload: FileUpload,
) -> Result<User, ServiceError> {
    let locator = blobs.put(&upload).await.map_err(ServiceError::server)?;

    let patch = ProfilePatch {
        avatar: Some(locator.clone()),
        ..ProfilePatch::default()
    };
    let updated = match db.update_user_profile(user.id, &patch).await {
        Ok(updated) => updated,
        Err(e) => {
            discard_blob(blobs, &locator).await;
            return Err(e.into());
        }
    };

    discard_blob(blobs, &user.avatar).await;
    Ok(updated)
}

pub(crate) async fn discard_blob<B: BlobStore>(blobs: &B, locator: &str) {
    if let Err(e) = blobs.remove(locator).await {
        tracing::warn!(locator, error = %e, "Could not remove stored file");
    }
}

/// Start a reset: persist the digest and hand back the raw token for delivery.
pub async fn issue_reset_token<D: UserExt>(
    db: &D,
    email: &str,
    now: DateTime<Utc>,
) -> Result<(User, reset_token::IssuedResetToken), ServiceError> {
    let user = db
        .get_user(None, Some(email.trim()))
        .await?
        .ok_or(ServiceError::NotFound(ErrorMessage::UserNotFound))?;

    let issued = reset_token::issue(now);
    db.set_reset_token(user.id, Some(&issued.digest), Some(issued.expires_at))
        .await?;

    Ok((user, issued))
}

/// Undo `issue_reset_token` when the token could not be delivered.
pub async fn revoke_reset_token<D: UserExt>(db: &D, user_id: Uuid) -> Result<(), ServiceError> {
    db.set_reset_token(user_id, None, None).await?;
    Ok(())
}

pub async fn reset_password<D: UserExt>(
    db: &D,
    auth: &AuthSettings,
    raw_token: &str,
    new_password: &str,
    now: DateTime<Utc>,
) -> Result<Session, ServiceError> {
    let password_hash = password::hash(new_password).map_err(password_error)?;

    let user = db
        .consume_reset_token(&reset_token::digest(raw_token), now, &password_hash)
        .await?
        .ok_or(ServiceError::InvalidOrExpired)?;

    tracing::info!(user_id = %user.id, "Password reset completed");
    open_session(auth, user)
}
