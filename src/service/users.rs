use uuid::Uuid;

use super::ServiceError;
use super::identity::discard_blob;
use crate::access::{Action, Actor, Resource, authorize};
use crate::db::{AdminUserPatch, StoreError, UserExt};
use crate::dtos::{AdminUpdateUserDto, UsersQueryDto};
use crate::error::ErrorMessage;
use crate::models::User;
use crate::upload::BlobStore;

const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug)]
pub struct UserPage {
    pub users: Vec<User>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

fn user_not_found(err: StoreError) -> ServiceError {
    match err {
        StoreError::NotFound => ServiceError::NotFound(ErrorMessage::UserNotFound),
        StoreError::Conflict(_) => ServiceError::Conflict(ErrorMessage::EmailExist.to_string()),
        other => other.into(),
    }
}

pub async fn list_users<D: UserExt>(
    db: &D,
    actor: &Actor,
    query: &UsersQueryDto,
) -> Result<UserPage, ServiceError> {
    authorize(actor, Resource::Users, Action::Manage)?;

    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
    let users = db.get_users(query.role, page, limit).await?;
    let total = db.get_user_count(query.role).await?;

    Ok(UserPage {
        users,
        total,
        page,
        limit,
    })
}

pub async fn get_user<D: UserExt>(
    db: &D,
    actor: &Actor,
    user_id: Uuid,
) -> Result<User, ServiceError> {
    authorize(actor, Resource::Users, Action::Manage)?;
    db.get_user(Some(user_id), None)
        .await?
        .ok_or(ServiceError::NotFound(ErrorMessage::UserNotFound))
}

pub async fn update_user<D: UserExt>(
    db: &D,
    actor: &Actor,
    user_id: Uuid,
    body: AdminUpdateUserDto,
) -> Result<User, ServiceError> {
    authorize(actor, Resource::Users, Action::Manage)?;

    let patch = AdminUserPatch {
        name: body.name,
        email: body.email.map(|email| email.trim().to_lowercase()),
        role: body.role,
        is_active: body.is_active,
        is_verified: body.is_verified,
    };

    db.update_user_admin(user_id, &patch)
        .await
        .map_err(user_not_found)
}

/// Deletes the account together with its postings and applications, then
/// the files they pointed at.
pub async fn delete_user<D: UserExt, B: BlobStore>(
    db: &D,
    blobs: &B,
    actor: &Actor,
    user_id: Uuid,
) -> Result<(), ServiceError> {
    authorize(actor, Resource::Users, Action::Manage)?;
    if actor.id == user_id {
        return Err(ServiceError::InvalidInput(
            "Admins cannot delete their own account".to_string(),
        ));
    }

    let locators = db.delete_user(user_id).await.map_err(user_not_found)?;
    for locator in &locators {
        discard_blob(blobs, locator).await;
    }

    tracing::info!(
        user_id = %user_id,
        deleted_by = %actor.id,
        files = locators.len(),
        "User deleted"
    );
    Ok(())
}
