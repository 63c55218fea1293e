use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    middleware,
    response::IntoResponse,
    routing::get,
};
use tracing::instrument;
use validator::Validate;

use crate::{
    AppState,
    dtos::{AdminUpdateUserDto, ApiResponse, PaginationDto, UsersQueryDto},
    error::{ErrorMessage, HttpError},
    handler::{AppJson, AppQuery, parse_id, validation_error},
    middleware::{JWTAuthMiddleware, auth, role_check},
    models::UserRole,
    service::users,
};

/// Router for account administration
///
/// Admin only. The service checks the role again, so these handlers stay
/// safe if mounted elsewhere.
pub fn users_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(get_users))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
        .route_layer(middleware::from_fn(|req, next| {
            role_check(req, next, vec![UserRole::Admin])
        }))
        .route_layer(middleware::from_fn_with_state(app_state, auth))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn get_users(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    AppQuery(query): AppQuery<UsersQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    query
        .validate()
        .map_err(|e| validation_error("users query", e))?;

    let page = users::list_users(&app_state.db_client, &jwt.actor(), &query).await?;

    let count = page.users.len();
    let pagination = PaginationDto::new(page.page, page.limit, page.total);
    Ok(Json(
        ApiResponse::ok(page.users)
            .with_count(count)
            .with_pagination(pagination),
    ))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn get_user(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let id = parse_id(&id, ErrorMessage::UserNotFound)?;
    let user = users::get_user(&app_state.db_client, &jwt.actor(), id).await?;
    Ok(Json(ApiResponse::ok(user)))
}

#[instrument(skip(app_state, jwt, body), fields(user_id = %jwt.user.id))]
pub async fn update_user(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Path(id): Path<String>,
    AppJson(body): AppJson<AdminUpdateUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    let id = parse_id(&id, ErrorMessage::UserNotFound)?;
    body.validate()
        .map_err(|e| validation_error("update user", e))?;

    let user = users::update_user(&app_state.db_client, &jwt.actor(), id, body).await?;

    tracing::info!(target_user = %user.id, "User updated by admin");
    Ok(Json(ApiResponse::ok(user)))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn delete_user(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let id = parse_id(&id, ErrorMessage::UserNotFound)?;

    users::delete_user(&app_state.db_client, &app_state.blob_store, &jwt.actor(), id).await?;
    Ok(Json(ApiResponse::ok(serde_json::json!({}))))
}
