use axum::{
    Extension, Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use chrono::Utc;
use tracing::instrument;
use validator::Validate;

use crate::{
    AppState,
    dtos::{ApiResponse, ApplicationFormDto, DecideApplicationDto},
    error::{ErrorMessage, HttpError},
    handler::{AppJson, parse_id, read_multipart, upload_body_limit, validation_error},
    middleware::{JWTAuthMiddleware, auth, role_check},
    models::UserRole,
    service::{
        lifecycle::{self, Submission},
        stats,
    },
    upload::UploadKind,
};

/// Router for the application lifecycle
///
/// Every route needs a session. Role layers reject the wrong kind of account
/// early; ownership is decided by the lifecycle service.
pub fn applications_handler(app_state: AppState) -> Router<AppState> {
    let role = |roles: &'static [UserRole]| {
        middleware::from_fn(move |req: axum::extract::Request, next: middleware::Next| role_check(req, next, roles.to_vec()))
    };

    Router::new()
        .route(
            "/",
            post(submit_application)
                .layer::<_, std::convert::Infallible>(role(&[UserRole::Student]))
                .layer(upload_body_limit()),
        )
        .route(
            "/my",
            get(my_applications).layer(role(&[UserRole::Student])),
        )
        .route("/stats", get(application_stats))
        .route(
            "/internship/{id}",
            get(internship_applications).layer(role(&[UserRole::Company, UserRole::Admin])),
        )
        .route(
            "/{id}/status",
            put(decide_application).layer(role(&[UserRole::Company, UserRole::Admin])),
        )
        .route(
            "/{id}",
            delete(withdraw_application).layer(role(&[UserRole::Student, UserRole::Admin])),
        )
        .route_layer(middleware::from_fn_with_state(app_state, auth))
}

/// Multipart submit: `internshipId`, `coverLetter`, optional `portfolio`,
/// and the `resume` file.
#[instrument(skip(app_state, jwt, multipart), fields(user_id = %jwt.user.id))]
pub async fn submit_application(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    let mut form = read_multipart(multipart, UploadKind::Resume).await?;

    let body = ApplicationFormDto {
        internship_id: form.take("internshipId"),
        cover_letter: form.take("coverLetter").unwrap_or_default(),
        portfolio: form.take("portfolio"),
    };
    body.validate()
        .map_err(|e| validation_error("application", e))?;

    let internship_id = body
        .internship_id
        .as_deref()
        .ok_or_else(|| HttpError::bad_request("Internship ID is required"))?;
    let internship_id = parse_id(internship_id, ErrorMessage::InternshipNotFound)?;

    let submission = Submission {
        internship_id,
        cover_letter: body.cover_letter,
        portfolio: body.portfolio,
        resume: form.file,
    };

    let application = lifecycle::submit_application(
        &app_state.db_client,
        &app_state.blob_store,
        &jwt.actor(),
        submission,
        Utc::now(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(application))))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn my_applications(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let applications = lifecycle::my_applications(&app_state.db_client, &jwt.actor()).await?;
    let count = applications.len();
    Ok(Json(ApiResponse::ok(applications).with_count(count)))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn internship_applications(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let internship_id = parse_id(&id, ErrorMessage::InternshipNotFound)?;

    let applications =
        lifecycle::internship_applications(&app_state.db_client, &jwt.actor(), internship_id)
            .await?;

    let count = applications.len();
    Ok(Json(ApiResponse::ok(applications).with_count(count)))
}

#[instrument(skip(app_state, jwt, body), fields(user_id = %jwt.user.id, status = %body.status))]
pub async fn decide_application(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Path(id): Path<String>,
    AppJson(body): AppJson<DecideApplicationDto>,
) -> Result<impl IntoResponse, HttpError> {
    let application_id = parse_id(&id, ErrorMessage::ApplicationNotFound)?;
    body.validate()
        .map_err(|e| validation_error("application status", e))?;

    let application = lifecycle::decide_application(
        &app_state.db_client,
        &jwt.actor(),
        application_id,
        body,
        app_state.env.lifecycle.transitions,
    )
    .await?;

    Ok(Json(ApiResponse::ok(application)))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn withdraw_application(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let application_id = parse_id(&id, ErrorMessage::ApplicationNotFound)?;

    lifecycle::withdraw_application(
        &app_state.db_client,
        &app_state.blob_store,
        &jwt.actor(),
        application_id,
    )
    .await?;

    Ok(Json(ApiResponse::ok(serde_json::json!({}))))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn application_stats(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let stats = stats::application_stats(&app_state.db_client, &jwt.actor()).await?;
    Ok(Json(ApiResponse::ok(stats)))
}
