use axum::{
    Extension, Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use tracing::instrument;
use validator::Validate;

use crate::{
    AppState,
    dtos::{
        ApiResponse, CreateInternshipDto, InternshipQueryDto, PaginationDto, UpdateInternshipDto,
    },
    error::{ErrorMessage, HttpError},
    handler::{
        AppJson, AppQuery, parse_id, read_multipart, upload_body_limit, validation_error,
    },
    middleware::{JWTAuthMiddleware, auth, role_check},
    models::UserRole,
    service::listing,
    upload::UploadKind,
};

/// Router for internship postings
///
/// Reads are public. Writes need a company or admin session; ownership is
/// checked per posting by the listing service.
pub fn internships_handler(app_state: AppState) -> Router<AppState> {
    let authed = || middleware::from_fn_with_state(app_state.clone(), auth);
    let poster = || {
        middleware::from_fn(|req: axum::extract::Request, next: middleware::Next| {
            role_check(req, next, vec![UserRole::Company, UserRole::Admin])
        })
    };

    Router::new()
        .route(
            "/",
            get(list_internships).merge(post(create_internship).layer(poster()).layer(authed())),
        )
        .route("/featured", get(featured_internships))
        .route("/recent", get(recent_internships))
        .route(
            "/my",
            get(my_internships).layer(poster()).layer(authed()),
        )
        .route(
            "/{id}",
            get(get_internship).merge(
                put(update_internship)
                    .delete(delete_internship)
                    .layer(poster())
                    .layer(authed()),
            ),
        )
        .route(
            "/{id}/logo",
            put(upload_logo)
                .layer(poster())
                .layer::<_, std::convert::Infallible>(authed())
                .layer(upload_body_limit()),
        )
}

#[instrument(skip(app_state))]
pub async fn list_internships(
    State(app_state): State<AppState>,
    AppQuery(query): AppQuery<InternshipQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    query
        .validate()
        .map_err(|e| validation_error("internship query", e))?;

    let page = listing::list_internships(&app_state.db_client, &query).await?;

    let count = page.internships.len();
    let pagination = PaginationDto::new(page.page, page.limit, page.total);
    Ok(Json(
        ApiResponse::ok(page.internships)
            .with_count(count)
            .with_pagination(pagination),
    ))
}

#[instrument(skip(app_state))]
pub async fn featured_internships(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let internships = listing::featured_internships(&app_state.db_client).await?;
    let count = internships.len();
    Ok(Json(ApiResponse::ok(internships).with_count(count)))
}

#[instrument(skip(app_state))]
pub async fn recent_internships(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let internships = listing::recent_internships(&app_state.db_client).await?;
    let count = internships.len();
    Ok(Json(ApiResponse::ok(internships).with_count(count)))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn my_internships(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let internships = listing::my_internships(&app_state.db_client, &jwt.actor()).await?;
    let count = internships.len();
    Ok(Json(ApiResponse::ok(internships).with_count(count)))
}

/// Detail view; counts as one view.
#[instrument(skip(app_state))]
pub async fn get_internship(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let id = parse_id(&id, ErrorMessage::InternshipNotFound)?;
    let internship = listing::view_internship(&app_state.db_client, id).await?;
    Ok(Json(ApiResponse::ok(internship)))
}

#[instrument(skip(app_state, jwt, body), fields(user_id = %jwt.user.id, title = %body.title))]
pub async fn create_internship(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    AppJson(body): AppJson<CreateInternshipDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| validation_error("create internship", e))?;

    let internship = listing::create_internship(&app_state.db_client, &jwt.user, body).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(internship))))
}

#[instrument(skip(app_state, jwt, body), fields(user_id = %jwt.user.id))]
pub async fn update_internship(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Path(id): Path<String>,
    AppJson(body): AppJson<UpdateInternshipDto>,
) -> Result<impl IntoResponse, HttpError> {
    let id = parse_id(&id, ErrorMessage::InternshipNotFound)?;
    body.validate()
        .map_err(|e| validation_error("update internship", e))?;

    let internship =
        listing::update_internship(&app_state.db_client, &jwt.actor(), id, body).await?;

    Ok(Json(ApiResponse::ok(internship)))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn delete_internship(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let id = parse_id(&id, ErrorMessage::InternshipNotFound)?;

    listing::delete_internship(
        &app_state.db_client,
        &app_state.blob_store,
        &jwt.actor(),
        id,
        app_state.env.lifecycle.internship_deletion,
    )
    .await?;
    Ok(Json(ApiResponse::ok(serde_json::json!({}))))
}

#[instrument(skip(app_state, jwt, multipart), fields(user_id = %jwt.user.id))]
pub async fn upload_logo(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    let id = parse_id(&id, ErrorMessage::InternshipNotFound)?;
    let form = read_multipart(multipart, UploadKind::Logo).await?;
    let upload = form
        .file
        .ok_or_else(|| HttpError::bad_request("Please upload a logo image"))?;

    let internship = listing::set_logo(
        &app_state.db_client,
        &app_state.blob_store,
        &jwt.actor(),
        id,
        upload,
    )
    .await?;

    Ok(Json(ApiResponse::ok(internship)))
}
