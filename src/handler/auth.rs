use axum::{
    Extension, Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::Utc;
use tracing::instrument;
use validator::Validate;

use crate::{
    AppState,
    config::AuthSettings,
    dtos::{
        ApiResponse, AuthResponseDto, FilterUserDto, ForgotPasswordDto, LoginUserDto,
        MessageResponseDto, RegisterUserDto, ResetPasswordDto, UpdateDetailsDto,
        UpdatePasswordDto,
    },
    error::{ErrorMessage, HttpError},
    handler::{AppJson, read_multipart, upload_body_limit, validation_error},
    mail::mails::{reset_link, send_reset_password_email},
    middleware::{JWTAuthMiddleware, SESSION_COOKIE, auth},
    service::identity::{self, Session},
    upload::UploadKind,
};

/// Router for account endpoints
///
/// Public: register, login, forgotpassword, resetpassword.
/// Everything else sits behind the `auth` middleware.
pub fn auth_handler(app_state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/me", get(get_me))
        .route("/logout", get(logout))
        .route("/updatedetails", put(update_details))
        .route("/updatepassword", put(update_password))
        .route(
            "/updateavatar",
            put(update_avatar).layer(upload_body_limit()),
        )
        .route_layer(middleware::from_fn_with_state(app_state, auth));

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/forgotpassword", post(forgot_password))
        .route("/resetpassword/{token}", put(reset_password))
        .merge(protected)
}

fn session_cookie(settings: &AuthSettings, token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .max_age(time::Duration::seconds(settings.jwt_maxage))
        .http_only(true)
        .secure(settings.cookie_secure)
        .build()
}

/// Body plus `token` cookie for every endpoint that opens a session.
fn session_response(
    jar: CookieJar,
    settings: &AuthSettings,
    status: StatusCode,
    session: Session,
) -> impl IntoResponse + use<> {
    let jar = jar.add(session_cookie(settings, session.token.clone()));
    let body = Json(AuthResponseDto {
        success: true,
        token: session.token,
        user: FilterUserDto::filter_user(&session.user),
    });
    (status, jar, body)
}

#[instrument(skip(app_state, jar, body), fields(email = %body.email))]
pub async fn register(
    State(app_state): State<AppState>,
    jar: CookieJar,
    AppJson(body): AppJson<RegisterUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| validation_error("register", e))?;

    let session = identity::register(&app_state.db_client, &app_state.env.auth, body).await?;
    Ok(session_response(
        jar,
        &app_state.env.auth,
        StatusCode::CREATED,
        session,
    ))
}

#[instrument(skip(app_state, jar, body), fields(email = %body.email))]
pub async fn login(
    State(app_state): State<AppState>,
    jar: CookieJar,
    AppJson(body): AppJson<LoginUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| validation_error("login", e))?;

    let session = identity::login(
        &app_state.db_client,
        &app_state.env.auth,
        &body.email,
        &body.password,
        Utc::now(),
    )
    .await?;

    tracing::info!(user_id = %session.user.id, "Login Successful");
    Ok(session_response(
        jar,
        &app_state.env.auth,
        StatusCode::OK,
        session,
    ))
}

#[instrument(skip_all)]
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    // Expire immediately
    let cleared = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .http_only(true)
        .build();

    (
        jar.add(cleared),
        Json(MessageResponseDto::new("Logged out")),
    )
}

#[instrument(skip_all, fields(user_id = %jwt.user.id))]
pub async fn get_me(Extension(jwt): Extension<JWTAuthMiddleware>) -> impl IntoResponse {
    Json(ApiResponse::ok(jwt.user))
}

#[instrument(skip(app_state, jwt, body), fields(user_id = %jwt.user.id))]
pub async fn update_details(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    AppJson(body): AppJson<UpdateDetailsDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| validation_error("update details", e))?;

    let user = identity::update_details(&app_state.db_client, &jwt.user, body).await?;

    Ok(Json(ApiResponse::ok(user)))
}

#[instrument(skip(app_state, jwt, jar, body), fields(user_id = %jwt.user.id))]
pub async fn update_password(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    jar: CookieJar,
    AppJson(body): AppJson<UpdatePasswordDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| validation_error("update password", e))?;

    let session = identity::update_password(
        &app_state.db_client,
        &app_state.env.auth,
        &jwt.user,
        &body.current_password,
        &body.new_password,
    )
    .await?;

    tracing::info!("Password updated");
    Ok(session_response(
        jar,
        &app_state.env.auth,
        StatusCode::OK,
        session,
    ))
}

#[instrument(skip(app_state, jwt, multipart), fields(user_id = %jwt.user.id))]
pub async fn update_avatar(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    let form = read_multipart(multipart, UploadKind::Avatar).await?;
    let upload = form
        .file
        .ok_or_else(|| HttpError::bad_request("Please upload an avatar image"))?;

    let user = identity::update_avatar(
        &app_state.db_client,
        &app_state.blob_store,
        &jwt.user,
        upload,
    )
    .await?;

    Ok(Json(ApiResponse::ok(user)))
}

/// Issue a reset token and mail the link. Without SMTP the raw token is
/// returned in the body instead.
#[instrument(skip(app_state, body), fields(email = %body.email))]
pub async fn forgot_password(
    State(app_state): State<AppState>,
    AppJson(body): AppJson<ForgotPasswordDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| validation_error("forgot password", e))?;

    let (user, issued) =
        identity::issue_reset_token(&app_state.db_client, &body.email, Utc::now()).await?;

    let Some(smtp) = app_state.env.smtp.as_ref() else {
        tracing::warn!(user_id = %user.id, "SMTP not configured, returning reset token in response");
        let mut response = MessageResponseDto::new("Reset token generated");
        response.reset_token = Some(issued.raw);
        return Ok(Json(response));
    };

    let link = reset_link(&app_state.env.frontend_url, &issued.raw);
    if let Err(e) = send_reset_password_email(smtp, &user.email, &user.name, &link).await {
        tracing::error!(user_id = %user.id, "Failed to send reset email: {}", e);
        identity::revoke_reset_token(&app_state.db_client, user.id).await?;
        return Err(HttpError::server_error("Email could not be sent"));
    }

    tracing::info!(user_id = %user.id, "Reset email sent");
    Ok(Json(MessageResponseDto::new("Email sent")))
}

#[instrument(skip(app_state, jar, token, body))]
pub async fn reset_password(
    State(app_state): State<AppState>,
    Path(token): Path<String>,
    jar: CookieJar,
    AppJson(body): AppJson<ResetPasswordDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| validation_error("reset password", e))?;
    if token.is_empty() {
        return Err(HttpError::bad_request(
            ErrorMessage::InvalidOrExpiredResetToken.to_string(),
        ));
    }

    let session = identity::reset_password(
        &app_state.db_client,
        &app_state.env.auth,
        &token,
        &body.password,
        Utc::now(),
    )
    .await?;

    Ok(session_response(
        jar,
        &app_state.env.auth,
        StatusCode::OK,
        session,
    ))
}
