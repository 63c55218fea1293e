use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::IntoResponse,
};

use axum_extra::extract::cookie::CookieJar;

use crate::{
    AppState,
    access::{Actor, require_role},
    error::{ErrorMessage, HttpError},
    models::{User, UserRole},
    service::identity,
};

/// Name of the session cookie set on login.
pub const SESSION_COOKIE: &str = "token";

/// Request extension carrying the authenticated account
///
/// Inserted by `auth`; handlers read it with
/// `Extension(jwt): Extension<JWTAuthMiddleware>`.
#[derive(Debug, Clone)]
pub struct JWTAuthMiddleware {
    pub user: User,
}

impl JWTAuthMiddleware {
    pub fn actor(&self) -> Actor {
        Actor::from(&self.user)
    }
}

fn bearer_token(req: &Request) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|auth_header| auth_header.to_str().ok())
        .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_owned())
        .filter(|token| !token.is_empty())
}

/// Authentication middleware
///
/// Token sources, in order: `Authorization: Bearer <token>`, then the
/// `token` cookie. The account is re-read on every request, so deleted or
/// deactivated users lose access immediately.
///
/// Returns 401 when no token is present, the token is invalid or expired,
/// or the account no longer exists or is inactive.
pub async fn auth(
    cookie_jar: CookieJar,
    State(app_state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let token = bearer_token(&req)
        .or_else(|| {
            cookie_jar
                .get(SESSION_COOKIE)
                .map(|cookie| cookie.value().to_string())
                .filter(|value| !value.is_empty())
        })
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::TokenNotProvided.to_string()))?;

    let user = identity::authenticate(&app_state.db_client, &app_state.env.auth, &token).await?;

    req.extensions_mut().insert(JWTAuthMiddleware { user });

    Ok(next.run(req).await)
}

/// Role-based access control, layered after `auth`
///
/// Returns 401 if `auth` did not run and 403 if the account's role is not
/// in `required_roles`.
pub async fn role_check(
    req: Request,
    next: Next,
    required_roles: Vec<UserRole>,
) -> Result<impl IntoResponse, HttpError> {
    let user = req
        .extensions()
        .get::<JWTAuthMiddleware>()
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNotAuthenticated.to_string()))?;

    require_role(&user.actor(), &required_roles)?;

    Ok(next.run(req).await)
}
