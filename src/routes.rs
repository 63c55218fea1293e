use axum::{Json, Router, response::IntoResponse, routing::get};
use chrono::Utc;
use serde_json::json;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{
    AppState,
    error::{ErrorMessage, HttpError},
    handler::{
        applications::applications_handler, auth::auth_handler,
        internships::internships_handler, users::users_handler,
    },
};

pub fn create_router(app_state: AppState) -> Router {
    let api_route = Router::new()
        .route("/test", get(health))
        .nest("/auth", auth_handler(app_state.clone()))
        .nest("/internships", internships_handler(app_state.clone()))
        .nest("/applications", applications_handler(app_state.clone()))
        .nest("/users", users_handler(app_state.clone()))
        .layer(TraceLayer::new_for_http());

    Router::new()
        .route("/", get(banner))
        .nest("/api", api_route)
        .nest_service("/uploads", ServeDir::new(app_state.blob_store.root()))
        .fallback(not_found)
        .with_state(app_state)
}

async fn banner() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "message": "Internship platform API is running",
    }))
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "message": "API is working",
        "timestamp": Utc::now(),
    }))
}

async fn not_found() -> HttpError {
    HttpError::not_found(ErrorMessage::RouteNotFound.to_string())
}
