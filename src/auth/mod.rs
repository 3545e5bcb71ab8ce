use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};

use crate::state::AppState;

pub mod cookies;
mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(handlers::register))
        .route("/users/login", post(handlers::login))
        .route("/users/logout", post(handlers::logout))
        .route("/users/refresh-token", post(handlers::refresh))
        .route("/users/change-password", post(handlers::change_password))
        .route("/users/current-user", get(handlers::current_user))
        .route("/users/update-account", patch(handlers::update_account))
        .route("/users/avatar", patch(handlers::update_avatar))
        .route("/users/cover-image", patch(handlers::update_cover_image))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024)) // 10MB uploads
}
