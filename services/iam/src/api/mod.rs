//! HTTP layer: router assembly, middleware and handlers.

pub mod auth;
pub mod health;
pub mod magic_links;
pub mod me;
pub mod middleware;
pub mod state;

use axum::Router;
use axum::http::HeaderMap;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use serde::Serialize;

pub use state::AppState;

/// Uniform `{"message": …}` payload for status-style endpoints.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Client address as reported by the edge proxy. The service always
/// runs behind one, so the socket peer is not useful.
pub(crate) fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn api_routes(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/verify-email-link", post(magic_links::verify_email_link))
        .route(
            "/api/auth/request-password-reset-link",
            post(magic_links::request_password_reset_link),
        )
        .route(
            "/api/auth/confirm-password-reset-link",
            post(magic_links::confirm_password_reset_link),
        );

    let protected = Router::new()
        .route("/api/me", get(me::me))
        .route(
            "/api/auth/request-change-password-link",
            post(magic_links::request_change_password_link),
        )
        .route(
            "/api/auth/confirm-change-password-link",
            post(magic_links::confirm_change_password_link),
        )
        .layer(from_fn_with_state(state.clone(), middleware::auth_middleware));

    public.merge(protected).with_state(state)
}
