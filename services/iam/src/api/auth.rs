//! Registration and login.

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use finrecon_errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::state::AppState;
use super::{MessageResponse, client_ip};
use crate::domain::audit::{AuditEntry, events};
use crate::domain::token::TokenPurpose;
use crate::domain::user::User;
use crate::domain::value_objects::{Email, HashedPassword};
use crate::application::magic_link::normalize_email;

const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub email: String,
    pub full_name: String,
    pub token: String,
}

/// POST /api/auth/register
///
/// Creates the account inactive-confirmed and fires a verification
/// link. Delivery problems are logged but never fail the registration;
/// the user can request another link later.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> AppResult<Json<MessageResponse>> {
    let email = Email::new(&request.email)?;

    if request.password != request.confirm_password {
        return Err(AppError::validation("Passwords do not match."));
    }
    HashedPassword::validate_plain(&request.password)?;

    if state.users.email_exists(email.as_str()).await? {
        return Err(AppError::validation("Email already registered."));
    }

    let password_hash = HashedPassword::from_plain(&request.password)?;
    let user = User::new(
        email,
        request.first_name,
        request.last_name,
        password_hash,
    );
    state.users.insert(&user).await?;
    info!(user_id = %user.id, "User registered");

    let ip = client_ip(&headers);
    state
        .record_audit(
            AuditEntry::new(events::USER_REGISTERED)
                .with_user(&user.id)
                .with_entity("User", Some(user.id.to_string()))
                .with_ip(ip.clone()),
        )
        .await;

    if let Some(issued) = state
        .magic_links
        .issue(
            &user.email,
            Some(user.id.clone()),
            TokenPurpose::EmailVerify,
            ip.clone(),
        )
        .await?
    {
        if let Err(err) = state
            .mailer
            .send_link(&user.email, TokenPurpose::EmailVerify, &issued.secret)
            .await
        {
            warn!(error = %err, "Failed to send verification email");
        }
    }

    state
        .record_audit(
            AuditEntry::new(events::MAGIC_LINK_REQUESTED)
                .with_user(&user.id)
                .with_entity("AuthActionToken", None)
                .with_metadata("purpose=EmailVerify")
                .with_ip(ip),
        )
        .await;

    Ok(Json(MessageResponse::new("User registered successfully.")))
}

/// POST /api/auth/login
///
/// Unknown address, wrong password and deactivated account all answer
/// with the same 401 so none of them can be told apart.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let email = normalize_email(&request.email);
    let user = state.users.find_by_email(&email).await?;

    let user = match user {
        Some(user)
            if user.is_active
                && user.password_hash.verify(&request.password).unwrap_or(false) =>
        {
            user
        }
        _ => return Err(AppError::unauthorized(INVALID_CREDENTIALS_MESSAGE)),
    };

    let token = state.token_service.generate_token(&user.id, &user.email)?;
    info!(user_id = %user.id, "User logged in");

    state
        .record_audit(
            AuditEntry::new(events::USER_LOGGED_IN)
                .with_user(&user.id)
                .with_entity("User", Some(user.id.to_string()))
                .with_ip(client_ip(&headers)),
        )
        .await;

    Ok(Json(LoginResponse {
        email: user.email.clone(),
        full_name: user.full_name(),
        token,
    }))
}
