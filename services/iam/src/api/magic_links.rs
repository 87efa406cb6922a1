//! Magic-link HTTP endpoints.
//!
//! Request endpoints answer uniformly whether or not the address has an
//! account, and consume endpoints answer one generic message for every
//! rejection reason, so nothing here can be used to probe accounts.

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use finrecon_errors::{AppError, AppResult};
use serde::Deserialize;
use tracing::{info, warn};

use super::middleware::AuthClaims;
use super::state::AppState;
use super::{MessageResponse, client_ip};
use crate::application::magic_link::normalize_email;
use crate::domain::audit::{AuditEntry, events};
use crate::domain::token::TokenPurpose;
use crate::domain::user::User;
use crate::domain::value_objects::HashedPassword;
use finrecon_common::UserId;

const INVALID_TOKEN_MESSAGE: &str = "Invalid or expired token.";
const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid credentials.";
const LINK_SENT_MESSAGE: &str = "If an account exists, a link was sent.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEmailLinkRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPasswordResetLinkRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPasswordResetLinkRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmChangePasswordLinkRequest {
    pub token: String,
    pub current_password: String,
    pub new_password: String,
}

/// POST /api/auth/verify-email-link
pub async fn verify_email_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<VerifyEmailLinkRequest>,
) -> AppResult<Json<MessageResponse>> {
    let outcome = state
        .magic_links
        .consume(&request.token, TokenPurpose::EmailVerify, None)
        .await?;

    if !outcome.success {
        state
            .record_audit(
                AuditEntry::new(events::MAGIC_LINK_CONSUME_FAILED)
                    .with_entity("AuthActionToken", None)
                    .with_metadata("purpose=EmailVerify")
                    .with_ip(client_ip(&headers)),
            )
            .await;
        return Err(AppError::validation(INVALID_TOKEN_MESSAGE));
    }

    let Some(user) = resolve_user(&state, outcome.user_id.as_ref(), outcome.email.as_deref()).await?
    else {
        return Err(AppError::validation(INVALID_TOKEN_MESSAGE));
    };

    state.users.mark_email_confirmed(&user.id).await?;
    info!(user_id = %user.id, "Email address verified");

    state
        .record_audit(
            AuditEntry::new(events::EMAIL_VERIFIED)
                .with_user(&user.id)
                .with_entity("User", Some(user.id.to_string()))
                .with_ip(client_ip(&headers)),
        )
        .await;
    state
        .record_audit(
            AuditEntry::new(events::MAGIC_LINK_CONSUMED)
                .with_user(&user.id)
                .with_entity("AuthActionToken", None)
                .with_metadata("purpose=EmailVerify")
                .with_ip(client_ip(&headers)),
        )
        .await;

    Ok(Json(MessageResponse::new("Email verified.")))
}

/// POST /api/auth/request-password-reset-link
///
/// Always answers 200 with the same body. A token is issued and mailed
/// only when the address belongs to an active account.
pub async fn request_password_reset_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RequestPasswordResetLinkRequest>,
) -> AppResult<Json<MessageResponse>> {
    let email = normalize_email(&request.email);
    let user = state
        .users
        .find_by_email(&email)
        .await?
        .filter(|u| u.is_active);

    if let Some(user) = user {
        let ip = client_ip(&headers);
        if let Some(issued) = state
            .magic_links
            .issue(
                &user.email,
                Some(user.id.clone()),
                TokenPurpose::PasswordReset,
                ip.clone(),
            )
            .await?
        {
            send_link_or_log(&state, &user.email, TokenPurpose::PasswordReset, &issued.secret)
                .await?;
        }

        state
            .record_audit(
                AuditEntry::new(events::MAGIC_LINK_REQUESTED)
                    .with_user(&user.id)
                    .with_entity("AuthActionToken", None)
                    .with_metadata("purpose=PasswordReset")
                    .with_ip(ip),
            )
            .await;
    }

    Ok(Json(MessageResponse::new(LINK_SENT_MESSAGE)))
}

/// POST /api/auth/confirm-password-reset-link
pub async fn confirm_password_reset_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ConfirmPasswordResetLinkRequest>,
) -> AppResult<Json<MessageResponse>> {
    // Policy check up front so a policy violation cannot burn the token.
    HashedPassword::validate_plain(&request.new_password)?;

    let outcome = state
        .magic_links
        .consume(&request.token, TokenPurpose::PasswordReset, None)
        .await?;

    if !outcome.success {
        state
            .record_audit(
                AuditEntry::new(events::MAGIC_LINK_CONSUME_FAILED)
                    .with_entity("AuthActionToken", None)
                    .with_metadata("purpose=PasswordReset")
                    .with_ip(client_ip(&headers)),
            )
            .await;
        return Err(AppError::validation(INVALID_TOKEN_MESSAGE));
    }

    let user = resolve_user(&state, outcome.user_id.as_ref(), outcome.email.as_deref())
        .await?
        .filter(|u| u.is_active);
    let Some(user) = user else {
        return Err(AppError::validation(INVALID_TOKEN_MESSAGE));
    };

    let password_hash = HashedPassword::from_plain(&request.new_password)?;
    state.users.update_password(&user.id, &password_hash).await?;
    info!(user_id = %user.id, "Password reset via magic link");

    state
        .record_audit(
            AuditEntry::new(events::PASSWORD_RESET_COMPLETED)
                .with_user(&user.id)
                .with_entity("User", Some(user.id.to_string()))
                .with_ip(client_ip(&headers)),
        )
        .await;
    state
        .record_audit(
            AuditEntry::new(events::MAGIC_LINK_CONSUMED)
                .with_user(&user.id)
                .with_entity("AuthActionToken", None)
                .with_metadata("purpose=PasswordReset")
                .with_ip(client_ip(&headers)),
        )
        .await;

    Ok(Json(MessageResponse::new("Password reset successful.")))
}

/// POST /api/auth/request-change-password-link (authenticated)
///
/// Answers the uniform body even when the token's account has vanished
/// or been deactivated since the JWT was issued.
pub async fn request_change_password_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    AuthClaims(claims): AuthClaims,
) -> AppResult<Json<MessageResponse>> {
    let user_id = claims.user_id()?;
    let user = state
        .users
        .find_by_id(&user_id)
        .await?
        .filter(|u| u.is_active);
    let Some(user) = user else {
        return Ok(Json(MessageResponse::new(LINK_SENT_MESSAGE)));
    };

    let ip = client_ip(&headers);
    if let Some(issued) = state
        .magic_links
        .issue(
            &user.email,
            Some(user.id.clone()),
            TokenPurpose::ChangePassword,
            ip.clone(),
        )
        .await?
    {
        send_link_or_log(&state, &user.email, TokenPurpose::ChangePassword, &issued.secret)
            .await?;
    }

    state
        .record_audit(
            AuditEntry::new(events::MAGIC_LINK_REQUESTED)
                .with_user(&user.id)
                .with_entity("AuthActionToken", None)
                .with_metadata("purpose=ChangePassword")
                .with_ip(ip),
        )
        .await;

    Ok(Json(MessageResponse::new(LINK_SENT_MESSAGE)))
}

/// POST /api/auth/confirm-change-password-link (authenticated)
///
/// Requires the current password and consumes the token bound to the
/// calling user, so a leaked link alone is not enough to rotate a
/// password.
pub async fn confirm_change_password_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    AuthClaims(claims): AuthClaims,
    Json(request): Json<ConfirmChangePasswordLinkRequest>,
) -> AppResult<Json<MessageResponse>> {
    HashedPassword::validate_plain(&request.new_password)?;

    let user_id = claims.user_id()?;
    let user = state
        .users
        .find_by_id(&user_id)
        .await?
        .filter(|u| u.is_active);
    let Some(user) = user else {
        return Err(AppError::validation(INVALID_CREDENTIALS_MESSAGE));
    };

    if !user
        .password_hash
        .verify(&request.current_password)
        .unwrap_or(false)
    {
        return Err(AppError::validation(INVALID_CREDENTIALS_MESSAGE));
    }

    let outcome = state
        .magic_links
        .consume(&request.token, TokenPurpose::ChangePassword, Some(&user.id))
        .await?;

    if !outcome.success {
        state
            .record_audit(
                AuditEntry::new(events::MAGIC_LINK_CONSUME_FAILED)
                    .with_user(&user.id)
                    .with_entity("AuthActionToken", None)
                    .with_metadata("purpose=ChangePassword")
                    .with_ip(client_ip(&headers)),
            )
            .await;
        return Err(AppError::validation(INVALID_TOKEN_MESSAGE));
    }

    let password_hash = HashedPassword::from_plain(&request.new_password)?;
    state.users.update_password(&user.id, &password_hash).await?;
    info!(user_id = %user.id, "Password changed via magic link");

    state
        .record_audit(
            AuditEntry::new(events::PASSWORD_CHANGED)
                .with_user(&user.id)
                .with_entity("User", Some(user.id.to_string()))
                .with_metadata("purpose=ChangePassword")
                .with_ip(client_ip(&headers)),
        )
        .await;
    state
        .record_audit(
            AuditEntry::new(events::MAGIC_LINK_CONSUMED)
                .with_user(&user.id)
                .with_entity("AuthActionToken", None)
                .with_metadata("purpose=ChangePassword")
                .with_ip(client_ip(&headers)),
        )
        .await;

    Ok(Json(MessageResponse::new("Password updated.")))
}

/// Resolve the account a consume outcome points at: by user id when the
/// token carried one, otherwise by the token's email.
async fn resolve_user(
    state: &AppState,
    user_id: Option<&UserId>,
    email: Option<&str>,
) -> AppResult<Option<User>> {
    if let Some(id) = user_id {
        return state.users.find_by_id(id).await;
    }
    if let Some(email) = email {
        if !email.trim().is_empty() {
            return state.users.find_by_email(email).await;
        }
    }
    Ok(None)
}

/// Deliver a link. Configuration faults propagate; transport faults are
/// logged and swallowed so the response stays uniform.
async fn send_link_or_log(
    state: &AppState,
    to: &str,
    purpose: TokenPurpose,
    secret: &str,
) -> AppResult<()> {
    match state.mailer.send_link(to, purpose, secret).await {
        Ok(()) => Ok(()),
        Err(err @ AppError::Configuration(_)) => Err(err),
        Err(err) => {
            warn!(error = %err, %purpose, "Failed to send magic-link email");
            Ok(())
        }
    }
}
