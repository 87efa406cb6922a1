//! Authentication middleware and the route-level permission gate.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use finrecon_auth_core::Claims;
use finrecon_common::UserId;
use finrecon_errors::{AppError, AppResult};
use tracing::{debug, warn};

use super::state::AppState;
use crate::application::permissions::PermissionResolver;

const UNAUTHORIZED_MESSAGE: &str = "Invalid or missing bearer token.";
const FORBIDDEN_MESSAGE: &str = "Access denied.";

/// Validates the bearer token and stores the claims plus a fresh
/// permission resolver in the request extensions. The resolver lives
/// for this request only, so grant changes apply on the next one.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let Some(token) = header_value.and_then(|h| h.strip_prefix("Bearer ")) else {
        return Err(AppError::unauthorized(UNAUTHORIZED_MESSAGE));
    };

    match state.token_service.validate_token(token) {
        Ok(claims) => {
            debug!(user_id = %claims.sub, "Bearer token validated");
            let resolver = Arc::new(PermissionResolver::new(state.rbac.clone()));
            request.extensions_mut().insert(claims);
            request.extensions_mut().insert(resolver);
            Ok(next.run(request).await)
        }
        Err(err) => {
            warn!(error = %err, "Bearer token validation failed");
            Err(AppError::unauthorized(UNAUTHORIZED_MESSAGE))
        }
    }
}

/// Extractor for the authenticated claims placed by `auth_middleware`.
pub struct AuthClaims(pub Claims);

impl<S> FromRequestParts<S> for AuthClaims
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(AuthClaims)
            .ok_or_else(|| AppError::unauthorized(UNAUTHORIZED_MESSAGE))
    }
}

/// Route-level permission gate, layered inside `auth_middleware`.
///
/// Denies with 401 when no claims are present, 403 when the user is
/// missing or deactivated, and 403 when neither the code nor one of its
/// alias targets is granted.
///
/// Attach with a closure so the required code rides along:
///
/// ```ignore
/// .route_layer(middleware::from_fn(move |req, next| {
///     require_permission(state.clone(), "ADMIN.USERS.MANAGE", req, next)
/// }))
/// ```
pub async fn require_permission(
    state: AppState,
    permission: &'static str,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(claims) = request.extensions().get::<Claims>().cloned() else {
        return Err(AppError::unauthorized(UNAUTHORIZED_MESSAGE));
    };
    let Some(resolver) = request
        .extensions()
        .get::<Arc<PermissionResolver>>()
        .cloned()
    else {
        return Err(AppError::unauthorized(UNAUTHORIZED_MESSAGE));
    };

    let user_id = claims.user_id()?;
    verify_permission(&state, &resolver, &user_id, permission).await?;
    Ok(next.run(request).await)
}

async fn verify_permission(
    state: &AppState,
    resolver: &PermissionResolver,
    user_id: &UserId,
    permission: &str,
) -> AppResult<()> {
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::forbidden(FORBIDDEN_MESSAGE))?;
    if !user.is_active {
        warn!(%user_id, "Permission check for deactivated user");
        return Err(AppError::forbidden(FORBIDDEN_MESSAGE));
    }

    if !resolver.has_permission(user_id, permission).await? {
        warn!(%user_id, permission, "Permission denied");
        return Err(AppError::forbidden(FORBIDDEN_MESSAGE));
    }

    Ok(())
}
