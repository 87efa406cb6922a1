//! Current-user profile endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::{Extension, Json};
use finrecon_errors::{AppError, AppResult};
use serde::Serialize;

use super::middleware::AuthClaims;
use super::state::AppState;
use crate::application::permissions::PermissionResolver;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

/// GET /api/me
///
/// Roles and permissions come from the request-scoped resolver, so the
/// payload reflects grants as of this request. Permissions are sorted
/// for a stable payload; role order carries no meaning.
pub async fn me(
    State(state): State<AppState>,
    Extension(resolver): Extension<Arc<PermissionResolver>>,
    AuthClaims(claims): AuthClaims,
) -> AppResult<Json<MeResponse>> {
    let user_id = claims.user_id()?;

    let Some(user) = state.users.find_by_id(&user_id).await? else {
        return Err(AppError::not_found("User not found."));
    };
    if !user.is_active {
        return Err(AppError::forbidden("Access denied."));
    }

    let roles = resolver.roles_for_user(&user_id).await?;
    let permission_set = resolver.permissions_for_user(&user_id).await?;
    let mut permissions: Vec<String> = permission_set.iter().cloned().collect();
    permissions.sort();

    Ok(Json(MeResponse {
        user_id: user.id.to_string(),
        email: user.email.clone(),
        display_name: user.display_or_full_name(),
        roles: roles.as_ref().clone(),
        permissions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::api_routes;
    use crate::test_support::{TestContext, get_authed, response_json};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_me_returns_profile_with_sorted_permissions() {
        let ctx = TestContext::new();
        let user = ctx.seed_user("me@example.com", "Password123!");
        ctx.rbac.set_user(
            &user.id,
            vec!["ADMIN"],
            vec!["MATCHER.VIEW", "ADMIN.USERS.MANAGE", "BASIC_ACCESS"],
        );
        let bearer = ctx.bearer_for(&user);

        let response = api_routes(ctx.state.clone())
            .oneshot(get_authed("/api/me", &bearer))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;

        assert_eq!(body["userId"], user.id.to_string());
        assert_eq!(body["email"], "me@example.com");
        assert_eq!(body["displayName"], "Test User");
        assert_eq!(body["roles"], serde_json::json!(["ADMIN"]));
        assert_eq!(
            body["permissions"],
            serde_json::json!(["ADMIN.USERS.MANAGE", "BASIC_ACCESS", "MATCHER.VIEW"])
        );
    }

    #[tokio::test]
    async fn test_me_falls_back_to_full_name() {
        use crate::domain::user::User;
        use crate::domain::value_objects::{Email, HashedPassword};

        let ctx = TestContext::new();
        let mut user = User::new(
            Email::new("me@example.com").unwrap(),
            "Test".to_string(),
            "User".to_string(),
            HashedPassword::from_plain("Password123!").unwrap(),
        );
        user.display_name = None;
        ctx.users.seed(user.clone());
        let bearer = ctx.bearer_for(&user);

        let response = api_routes(ctx.state.clone())
            .oneshot(get_authed("/api/me", &bearer))
            .await
            .unwrap();
        let body = response_json(response).await;
        assert_eq!(body["displayName"], "Test User");
    }

    #[tokio::test]
    async fn test_me_without_token_is_unauthorized() {
        let ctx = TestContext::new();
        let response = api_routes(ctx.state.clone())
            .oneshot(Request::builder().uri("/api/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_me_for_vanished_user_is_not_found() {
        let ctx = TestContext::new();
        let user = ctx.seed_user("me@example.com", "Password123!");
        let bearer = ctx.bearer_for(&user);

        // A fresh context has no users but shares the signing key, so the
        // bearer stays valid while the account is gone.
        let fresh = TestContext::new();
        let response = api_routes(fresh.state.clone())
            .oneshot(get_authed("/api/me", &bearer))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_me_for_deactivated_user_is_forbidden() {
        let ctx = TestContext::new();
        let user = ctx.seed_user("me@example.com", "Password123!");
        ctx.users.set_active(&user.id, false);
        let bearer = ctx.bearer_for(&user);

        let response = api_routes(ctx.state.clone())
            .oneshot(get_authed("/api/me", &bearer))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_role_changes_apply_on_the_next_request() {
        let ctx = TestContext::new();
        let user = ctx.seed_user("me@example.com", "Password123!");
        ctx.rbac
            .set_user(&user.id, vec!["ADMIN"], vec!["ADMIN.USERS.MANAGE"]);
        let bearer = ctx.bearer_for(&user);

        let before = api_routes(ctx.state.clone())
            .oneshot(get_authed("/api/me", &bearer))
            .await
            .unwrap();
        let before_body = response_json(before).await;
        assert_eq!(before_body["roles"], serde_json::json!(["ADMIN"]));

        ctx.rbac.clear_user(&user.id);

        let after = api_routes(ctx.state.clone())
            .oneshot(get_authed("/api/me", &bearer))
            .await
            .unwrap();
        let after_body = response_json(after).await;
        assert_eq!(after_body["roles"], serde_json::json!([]));
        assert_eq!(after_body["permissions"], serde_json::json!([]));
    }
}
