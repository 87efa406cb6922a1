//! Permission resolver.
//!
//! One resolver is built per request and memoizes lookups for its
//! lifetime only. Role or grant changes are therefore visible on the
//! very next request without any invalidation machinery.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use finrecon_common::UserId;
use finrecon_errors::AppResult;
use tokio::sync::Mutex;

use crate::domain::rbac::RbacRepository;

/// Legacy permission codes mapped onto their canonical equivalents.
/// A requirement on the left passes when the user holds any code on
/// the right.
const PERMISSION_ALIASES: &[(&str, &[&str])] = &[
    ("ROLE_MANAGEMENT", &["ADMIN.ROLES.MANAGE"]),
    ("PERMISSION_MANAGEMENT", &["ADMIN.PERMISSIONS.MANAGE"]),
    ("USER_MANAGEMENT", &["ADMIN.USERS.MANAGE"]),
    ("ADMIN_DASHBOARD", &["ADMIN.DASHBOARD.VIEW"]),
];

fn alias_targets(code: &str) -> Option<&'static [&'static str]> {
    PERMISSION_ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(code))
        .map(|(_, targets)| *targets)
}

pub struct PermissionResolver {
    rbac: Arc<dyn RbacRepository>,
    permission_cache: Mutex<HashMap<UserId, Arc<HashSet<String>>>>,
    role_cache: Mutex<HashMap<UserId, Arc<Vec<String>>>>,
}

impl PermissionResolver {
    pub fn new(rbac: Arc<dyn RbacRepository>) -> Self {
        Self {
            rbac,
            permission_cache: Mutex::new(HashMap::new()),
            role_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Effective permission codes, uppercased so membership checks are
    /// case-insensitive.
    pub async fn permissions_for_user(&self, user_id: &UserId) -> AppResult<Arc<HashSet<String>>> {
        {
            let cache = self.permission_cache.lock().await;
            if let Some(cached) = cache.get(user_id) {
                return Ok(cached.clone());
            }
        }

        let codes = self.rbac.permission_codes_for_user(user_id).await?;
        let set: Arc<HashSet<String>> =
            Arc::new(codes.into_iter().map(|c| c.to_ascii_uppercase()).collect());

        self.permission_cache
            .lock()
            .await
            .insert(user_id.clone(), set.clone());
        Ok(set)
    }

    pub async fn roles_for_user(&self, user_id: &UserId) -> AppResult<Arc<Vec<String>>> {
        {
            let cache = self.role_cache.lock().await;
            if let Some(cached) = cache.get(user_id) {
                return Ok(cached.clone());
            }
        }

        let roles = Arc::new(self.rbac.role_codes_for_user(user_id).await?);
        self.role_cache
            .lock()
            .await
            .insert(user_id.clone(), roles.clone());
        Ok(roles)
    }

    /// Exact match first, then the alias table. Unknown codes deny.
    pub async fn has_permission(&self, user_id: &UserId, code: &str) -> AppResult<bool> {
        let permissions = self.permissions_for_user(user_id).await?;
        let canonical = code.to_ascii_uppercase();

        if permissions.contains(&canonical) {
            return Ok(true);
        }

        if let Some(targets) = alias_targets(&canonical) {
            return Ok(targets.iter().any(|t| permissions.contains(*t)));
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::InMemoryRbacRepository;

    fn resolver(rbac: Arc<InMemoryRbacRepository>) -> PermissionResolver {
        PermissionResolver::new(rbac)
    }

    #[tokio::test]
    async fn test_aggregates_and_dedups_case_insensitively() {
        let rbac = Arc::new(InMemoryRbacRepository::new());
        let user_id = UserId::new();
        rbac.set_user(
            &user_id,
            vec!["ADMIN"],
            vec!["admin.users.manage", "ADMIN.USERS.MANAGE", "MATCHER.VIEW"],
        );

        let r = resolver(rbac);
        let permissions = r.permissions_for_user(&user_id).await.unwrap();
        assert_eq!(permissions.len(), 2);
        assert!(permissions.contains("ADMIN.USERS.MANAGE"));
        assert!(permissions.contains("MATCHER.VIEW"));
    }

    #[tokio::test]
    async fn test_lookups_are_memoized_per_resolver() {
        let rbac = Arc::new(InMemoryRbacRepository::new());
        let user_id = UserId::new();
        rbac.set_user(&user_id, vec!["USER"], vec!["BASIC_ACCESS"]);

        let r = resolver(rbac.clone());
        assert!(r.has_permission(&user_id, "BASIC_ACCESS").await.unwrap());
        assert!(r.has_permission(&user_id, "BASIC_ACCESS").await.unwrap());
        r.permissions_for_user(&user_id).await.unwrap();
        assert_eq!(rbac.permission_calls(), 1);
    }

    #[tokio::test]
    async fn test_fresh_resolver_sees_revocation() {
        let rbac = Arc::new(InMemoryRbacRepository::new());
        let user_id = UserId::new();
        rbac.set_user(&user_id, vec!["ADMIN"], vec!["ADMIN.USERS.MANAGE"]);

        let first = resolver(rbac.clone());
        assert!(
            first
                .has_permission(&user_id, "ADMIN.USERS.MANAGE")
                .await
                .unwrap()
        );

        rbac.clear_user(&user_id);

        // The old resolver still answers from its snapshot.
        assert!(
            first
                .has_permission(&user_id, "ADMIN.USERS.MANAGE")
                .await
                .unwrap()
        );

        // A new resolver, as built for the next request, sees the change.
        let second = resolver(rbac);
        assert!(
            !second
                .has_permission(&user_id, "ADMIN.USERS.MANAGE")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_alias_grants_access() {
        let rbac = Arc::new(InMemoryRbacRepository::new());
        let user_id = UserId::new();
        rbac.set_user(&user_id, vec!["ADMIN"], vec!["ADMIN.ROLES.MANAGE"]);

        let r = resolver(rbac);
        assert!(r.has_permission(&user_id, "ROLE_MANAGEMENT").await.unwrap());
        assert!(r.has_permission(&user_id, "role_management").await.unwrap());
        assert!(!r.has_permission(&user_id, "USER_MANAGEMENT").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_code_denies() {
        let rbac = Arc::new(InMemoryRbacRepository::new());
        let user_id = UserId::new();
        rbac.set_user(&user_id, vec!["USER"], vec!["BASIC_ACCESS"]);

        let r = resolver(rbac);
        assert!(!r.has_permission(&user_id, "NO.SUCH.CODE").await.unwrap());
    }

    #[tokio::test]
    async fn test_user_without_grants_denies() {
        let rbac = Arc::new(InMemoryRbacRepository::new());
        let r = resolver(rbac);
        assert!(
            !r.has_permission(&UserId::new(), "BASIC_ACCESS")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_roles_come_back_as_stored() {
        let rbac = Arc::new(InMemoryRbacRepository::new());
        let user_id = UserId::new();
        rbac.set_user(&user_id, vec!["ADMIN", "USER"], vec![]);

        let r = resolver(rbac);
        let roles = r.roles_for_user(&user_id).await.unwrap();
        assert_eq!(roles.as_ref(), &vec!["ADMIN".to_string(), "USER".to_string()]);
    }
}
