//! Permission resolver: answers "can principal P do action A on resource R".
//!
//! Lookups are backed by the cache layer so role/permission data is not
//! re-queried on every request. Fail-closed: an unknown principal, a
//! principal without a role, or no matching active grant all resolve to
//! `false`. The resolver never self-invalidates ahead of the TTL; a revoked
//! permission can remain effective for up to one TTL window unless the
//! mutation path evicts explicitly.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{cache_key, TtlCache};
use crate::db::Repository;
use crate::errors::AppError;
use crate::models::Permission;

const GRANTS_PREFIX: &str = "authz:grants";

/// RBAC resolver over cached grant sets.
#[derive(Clone)]
pub struct PermissionResolver {
    repo: Arc<Repository>,
    cache: Arc<TtlCache>,
    ttl: Duration,
}

impl PermissionResolver {
    pub fn new(repo: Arc<Repository>, cache: Arc<TtlCache>, ttl: Duration) -> Self {
        Self { repo, cache, ttl }
    }

    /// Check a single (resource, action) pair for a principal.
    pub async fn authorize(
        &self,
        principal_id: &str,
        resource: &str,
        action: &str,
    ) -> Result<bool, AppError> {
        let grants = self.cached_grants(principal_id).await?;
        Ok(grant_matches(&grants, resource, action))
    }

    /// Batch variant: one grant lookup for N checks.
    pub async fn authorize_all(
        &self,
        principal_id: &str,
        pairs: &[(String, String)],
    ) -> Result<Vec<bool>, AppError> {
        let grants = self.cached_grants(principal_id).await?;
        Ok(pairs
            .iter()
            .map(|(resource, action)| grant_matches(&grants, resource, action))
            .collect())
    }

    /// Whether the principal holds an elevated role (Administrator or
    /// Manager). Used for assignee-or-elevated checks.
    pub async fn is_elevated(&self, principal_id: &str) -> Result<bool, AppError> {
        let role = self.repo.role_of_employee(principal_id).await?;
        Ok(role.map(|r| r.kind.is_elevated()).unwrap_or(false))
    }

    /// Drop one principal's cached grants.
    pub fn evict_principal(&self, principal_id: &str) {
        self.cache.delete(&grants_key(principal_id));
    }

    /// Drop all cached grants. Role and permission mutations affect an
    /// unbounded set of principals, so they evict the whole prefix.
    pub fn evict_all(&self) -> usize {
        self.cache.invalidate_by_prefix(GRANTS_PREFIX, None)
    }

    async fn cached_grants(&self, principal_id: &str) -> Result<Vec<Permission>, AppError> {
        let key = grants_key(principal_id);

        if let Some(value) = self.cache.get(&key) {
            return Ok(serde_json::from_value(value)?);
        }

        let grants = self.repo.permissions_for_employee(principal_id).await?;
        self.cache
            .set(&key, serde_json::to_value(&grants)?, self.ttl);
        Ok(grants)
    }
}

fn grants_key(principal_id: &str) -> String {
    cache_key(GRANTS_PREFIX, &[("employeeId", principal_id)])
}

fn grant_matches(grants: &[Permission], resource: &str, action: &str) -> bool {
    grants
        .iter()
        .any(|p| p.active && p.resource == resource && p.action == action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use crate::models::{
        CreateEmployeeRequest, CreatePermissionRequest, CreateRoleRequest, RoleKind,
    };
    use tempfile::TempDir;

    async fn fixture() -> (TempDir, Arc<Repository>, PermissionResolver) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .unwrap();
        let repo = Arc::new(Repository::new(pool));
        let cache = Arc::new(TtlCache::new(64));
        let resolver = PermissionResolver::new(repo.clone(), cache, Duration::from_secs(300));
        (temp_dir, repo, resolver)
    }

    async fn seed_employee(
        repo: &Repository,
        role_id: Option<String>,
    ) -> String {
        repo.create_employee(&CreateEmployeeRequest {
            company_id: "T1".to_string(),
            name: "Test".to_string(),
            email: None,
            department_id: None,
            role_id,
            manager_id: None,
            auto_assign_enabled: true,
        })
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn test_unknown_principal_is_denied() {
        let (_tmp, _repo, resolver) = fixture().await;
        assert!(!resolver.authorize("ghost", "lead", "UPDATE").await.unwrap());
    }

    #[tokio::test]
    async fn test_principal_without_role_is_denied() {
        let (_tmp, repo, resolver) = fixture().await;
        let id = seed_employee(&repo, None).await;
        assert!(!resolver.authorize(&id, "lead", "UPDATE").await.unwrap());
    }

    #[tokio::test]
    async fn test_exact_pair_required() {
        let (_tmp, repo, resolver) = fixture().await;
        let role = repo
            .create_role(&CreateRoleRequest {
                company_id: "T1".to_string(),
                name: "Sales".to_string(),
                kind: RoleKind::Employee,
            })
            .await
            .unwrap();
        let perm = repo
            .create_permission(&CreatePermissionRequest {
                company_id: "T1".to_string(),
                resource: "lead".to_string(),
                action: "READ".to_string(),
                active: true,
            })
            .await
            .unwrap();
        repo.grant_permission(&role.id, &perm.id).await.unwrap();
        let id = seed_employee(&repo, Some(role.id)).await;

        assert!(resolver.authorize(&id, "lead", "READ").await.unwrap());
        // A similarly-named permission for a different action does not match
        assert!(!resolver.authorize(&id, "lead", "UPDATE").await.unwrap());
        assert!(!resolver.authorize(&id, "leads", "READ").await.unwrap());
    }

    #[tokio::test]
    async fn test_inactive_grant_is_denied() {
        let (_tmp, repo, resolver) = fixture().await;
        let role = repo
            .create_role(&CreateRoleRequest {
                company_id: "T1".to_string(),
                name: "Sales".to_string(),
                kind: RoleKind::Employee,
            })
            .await
            .unwrap();
        let perm = repo
            .create_permission(&CreatePermissionRequest {
                company_id: "T1".to_string(),
                resource: "lead".to_string(),
                action: "UPDATE".to_string(),
                active: false,
            })
            .await
            .unwrap();
        repo.grant_permission(&role.id, &perm.id).await.unwrap();
        let id = seed_employee(&repo, Some(role.id)).await;

        assert!(!resolver.authorize(&id, "lead", "UPDATE").await.unwrap());
    }

    #[tokio::test]
    async fn test_revocation_visible_after_explicit_eviction() {
        let (_tmp, repo, resolver) = fixture().await;
        let role = repo
            .create_role(&CreateRoleRequest {
                company_id: "T1".to_string(),
                name: "Sales".to_string(),
                kind: RoleKind::Employee,
            })
            .await
            .unwrap();
        let id = seed_employee(&repo, Some(role.id.clone())).await;

        // Denied and cached as denied
        assert!(!resolver.authorize(&id, "lead", "UPDATE").await.unwrap());

        let perm = repo
            .create_permission(&CreatePermissionRequest {
                company_id: "T1".to_string(),
                resource: "lead".to_string(),
                action: "UPDATE".to_string(),
                active: true,
            })
            .await
            .unwrap();
        repo.grant_permission(&role.id, &perm.id).await.unwrap();

        // Stale cache entry still answers until evicted
        assert!(!resolver.authorize(&id, "lead", "UPDATE").await.unwrap());
        resolver.evict_principal(&id);
        assert!(resolver.authorize(&id, "lead", "UPDATE").await.unwrap());
    }

    #[tokio::test]
    async fn test_authorize_all_batches() {
        let (_tmp, repo, resolver) = fixture().await;
        let role = repo
            .create_role(&CreateRoleRequest {
                company_id: "T1".to_string(),
                name: "Manager".to_string(),
                kind: RoleKind::Manager,
            })
            .await
            .unwrap();
        let perm = repo
            .create_permission(&CreatePermissionRequest {
                company_id: "T1".to_string(),
                resource: "lead".to_string(),
                action: "UPDATE".to_string(),
                active: true,
            })
            .await
            .unwrap();
        repo.grant_permission(&role.id, &perm.id).await.unwrap();
        let id = seed_employee(&repo, Some(role.id)).await;

        let results = resolver
            .authorize_all(
                &id,
                &[
                    ("lead".to_string(), "UPDATE".to_string()),
                    ("lead".to_string(), "DELETE".to_string()),
                ],
            )
            .await
            .unwrap();
        assert_eq!(results, vec![true, false]);
        assert!(resolver.is_elevated(&id).await.unwrap());
    }
}
