//! 权限解析测试

use chrono::{Duration, TimeZone, Utc};
use erp_rbac::{
    catalog::PermissionCatalog,
    models::role::CreateRoleRequest,
    repository::{AssignmentStore, Grant, MemoryAssignmentStore},
    services::{PermissionResolver, SystemClock},
};
use std::sync::Arc;
use uuid::Uuid;

async fn seeded_store() -> Arc<MemoryAssignmentStore> {
    let store = Arc::new(MemoryAssignmentStore::new());
    store
        .upsert_permissions(&PermissionCatalog::builtin().unwrap().definitions())
        .await
        .unwrap();
    store
}

async fn role_with(store: &MemoryAssignmentStore, name: &str, level: i32, codes: &[&str]) -> Uuid {
    tenant_role_with(store, name, None, level, codes).await
}

async fn tenant_role_with(
    store: &MemoryAssignmentStore,
    name: &str,
    tenant_tag: Option<&str>,
    level: i32,
    codes: &[&str],
) -> Uuid {
    let now = Utc::now();
    let role = store
        .create_role(
            &CreateRoleRequest {
                name: name.to_string(),
                description: None,
                level,
                tenant_tag: tenant_tag.map(str::to_string),
                is_superadmin_granting: None,
            },
            now,
        )
        .await
        .unwrap();

    let mut ids = Vec::new();
    for code in codes {
        ids.push(store.find_permission_by_code(code).await.unwrap().unwrap().id);
    }
    store.set_role_permissions(role.id, &ids, None, now).await.unwrap();
    role.id
}

fn grant(user_id: Uuid, target_id: Uuid, expires_at: Option<chrono::DateTime<Utc>>) -> Grant {
    Grant {
        user_id,
        target_id,
        granted_by: None,
        expires_at,
        at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn test_unknown_user_resolves_to_empty_set() {
    let store = seeded_store().await;
    let resolver = PermissionResolver::new(store, Arc::new(SystemClock));

    let set = resolver.resolve(Uuid::new_v4()).await.unwrap();
    assert!(set.permissions.is_empty());
    assert!(set.roles.is_empty());
    assert_eq!(set.max_level, 0);
    assert!(!set.is_superadmin);
}

#[tokio::test]
async fn test_roles_are_ordered_by_level() {
    let store = seeded_store().await;
    let user = Uuid::new_v4();
    let clerk = role_with(&store, "Clerk", 10, &["finance.journal.read"]).await;
    let controller = role_with(&store, "Controller", 60, &["finance.journal.post"]).await;
    store.assign_role(grant(user, clerk, None)).await.unwrap();
    store.assign_role(grant(user, controller, None)).await.unwrap();

    let resolver = PermissionResolver::new(store, Arc::new(SystemClock));
    let set = resolver.resolve(user).await.unwrap();

    assert_eq!(set.roles, vec!["Controller".to_string(), "Clerk".to_string()]);
    assert_eq!(set.max_level, 60);
    assert!(set.has_all_permissions(&["finance.journal.read", "finance.journal.post"]));
}

#[tokio::test]
async fn test_resolution_honours_evaluation_instant() {
    let store = seeded_store().await;
    let user = Uuid::new_v4();
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let role = role_with(&store, "Contractor", 5, &["inventory.stock.read"]).await;
    store
        .assign_role(grant(user, role, Some(start + Duration::days(30))))
        .await
        .unwrap();

    let resolver = PermissionResolver::new(store, Arc::new(SystemClock));

    let during = resolver.resolve_at(user, start + Duration::days(1)).await.unwrap();
    assert!(during.has_permission("inventory.stock.read"));

    let after = resolver.resolve_at(user, start + Duration::days(31)).await.unwrap();
    assert!(!after.has_permission("inventory.stock.read"));
    assert!(after.roles.is_empty());
}

#[tokio::test]
async fn test_inactive_role_contributes_nothing() {
    let store = seeded_store().await;
    let user = Uuid::new_v4();
    let role = role_with(&store, "Retired", 50, &["hr.employee.read"]).await;
    store.assign_role(grant(user, role, None)).await.unwrap();

    store
        .update_role(
            role,
            &erp_rbac::models::role::UpdateRoleRequest {
                is_active: Some(false),
                ..Default::default()
            },
            Utc::now(),
        )
        .await
        .unwrap();

    let resolver = PermissionResolver::new(store, Arc::new(SystemClock));
    let set = resolver.resolve(user).await.unwrap();
    assert!(set.permissions.is_empty());
    assert_eq!(set.max_level, 0);
}

#[tokio::test]
async fn test_store_failure_carries_empty_fallback() {
    let store = seeded_store().await;
    store.set_unavailable(true);
    let user = Uuid::new_v4();

    let resolver = PermissionResolver::new(store, Arc::new(SystemClock));
    let err = resolver.resolve(user).await.unwrap_err();

    assert_eq!(err.fallback.user_id, user);
    assert!(err.fallback.permissions.is_empty());
    assert!(!err.fallback.is_superadmin);
}

#[tokio::test]
async fn test_repeated_resolution_is_byte_identical() {
    let store = seeded_store().await;
    let user = Uuid::new_v4();
    let north =
        tenant_role_with(&store, "Buyer", Some("north"), 30, &["procurement.purchase_order.read"]).await;
    let south =
        tenant_role_with(&store, "Buyer", Some("south"), 30, &["inventory.stock.read"]).await;
    store.assign_role(grant(user, south, None)).await.unwrap();
    store.assign_role(grant(user, north, None)).await.unwrap();

    let at = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
    let resolver = PermissionResolver::new(store.clone(), Arc::new(SystemClock));
    let first = resolver.resolve_at(user, at).await.unwrap();
    let second = resolver.resolve_at(user, at).await.unwrap();

    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
    assert_eq!(first.roles, vec!["Buyer".to_string(), "Buyer".to_string()]);

    // 同名同级的角色按 ID 排序
    let held = store.held_roles(user, at).await.unwrap();
    assert!(held[0].role_id < held[1].role_id);
}
