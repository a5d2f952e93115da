//! HTTP 集成测试

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

mod common;
use common::TestContext;

fn app(ctx: &TestContext) -> Router {
    erp_rbac::routes::create_router(ctx.app_state())
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn send_json(method: &str, uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let ctx = TestContext::new().await;

    let response = app(&ctx).oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let ctx = TestContext::new().await;

    let response = app(&ctx)
        .oneshot(get("/api/v1/rbac/roles", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app(&ctx)
        .oneshot(get("/api/v1/rbac/roles", Some("not.a.token")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_without_module_access_gets_required_module() {
    let ctx = TestContext::new().await;
    let token = ctx.token(Uuid::new_v4());

    let response = app(&ctx)
        .oneshot(get("/api/v1/rbac/roles", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], 403);
    assert_eq!(json["error"]["required"], json!({"type": "module", "value": "rbac"}));
}

#[tokio::test]
async fn test_route_guard_names_the_missing_permission() {
    let ctx = TestContext::new().await;
    let user = Uuid::new_v4();
    let viewer = ctx.create_role("RBAC Viewer", 10, &["rbac.role.read"]).await;
    ctx.assign(user, viewer).await;
    let token = ctx.token(user);

    let response = app(&ctx)
        .oneshot(get("/api/v1/rbac/roles", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app(&ctx)
        .oneshot(send_json(
            "POST",
            "/api/v1/rbac/roles",
            &token,
            json!({"name": "Sneaky", "level": 10}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let json = body_json(response).await;
    assert_eq!(
        json["error"]["required"],
        json!({"type": "permission", "value": "rbac.role.create"})
    );
    // 拒绝响应不泄露用户已有的权限
    assert!(!json.to_string().contains("rbac.role.read"));
}

#[tokio::test]
async fn test_admin_creates_role_and_assigns_it() {
    let ctx = TestContext::new().await;
    let token = ctx.token(ctx.admin_id);
    let user = Uuid::new_v4();

    let response = app(&ctx)
        .oneshot(send_json(
            "POST",
            "/api/v1/rbac/roles",
            &token,
            json!({"name": "Payroll Officer", "level": 30, "description": "Runs payroll"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let role = body_json(response).await;
    let role_id = role["id"].as_str().unwrap().to_string();

    let process = ctx.permission_id("hr.payroll.process").await;
    let response = app(&ctx)
        .oneshot(send_json(
            "PUT",
            &format!("/api/v1/rbac/roles/{}/permissions", role_id),
            &token,
            json!({"permission_ids": [process]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["count"], 1);

    let response = app(&ctx)
        .oneshot(send_json(
            "POST",
            &format!("/api/v1/rbac/users/{}/roles", user),
            &token,
            json!({"role_id": role_id}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["changed"], true);

    // 新用户立即获得权限
    let response = app(&ctx)
        .oneshot(get("/api/v1/me/permissions", Some(&ctx.token(user))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["permissions"], json!(["hr.payroll.process"]));
    assert_eq!(json["roles"], json!(["Payroll Officer"]));
    assert_eq!(json["modules"], json!(["hr"]));
}

#[tokio::test]
async fn test_delete_system_role_is_forbidden() {
    let ctx = TestContext::new().await;
    let token = ctx.token(ctx.admin_id);

    let request = Request::builder()
        .method("DELETE")
        .uri(format!(
            "/api/v1/rbac/roles/{}",
            erp_rbac::models::role::SUPERADMIN_ROLE_ID
        ))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app(&ctx).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert!(json["error"]["required"].is_null());
}

#[tokio::test]
async fn test_unknown_query_key_is_rejected() {
    let ctx = TestContext::new().await;
    let token = ctx.token(ctx.admin_id);

    let response = app(&ctx)
        .oneshot(get("/api/v1/rbac/permissions?module=finance", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["count"].as_u64().unwrap() > 0);

    let response = app(&ctx)
        .oneshot(get("/api/v1/rbac/audit?sort=asc", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_audit_log_lists_admin_actions() {
    let ctx = TestContext::new().await;
    let token = ctx.token(ctx.admin_id);

    let response = app(&ctx)
        .oneshot(get(
            "/api/v1/rbac/audit?action=role_created&limit=5",
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["limit"], 5);
    let entries = json["entries"].as_array().unwrap();
    assert!(!entries.is_empty());
    assert!(entries.iter().all(|e| e["action"] == "role_created"));
}

#[tokio::test]
async fn test_store_outage_denies_instead_of_failing_open() {
    let ctx = TestContext::new().await;
    let token = ctx.token(ctx.admin_id);
    ctx.service.invalidate_all_permissions().await;
    ctx.store.set_unavailable(true);

    let response = app(&ctx)
        .oneshot(get("/api/v1/rbac/roles", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
