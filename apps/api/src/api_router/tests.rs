use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tablegate_application::Clock;
use tablegate_domain::{AccessKey, AuditAction, CapabilityId, Principal, UserId};
use tablegate_infrastructure::InMemorySecurityStore;
use tower::ServiceExt;

use super::build_router;
use crate::api_config::{ApiConfig, LogFormat};
use crate::api_services::{SecurityPorts, build_app_state};

const ADMIN_KEY: &str = "admin-key";
const ANALYST_KEY: &str = "analyst-key";
const RETIRED_KEY: &str = "retired-key";

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

fn test_config() -> ApiConfig {
    ApiConfig {
        migrate_only: false,
        database_url: "postgres://unused".to_owned(),
        database_max_connections: 1,
        frontend_url: "http://localhost:3000".to_owned(),
        api_host: "127.0.0.1".to_owned(),
        api_port: 3001,
        sso_fallback_email_domain: "example.com".to_owned(),
        grant_lifetime_days: 183,
        log_format: LogFormat::Compact,
    }
}

fn access_key(value: &str) -> AccessKey {
    match AccessKey::new(value) {
        Ok(access_key) => access_key,
        Err(error) => panic!("invalid test access key {value}: {error}"),
    }
}

async fn spawn_app() -> (Router, Arc<InMemorySecurityStore>) {
    let store = Arc::new(InMemorySecurityStore::new());

    let admin = Principal::new(UserId::new(1), "root", "Ada", "Admin", true).with_roles(["Admin"]);
    let analyst =
        Principal::new(UserId::new(2), "analyst", "Ann", "Lyst", true).with_roles(["Gamma"]);
    let retired = Principal::new(UserId::new(3), "gone", "Old", "Timer", false);

    for principal in [admin, analyst, retired] {
        store.insert_principal(principal).await;
    }
    store
        .insert_access_key(UserId::new(1), access_key(ADMIN_KEY))
        .await;
    store
        .insert_access_key(UserId::new(2), access_key(ANALYST_KEY))
        .await;
    store
        .insert_access_key(UserId::new(3), access_key(RETIRED_KEY))
        .await;
    store
        .insert_table_capability(CapabilityId::new(11), "[warehouse].[orders](id:3)")
        .await;
    store
        .insert_table_capability(CapabilityId::new(12), "[warehouse].[customers](id:4)")
        .await;

    let now = match Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).single() {
        Some(now) => now,
        None => panic!("invalid fixed clock date"),
    };

    let ports = SecurityPorts {
        principals: store.clone(),
        access_keys: store.clone(),
        capabilities: store.clone(),
        grants: store.clone(),
        audit: store.clone(),
        audit_log: store.clone(),
    };
    let state = build_app_state(ports, Arc::new(FixedClock(now)), &test_config());

    match build_router(state, "http://localhost:3000") {
        Ok(router) => (router, store),
        Err(error) => panic!("failed to build router: {error}"),
    }
}

fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()));

    match request {
        Ok(request) => request,
        Err(error) => panic!("failed to build request: {error}"),
    }
}

fn bearer_request(method: Method, uri: &str, token: &str) -> Request<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty());

    match request {
        Ok(request) => request,
        Err(error) => panic!("failed to build request: {error}"),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = match app.clone().oneshot(request).await {
        Ok(response) => response,
        Err(error) => match error {},
    };

    let status = response.status();
    let bytes = match response.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(error) => panic!("failed to read response body: {error}"),
    };

    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_default()
    };

    (status, body)
}

#[tokio::test]
async fn health_is_public() {
    let (app, _) = spawn_app().await;

    let request = match Request::builder().uri("/health").body(Body::empty()) {
        Ok(request) => request,
        Err(error) => panic!("failed to build request: {error}"),
    };
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn gate_reads_the_key_from_the_json_body() {
    let (app, _) = spawn_app().await;

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/me",
            &json!({ "access_key": ANALYST_KEY }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "analyst");
    assert_eq!(body["display_name"], "Ann Lyst (analyst)");
    assert_eq!(body["is_admin"], false);
}

#[tokio::test]
async fn missing_key_is_rejected_and_audited() {
    let (app, store) = spawn_app().await;

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/api/v1/me", &json!({ "query": "select 1" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "unauthorized: Invalid access_key: None");

    let events = store.audit_events().await;
    let Some(event) = events.last() else {
        panic!("expected a rejection audit event");
    };
    assert_eq!(event.action, AuditAction::AccessKeyRejected);
    assert_eq!(event.actor_id, None);
    assert_eq!(event.payload["error_message"], "Invalid access_key: None");
    assert_eq!(event.payload["offending_request"]["query"], "select 1");
}

#[tokio::test]
async fn inactive_owner_is_rejected_with_its_id() {
    let (app, store) = spawn_app().await;

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/me",
            &json!({ "access_key": RETIRED_KEY }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let events = store.audit_events().await;
    assert!(
        events
            .last()
            .is_some_and(|event| event.actor_id == Some(UserId::new(3)))
    );
}

#[tokio::test]
async fn admin_routes_accept_bearer_keys_and_require_the_admin_role() {
    let (app, _) = spawn_app().await;

    let (status, body) = send(
        &app,
        bearer_request(Method::GET, "/api/admin/access-keys", ADMIN_KEY),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(3));

    let (status, body) = send(
        &app,
        bearer_request(Method::GET, "/api/admin/access-keys", ANALYST_KEY),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(
        body["message"]
            .as_str()
            .is_some_and(|message| message.contains("Permission denied"))
    );
}

#[tokio::test]
async fn rotated_key_replaces_the_old_one_immediately() {
    let (app, _) = spawn_app().await;

    let (status, body) = send(
        &app,
        json_request(
            Method::PUT,
            "/api/admin/access-keys/2",
            &json!({ "access_key": ADMIN_KEY, "new_access_key": "analyst-key-2" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["access_key"], "analyst-key-2");

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/me",
            &json!({ "access_key": ANALYST_KEY }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        bearer_request(Method::POST, "/api/v1/me", "analyst-key-2"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn gated_writes_accept_json_without_a_content_type() {
    let (app, store) = spawn_app().await;
    store
        .insert_principal(Principal::new(UserId::new(4), "newbie", "New", "Bie", true))
        .await;

    let issue = Request::builder()
        .method(Method::POST)
        .uri("/api/admin/access-keys")
        .body(Body::from(
            json!({ "access_key": ADMIN_KEY, "user_id": 4, "new_access_key": "newbie-key" })
                .to_string(),
        ));
    let issue = match issue {
        Ok(request) => request,
        Err(error) => panic!("failed to build request: {error}"),
    };

    let (status, body) = send(&app, issue).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user_id"], 4);
    assert_eq!(body["access_key"], "newbie-key");

    let (status, body) = send(
        &app,
        bearer_request(Method::POST, "/api/admin/access-keys", ADMIN_KEY),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["message"]
            .as_str()
            .is_some_and(|message| message.contains("invalid access key issue payload"))
    );
}

#[tokio::test]
async fn grant_lifecycle_over_http() {
    let (app, _) = spawn_app().await;

    let (status, grant) = send(
        &app,
        json_request(
            Method::POST,
            "/api/admin/permission-grants",
            &json!({ "access_key": ADMIN_KEY, "user_id": 2, "capability_ids": [11] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(grant["status"], "Active");
    assert_eq!(grant["expire_date"], "2024-07-02");
    assert_eq!(grant["exp_or_terminate_date"], "2024-07-02");
    let Some(grant_id) = grant["grant_id"].as_i64() else {
        panic!("grant response without id: {grant}");
    };
    let grant_uri = format!("/api/admin/permission-grants/{grant_id}");

    let (status, capabilities) = send(
        &app,
        bearer_request(Method::POST, "/api/v1/table-permissions", ANALYST_KEY),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(capabilities[0]["capability_id"], 11);

    let (status, _) = send(
        &app,
        bearer_request(Method::DELETE, grant_uri.as_str(), ADMIN_KEY),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        json_request(
            Method::PUT,
            grant_uri.as_str(),
            &json!({ "access_key": ADMIN_KEY, "force_revoke": false }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, revoked) = send(
        &app,
        json_request(
            Method::PUT,
            grant_uri.as_str(),
            &json!({ "access_key": ADMIN_KEY, "force_revoke": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(revoked["status"], "Force Revoked");
    assert_eq!(revoked["exp_or_terminate_date"], "2024-01-01 12:00:00 (forced)");

    let (status, capabilities) = send(
        &app,
        bearer_request(Method::POST, "/api/v1/table-permissions", ANALYST_KEY),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(capabilities, json!([]));

    let (status, _) = send(
        &app,
        bearer_request(Method::DELETE, grant_uri.as_str(), ADMIN_KEY),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        bearer_request(Method::GET, grant_uri.as_str(), ADMIN_KEY),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_dates_are_validation_errors() {
    let (app, _) = spawn_app().await;

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/admin/permission-grants",
            &json!({
                "access_key": ADMIN_KEY,
                "user_id": 2,
                "capability_ids": [11],
                "expire_date": "next summer",
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oauth_user_info_maps_provider_profiles() {
    let (app, _) = spawn_app().await;

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/auth/oauth/github_aics/user-info",
            &json!({ "login": "octo", "email": null }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "username": "github_octo", "email": "octo@example.com" })
    );

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/auth/oauth/gitlab/user-info",
            &json!({ "login": "octo" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
