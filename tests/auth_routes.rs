use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use httpmock::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use zoho_crm_integration::config::{ProbeSettings, ServerSettings, Settings, ZohoSettings};
use zoho_crm_integration::{create_app, AppState};
use zoho_crm_oauth::settings::keys;
use zoho_crm_oauth::{ClientCredentials, MemorySettings, SettingsStore, ZohoDomain, ZohoEndpoints};

fn settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        zoho: ZohoSettings {
            settings_file: "unused.yml".into(),
            catalog_path: None,
            redirect_uri: "http://localhost:8080/auth/zoho/callback".to_string(),
            probe: ProbeSettings::default(),
            widened_groups: None,
        },
    }
}

fn configured_store() -> Arc<dyn SettingsStore> {
    let store: Arc<dyn SettingsStore> = Arc::new(MemorySettings::new());
    ClientCredentials::new("id1", "sec1", "admin@example.com", ZohoDomain::Com, "ignored")
        .save_to(store.as_ref())
        .unwrap();
    store
}

fn app_for(server: &MockServer, store: Arc<dyn SettingsStore>) -> Router {
    let endpoints = ZohoEndpoints::custom(server.base_url(), server.base_url());
    let state = AppState::build(settings(), store, Some(endpoints)).unwrap();
    create_app(Arc::new(state))
}

async fn send(app: &Router, method: Method, uri: &str) -> (StatusCode, axum::http::HeaderMap, Value) {
    let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

#[tokio::test]
async fn test_health() {
    let server = MockServer::start_async().await;
    let app = app_for(&server, configured_store());

    let (status, _, body) = send(&app, Method::GET, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_consent_redirect_without_client_id_is_400() {
    let server = MockServer::start_async().await;
    let app = app_for(&server, Arc::new(MemorySettings::new()));

    let (status, _, body) = send(&app, Method::GET, "/auth/zoho").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_consent_redirect_uses_saved_flags() {
    let server = MockServer::start_async().await;
    let store = configured_store();
    store.set_bool(&keys::capability("users", "all"), true).unwrap();
    let app = app_for(&server, store);

    let (status, headers, _) = send(&app, Method::GET, "/auth/zoho").await;
    assert_eq!(status, StatusCode::SEE_OTHER);

    let location = headers[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with(&format!("{}/oauth/v2/auth?prompt=consent&scope=", server.base_url())));
    assert!(location.contains("scope=ZohoCRM.aaaserver.profile.read%2CZohoCRM.users.ALL&client_id=id1"));
    assert!(location.contains("access_type=offline"));
}

#[tokio::test]
async fn test_callback_exchanges_once() {
    let server = MockServer::start_async().await;
    let token = server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/v2/token").body_contains("code=grant-1");
            then.status(200).json_body(json!({
                "access_token": "1000.access",
                "refresh_token": "1000.refresh",
                "expires_in": 3600
            }));
        })
        .await;

    let store = configured_store();
    let app = app_for(&server, store.clone());

    let (status, _, body) = send(&app, Method::GET, "/auth/zoho/callback?code=grant-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authorized"], true);
    assert_eq!(body["authorization"], "authorized");
    assert_eq!(store.get_string(keys::REFRESH_TOKEN).as_deref(), Some("1000.refresh"));

    let (status, _, _) = send(&app, Method::GET, "/auth/zoho/callback?code=grant-1").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(store.get_string(keys::REFRESH_TOKEN).as_deref(), Some("1000.refresh"));

    token.assert_async().await;
}

#[tokio::test]
async fn test_callback_error_param_is_400() {
    let server = MockServer::start_async().await;
    let app = app_for(&server, configured_store());

    let (status, _, body) = send(&app, Method::GET, "/auth/zoho/callback?error=access_denied").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("access_denied"));
}

#[tokio::test]
async fn test_callback_provider_rejection_keeps_token() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/v2/token");
            then.status(200).json_body(json!({ "error": "invalid_code" }));
        })
        .await;

    let store = configured_store();
    store.set_string(keys::REFRESH_TOKEN, "good").unwrap();
    let app = app_for(&server, store.clone());

    let (status, _, _) = send(&app, Method::GET, "/auth/zoho/callback?code=consumed").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(store.get_string(keys::REFRESH_TOKEN).as_deref(), Some("good"));
}

#[tokio::test]
async fn test_callback_transport_failure_is_502() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/v2/token");
            then.status(503).body("unavailable");
        })
        .await;

    let store = configured_store();
    let app = app_for(&server, store.clone());

    let (status, _, _) = send(&app, Method::GET, "/auth/zoho/callback?code=fresh").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(store.get_string(keys::REFRESH_TOKEN), None);
}

#[tokio::test]
async fn test_revoke_clears_token_on_200() {
    let server = MockServer::start_async().await;
    let revoke = server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/v2/token/revoke").query_param("token", "abc123");
            then.status(200);
        })
        .await;

    let store = configured_store();
    store.set_string(keys::REFRESH_TOKEN, "abc123").unwrap();
    let app = app_for(&server, store.clone());

    let (status, _, body) = send(&app, Method::POST, "/auth/zoho/revoke").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revoked"], true);
    assert_eq!(store.get_string(keys::REFRESH_TOKEN), None);
    revoke.assert_async().await;
}

#[tokio::test]
async fn test_revoke_keeps_token_when_not_confirmed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/v2/token/revoke");
            then.status(500);
        })
        .await;

    let store = configured_store();
    store.set_string(keys::REFRESH_TOKEN, "abc123").unwrap();
    let app = app_for(&server, store.clone());

    let (status, _, body) = send(&app, Method::POST, "/auth/zoho/revoke").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["revoked"], false);
    assert_eq!(store.get_string(keys::REFRESH_TOKEN).as_deref(), Some("abc123"));
}

#[tokio::test]
async fn test_revoke_without_token() {
    let server = MockServer::start_async().await;
    let revoke = server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/v2/token/revoke");
            then.status(200);
        })
        .await;

    let app = app_for(&server, configured_store());

    let (status, _, body) = send(&app, Method::POST, "/auth/zoho/revoke").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revoked"], false);
    assert_eq!(revoke.hits_async().await, 0);
}

#[tokio::test]
async fn test_status_reports_connection() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/v2/token").body_contains("grant_type=refresh_token");
            then.status(200).json_body(json!({ "access_token": "live", "expires_in": 3600 }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/oauth/user/info");
            then.status(200).json_body(json!({ "Email": "admin@example.com" }));
        })
        .await;

    let store = configured_store();
    let app = app_for(&server, store.clone());

    let (_, _, body) = send(&app, Method::GET, "/auth/zoho/status").await;
    assert_eq!(body["connected"], false);
    assert_eq!(body["state"]["state"], "awaiting_consent");
    assert_eq!(body["authorization"], "awaiting_consent");

    store.set_string(keys::REFRESH_TOKEN, "r1").unwrap();
    let (status, _, body) = send(&app, Method::GET, "/auth/zoho/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["connected"], true);
    assert_eq!(body["state"]["state"], "connected");
    assert_eq!(body["authorization"], "authorized");
}

#[tokio::test]
async fn test_scopes_lists_catalog_and_resolved_scope() {
    let server = MockServer::start_async().await;
    let store = configured_store();
    store.set_bool(&keys::capability("modules", "leads"), true).unwrap();
    store.set_bool(&keys::capability("org", "read"), true).unwrap();
    let app = app_for(&server, store);

    let (status, _, body) = send(&app, Method::GET, "/auth/zoho/scopes").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enabled"], json!(["org_read", "modules_leads"]));
    assert_eq!(
        body["scope"],
        "ZohoCRM.aaaserver.profile.read,ZohoCRM.org.read,ZohoCRM.modules.ALL"
    );
    assert_eq!(body["catalog"]["users"], json!(["all", "read"]));
}

#[tokio::test]
async fn test_callback_persists_to_yaml_settings_file() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/v2/token");
            then.status(200).json_body(json!({
                "access_token": "1000.access",
                "refresh_token": "1000.yaml",
                "expires_in": 3600
            }));
        })
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zoho_settings.yml");
    {
        let file = zoho_crm_oauth::YamlSettingsFile::open(&path).unwrap();
        ClientCredentials::new("id1", "sec1", "admin@example.com", ZohoDomain::Com, "ignored")
            .save_to(&file)
            .unwrap();
    }

    let store: Arc<dyn SettingsStore> = Arc::new(zoho_crm_oauth::YamlSettingsFile::open(&path).unwrap());
    let app = app_for(&server, store);

    let (status, _, _) = send(&app, Method::GET, "/auth/zoho/callback?code=yaml-code").await;
    assert_eq!(status, StatusCode::OK);

    let reopened = zoho_crm_oauth::YamlSettingsFile::open(&path).unwrap();
    assert_eq!(reopened.get_string(keys::REFRESH_TOKEN).as_deref(), Some("1000.yaml"));
    assert_eq!(reopened.get_string(keys::CLIENT_ID).as_deref(), Some("id1"));
}
