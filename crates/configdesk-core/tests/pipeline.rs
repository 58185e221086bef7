//! End-to-end checks of the request pipeline against an in-process server.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use futures::future::AbortHandle;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::Notify;

use configdesk_core::api::cancellable;
use configdesk_core::auth::{MemoryStorage, SessionStorage};
use configdesk_core::models::Configuration;
use configdesk_core::navigation::View;
use configdesk_core::{ApiError, App, Config, SessionRecord};

const GOOD_TOKEN: &str = "abc";

#[derive(Clone, Default)]
struct ServerState {
    seen_auth: Arc<Mutex<Vec<Option<String>>>>,
    arrived: Arc<Notify>,
}

impl ServerState {
    fn record(&self, headers: &HeaderMap) -> Option<String> {
        let auth = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.seen_auth.lock().push(auth.clone());
        auth
    }

    fn last_auth(&self) -> Option<String> {
        self.seen_auth.lock().last().cloned().flatten()
    }
}

fn authorized(auth: Option<&str>) -> bool {
    auth == Some(&format!("Bearer {}", GOOD_TOKEN)[..])
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["password"] == "secret" {
        Json(json!({"token": GOOD_TOKEN, "username": body["username"]})).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({"message": "Bad credentials"}))).into_response()
    }
}

async fn list_configs(State(state): State<ServerState>, headers: HeaderMap) -> Response {
    let auth = state.record(&headers);
    if !authorized(auth.as_deref()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!([
        {"id": 1, "key": "db.url", "value": "postgres://db", "createdBy": "alice"}
    ]))
    .into_response()
}

async fn create_config(State(state): State<ServerState>, headers: HeaderMap) -> Response {
    let auth = state.record(&headers);
    if !authorized(auth.as_deref()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    (
        StatusCode::CONFLICT,
        Json(json!({"message": "Configuration with key 'db.url' already exists", "status": 409})),
    )
        .into_response()
}

async fn config_by_id(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    state.record(&headers);
    match id {
        1 => Json(json!({"id": 1, "key": "db.url", "value": "postgres://db"})).into_response(),
        99 => {
            state.arrived.notify_one();
            std::future::pending::<Response>().await
        }
        _ => (StatusCode::NOT_FOUND, Json(json!({"message": "Configuration not found"}))).into_response(),
    }
}

async fn delete_config(State(state): State<ServerState>, headers: HeaderMap) -> Response {
    state.record(&headers);
    StatusCode::NO_CONTENT.into_response()
}

async fn spawn_server(state: ServerState) -> String {
    let app = axum::Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/configs", get(list_configs).post(create_config))
        .route("/api/configs/{id}", get(config_by_id).delete(delete_config))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{}", addr)
}

async fn setup() -> (ServerState, MemoryStorage, App) {
    let state = ServerState::default();
    let base = spawn_server(state.clone()).await;
    let config = Config {
        user_api_url: base.clone(),
        config_api_url: base,
        ..Config::default()
    };
    let storage = MemoryStorage::new();
    let app = App::with_storage(config, Box::new(storage.clone())).expect("app");
    (state, storage, app)
}

#[tokio::test]
async fn test_established_session_is_attached_as_bearer() {
    let (state, _storage, app) = setup().await;
    app.store().establish(SessionRecord::new("abc", "alice"));

    let configs = app.api().list_configurations().await.expect("list");

    assert_eq!(state.last_auth().as_deref(), Some("Bearer abc"));
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].key, "db.url");
}

#[tokio::test]
async fn test_request_without_session_has_no_authorization() {
    let (state, _storage, app) = setup().await;

    let outcome = app.api().list_configurations().await;

    assert!(matches!(outcome, Err(ApiError::Unauthorized)));
    assert_eq!(*state.seen_auth.lock(), vec![None]);
    assert_eq!(app.store().current(), None);
}

#[tokio::test]
async fn test_rejected_credential_clears_session_and_surfaces_error() {
    let (state, storage, app) = setup().await;
    app.store().establish(SessionRecord::new("expired", "alice"));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _sub = app
        .store()
        .subscribe(move |s| sink.lock().push(s.map(|r| r.principal.clone())));

    let outcome = app.api().list_configurations().await;

    assert!(matches!(outcome, Err(ApiError::Unauthorized)));
    assert_eq!(state.last_auth().as_deref(), Some("Bearer expired"));
    assert_eq!(app.store().current(), None);
    assert_eq!(storage.read().expect("read"), None);
    assert_eq!(*seen.lock(), vec![Some("alice".to_string()), None]);
}

#[tokio::test]
async fn test_other_failures_leave_session_alone() {
    let (_state, _storage, app) = setup().await;
    app.store().establish(SessionRecord::new("abc", "alice"));

    let created = app
        .api()
        .create_configuration(&Configuration::new("db.url", "x"))
        .await;
    match created {
        Err(ApiError::Conflict(detail)) => assert!(detail.contains("already exists")),
        other => panic!("unexpected outcome: {:?}", other.map(|c| c.key)),
    }

    let missing = app.api().get_configuration(404).await;
    assert!(matches!(missing, Err(ApiError::NotFound(_))));

    assert_eq!(app.store().current(), Some(SessionRecord::new("abc", "alice")));
}

#[tokio::test]
async fn test_login_flow_replays_pending_intent() {
    let (_state, storage, mut app) = setup().await;

    let landing = app.navigate("/dashboard").expect("navigate");
    assert_eq!(landing.url, "/login?returnUrl=%2Fdashboard");
    let View::Login { intent } = landing.view else {
        panic!("expected login view");
    };

    let destination = app.login("alice", "secret", intent).await.expect("login");
    assert_eq!(destination, "/dashboard");
    assert_eq!(app.navigate(&destination).expect("navigate").view, View::Dashboard);

    assert_eq!(app.store().current(), Some(SessionRecord::new("abc", "alice")));
    assert_eq!(app.config.last_username.as_deref(), Some("alice"));

    // A restart over the same storage is still logged in
    let restarted = App::with_storage(Config::default(), Box::new(storage.clone())).expect("app");
    assert!(restarted.is_authenticated());
}

#[tokio::test]
async fn test_failed_login_reports_unauthorized() {
    let (_state, _storage, mut app) = setup().await;

    let err = app
        .login("alice", "wrong", Default::default())
        .await
        .expect_err("login should fail");

    assert!(matches!(err.downcast_ref::<ApiError>(), Some(ApiError::Unauthorized)));
    assert!(!app.is_authenticated());
}

#[tokio::test]
async fn test_delete_accepts_no_content() {
    let (state, _storage, app) = setup().await;
    app.store().establish(SessionRecord::new("abc", "alice"));

    app.api().delete_configuration(1).await.expect("delete");
    assert_eq!(state.last_auth().as_deref(), Some("Bearer abc"));
}

#[tokio::test]
async fn test_cancelled_request_is_not_a_rejection() {
    let (state, _storage, app) = setup().await;
    app.store().establish(SessionRecord::new("abc", "alice"));

    let (handle, registration) = AbortHandle::new_pair();
    let api = app.api().clone();
    let task = tokio::spawn(async move { cancellable(registration, api.get_configuration(99)).await });

    state.arrived.notified().await;
    handle.abort();

    let outcome = task.await.expect("join");
    assert!(matches!(outcome, Err(ApiError::Cancelled)));
    assert!(app.is_authenticated());
}
