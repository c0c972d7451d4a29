use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use daybook::components::backend::{
    AuthBackend, AuthChange, AuthClient, BackendClient, SessionStore, SignUpResponse,
};
use daybook::components::events::{NewEvent, NewTodo, RemoteEventStore};
use daybook::components::EventStore;
use daybook::config::{Config, FileSettings};
use daybook::error::Error;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use url::Url;
use uuid::Uuid;

const EMAIL: &str = "ada@example.com";
const PASSWORD: &str = "secret1";

/// In-process stand-in for the hosted backend. The auth endpoint rotates the refresh
/// token on every use; the REST endpoint keeps rows in memory.
#[derive(Debug)]
struct MockBackend {
    user_id: Uuid,
    access_token: String,
    refresh_token: String,
    generation: u32,
    sign_in_expires_in: i64,
    refresh_requests: usize,
    events: Vec<Value>,
    todos: Vec<Value>,
    prefer_headers: Vec<String>,
    last_query: HashMap<String, String>,
}

type Shared = Arc<RwLock<MockBackend>>;

impl MockBackend {
    fn new() -> Self {
        Self {
            user_id: Uuid::new_v4(),
            access_token: String::new(),
            refresh_token: String::new(),
            generation: 0,
            sign_in_expires_in: 3600,
            refresh_requests: 0,
            events: Vec::new(),
            todos: Vec::new(),
            prefer_headers: Vec::new(),
            last_query: HashMap::new(),
        }
    }

    /// Sessions that are already inside the client's refresh margin
    fn expiring() -> Self {
        Self {
            sign_in_expires_in: 10,
            ..Self::new()
        }
    }

    fn user(&self, email: &str) -> Value {
        json!({ "id": self.user_id, "email": email })
    }

    fn issue(&mut self, expires_in: i64) -> Value {
        self.access_token = format!("access-{}", self.generation);
        self.refresh_token = format!("refresh-{}", self.generation);
        json!({
            "access_token": self.access_token,
            "token_type": "bearer",
            "expires_in": expires_in,
            "refresh_token": self.refresh_token,
            "user": self.user(EMAIL),
        })
    }

    fn record_prefer(&mut self, headers: &HeaderMap) {
        if let Some(prefer) = headers.get("prefer").and_then(|v| v.to_str().ok()) {
            self.prefer_headers.push(prefer.to_string());
        }
    }
}

fn grant_error(description: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "invalid_grant", "error_description": description })),
    )
        .into_response()
}

fn eq_filter(query: &HashMap<String, String>, column: &str) -> Option<String> {
    query.get(column)?.strip_prefix("eq.").map(String::from)
}

async fn token(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    match query.get("grant_type").map(String::as_str) {
        Some("password") => {
            if body["password"] != PASSWORD {
                return grant_error("Invalid login credentials");
            }
            let mut backend = state.write().await;
            backend.generation = 0;
            let expires_in = backend.sign_in_expires_in;
            Json(backend.issue(expires_in)).into_response()
        }
        Some("refresh_token") => {
            // Long enough for overlapping refreshes to race
            tokio::time::sleep(Duration::from_millis(50)).await;
            let mut backend = state.write().await;
            backend.refresh_requests += 1;
            if body["refresh_token"] != backend.refresh_token.as_str() {
                return grant_error("Refresh Token Already Used");
            }
            backend.generation += 1;
            Json(backend.issue(3600)).into_response()
        }
        _ => grant_error("unsupported grant type"),
    }
}

async fn signup(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default().to_string();
    let mut backend = state.write().await;
    if email.starts_with("confirm") {
        return Json(backend.user(&email)).into_response();
    }
    backend.generation = 0;
    let mut session = backend.issue(3600);
    session["user"] = backend.user(&email);
    Json(session).into_response()
}

async fn user(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let backend = state.read().await;
    let expected = format!("Bearer {}", backend.access_token);
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(value) if value == expected => Json(backend.user(EMAIL)).into_response(),
        _ => (StatusCode::UNAUTHORIZED, Json(json!({ "msg": "invalid JWT" }))).into_response(),
    }
}

async fn logout() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn list_events(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let mut backend = state.write().await;
    let date = eq_filter(&query, "date");
    let rows: Vec<Value> = backend
        .events
        .iter()
        .filter(|e| date.as_deref().map_or(true, |d| e["date"] == d))
        .map(|e| {
            let mut event = e.clone();
            let todos = backend
                .todos
                .iter()
                .filter(|t| t["event_id"] == e["id"])
                .cloned()
                .collect();
            event["todos"] = Value::Array(todos);
            event
        })
        .collect();
    backend.last_query = query;
    Json(Value::Array(rows))
}

async fn insert_events(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(rows): Json<Vec<Value>>,
) -> Response {
    let mut backend = state.write().await;
    backend.record_prefer(&headers);
    if rows.iter().any(|row| row["name"] == "Denied") {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({
                "code": "42501",
                "message": "new row violates row-level security policy for table \"events\"",
                "details": null,
                "hint": null,
            })),
        )
            .into_response();
    }
    let created: Vec<Value> = rows
        .into_iter()
        .map(|mut row| {
            row["id"] = json!(Uuid::new_v4());
            row["created_at"] = json!(Utc::now().to_rfc3339());
            row
        })
        .collect();
    backend.events.extend(created.iter().cloned());
    (StatusCode::CREATED, Json(Value::Array(created))).into_response()
}

async fn insert_todos(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(rows): Json<Vec<Value>>,
) -> Response {
    let mut backend = state.write().await;
    backend.record_prefer(&headers);
    let created: Vec<Value> = rows
        .into_iter()
        .map(|mut row| {
            row["id"] = json!(Uuid::new_v4());
            row
        })
        .collect();
    backend.todos.extend(created.iter().cloned());
    (StatusCode::CREATED, Json(Value::Array(created))).into_response()
}

async fn update_todos(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(patch): Json<Value>,
) -> Json<Value> {
    let mut backend = state.write().await;
    backend.record_prefer(&headers);
    let id = eq_filter(&query, "id");
    let mut updated = Vec::new();
    for todo in backend.todos.iter_mut() {
        if id.as_deref().is_some_and(|id| todo["id"] == id) {
            todo["completed"] = patch["completed"].clone();
            updated.push(todo.clone());
        }
    }
    Json(Value::Array(updated))
}

/// Serve the mock on an ephemeral port and return its base URL
async fn spawn_backend(backend: MockBackend) -> (String, Shared) {
    let state = Arc::new(RwLock::new(backend));
    let app = Router::new()
        .route("/auth/v1/token", post(token))
        .route("/auth/v1/signup", post(signup))
        .route("/auth/v1/user", get(user))
        .route("/auth/v1/logout", post(logout))
        .route("/rest/v1/events", get(list_events).post(insert_events))
        .route("/rest/v1/todos", post(insert_todos).patch(update_todos))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (base, state)
}

fn auth_client(base: &str) -> AuthClient {
    AuthClient::new(
        reqwest::Client::new(),
        &Url::parse(base).unwrap(),
        "anon",
        SessionStore::disabled(),
        60,
    )
    .unwrap()
}

fn backend_client(base: &str) -> BackendClient {
    let env: HashMap<&str, String> = HashMap::from([
        ("BACKEND_URL", base.to_string()),
        ("BACKEND_ANON_KEY", "anon".to_string()),
        ("SESSION_FILE", String::new()),
    ]);
    let config =
        Config::from_sources(|key| env.get(key).cloned(), FileSettings::default()).unwrap();
    BackendClient::new(&config).unwrap()
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<AuthChange>) -> Vec<AuthChange> {
    let mut changes = Vec::new();
    while let Ok(change) = rx.try_recv() {
        changes.push(change);
    }
    changes
}

#[tokio::test]
async fn test_sign_in_and_probe() {
    let (base, mock) = spawn_backend(MockBackend::new()).await;
    let auth = auth_client(&base);

    let session = auth.sign_in(EMAIL, PASSWORD).await.unwrap();
    assert_eq!(session.user.id, mock.read().await.user_id);
    assert!(session.expires_at.is_some());
    assert_eq!(auth.bearer_token().await.unwrap(), "access-0");

    let user = auth.current_user().await.unwrap().unwrap();
    assert_eq!(user.email.as_deref(), Some(EMAIL));

    // A token the backend no longer accepts ends the session
    mock.write().await.access_token = "revoked".to_string();
    assert!(auth.current_user().await.unwrap().is_none());
    assert_eq!(auth.bearer_token().await.unwrap(), "anon");
}

#[tokio::test]
async fn test_wrong_password_is_a_backend_error() {
    let (base, _mock) = spawn_backend(MockBackend::new()).await;
    let auth = auth_client(&base);

    let error = auth.sign_in(EMAIL, "nope").await.unwrap_err();
    assert!(matches!(
        &error,
        Error::Backend { status: 400, message } if message == "Invalid login credentials"
    ));
    assert_eq!(auth.bearer_token().await.unwrap(), "anon");
}

#[tokio::test]
async fn test_sign_up_responses() {
    let (base, _mock) = spawn_backend(MockBackend::new()).await;
    let auth = auth_client(&base);

    match auth.sign_up("confirm@example.com", PASSWORD).await.unwrap() {
        SignUpResponse::User(user) => {
            assert_eq!(user.email.as_deref(), Some("confirm@example.com"))
        }
        SignUpResponse::Session(_) => panic!("expected a bare user"),
    }
    assert_eq!(auth.bearer_token().await.unwrap(), "anon");

    match auth.sign_up("new@example.com", PASSWORD).await.unwrap() {
        SignUpResponse::Session(session) => {
            assert_eq!(session.user.email.as_deref(), Some("new@example.com"))
        }
        SignUpResponse::User(_) => panic!("expected a session"),
    }
    assert_eq!(auth.bearer_token().await.unwrap(), "access-0");
}

#[tokio::test]
async fn test_concurrent_refreshes_share_one_exchange() {
    let (base, mock) = spawn_backend(MockBackend::expiring()).await;
    let auth = auth_client(&base);
    auth.sign_in(EMAIL, PASSWORD).await.unwrap();
    let mut rx = auth.subscribe();

    let tokens = futures::future::join_all((0..5).map(|_| auth.bearer_token())).await;
    for token in tokens {
        assert_eq!(token.unwrap(), "access-1");
    }

    assert_eq!(mock.read().await.refresh_requests, 1);
    assert_eq!(auth.bearer_token().await.unwrap(), "access-1");

    let changes = drain(&mut rx);
    assert!(!changes.contains(&AuthChange::SignedOut));
    assert_eq!(changes.len(), 1);
}

#[tokio::test]
async fn test_rejected_refresh_signs_out() {
    let (base, mock) = spawn_backend(MockBackend::expiring()).await;
    let auth = auth_client(&base);
    auth.sign_in(EMAIL, PASSWORD).await.unwrap();
    let mut rx = auth.subscribe();

    mock.write().await.refresh_token = "revoked".to_string();
    let error = auth.bearer_token().await.unwrap_err();
    assert!(error.is_status(400));

    assert_eq!(auth.bearer_token().await.unwrap(), "anon");
    assert_eq!(drain(&mut rx), vec![AuthChange::SignedOut]);
}

#[tokio::test]
async fn test_sign_out() {
    let (base, _mock) = spawn_backend(MockBackend::new()).await;
    let auth = auth_client(&base);
    auth.sign_in(EMAIL, PASSWORD).await.unwrap();

    auth.sign_out().await.unwrap();
    assert_eq!(auth.bearer_token().await.unwrap(), "anon");
    assert!(auth.current_user().await.unwrap().is_none());
}

#[tokio::test]
async fn test_remote_event_store_round_trip() {
    let (base, mock) = spawn_backend(MockBackend::new()).await;
    let backend = backend_client(&base);
    backend.auth.sign_in(EMAIL, PASSWORD).await.unwrap();
    let store = RemoteEventStore::new(backend.clone());
    let user_id = mock.read().await.user_id;
    let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();

    let event = store
        .create_event(
            &NewEvent {
                name: "Trip".into(),
                icon: "✈️".into(),
                date,
            },
            user_id,
        )
        .await
        .unwrap();
    assert_eq!(event.name, "Trip");
    assert_eq!(event.user_id, user_id);
    assert!(event.todos.is_empty());

    let todos = store
        .create_todos(&[NewTodo::new("Pack bags")], event.id)
        .await
        .unwrap();
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].event_id, event.id);
    assert!(!todos[0].completed);

    let toggled = store.update_todo_status(todos[0].id, true).await.unwrap();
    assert!(toggled.completed);

    let events = store.events_for_date(date, user_id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].total_count(), 1);
    assert_eq!(events[0].completion_percent(), 100);

    let missing = store.update_todo_status(Uuid::new_v4(), true).await;
    assert!(matches!(missing, Err(Error::NotFound(_))));

    let mock = mock.read().await;
    assert_eq!(mock.last_query.get("select").map(String::as_str), Some("*,todos(*)"));
    assert_eq!(mock.last_query.get("order").map(String::as_str), Some("created_at.asc"));
    assert_eq!(mock.prefer_headers.len(), 4);
    assert!(mock
        .prefer_headers
        .iter()
        .all(|p| p == "return=representation"));
}

#[tokio::test]
async fn test_remote_rejection_keeps_backend_message() {
    let (base, mock) = spawn_backend(MockBackend::new()).await;
    let store = RemoteEventStore::new(backend_client(&base));
    let user_id = mock.read().await.user_id;

    let result = store
        .create_event(
            &NewEvent {
                name: "Denied".into(),
                icon: "📅".into(),
                date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            },
            user_id,
        )
        .await;
    match result {
        Err(Error::Backend { status, message }) => {
            assert_eq!(status, 403);
            assert!(message.contains("row-level security"));
        }
        other => panic!("expected a backend error, got {:?}", other),
    }
}
