#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use daybook::components::backend::{AuthBackend, AuthChange, AuthSession, SignUpResponse, User};
use daybook::components::events::InMemoryEventStore;
use daybook::components::session::SessionHandle;
use daybook::error::{AppResult, Error};
use daybook::web::auth::{AuthConfig, AuthService};
use daybook::web::{router, AppState, WebSettings};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

pub const EMAIL: &str = "ada@example.com";
pub const PASSWORD: &str = "secret1";

/// Mock implementation of the auth endpoint for testing
pub struct MockAuth {
    changes: broadcast::Sender<AuthChange>,
    user: Mutex<Option<User>>,
    pub user_id: Uuid,
    confirmation_required: AtomicBool,
    fail_probe: AtomicBool,
    sign_in_delay: Mutex<Option<Duration>>,
}

impl MockAuth {
    /// Nobody signed in
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            changes,
            user: Mutex::new(None),
            user_id: Uuid::new_v4(),
            confirmation_required: AtomicBool::new(false),
            fail_probe: AtomicBool::new(false),
            sign_in_delay: Mutex::new(None),
        }
    }

    /// A session already persisted from an earlier run
    pub fn signed_in() -> Self {
        let auth = Self::new();
        *auth.user.try_lock().expect("fresh mutex") = Some(auth.user());
        auth
    }

    pub fn user(&self) -> User {
        User {
            id: self.user_id,
            email: Some(EMAIL.to_string()),
        }
    }

    pub fn emit(&self, change: AuthChange) {
        let _ = self.changes.send(change);
    }

    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }

    pub fn set_confirmation_required(&self, required: bool) {
        self.confirmation_required.store(required, Ordering::SeqCst);
    }

    pub fn set_fail_probe(&self, fail: bool) {
        self.fail_probe.store(fail, Ordering::SeqCst);
    }

    pub async fn set_sign_in_delay(&self, delay: Duration) {
        *self.sign_in_delay.lock().await = Some(delay);
    }

    fn session_for(&self, user: User) -> AuthSession {
        AuthSession {
            access_token: "access".to_string(),
            token_type: "bearer".to_string(),
            expires_in: 3600,
            expires_at: None,
            refresh_token: "refresh".to_string(),
            user,
        }
        .normalized()
    }
}

#[async_trait]
impl AuthBackend for MockAuth {
    async fn sign_up(&self, email: &str, _password: &str) -> AppResult<SignUpResponse> {
        let user = User {
            id: self.user_id,
            email: Some(email.to_string()),
        };
        if self.confirmation_required.load(Ordering::SeqCst) {
            return Ok(SignUpResponse::User(user));
        }
        *self.user.lock().await = Some(user.clone());
        self.emit(AuthChange::SignedIn(user.clone()));
        Ok(SignUpResponse::Session(self.session_for(user)))
    }

    async fn sign_in(&self, email: &str, password: &str) -> AppResult<AuthSession> {
        if let Some(delay) = *self.sign_in_delay.lock().await {
            tokio::time::sleep(delay).await;
        }
        if email != EMAIL || password != PASSWORD {
            return Err(Error::Backend {
                status: 400,
                message: "Invalid login credentials".to_string(),
            });
        }
        let user = self.user();
        *self.user.lock().await = Some(user.clone());
        self.emit(AuthChange::SignedIn(user.clone()));
        Ok(self.session_for(user))
    }

    async fn sign_out(&self) -> AppResult<()> {
        *self.user.lock().await = None;
        self.emit(AuthChange::SignedOut);
        Ok(())
    }

    async fn current_user(&self) -> AppResult<Option<User>> {
        if self.fail_probe.load(Ordering::SeqCst) {
            return Err(Error::Other("probe failed".to_string()));
        }
        Ok(self.user.lock().await.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.changes.subscribe()
    }
}

/// A full app over in-memory storage and the mock auth endpoint
pub struct TestApp {
    pub router: Router,
    pub events: Arc<InMemoryEventStore>,
    pub auth: Arc<MockAuth>,
    pub session: SessionHandle,
}

impl TestApp {
    pub fn new(auth: MockAuth) -> Self {
        let auth = Arc::new(auth);
        let session = SessionHandle::new(auth.clone());
        let events = Arc::new(InMemoryEventStore::new());
        let state = AppState {
            session: session.clone(),
            events: events.clone(),
            auth_service: Arc::new(AuthService::new(AuthConfig {
                jwt_secret: "test-secret".to_string(),
                token_expiration_minutes: 60,
            })),
            settings: WebSettings::default(),
        };
        Self {
            router: router(state),
            events,
            auth,
            session,
        }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> axum::response::Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.router
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn post(&self, uri: &str, form: &str, cookie: Option<&str>) -> axum::response::Response {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.router
            .clone()
            .oneshot(builder.body(Body::from(form.to_string())).unwrap())
            .await
            .unwrap()
    }

    /// Sign in through the login form and return the cookie pair to send back
    pub async fn sign_in(&self) -> String {
        let form = format!("email={}&password={}", urlencoding::encode(EMAIL), PASSWORD);
        let response = self.post("/login", &form, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        set_cookie_pair(&response).expect("login sets the session cookie")
    }
}

/// `name=value` of the first Set-Cookie header
pub fn set_cookie_pair(response: &axum::response::Response) -> Option<String> {
    let value = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
    value.split(';').next().map(|pair| pair.trim().to_string())
}

pub fn location(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
