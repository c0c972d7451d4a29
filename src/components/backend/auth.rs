use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tokio::sync::{broadcast, Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use super::models::{AuthChange, AuthSession, SignUpResponse, User};
use super::rest::check_response;
use super::store::SessionStore;
use crate::error::{auth_error, AppResult};
use crate::utils::time::unix_now;

/// Capacity of the auth change broadcast; slow subscribers see `Lagged`
const AUTH_CHANGE_CAPACITY: usize = 16;

/// Pause after a failed background refresh before trying again
const REFRESH_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Authentication operations the session manager depends on
#[async_trait]
pub trait AuthBackend: Send + Sync + 'static {
    /// Register a new account
    async fn sign_up(&self, email: &str, password: &str) -> AppResult<SignUpResponse>;

    /// Sign in with email and password
    async fn sign_in(&self, email: &str, password: &str) -> AppResult<AuthSession>;

    /// End the current session
    async fn sign_out(&self) -> AppResult<()>;

    /// The user of the current session, if there is a valid one
    async fn current_user(&self) -> AppResult<Option<User>>;

    /// Subscribe to session changes that happen outside an explicit call
    fn subscribe(&self) -> broadcast::Receiver<AuthChange>;
}

/// Client for the backend's auth endpoint.
///
/// Holds the one live session of this process, persists it through [`SessionStore`] and
/// broadcasts [`AuthChange`]s when it changes.
pub struct AuthClient {
    client: Client,
    base: Url,
    api_key: String,
    session: RwLock<Option<AuthSession>>,
    store: SessionStore,
    changes: broadcast::Sender<AuthChange>,
    session_changed: Notify,
    /// Held for the whole refresh exchange; the backend rotates refresh tokens
    refresh_lock: Mutex<()>,
    refresh_margin_secs: i64,
}

impl AuthClient {
    pub fn new(
        client: Client,
        base: &Url,
        api_key: impl Into<String>,
        store: SessionStore,
        refresh_margin_secs: i64,
    ) -> AppResult<Self> {
        let base = base.join("auth/v1/")?;
        let (changes, _) = broadcast::channel(AUTH_CHANGE_CAPACITY);
        Ok(Self {
            client,
            base,
            api_key: api_key.into(),
            session: RwLock::new(None),
            store,
            changes,
            session_changed: Notify::new(),
            refresh_lock: Mutex::new(()),
            refresh_margin_secs,
        })
    }

    /// Number of live subscriptions to auth changes
    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }

    /// Token for REST requests: the session's access token, refreshed when close to
    /// expiry, or the public key when nobody is signed in
    pub async fn bearer_token(&self) -> AppResult<String> {
        let current = self.session.read().await.clone();
        match current {
            Some(session) if session.expires_within(self.refresh_margin_secs) => {
                match self.refresh_current().await? {
                    Some(refreshed) => Ok(refreshed.access_token),
                    None => Ok(self.api_key.clone()),
                }
            }
            Some(session) => Ok(session.access_token),
            None => Ok(self.api_key.clone()),
        }
    }

    /// Spawn the task that refreshes the token ahead of expiry until `cancel` fires
    pub fn spawn_refresher(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            info!("Token refresher started");
            loop {
                let wait = this.next_refresh_in().await;
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = this.session_changed.notified() => continue,
                    _ = sleep_for(wait) => {}
                }

                if let Err(e) = this.refresh_current().await {
                    error!("Background token refresh failed: {}", e);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(REFRESH_RETRY_DELAY) => {}
                    }
                }
            }
            info!("Token refresher stopped");
        })
    }

    /// Time until the current session should be refreshed; `None` when there is none
    async fn next_refresh_in(&self) -> Option<Duration> {
        let session = self.session.read().await;
        session.as_ref().map(|s| {
            let secs = s.expires_at() - self.refresh_margin_secs - unix_now();
            Duration::from_secs(secs.max(0) as u64)
        })
    }

    fn endpoint(&self, path: &str) -> AppResult<Url> {
        Ok(self.base.join(path)?)
    }

    fn emit(&self, change: AuthChange) {
        // Nobody listening is fine
        let _ = self.changes.send(change);
    }

    /// Install a new session: memory, disk, refresher
    async fn install(&self, session: AuthSession) -> AppResult<()> {
        if let Err(e) = self.store.save(&session).await {
            warn!("Could not persist session: {}", e);
        }
        *self.session.write().await = Some(session);
        self.session_changed.notify_one();
        Ok(())
    }

    /// Drop the session everywhere
    async fn discard(&self) {
        *self.session.write().await = None;
        if let Err(e) = self.store.clear().await {
            warn!("Could not remove persisted session: {}", e);
        }
        self.session_changed.notify_one();
    }

    /// The current session, refreshed first if it is close to expiry. Concurrent callers
    /// queue on the refresh lock and then find the session another caller refreshed.
    async fn refresh_current(&self) -> AppResult<Option<AuthSession>> {
        let _guard = self.refresh_lock.lock().await;
        let current = self.session.read().await.clone();
        match current {
            Some(session) if session.expires_within(self.refresh_margin_secs) => {
                self.refresh(&session).await.map(Some)
            }
            other => Ok(other),
        }
    }

    /// Exchange the refresh token for a new session. A rejected refresh token ends
    /// the session and tells subscribers so, unless the session moved on meanwhile.
    async fn refresh(&self, session: &AuthSession) -> AppResult<AuthSession> {
        debug!("Refreshing access token");
        let mut url = self.endpoint("token")?;
        url.query_pairs_mut().append_pair("grant_type", "refresh_token");

        let response = self
            .client
            .post(url)
            .header("apikey", &self.api_key)
            .json(&json!({ "refresh_token": session.refresh_token }))
            .send()
            .await?;

        let response = match check_response(response).await {
            Ok(response) => response,
            Err(e) if e.is_status(400) || e.is_status(401) => {
                let current = self.session.read().await.clone();
                match current {
                    Some(current) if current.refresh_token != session.refresh_token => {
                        debug!("Stale refresh token rejected; keeping the newer session");
                        return Ok(current);
                    }
                    Some(_) => {
                        warn!("Refresh token rejected, signing out: {}", e);
                        self.discard().await;
                        self.emit(AuthChange::SignedOut);
                    }
                    None => {}
                }
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let refreshed = response.json::<AuthSession>().await?.normalized();
        self.install(refreshed.clone()).await?;
        info!("Access token refreshed");
        self.emit(AuthChange::TokenRefreshed(refreshed.user.clone()));
        Ok(refreshed)
    }

    async fn fetch_user(&self, access_token: &str) -> AppResult<User> {
        let response = self
            .client
            .get(self.endpoint("user")?)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;
        Ok(check_response(response).await?.json::<User>().await?)
    }
}

#[async_trait]
impl AuthBackend for AuthClient {
    async fn sign_up(&self, email: &str, password: &str) -> AppResult<SignUpResponse> {
        let response = self
            .client
            .post(self.endpoint("signup")?)
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let outcome = check_response(response).await?.json::<SignUpResponse>().await?;
        match outcome {
            SignUpResponse::Session(session) => {
                let session = session.normalized();
                self.install(session.clone()).await?;
                self.emit(AuthChange::SignedIn(session.user.clone()));
                Ok(SignUpResponse::Session(session))
            }
            user => Ok(user),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> AppResult<AuthSession> {
        let mut url = self.endpoint("token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let response = self
            .client
            .post(url)
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let session = check_response(response)
            .await?
            .json::<AuthSession>()
            .await?
            .normalized();
        self.install(session.clone()).await?;
        self.emit(AuthChange::SignedIn(session.user.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> AppResult<()> {
        let current = self.session.read().await.clone();
        if let Some(session) = current {
            let response = self
                .client
                .post(self.endpoint("logout")?)
                .header("apikey", &self.api_key)
                .header("Authorization", format!("Bearer {}", session.access_token))
                .send()
                .await?;

            // An expired token cannot be revoked anymore; the session is over either way
            match check_response(response).await {
                Ok(_) => {}
                Err(e) if e.is_status(401) || e.is_status(403) => {
                    debug!("Logout with stale token: {}", e);
                }
                Err(e) => return Err(e),
            }
        }

        self.discard().await;
        self.emit(AuthChange::SignedOut);
        Ok(())
    }

    async fn current_user(&self) -> AppResult<Option<User>> {
        let mut session = self.session.read().await.clone();
        if session.is_none() {
            session = self.store.load().await?;
            if let Some(loaded) = &session {
                *self.session.write().await = Some(loaded.clone());
                self.session_changed.notify_one();
            }
        }

        let Some(mut session) = session else {
            return Ok(None);
        };

        if session.expires_within(self.refresh_margin_secs) {
            session = match self.refresh_current().await {
                Ok(Some(refreshed)) => refreshed,
                Ok(None) => return Ok(None),
                Err(e) if matches!(e, crate::error::Error::Backend { .. }) => return Ok(None),
                Err(e) => return Err(e),
            };
        }

        match self.fetch_user(&session.access_token).await {
            Ok(user) => Ok(Some(user)),
            Err(e) if e.is_status(401) || e.is_status(403) => {
                warn!("Stored session is no longer valid: {}", e);
                self.discard().await;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.changes.subscribe()
    }
}

/// Sleep for `wait`, or forever when there is nothing to wait for
async fn sleep_for(wait: Option<Duration>) {
    match wait {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending::<()>().await,
    }
}

/// Reject obviously unusable credentials before they reach the backend
pub fn check_credentials(email: &str, password: &str) -> AppResult<()> {
    if email.trim().is_empty() || !email.contains('@') {
        return Err(auth_error(&t!("auth_invalid_email")));
    }
    if password.is_empty() {
        return Err(auth_error(&t!("auth_missing_password")));
    }
    Ok(())
}
