//! Client for the hosted backend: REST tables, the auth endpoint, and a persisted session.

pub mod auth;
pub mod models;
pub mod rest;
pub mod store;

pub use auth::{AuthBackend, AuthClient};
pub use models::{AuthChange, AuthSession, SignUpResponse, User};
pub use rest::RestClient;
pub use store::SessionStore;

use crate::config::Config;
use crate::error::AppResult;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

/// Both halves of the backend, sharing one HTTP connection pool
#[derive(Clone)]
pub struct BackendClient {
    pub rest: RestClient,
    pub auth: Arc<AuthClient>,
}

impl BackendClient {
    pub fn new(config: &Config) -> AppResult<Self> {
        let base = Url::parse(&config.backend_url)?;
        let client = reqwest::Client::new();

        let rest = RestClient::new(client.clone(), &base, config.backend_anon_key.clone())?;
        let auth = AuthClient::new(
            client,
            &base,
            config.backend_anon_key.clone(),
            SessionStore::new(config.session_file.clone()),
            config.token_refresh_margin_secs,
        )?;

        Ok(Self {
            rest,
            auth: Arc::new(auth),
        })
    }
}

/// Keeps the token refresher running for the lifetime of the app
pub struct Backend {
    client: BackendClient,
    refresher: RwLock<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl Backend {
    pub fn new(client: BackendClient) -> Self {
        Self {
            client,
            refresher: RwLock::new(None),
        }
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }
}

#[async_trait]
impl super::Component for Backend {
    fn name(&self) -> &'static str {
        "backend"
    }

    async fn init(&self, _config: Arc<RwLock<Config>>) -> AppResult<()> {
        let mut refresher = self.refresher.write().await;
        if refresher.is_none() {
            let cancel = CancellationToken::new();
            let task = self.client.auth.spawn_refresher(cancel.clone());
            *refresher = Some((cancel, task));
        }
        Ok(())
    }

    async fn shutdown(&self) -> AppResult<()> {
        if let Some((cancel, task)) = self.refresher.write().await.take() {
            cancel.cancel();
            let _ = task.await;
            info!("Backend refresher shut down");
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
