//! Session manager: a single actor that tracks who is signed in.

mod actor;
mod handle;
pub mod models;

pub use handle::SessionHandle;
pub use models::{SessionSnapshot, SessionState, SessionUser, SignUpOutcome};

use crate::components::backend::AuthBackend;
use crate::config::Config;
use crate::error::{component_error, AppResult};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Session component owning the session actor
pub struct Session {
    auth: Arc<dyn AuthBackend>,
    handle: RwLock<Option<SessionHandle>>,
}

impl Session {
    pub fn new(auth: Arc<dyn AuthBackend>) -> Self {
        Self {
            auth,
            handle: RwLock::new(None),
        }
    }

    /// Get the handle if it exists
    pub async fn get_handle(&self) -> Option<SessionHandle> {
        self.handle.read().await.clone()
    }

    /// The handle, or an error when `init` has not run
    pub async fn require_handle(&self) -> AppResult<SessionHandle> {
        self.get_handle()
            .await
            .ok_or_else(|| component_error("Session component is not initialized"))
    }
}

#[async_trait]
impl super::Component for Session {
    fn name(&self) -> &'static str {
        "session"
    }

    async fn init(&self, _config: Arc<RwLock<Config>>) -> AppResult<()> {
        let mut handle_lock = self.handle.write().await;
        if handle_lock.is_none() {
            *handle_lock = Some(SessionHandle::new(Arc::clone(&self.auth)));
            info!("Session actor spawned");
        }
        Ok(())
    }

    async fn shutdown(&self) -> AppResult<()> {
        if let Some(handle) = self.handle.write().await.take() {
            handle.shutdown().await?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
