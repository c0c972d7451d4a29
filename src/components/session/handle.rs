use super::actor::{SessionActor, SessionActorHandle};
use super::models::{SessionSnapshot, SessionUser, SignUpOutcome};
use crate::components::backend::AuthBackend;
use crate::error::AppResult;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle for interacting with the session actor
#[derive(Clone)]
pub struct SessionHandle {
    actor_handle: SessionActorHandle,
    actor_task: Arc<JoinHandle<()>>,
}

impl SessionHandle {
    /// Create a new SessionHandle and spawn the actor
    pub fn new(auth: Arc<dyn AuthBackend>) -> Self {
        let (mut actor, handle) = SessionActor::new(auth);

        let actor_task = tokio::spawn(async move {
            actor.run().await;
        });

        Self {
            actor_handle: handle,
            actor_task: Arc::new(actor_task),
        }
    }

    /// Observe the session; dropping the receiver ends the observation
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.actor_handle.subscribe()
    }

    /// The current state without waiting
    pub fn snapshot(&self) -> SessionSnapshot {
        self.actor_handle.snapshot()
    }

    /// The state once the startup probe has answered
    pub async fn resolved(&self) -> SessionSnapshot {
        let mut rx = self.subscribe();
        let resolved = match rx.wait_for(|snapshot| !snapshot.is_loading()).await {
            Ok(snapshot) => Some(snapshot.clone()),
            Err(_) => None,
        };
        // Actor gone; its last published state is all there is
        resolved.unwrap_or_else(|| rx.borrow().clone())
    }

    /// The signed-in user, once known
    pub async fn current_user(&self) -> Option<SessionUser> {
        self.resolved().await.user().cloned()
    }

    pub async fn sign_up(
        &self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> AppResult<SignUpOutcome> {
        self.actor_handle.sign_up(email.into(), password.into()).await
    }

    pub async fn sign_in(
        &self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> AppResult<SessionUser> {
        self.actor_handle.sign_in(email.into(), password.into()).await
    }

    pub async fn sign_out(&self) -> AppResult<()> {
        self.actor_handle.sign_out().await
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> AppResult<()> {
        self.actor_handle.shutdown().await
    }

    /// Whether the actor task has exited
    pub fn is_stopped(&self) -> bool {
        self.actor_task.is_finished()
    }
}
