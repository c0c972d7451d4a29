use crate::components::backend::{AuthBackend, AuthChange, SignUpResponse};
use crate::components::session::models::{
    SessionSnapshot, SessionState, SessionUser, SignUpOutcome,
};
use crate::error::{component_error, AppResult};
use std::sync::Arc;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};

/// The session actor: owns the session state and is its only writer
pub struct SessionActor {
    auth: Arc<dyn AuthBackend>,
    command_rx: mpsc::Receiver<SessionCommand>,
    changes: Option<broadcast::Receiver<AuthChange>>,
    state_tx: watch::Sender<SessionSnapshot>,
}

/// Commands that can be sent to the session actor
pub enum SessionCommand {
    SignUp {
        email: String,
        password: String,
        response_tx: mpsc::Sender<AppResult<SignUpOutcome>>,
    },
    SignIn {
        email: String,
        password: String,
        response_tx: mpsc::Sender<AppResult<SessionUser>>,
    },
    SignOut(mpsc::Sender<AppResult<()>>),
    Shutdown,
}

/// Handle for communicating with the session actor
#[derive(Clone)]
pub struct SessionActorHandle {
    command_tx: mpsc::Sender<SessionCommand>,
    state_rx: watch::Receiver<SessionSnapshot>,
}

impl SessionActorHandle {
    /// A fresh observer of the session state
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state_rx.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state_rx.borrow().clone()
    }

    pub async fn sign_up(&self, email: String, password: String) -> AppResult<SignUpOutcome> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.send(SessionCommand::SignUp {
            email,
            password,
            response_tx,
        })
        .await?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| component_error("Response channel closed"))?
    }

    pub async fn sign_in(&self, email: String, password: String) -> AppResult<SessionUser> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.send(SessionCommand::SignIn {
            email,
            password,
            response_tx,
        })
        .await?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| component_error("Response channel closed"))?
    }

    pub async fn sign_out(&self) -> AppResult<()> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.send(SessionCommand::SignOut(response_tx)).await?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| component_error("Response channel closed"))?
    }

    /// Stop the actor; a stopped actor is not an error
    pub async fn shutdown(&self) -> AppResult<()> {
        let _ = self.command_tx.send(SessionCommand::Shutdown).await;
        Ok(())
    }

    async fn send(&self, command: SessionCommand) -> AppResult<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|e| component_error(&format!("Session actor mailbox error: {}", e)))
    }
}

impl SessionActor {
    /// Create a new actor and return its handle.
    ///
    /// The auth-change subscription is taken here, before the actor runs its probe, so a
    /// change that lands while the probe is in flight is not lost.
    pub fn new(auth: Arc<dyn AuthBackend>) -> (Self, SessionActorHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (state_tx, state_rx) = watch::channel(SessionSnapshot::default());
        let changes = Some(auth.subscribe());

        let actor = Self {
            auth,
            command_rx,
            changes,
            state_tx,
        };

        let handle = SessionActorHandle {
            command_tx,
            state_rx,
        };

        (actor, handle)
    }

    /// Start the actor's processing loop
    pub async fn run(&mut self) {
        info!("Session actor started");

        self.probe().await;

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SessionCommand::SignUp { email, password, response_tx }) => {
                            let result = self.sign_up(&email, &password).await;
                            self.skip_queued_changes();
                            let _ = response_tx.send(result).await;
                        }
                        Some(SessionCommand::SignIn { email, password, response_tx }) => {
                            let result = self.sign_in(&email, &password).await;
                            self.skip_queued_changes();
                            let _ = response_tx.send(result).await;
                        }
                        Some(SessionCommand::SignOut(response_tx)) => {
                            let result = self.sign_out().await;
                            self.skip_queued_changes();
                            let _ = response_tx.send(result).await;
                        }
                        Some(SessionCommand::Shutdown) | None => {
                            info!("Session actor shutting down");
                            break;
                        }
                    }
                }
                change = next_change(&mut self.changes) => {
                    match change {
                        Ok(change) => self.apply_change(change),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Session actor missed {} auth changes", skipped);
                        }
                        Err(RecvError::Closed) => {
                            warn!("Auth change feed closed");
                            self.changes = None;
                        }
                    }
                }
            }
        }

        // Dropping the receiver ends the subscription
        self.changes = None;
        info!("Session actor shut down");
    }

    /// Resolve the startup state from whatever session the backend already holds
    async fn probe(&mut self) {
        let state = match self.auth.current_user().await {
            Ok(Some(user)) => SessionState::Authenticated(user.into()),
            Ok(None) => SessionState::Anonymous,
            Err(e) => {
                error!("Session probe failed: {}", e);
                SessionState::Anonymous
            }
        };
        self.set_state(state);
    }

    async fn sign_up(&mut self, email: &str, password: &str) -> AppResult<SignUpOutcome> {
        info!("Sign-up attempt");
        self.set_in_progress(true);
        let result = self.auth.sign_up(email, password).await;
        self.set_in_progress(false);

        match result? {
            SignUpResponse::Session(session) => {
                let user = SessionUser::from(session.user);
                self.set_state(SessionState::Authenticated(user.clone()));
                Ok(SignUpOutcome {
                    user,
                    confirmation_required: false,
                })
            }
            SignUpResponse::User(user) => {
                info!("Sign-up awaits email confirmation");
                Ok(SignUpOutcome {
                    user: user.into(),
                    confirmation_required: true,
                })
            }
        }
    }

    async fn sign_in(&mut self, email: &str, password: &str) -> AppResult<SessionUser> {
        info!("Sign-in attempt");
        self.set_in_progress(true);
        let result = self.auth.sign_in(email, password).await;
        self.set_in_progress(false);

        let user = SessionUser::from(result?.user);
        self.set_state(SessionState::Authenticated(user.clone()));
        Ok(user)
    }

    async fn sign_out(&mut self) -> AppResult<()> {
        self.set_in_progress(true);
        let result = self.auth.sign_out().await;
        self.set_in_progress(false);

        result?;
        self.set_state(SessionState::Anonymous);
        Ok(())
    }

    /// Changes queued while an explicit call ran are older than its result
    fn skip_queued_changes(&mut self) {
        let Some(changes) = self.changes.as_mut() else {
            return;
        };
        loop {
            match changes.try_recv() {
                Ok(change) => debug!("Skipping queued auth change: {}", change_label(&change)),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Closed) => {
                    self.changes = None;
                    break;
                }
            }
        }
    }

    fn apply_change(&mut self, change: AuthChange) {
        match change {
            AuthChange::SignedIn(user) | AuthChange::TokenRefreshed(user) => {
                self.set_state(SessionState::Authenticated(user.into()));
            }
            AuthChange::SignedOut => self.set_state(SessionState::Anonymous),
        }
    }

    fn set_state(&self, state: SessionState) {
        self.state_tx.send_if_modified(|snapshot| {
            if snapshot.state == state {
                return false;
            }
            info!("Session state: {} -> {}", label(&snapshot.state), label(&state));
            snapshot.state = state;
            true
        });
    }

    fn set_in_progress(&self, in_progress: bool) {
        self.state_tx.send_modify(|snapshot| snapshot.in_progress = in_progress);
    }
}

/// Next auth change, or never once the feed is gone
async fn next_change(
    changes: &mut Option<broadcast::Receiver<AuthChange>>,
) -> Result<AuthChange, RecvError> {
    match changes {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// State name for logs; the email stays out of them
fn label(state: &SessionState) -> &'static str {
    match state {
        SessionState::Unknown => "unknown",
        SessionState::Anonymous => "anonymous",
        SessionState::Authenticated(_) => "authenticated",
    }
}

fn change_label(change: &AuthChange) -> &'static str {
    match change {
        AuthChange::SignedIn(_) => "signed in",
        AuthChange::TokenRefreshed(_) => "token refreshed",
        AuthChange::SignedOut => "signed out",
    }
}
