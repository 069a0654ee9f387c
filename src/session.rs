// src/session.rs

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::backend::auth::{AuthClient, Session};
use crate::error::BackendError;

/// The signed-in user as seen by the rest of the app.
#[derive(Clone, PartialEq)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub access_token: String,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl From<&Session> for Identity {
    fn from(session: &Session) -> Self {
        Identity {
            user_id: session.user.id,
            email: session.user.email.clone(),
            access_token: session.access_token.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub identity: Option<Identity>,
    pub loading: bool,
    pub error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            identity: None,
            loading: true,
            error: None,
        }
    }
}

/// Owns the process-wide identity. Built once in `main` and handed to
/// everything that needs to know who is signed in.
pub struct SessionProvider {
    auth: Arc<AuthClient>,
    oauth_provider: String,
    redirect_to: String,
    state: watch::Sender<SessionState>,
    applied_seq: Mutex<Option<u64>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionProvider {
    pub fn new(auth: Arc<AuthClient>, oauth_provider: &str, redirect_to: &str) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            auth,
            oauth_provider: oauth_provider.to_string(),
            redirect_to: redirect_to.to_string(),
            state,
            applied_seq: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.borrow().identity.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Listens for auth events, then loads the existing session once.
    /// With `refresh_every`, also keeps the access token fresh.
    pub async fn start(self: &Arc<Self>, refresh_every: Option<Duration>) {
        // Subscribe before the initial fetch so no transition slips between the two.
        let mut events = self.auth.subscribe();

        match self.auth.get_session().await {
            Ok(snapshot) => {
                match snapshot.session.as_ref() {
                    Some(s) => log::info!(
                        "initial session found user={}",
                        s.user.email.as_deref().unwrap_or("-")
                    ),
                    None => log::info!("no initial session found"),
                }
                self.apply(snapshot.seq, snapshot.session.as_ref());
            }
            Err(e) => {
                log::error!("error getting session: {e}");
                self.fail(e.to_string());
            }
        }

        let this = Arc::clone(self);
        let listener = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        log::info!("auth event kind={:?} seq={}", event.kind, event.seq);
                        this.apply(event.seq, event.session.as_ref());
                    }
                    Err(RecvError::Lagged(n)) => {
                        log::warn!("auth event listener lagged by {n} events, resyncing");
                        let snapshot = this.auth.snapshot();
                        this.apply(snapshot.seq, snapshot.session.as_ref());
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(|p| p.into_inner());
        tasks.push(listener);
        if let Some(every) = refresh_every {
            tasks.push(tokio::spawn(Arc::clone(&self.auth).run_refresher(every)));
        }
    }

    /// Stops listening for auth events.
    pub fn stop(&self) {
        for task in self.tasks.lock().unwrap_or_else(|p| p.into_inner()).drain(..) {
            task.abort();
        }
    }

    /// Applies a session observed at `seq`. Anything not newer than what is
    /// already applied is dropped; returns whether the state changed.
    pub fn apply(&self, seq: u64, session: Option<&Session>) -> bool {
        let mut applied = self.applied_seq.lock().unwrap_or_else(|p| p.into_inner());
        if matches!(*applied, Some(last) if seq <= last) {
            log::debug!("dropping stale session update seq={seq}");
            return false;
        }
        *applied = Some(seq);

        let identity = session.map(Identity::from);
        self.state.send_modify(|state| {
            if identity.is_some() {
                state.error = None;
            }
            state.identity = identity;
            state.loading = false;
        });
        true
    }

    /// URL of the OAuth provider page the browser should be sent to.
    pub fn sign_in_with_provider(&self) -> Result<String, BackendError> {
        self.state.send_modify(|state| state.error = None);
        self.auth
            .authorize_url(&self.oauth_provider, &self.redirect_to)
            .inspect_err(|e| {
                log::error!("error signing in with {}: {e}", self.oauth_provider);
                self.fail(format!("Failed to sign in with {}", self.oauth_provider));
            })
    }

    pub async fn complete_sign_in(&self, code: &str) -> Result<Identity, BackendError> {
        match self.auth.exchange_code(code).await {
            Ok(snapshot) => {
                self.apply(snapshot.seq, snapshot.session.as_ref());
                snapshot
                    .session
                    .as_ref()
                    .map(Identity::from)
                    .ok_or_else(|| BackendError::InvalidResponse("sign-in returned no session".into()))
            }
            Err(e) => {
                log::error!("error completing sign-in: {e}");
                self.fail(format!("Failed to sign in with {}", self.oauth_provider));
                Err(e)
            }
        }
    }

    pub async fn sign_out(&self) -> Result<(), BackendError> {
        self.state.send_modify(|state| state.error = None);
        match self.auth.sign_out().await {
            Ok(snapshot) => {
                self.apply(snapshot.seq, snapshot.session.as_ref());
                Ok(())
            }
            Err(e) => {
                log::error!("error signing out: {e}");
                self.fail(e.to_string());
                Err(e)
            }
        }
    }

    fn fail(&self, message: String) {
        self.state.send_modify(|state| {
            state.loading = false;
            state.error = Some(message);
        });
    }
}
