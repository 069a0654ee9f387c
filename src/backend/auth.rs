// src/backend/auth.rs
//
// Client for the hosted auth service (GoTrue-style REST API under /auth/v1).
// Keeps the current session, persists it to an optional file and pushes every
// state change to subscribers tagged with a sequence number.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::BackendError;

/// Refresh this many seconds before the access token expires.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds.
    pub expires_at: i64,
    pub user: AuthUser,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn expires_within(&self, secs: i64) -> bool {
        self.expires_at - Utc::now().timestamp() <= secs
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

#[derive(Debug, Clone)]
pub struct AuthEvent {
    pub seq: u64,
    pub kind: AuthEventKind,
    pub session: Option<Session>,
}

/// Session as of the given sequence number.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub seq: u64,
    pub session: Option<Session>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl From<TokenResponse> for Session {
    fn from(t: TokenResponse) -> Self {
        let expires_at = t
            .expires_at
            .unwrap_or_else(|| Utc::now().timestamp() + t.expires_in.unwrap_or(3600));
        Session {
            access_token: t.access_token,
            refresh_token: t.refresh_token,
            expires_at,
            user: t.user,
        }
    }
}

#[derive(Default)]
struct AuthState {
    session: Option<Session>,
    seq: u64,
}

pub struct AuthClient {
    client: reqwest::Client,
    base_url: Arc<str>,
    anon_key: Arc<str>,
    store: Option<PathBuf>,
    state: Mutex<AuthState>,
    pending_verifier: Mutex<Option<String>>,
    events: broadcast::Sender<AuthEvent>,
}

impl AuthClient {
    /// `supabase_url` is the project root; a session persisted in `store` is restored.
    pub fn new(supabase_url: &str, anon_key: &str, store: Option<PathBuf>) -> Self {
        let session = store.as_ref().and_then(|path| match load_session(path) {
            Ok(session) => session,
            Err(e) => {
                log::warn!("auth session restore failed path={}: {e}", path.display());
                None
            }
        });

        let (events, _) = broadcast::channel(16);

        Self {
            client: reqwest::Client::new(),
            base_url: Arc::from(format!("{supabase_url}/auth/v1")),
            anon_key: Arc::from(anon_key),
            store,
            state: Mutex::new(AuthState { session, seq: 0 }),
            pending_verifier: Mutex::new(None),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Current session without touching the network.
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock_state();
        SessionSnapshot {
            seq: state.seq,
            session: state.session.clone(),
        }
    }

    /// Current session, refreshed first when the access token is about to expire.
    pub async fn get_session(&self) -> Result<SessionSnapshot, BackendError> {
        let snapshot = self.snapshot();
        match snapshot.session {
            Some(ref s) if s.expires_within(EXPIRY_MARGIN_SECS) => self.refresh().await,
            _ => Ok(snapshot),
        }
    }

    /// Builds the provider authorization URL and remembers the PKCE verifier
    /// for the callback.
    pub fn authorize_url(&self, provider: &str, redirect_to: &str) -> Result<String, BackendError> {
        let verifier = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let challenge = pkce_challenge(&verifier);

        let query = serde_urlencoded::to_string([
            ("provider", provider),
            ("redirect_to", redirect_to),
            ("code_challenge", challenge.as_str()),
            ("code_challenge_method", "s256"),
        ])
        .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        *self
            .pending_verifier
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = Some(verifier);

        Ok(format!("{}/authorize?{query}", self.base_url))
    }

    /// Exchanges the OAuth callback code for a session and announces the sign-in.
    pub async fn exchange_code(&self, code: &str) -> Result<SessionSnapshot, BackendError> {
        let verifier = self
            .pending_verifier
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
            .ok_or_else(|| {
                BackendError::Rejected("sign-in was not started from this app".to_string())
            })?;

        let body = serde_json::json!({ "auth_code": code, "code_verifier": verifier });
        let session = self.token_request("pkce", &body).await?;
        Ok(self.replace(Some(session), AuthEventKind::SignedIn))
    }

    pub async fn refresh(&self) -> Result<SessionSnapshot, BackendError> {
        let refresh_token = match self.snapshot().session {
            Some(s) => s.refresh_token,
            None => return Ok(self.snapshot()),
        };

        let body = serde_json::json!({ "refresh_token": refresh_token });
        match self.token_request("refresh_token", &body).await {
            Ok(session) => Ok(self.replace(Some(session), AuthEventKind::TokenRefreshed)),
            Err(BackendError::Api { status, body }) if status == 400 || status == 401 => {
                log::warn!("auth refresh rejected status={status}, signing out locally");
                self.replace(None, AuthEventKind::SignedOut);
                Err(BackendError::Api { status, body })
            }
            Err(e) => Err(e),
        }
    }

    /// Revokes the session remotely, then forgets it locally.
    pub async fn sign_out(&self) -> Result<SessionSnapshot, BackendError> {
        if let Some(session) = self.snapshot().session {
            let resp = self
                .client
                .post(format!("{}/logout", self.base_url))
                .header("apikey", self.anon_key.as_ref())
                .bearer_auth(&session.access_token)
                .send()
                .await?;

            let status = resp.status();
            // 401/404: the token is already gone server-side.
            if !status.is_success() && status.as_u16() != 401 && status.as_u16() != 404 {
                let body = resp.text().await.unwrap_or_default();
                return Err(BackendError::Api {
                    status: status.as_u16(),
                    body,
                });
            }
        }

        Ok(self.replace(None, AuthEventKind::SignedOut))
    }

    /// Refreshes the token whenever it is close to expiry. Failures are only logged.
    pub async fn run_refresher(self: Arc<Self>, check_every: std::time::Duration) {
        let mut ticker = tokio::time::interval(check_every);
        loop {
            ticker.tick().await;
            let expiring = self
                .snapshot()
                .session
                .map(|s| s.expires_within(EXPIRY_MARGIN_SECS))
                .unwrap_or(false);
            if expiring {
                if let Err(e) = self.refresh().await {
                    log::error!("auth token refresh failed: {e}");
                }
            }
        }
    }

    async fn token_request(
        &self,
        grant_type: &str,
        body: &serde_json::Value,
    ) -> Result<Session, BackendError> {
        let resp = self
            .client
            .post(format!("{}/token", self.base_url))
            .query(&[("grant_type", grant_type)])
            .header("apikey", self.anon_key.as_ref())
            .bearer_auth(self.anon_key.as_ref())
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(BackendError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str::<TokenResponse>(&text)
            .map(Session::from)
            .map_err(|e| BackendError::InvalidResponse(format!("{e}; body={text}")))
    }

    fn replace(&self, session: Option<Session>, kind: AuthEventKind) -> SessionSnapshot {
        let snapshot = {
            let mut state = self.lock_state();
            state.session = session;
            state.seq += 1;
            let snapshot = SessionSnapshot {
                seq: state.seq,
                session: state.session.clone(),
            };
            // No receivers is fine: nobody is listening yet.
            let _ = self.events.send(AuthEvent {
                seq: snapshot.seq,
                kind,
                session: snapshot.session.clone(),
            });
            snapshot
        };

        if let Some(path) = &self.store {
            if let Err(e) = store_session(path, snapshot.session.as_ref()) {
                log::error!("auth session persist failed path={}: {e}", path.display());
            }
        }

        log::info!(
            "auth state changed kind={:?} seq={} user={}",
            kind,
            snapshot.seq,
            snapshot
                .session
                .as_ref()
                .and_then(|s| s.user.email.as_deref())
                .unwrap_or("-")
        );
        snapshot
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

pub fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn load_session(path: &PathBuf) -> Result<Option<Session>, BackendError> {
    match std::fs::read_to_string(path) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| BackendError::Store(e.to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(BackendError::Store(e.to_string())),
    }
}

fn store_session(path: &PathBuf, session: Option<&Session>) -> Result<(), BackendError> {
    match session {
        Some(s) => {
            let raw = serde_json::to_string(s).map_err(|e| BackendError::Store(e.to_string()))?;
            std::fs::write(path, raw).map_err(|e| BackendError::Store(e.to_string()))
        }
        None => match std::fs::remove_file(path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                Err(BackendError::Store(e.to_string()))
            }
            _ => Ok(()),
        },
    }
}
