// src/profile.rs

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::backend::api::ApiClient;
use crate::error::BackendError;
use crate::models::Profile;
use crate::session::SessionProvider;

#[derive(Debug, Clone)]
pub struct ProfileState {
    pub profile: Option<Profile>,
    pub loading: bool,
}

impl Default for ProfileState {
    fn default() -> Self {
        Self {
            profile: None,
            loading: true,
        }
    }
}

/// Owns the signed-in user's profile record (credits, referral code).
pub struct ProfileProvider {
    api: Arc<ApiClient>,
    session: Arc<SessionProvider>,
    state: watch::Sender<ProfileState>,
    latest_request: AtomicU64,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl ProfileProvider {
    pub fn new(api: Arc<ApiClient>, session: Arc<SessionProvider>) -> Self {
        let (state, _) = watch::channel(ProfileState::default());
        Self {
            api,
            session,
            state,
            latest_request: AtomicU64::new(0),
            watcher: Mutex::new(None),
        }
    }

    pub fn current(&self) -> ProfileState {
        self.state.borrow().clone()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.state.borrow().profile.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProfileState> {
        self.state.subscribe()
    }

    /// Whether the last fetched balance covers `cost`.
    ///
    /// This only decides what the UI offers. It is never an authorization
    /// check: the backend validates and deducts credits itself, and the local
    /// balance may be stale.
    pub fn has_enough_credits(&self, cost: i64) -> bool {
        self.state
            .borrow()
            .profile
            .as_ref()
            .map(|p| p.credits >= cost)
            .unwrap_or(false)
    }

    /// Fetches the profile of the current identity. Without an identity the
    /// held profile is cleared. A response that was overtaken by a newer
    /// request, or that belongs to a user who has since signed out, is dropped.
    pub async fn refresh(&self) -> Result<Option<Profile>, BackendError> {
        let Some(identity) = self.session.identity() else {
            self.state.send_modify(|state| {
                state.profile = None;
                state.loading = false;
            });
            return Ok(None);
        };

        let ticket = self.latest_request.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self
            .api
            .get_profile(identity.user_id, &identity.access_token)
            .await;
        let still_current = ticket == self.latest_request.load(Ordering::SeqCst)
            && self.current_user() == Some(identity.user_id);

        match result {
            Ok(profile) => {
                if still_current {
                    let fetched = profile.clone();
                    self.state.send_modify(|state| {
                        state.profile = Some(fetched);
                        state.loading = false;
                    });
                } else {
                    log::debug!("dropping superseded profile response user={}", identity.user_id);
                }
                Ok(Some(profile))
            }
            Err(e) => {
                log::error!("error fetching profile user={}: {e}", identity.user_id);
                if still_current {
                    self.state.send_modify(|state| state.loading = false);
                }
                Err(e)
            }
        }
    }

    /// Replaces the held balance with a value pushed by the backend.
    /// Returns false when no profile is held.
    pub fn apply_balance(&self, credits: i64) -> bool {
        let mut held = false;
        self.state.send_if_modified(|state| match state.profile.as_mut() {
            Some(profile) => {
                held = true;
                let changed = profile.credits != credits;
                profile.credits = credits;
                changed
            }
            None => false,
        });
        held
    }

    /// Follows the session: refreshes on sign-in or user switch, clears on sign-out.
    pub fn start(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let mut session = self.session.subscribe();
        let handle = tokio::spawn(async move {
            let mut last_user: Option<Option<Uuid>> = None;
            loop {
                let (loading, user) = {
                    let state = session.borrow_and_update();
                    (state.loading, state.identity.as_ref().map(|i| i.user_id))
                };
                if !loading && last_user != Some(user) {
                    last_user = Some(user);
                    // Errors are logged inside refresh.
                    let _ = this.refresh().await;
                }
                if session.changed().await.is_err() {
                    break;
                }
            }
        });

        if let Some(old) = self
            .watcher
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .replace(handle)
        {
            old.abort();
        }
    }

    pub fn stop(&self) {
        if let Some(handle) = self.watcher.lock().unwrap_or_else(|p| p.into_inner()).take() {
            handle.abort();
        }
    }

    fn current_user(&self) -> Option<Uuid> {
        self.session.identity().map(|i| i.user_id)
    }
}
