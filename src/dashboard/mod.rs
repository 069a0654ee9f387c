// src/dashboard/mod.rs
//
// Dashboard state for the signed-in user: generation submission, the recent
// history list, the displayed balance and the two realtime channels feeding them.

pub mod generation;
pub mod history;
pub mod plans;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use actix::Recipient;
use serde::Serialize;
use tokio::task::JoinHandle;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::backend::api::{ApiClient, GENERATE_FALLBACK_ERROR};
use crate::backend::database::{DatabaseClient, Page};
use crate::backend::realtime::{balance_from_change, ChangeEvent, ChannelSpec, RealtimeClient};
use crate::error::{AppError, BackendError};
use crate::models::{Generation, GenerationType, UserImage};
use crate::profile::ProfileProvider;
use crate::session::{Identity, SessionProvider};
use crate::ws::PushEvent;

use generation::{GenerationRequest, SubmitGate};
use history::{History, HistoryFilter};
use plans::{active_plan_view, plan_views, BillingInterval, SubscriptionView};

pub const RECENT_GENERATIONS: usize = 4;
const RECENT_PAYMENTS: usize = 5;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ModeCost {
    pub generation_type: GenerationType,
    pub cost: i64,
    /// Advisory; the backend decides.
    pub can_afford: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardOverview {
    pub email: Option<String>,
    pub credits: Option<i64>,
    pub referral_code: Option<String>,
    pub generating: bool,
    pub last_result: Option<Generation>,
    pub last_error: Option<String>,
    pub recent: Vec<Generation>,
    pub modes: Vec<ModeCost>,
}

#[derive(Debug, Clone, Copy)]
enum LiveTable {
    Balance,
    Generations,
}

struct LiveChannels {
    user_id: Uuid,
    pumps: Vec<JoinHandle<()>>,
}

pub struct Dashboard {
    session: Arc<SessionProvider>,
    profile: Arc<ProfileProvider>,
    api: Arc<ApiClient>,
    db: Arc<DatabaseClient>,
    realtime: RealtimeClient,
    page_size: usize,
    submitting: AtomicBool,
    history: Mutex<History>,
    balance: Mutex<Option<i64>>,
    last_result: Mutex<Option<Generation>>,
    last_error: Mutex<Option<String>>,
    channels: Mutex<Option<LiveChannels>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
    notifier: Option<Recipient<PushEvent>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

impl Dashboard {
    pub fn new(
        session: Arc<SessionProvider>,
        profile: Arc<ProfileProvider>,
        api: Arc<ApiClient>,
        db: Arc<DatabaseClient>,
        realtime: RealtimeClient,
        page_size: usize,
        history_capacity: usize,
    ) -> Self {
        Self {
            session,
            profile,
            api,
            db,
            realtime,
            page_size: page_size.max(1),
            submitting: AtomicBool::new(false),
            history: Mutex::new(History::new(history_capacity)),
            balance: Mutex::new(None),
            last_result: Mutex::new(None),
            last_error: Mutex::new(None),
            channels: Mutex::new(None),
            watcher: Mutex::new(None),
            notifier: None,
        }
    }

    /// Pushes dashboard changes to connected browser tabs.
    pub fn with_notifier(mut self, notifier: Recipient<PushEvent>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn is_generating(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    /// Balance shown to the user: the last pushed or re-fetched value, else the profile's.
    pub fn balance(&self) -> Option<i64> {
        (*lock(&self.balance)).or_else(|| self.profile.profile().map(|p| p.credits))
    }

    pub fn recent(&self, n: usize) -> Vec<Generation> {
        lock(&self.history).recent(n)
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    pub fn last_result(&self) -> Option<Generation> {
        lock(&self.last_result).clone()
    }

    pub fn overview(&self) -> DashboardOverview {
        let identity = self.session.identity();
        let profile = self.profile.profile();
        let credits = self.balance();
        let modes = [
            GenerationType::TextToThumbnail,
            GenerationType::ImageToThumbnail,
            GenerationType::YoutubeToThumbnail,
        ]
        .into_iter()
        .map(|t| ModeCost {
            generation_type: t,
            cost: t.display_cost(),
            can_afford: self.profile.has_enough_credits(t.display_cost()),
        })
        .collect();

        DashboardOverview {
            email: identity.and_then(|i| i.email),
            credits,
            referral_code: profile.and_then(|p| p.referral_code),
            generating: self.is_generating(),
            last_result: self.last_result(),
            last_error: self.last_error(),
            recent: self.recent(RECENT_GENERATIONS),
            modes,
        }
    }

    /// Submits one generation. While another submission is in flight this
    /// returns `InFlight` and leaves every piece of state alone.
    pub async fn submit_generation(
        &self,
        request: &GenerationRequest,
    ) -> Result<Generation, AppError> {
        let Some(_gate) = SubmitGate::try_begin(&self.submitting) else {
            log::warn!("generation submit ignored: already in flight");
            return Err(AppError::InFlight);
        };

        let Some(identity) = self.session.identity() else {
            return Err(self.fail(AppError::Validation(
                "Please log in to generate thumbnails".to_string(),
            )));
        };
        if let Err(message) = request.validate() {
            return Err(self.fail(AppError::Validation(message)));
        }

        *lock(&self.last_error) = None;
        *lock(&self.last_result) = None;

        let body = request.to_body(identity.user_id);
        log::info!(
            "submitting generation user={} type={}",
            identity.user_id,
            request.generation_type().as_str()
        );

        match self.api.generate_thumbnail(&body, &identity.access_token).await {
            Ok(generation) => {
                log::info!("generation created id={} user={}", generation.id, identity.user_id);
                if !self.is_current(identity.user_id) {
                    log::info!(
                        "generation id={} finished after user={} left",
                        generation.id,
                        identity.user_id
                    );
                    return Ok(generation);
                }
                lock(&self.history).prepend(generation.clone());
                *lock(&self.last_result) = Some(generation.clone());
                self.notify(PushEvent::GenerationCreated(generation.clone()));

                // The backend deducted the cost; show whatever it reports now.
                match self.profile.refresh().await {
                    Ok(Some(profile)) if self.is_current(identity.user_id) => {
                        self.set_balance(profile.credits)
                    }
                    Ok(_) => {
                        log::debug!("skipping balance of superseded user={}", identity.user_id);
                    }
                    Err(e) => log::error!("error refreshing profile after generation: {e}"),
                }
                Ok(generation)
            }
            Err(e) => {
                let message = match e {
                    BackendError::Rejected(message) => message,
                    other => {
                        log::error!("error generating thumbnail user={}: {other}", identity.user_id);
                        GENERATE_FALLBACK_ERROR.to_string()
                    }
                };
                Err(self.fail(AppError::Failed(message)))
            }
        }
    }

    /// One page of history, newest first. The unfiltered first page also
    /// replaces the in-memory recent list.
    pub async fn load_history(
        &self,
        page_index: usize,
        filter: HistoryFilter,
    ) -> Result<Vec<Generation>, AppError> {
        let identity = self.session.identity().ok_or(AppError::NotSignedIn)?;
        let page = Page {
            index: page_index,
            size: self.page_size,
        };
        if page.offset().is_none() {
            return Err(AppError::Validation("Page is out of range".to_string()));
        }
        let rows = self
            .db
            .list_generations(
                identity.user_id,
                filter.generation_type(),
                page,
                &identity.access_token,
            )
            .await
            .inspect_err(|e| log::error!("error fetching generations user={}: {e}", identity.user_id))?;

        if page_index == 0 && filter == HistoryFilter::All && self.is_current(identity.user_id) {
            lock(&self.history).replace(rows.clone());
        }
        Ok(rows)
    }

    pub async fn user_images(&self) -> Result<Vec<UserImage>, AppError> {
        let identity = self.session.identity().ok_or(AppError::NotSignedIn)?;
        self.db
            .list_user_images(identity.user_id, &identity.access_token)
            .await
            .inspect_err(|e| log::error!("error fetching user images user={}: {e}", identity.user_id))
            .map_err(AppError::from)
    }

    /// Stores an uploaded reference image as `<timestamp>.<ext>` under the user's folder.
    pub async fn upload_image(
        &self,
        extension: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<UserImage, AppError> {
        let identity = self.session.identity().ok_or(AppError::NotSignedIn)?;
        if bytes.is_empty() {
            return Err(AppError::Validation("Image is empty".to_string()));
        }
        let object_name = format!("{}.{extension}", chrono::Utc::now().timestamp_millis());
        let image = self
            .db
            .upload_user_image(
                identity.user_id,
                &object_name,
                content_type,
                bytes,
                &identity.access_token,
            )
            .await
            .map_err(|e| {
                log::error!("error uploading image user={}: {e}", identity.user_id);
                AppError::Failed("Failed to upload image".to_string())
            })?;
        log::info!("image uploaded user={} url={}", identity.user_id, image.image_url);
        Ok(image)
    }

    /// Fetch failures are logged and shown as empty sections.
    pub async fn subscription_view(
        &self,
        interval: BillingInterval,
    ) -> Result<SubscriptionView, AppError> {
        let identity = self.session.identity().ok_or(AppError::NotSignedIn)?;
        let credits = self.balance();

        let subscription = self
            .db
            .active_subscription(identity.user_id, &identity.access_token)
            .await
            .unwrap_or_else(|e| {
                log::error!("error fetching subscription user={}: {e}", identity.user_id);
                None
            });
        let recent_payments = self
            .db
            .recent_payments(identity.user_id, RECENT_PAYMENTS, &identity.access_token)
            .await
            .unwrap_or_else(|e| {
                log::error!("error fetching payments user={}: {e}", identity.user_id);
                Vec::new()
            });

        Ok(SubscriptionView {
            credits,
            active: subscription
                .as_ref()
                .and_then(|s| active_plan_view(s, credits.unwrap_or_default())),
            interval,
            plans: plan_views(interval),
            recent_payments,
        })
    }

    /// Applies a balance-row change. Only an integer `credits` is taken, and
    /// it replaces the displayed balance as is.
    pub fn apply_balance_change(&self, event: &ChangeEvent) -> Option<i64> {
        let Some(credits) = balance_from_change(event) else {
            log::warn!("ignoring balance change without integer credits topic={}", event.topic);
            return None;
        };
        self.profile.apply_balance(credits);
        self.set_balance(credits);
        Some(credits)
    }

    /// Follows the session: opens channels on sign-in, tears them down on
    /// sign-out or user switch. Must run inside the actix runtime.
    pub fn start(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let mut session = self.session.subscribe();
        let handle = actix_web::rt::spawn(async move {
            let mut last_user: Option<Option<Uuid>> = None;
            loop {
                let (loading, identity) = {
                    let state = session.borrow_and_update();
                    (state.loading, state.identity.clone())
                };
                let user = identity.as_ref().map(|i| i.user_id);
                if !loading && last_user != Some(user) {
                    last_user = Some(user);
                    this.detach();
                    this.reset();
                    this.notify(PushEvent::SessionChanged {
                        signed_in: user.is_some(),
                    });
                    if let Some(identity) = identity {
                        this.attach(&identity);
                        if let Err(e) = this.load_history(0, HistoryFilter::All).await {
                            log::error!("initial history load failed: {e}");
                        }
                    }
                }
                if session.changed().await.is_err() {
                    break;
                }
            }
        });

        if let Some(old) = lock(&self.watcher).replace(handle) {
            old.abort();
        }
    }

    pub fn stop(&self) {
        if let Some(handle) = lock(&self.watcher).take() {
            handle.abort();
        }
        self.detach();
    }

    /// Opens the balance and generation channels for `identity`.
    pub fn attach(self: &Arc<Self>, identity: &Identity) {
        self.detach();
        let id = identity.user_id;
        let specs = [
            (
                LiveTable::Balance,
                ChannelSpec {
                    name: format!("profile-{id}"),
                    table: "profiles".to_string(),
                    filter: format!("id=eq.{id}"),
                },
            ),
            (
                LiveTable::Generations,
                ChannelSpec {
                    name: format!("generations-{id}"),
                    table: "generations".to_string(),
                    filter: format!("profile_id=eq.{id}"),
                },
            ),
        ];

        let pumps = specs
            .into_iter()
            .map(|(table, spec)| {
                let mut channel = self.realtime.subscribe(spec, &identity.access_token);
                let this = Arc::clone(self);
                actix_web::rt::spawn(async move {
                    while let Some(event) = channel.events.recv().await {
                        match table {
                            LiveTable::Balance => {
                                if let Some(credits) = this.apply_balance_change(&event) {
                                    log::info!("balance pushed credits={credits}");
                                }
                            }
                            LiveTable::Generations => this.on_generations_changed().await,
                        }
                    }
                })
            })
            .collect();

        log::info!("realtime channels attached user={id}");
        *lock(&self.channels) = Some(LiveChannels { user_id: id, pumps });
    }

    pub fn detach(&self) {
        if let Some(live) = lock(&self.channels).take() {
            for pump in live.pumps {
                pump.abort();
            }
            log::info!("realtime channels detached user={}", live.user_id);
        }
    }

    pub fn attached_user(&self) -> Option<Uuid> {
        lock(&self.channels).as_ref().map(|c| c.user_id)
    }

    async fn on_generations_changed(&self) {
        match self.load_history(0, HistoryFilter::All).await {
            Ok(_) => {
                let count = lock(&self.history).len();
                self.notify(PushEvent::GenerationsUpdated { count });
            }
            Err(e) => log::error!("error reloading generations: {e}"),
        }
    }

    fn set_balance(&self, credits: i64) {
        *lock(&self.balance) = Some(credits);
        self.notify(PushEvent::CreditsUpdated { credits });
    }

    fn reset(&self) {
        lock(&self.history).clear();
        *lock(&self.balance) = None;
        *lock(&self.last_result) = None;
        *lock(&self.last_error) = None;
    }

    fn fail(&self, error: AppError) -> AppError {
        *lock(&self.last_error) = Some(error.to_string());
        error
    }

    fn is_current(&self, user_id: Uuid) -> bool {
        self.session.identity().map(|i| i.user_id) == Some(user_id)
    }

    fn notify(&self, event: PushEvent) {
        if let Some(notifier) = &self.notifier {
            notifier.do_send(event);
        }
    }
}
