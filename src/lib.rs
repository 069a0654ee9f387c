pub mod api;
pub mod backend;
pub mod checkout;
pub mod config;
pub mod dashboard;
pub mod docs;
pub mod error;
pub mod models;
pub mod profile;
pub mod session;
pub mod ws;

use std::sync::Arc;
use std::time::Duration;

use actix::Actor;

use backend::api::ApiClient;
use backend::auth::AuthClient;
use backend::database::DatabaseClient;
use backend::realtime::RealtimeClient;
use checkout::CheckoutInitiator;
use config::Config;
use dashboard::Dashboard;
use profile::ProfileProvider;
use session::SessionProvider;
use ws::WsHub;

/// Everything the handlers share. Built once per process.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub session: Arc<SessionProvider>,
    pub profile: Arc<ProfileProvider>,
    pub dashboard: Arc<Dashboard>,
    pub checkout: Arc<CheckoutInitiator>,
    pub ws_hub: actix::Addr<WsHub>,
}

impl AppState {
    /// Wires clients and providers. Needs a running actix system for the hub.
    pub fn new(config: Config) -> Self {
        let auth = Arc::new(AuthClient::new(
            &config.supabase_url,
            &config.supabase_anon_key,
            config.session_file.clone(),
        ));
        let api = Arc::new(ApiClient::new(&config.api_url));
        let db = Arc::new(DatabaseClient::new(
            &config.supabase_url,
            &config.supabase_anon_key,
        ));
        let realtime = RealtimeClient::new(&config.realtime_url, &config.supabase_anon_key);

        let session = Arc::new(SessionProvider::new(
            auth,
            &config.oauth_provider,
            &config.auth_callback_url(),
        ));
        let profile = Arc::new(ProfileProvider::new(Arc::clone(&api), Arc::clone(&session)));

        let ws_hub = WsHub::new().start();
        let dashboard = Arc::new(
            Dashboard::new(
                Arc::clone(&session),
                Arc::clone(&profile),
                Arc::clone(&api),
                Arc::clone(&db),
                realtime,
                config.history_page_size,
                config.history_capacity,
            )
            .with_notifier(ws_hub.clone().recipient()),
        );
        let checkout = Arc::new(CheckoutInitiator::new(
            api,
            db,
            &config.checkout_default_country,
        ));

        Self {
            config,
            session,
            profile,
            dashboard,
            checkout,
            ws_hub,
        }
    }

    /// Loads the existing session, then lets the profile and dashboard follow it.
    pub async fn start(&self, refresh_every: Option<Duration>) {
        self.session.start(refresh_every).await;
        self.profile.start();
        self.dashboard.start();
    }

    pub fn stop(&self) {
        self.dashboard.stop();
        self.profile.stop();
        self.session.stop();
    }
}
