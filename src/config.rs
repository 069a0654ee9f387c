// src/config.rs

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct Config {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    /// Realtime socket host; the hosted service URL unless overridden.
    pub realtime_url: String,
    pub api_url: String,
    pub app_base_url: String,
    pub bind_addr: String,
    pub port: u16,
    pub session_file: Option<PathBuf>,
    pub oauth_provider: String,
    pub history_page_size: usize,
    pub history_capacity: usize,
    pub checkout_default_country: String,
    pub token_refresh_check_secs: u64,
}

impl Config {
    /// Reads the process environment (after `.env`, see `main`).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let supabase_url = required(&lookup, "SUPABASE_URL")?;
        let supabase_anon_key = required(&lookup, "SUPABASE_ANON_KEY")?;
        let api_url = required(&lookup, "API_URL")?;

        let realtime_url = lookup("SUPABASE_REALTIME_URL")
            .map(|v| trim_url(&v))
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| trim_url(&supabase_url));

        Ok(Self {
            realtime_url,
            supabase_url: trim_url(&supabase_url),
            supabase_anon_key,
            api_url: trim_url(&api_url),
            app_base_url: trim_url(&optional(&lookup, "APP_BASE_URL", "http://localhost:8065")),
            bind_addr: optional(&lookup, "BIND_ADDR", "0.0.0.0"),
            port: parsed(&lookup, "PORT", 8065)?,
            session_file: lookup("SESSION_FILE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            oauth_provider: optional(&lookup, "OAUTH_PROVIDER", "google"),
            history_page_size: parsed(&lookup, "HISTORY_PAGE_SIZE", 12)?,
            history_capacity: parsed(&lookup, "HISTORY_CAPACITY", 100)?,
            checkout_default_country: optional(&lookup, "CHECKOUT_DEFAULT_COUNTRY", "IN"),
            token_refresh_check_secs: parsed(&lookup, "TOKEN_REFRESH_CHECK_SECS", 30)?,
        })
    }

    pub fn auth_callback_url(&self) -> String {
        format!("{}/auth/callback", self.app_base_url)
    }
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn optional<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => v,
        _ => {
            log::info!("{key} not set, using default: {default}");
            default.to_string()
        }
    }
}

fn parsed<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => v.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: v.clone(),
            reason: e.to_string(),
        }),
        _ => Ok(default),
    }
}

fn trim_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
