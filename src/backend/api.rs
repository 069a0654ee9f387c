// src/backend/api.rs
//
// Client for the product backend API (profile lookup, thumbnail generation,
// checkout session creation).

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::BackendError;
use crate::models::{Generation, Profile};

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    success: bool,
    profile: Option<Profile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerAddress {
    pub country: String,
    pub line1: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerDetails {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<CustomerAddress>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutSessionRequest<'a> {
    pub price_type: &'a str,
    pub user_id: Uuid,
    pub user_email: &'a str,
    pub customer_details: &'a CustomerDetails,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: String,
}

pub const GENERATE_FALLBACK_ERROR: &str = "Failed to generate thumbnail";
pub const CHECKOUT_FALLBACK_ERROR: &str = "Failed to create checkout session";

#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: Arc<str>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: Arc::from(base_url),
        }
    }

    pub async fn get_profile(
        &self,
        user_id: Uuid,
        access_token: &str,
    ) -> Result<Profile, BackendError> {
        let resp = self
            .client
            .get(format!("{}/api/profile/{user_id}", self.base_url))
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(BackendError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ProfileResponse = serde_json::from_str(&body)
            .map_err(|e| BackendError::InvalidResponse(format!("{e}; body={body}")))?;

        match parsed {
            ProfileResponse {
                success: true,
                profile: Some(profile),
            } => Ok(profile),
            _ => Err(BackendError::InvalidResponse(format!(
                "profile lookup unsuccessful body={body}"
            ))),
        }
    }

    /// Posts an already-shaped generation request body.
    pub async fn generate_thumbnail(
        &self,
        body: &serde_json::Value,
        access_token: &str,
    ) -> Result<Generation, BackendError> {
        let resp = self
            .client
            .post(format!("{}/api/generate-thumbnail", self.base_url))
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            log::error!("generate-thumbnail failed status={} body={}", status, text);
            let message = error_message(&text, &["error"])
                .unwrap_or_else(|| GENERATE_FALLBACK_ERROR.to_string());
            return Err(BackendError::Rejected(message));
        }

        serde_json::from_str::<Generation>(&text)
            .map_err(|e| BackendError::InvalidResponse(format!("{e}; body={text}")))
    }

    pub async fn create_checkout_session(
        &self,
        req: &CreateCheckoutSessionRequest<'_>,
    ) -> Result<CheckoutSession, BackendError> {
        let resp = self
            .client
            .post(format!("{}/api/stripe/create-checkout-session", self.base_url))
            .json(req)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            log::error!(
                "create-checkout-session failed status={} body={}",
                status,
                text
            );
            let message = error_message(&text, &["details", "error"])
                .unwrap_or_else(|| CHECKOUT_FALLBACK_ERROR.to_string());
            return Err(BackendError::Rejected(message));
        }

        serde_json::from_str::<CheckoutSession>(&text)
            .map_err(|e| BackendError::InvalidResponse(format!("{e}; body={text}")))
    }
}

/// First non-empty string among `keys` in a JSON error body.
pub fn error_message(body: &str, keys: &[&str]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    keys.iter()
        .filter_map(|k| value.get(*k).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(|s| s.to_string())
}
