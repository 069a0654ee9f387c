// src/backend/database.rs
//
// Reads and writes against the hosted database REST interface (/rest/v1) and the
// storage bucket for user images. Every call runs as the signed-in user.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::BackendError;
use crate::models::{Generation, GenerationType, Payment, Subscription, UserImage};

pub const USER_IMAGES_BUCKET: &str = "user_images";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub index: usize,
    pub size: usize,
}

impl Page {
    /// Row offset of the page, `None` when it does not fit in `usize`.
    pub fn offset(&self) -> Option<usize> {
        self.index.checked_mul(self.size)
    }
}

#[derive(Debug, Deserialize)]
struct FullNameRow {
    full_name: Option<String>,
}

#[derive(Clone)]
pub struct DatabaseClient {
    client: reqwest::Client,
    base_url: Arc<str>,
    anon_key: Arc<str>,
}

impl DatabaseClient {
    pub fn new(supabase_url: &str, anon_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: Arc::from(supabase_url),
            anon_key: Arc::from(anon_key),
        }
    }

    /// Generations of `profile_id`, newest first.
    pub async fn list_generations(
        &self,
        profile_id: Uuid,
        generation_type: Option<GenerationType>,
        page: Page,
        access_token: &str,
    ) -> Result<Vec<Generation>, BackendError> {
        let offset = page
            .offset()
            .ok_or_else(|| BackendError::InvalidRequest(format!("page {} is out of range", page.index)))?;
        let mut query = vec![
            ("select", "*".to_string()),
            ("profile_id", format!("eq.{profile_id}")),
            ("order", "created_at.desc".to_string()),
            ("limit", page.size.to_string()),
            ("offset", offset.to_string()),
        ];
        if let Some(t) = generation_type {
            query.push(("generation_type", format!("eq.{}", t.as_str())));
        }
        self.select("generations", &query, access_token).await
    }

    pub async fn list_user_images(
        &self,
        profile_id: Uuid,
        access_token: &str,
    ) -> Result<Vec<UserImage>, BackendError> {
        let query = [
            ("select", "*".to_string()),
            ("profile_id", format!("eq.{profile_id}")),
            ("order", "created_at.desc".to_string()),
        ];
        self.select("user_images", &query, access_token).await
    }

    pub async fn active_subscription(
        &self,
        profile_id: Uuid,
        access_token: &str,
    ) -> Result<Option<Subscription>, BackendError> {
        let query = [
            ("select", "*".to_string()),
            ("profile_id", format!("eq.{profile_id}")),
            ("is_active", "eq.true".to_string()),
            ("order", "start_date.desc".to_string()),
            ("limit", "1".to_string()),
        ];
        let rows: Vec<Subscription> = self.select("subscriptions", &query, access_token).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn recent_payments(
        &self,
        profile_id: Uuid,
        limit: usize,
        access_token: &str,
    ) -> Result<Vec<Payment>, BackendError> {
        let query = [
            ("select", "*".to_string()),
            ("profile_id", format!("eq.{profile_id}")),
            ("order", "created_at.desc".to_string()),
            ("limit", limit.to_string()),
        ];
        self.select("payments", &query, access_token).await
    }

    /// `profiles.full_name`, when the user has set one.
    pub async fn full_name(
        &self,
        profile_id: Uuid,
        access_token: &str,
    ) -> Result<Option<String>, BackendError> {
        let query = [
            ("select", "full_name".to_string()),
            ("id", format!("eq.{profile_id}")),
        ];
        let rows: Vec<FullNameRow> = self.select("profiles", &query, access_token).await?;
        match rows.into_iter().next() {
            Some(row) => Ok(row.full_name.filter(|n| !n.trim().is_empty())),
            None => Err(BackendError::InvalidResponse(format!(
                "profile {profile_id} not found"
            ))),
        }
    }

    /// Uploads to the image bucket, then records the public URL in `user_images`.
    pub async fn upload_user_image(
        &self,
        profile_id: Uuid,
        object_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
        access_token: &str,
    ) -> Result<UserImage, BackendError> {
        let object_path = format!("{profile_id}/{object_name}");
        let resp = self
            .client
            .post(format!(
                "{}/storage/v1/object/{USER_IMAGES_BUCKET}/{object_path}",
                self.base_url
            ))
            .header("apikey", self.anon_key.as_ref())
            .bearer_auth(access_token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        check_status(resp).await?;

        let image_url = self.public_object_url(USER_IMAGES_BUCKET, &object_path);

        let resp = self
            .client
            .post(format!("{}/rest/v1/user_images", self.base_url))
            .header("apikey", self.anon_key.as_ref())
            .bearer_auth(access_token)
            .header("Prefer", "return=representation")
            .json(&json!({
                "profile_id": profile_id,
                "image_url": image_url,
                "created_at": chrono::Utc::now(),
            }))
            .send()
            .await?;
        let text = check_status(resp).await?;

        let rows: Vec<UserImage> = serde_json::from_str(&text)
            .map_err(|e| BackendError::InvalidResponse(format!("{e}; body={text}")))?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::InvalidResponse("insert returned no rows".to_string()))
    }

    pub fn public_object_url(&self, bucket: &str, object_path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{bucket}/{object_path}",
            self.base_url
        )
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
        access_token: &str,
    ) -> Result<Vec<T>, BackendError> {
        let resp = self
            .client
            .get(format!("{}/rest/v1/{table}", self.base_url))
            .query(query)
            .header("apikey", self.anon_key.as_ref())
            .bearer_auth(access_token)
            .send()
            .await?;
        let text = check_status(resp).await?;

        serde_json::from_str(&text)
            .map_err(|e| BackendError::InvalidResponse(format!("{table}: {e}; body={text}")))
    }
}

async fn check_status(resp: reqwest::Response) -> Result<String, BackendError> {
    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
        return Err(BackendError::Api {
            status: status.as_u16(),
            body: text,
        });
    }
    Ok(text)
}
