// src/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    pub id: Uuid,
    pub credits: i64,
    #[serde(default)]
    pub referral_code: Option<String>,
    #[serde(default)]
    pub referred_by: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GenerationType {
    TextToThumbnail,
    ImageToThumbnail,
    YoutubeToThumbnail,
}

impl GenerationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationType::TextToThumbnail => "text_to_thumbnail",
            GenerationType::ImageToThumbnail => "image_to_thumbnail",
            GenerationType::YoutubeToThumbnail => "youtube_to_thumbnail",
        }
    }

    /// Price shown next to each mode in the dashboard.
    pub fn display_cost(&self) -> i64 {
        match self {
            GenerationType::TextToThumbnail => 10,
            GenerationType::ImageToThumbnail | GenerationType::YoutubeToThumbnail => 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Generation {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub generation_type: GenerationType,
    pub output_image_url: String,
    #[serde(default)]
    pub credit_cost: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserImage {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub image_url: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Subscription {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub plan_name: String,
    pub is_active: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub stripe_payment_id: Option<String>,
    pub amount: f64,
    pub credits_added: i64,
    pub created_at: Option<DateTime<Utc>>,
}
