// src/dashboard/generation.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::GenerationType;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }
}

/// How a YouTube source is used: borrow its style, or redraw its thumbnail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GenerationOption {
    #[default]
    Style,
    Recreate,
}

impl GenerationOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationOption::Style => "style",
            GenerationOption::Recreate => "recreate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationMode {
    Title {
        prompt: String,
    },
    Image {
        prompt: String,
        #[serde(default)]
        reference_image_url: Option<String>,
    },
    Youtube {
        youtube_url: String,
        #[serde(default)]
        video_title: String,
        #[serde(default)]
        option: GenerationOption,
        #[serde(default)]
        reference_image_url: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema)]
pub struct GenerationRequest {
    pub mode: GenerationMode,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
}

impl GenerationRequest {
    pub fn generation_type(&self) -> GenerationType {
        match self.mode {
            GenerationMode::Title { .. } => GenerationType::TextToThumbnail,
            GenerationMode::Image { .. } => GenerationType::ImageToThumbnail,
            GenerationMode::Youtube { .. } => GenerationType::YoutubeToThumbnail,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match &self.mode {
            GenerationMode::Title { prompt } if prompt.trim().is_empty() => {
                Err("Please enter a prompt".to_string())
            }
            GenerationMode::Image { prompt, .. } if prompt.trim().is_empty() => {
                Err("Please describe what you want in the image".to_string())
            }
            GenerationMode::Youtube { youtube_url, .. } if youtube_video_id(youtube_url).is_none() => {
                Err("Please enter a valid YouTube URL".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Body for `POST /api/generate-thumbnail`.
    pub fn to_body(&self, user_id: Uuid) -> serde_json::Value {
        let generation_type = self.generation_type().as_str();
        let aspect_ratio = self.aspect_ratio.as_str();
        match &self.mode {
            GenerationMode::Title { prompt } => json!({
                "userId": user_id,
                "generationType": generation_type,
                "prompt": prompt.trim(),
                "aspectRatio": aspect_ratio,
            }),
            GenerationMode::Image {
                prompt,
                reference_image_url,
            } => json!({
                "userId": user_id,
                "generationType": generation_type,
                "prompt": prompt.trim(),
                "aspectRatio": aspect_ratio,
                "referenceImageUrl": reference_image_url,
            }),
            GenerationMode::Youtube {
                youtube_url,
                video_title,
                option,
                reference_image_url,
            } => json!({
                "userId": user_id,
                "generationType": generation_type,
                "youtubeUrl": youtube_url.trim(),
                "videoTitle": video_title.trim(),
                "aspectRatio": aspect_ratio,
                "generationOption": option.as_str(),
                "referenceImageUrl": reference_image_url,
            }),
        }
    }
}

fn youtube_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?:https?://)?(?:www\.)?(?:youtube\.com/(?:watch\?v=|embed/)|youtu\.be/)([a-zA-Z0-9_-]{11})",
        )
        .expect("static youtube pattern")
    })
}

pub fn youtube_video_id(url: &str) -> Option<&str> {
    youtube_pattern()
        .captures(url.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

pub fn youtube_preview_url(url: &str) -> Option<String> {
    youtube_video_id(url).map(|id| format!("https://img.youtube.com/vi/{id}/maxresdefault.jpg"))
}

/// Held while a submission is in flight; releases the slot when dropped.
pub struct SubmitGate<'a>(&'a AtomicBool);

impl<'a> SubmitGate<'a> {
    pub fn try_begin(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SubmitGate(flag))
    }
}

impl Drop for SubmitGate<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn youtube_ids_from_watch_embed_and_short_links() {
        assert_eq!(youtube_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), Some("dQw4w9WgXcQ"));
        assert_eq!(youtube_video_id("youtube.com/embed/dQw4w9WgXcQ"), Some("dQw4w9WgXcQ"));
        assert_eq!(youtube_video_id("https://youtu.be/dQw4w9WgXcQ?t=10"), Some("dQw4w9WgXcQ"));
        assert_eq!(youtube_video_id("https://youtu.be/short"), None);
        assert_eq!(youtube_video_id("https://vimeo.com/123456"), None);
    }

    #[test]
    fn image_body_carries_optional_reference() {
        let user = Uuid::nil();
        let request = GenerationRequest {
            mode: GenerationMode::Image {
                prompt: "me, surprised".to_string(),
                reference_image_url: None,
            },
            aspect_ratio: AspectRatio::Portrait,
        };
        assert_eq!(
            request.to_body(user),
            json!({
                "userId": user,
                "generationType": "image_to_thumbnail",
                "prompt": "me, surprised",
                "aspectRatio": "9:16",
                "referenceImageUrl": null
            })
        );
    }

    #[test]
    fn request_deserializes_from_tagged_mode() {
        let request: GenerationRequest = serde_json::from_value(json!({
            "mode": { "type": "youtube", "youtube_url": "https://youtu.be/dQw4w9WgXcQ" }
        }))
        .unwrap();
        assert_eq!(request.aspect_ratio, AspectRatio::Landscape);
        assert_eq!(request.generation_type(), GenerationType::YoutubeToThumbnail);
        assert!(request.validate().is_ok());
        assert_eq!(request.to_body(Uuid::nil())["generationOption"], "style");
    }

    #[test]
    fn blank_prompt_is_rejected() {
        let request = GenerationRequest {
            mode: GenerationMode::Title { prompt: "   ".to_string() },
            aspect_ratio: AspectRatio::default(),
        };
        assert_eq!(request.validate().unwrap_err(), "Please enter a prompt");
    }

    #[test]
    fn gate_admits_one_holder_at_a_time() {
        let flag = AtomicBool::new(false);
        let gate = SubmitGate::try_begin(&flag).unwrap();
        assert!(SubmitGate::try_begin(&flag).is_none());
        drop(gate);
        assert!(SubmitGate::try_begin(&flag).is_some());
    }
}
