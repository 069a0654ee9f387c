#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chrono::Utc;
use httpmock::Method::GET;
use httpmock::{Mock, MockServer};
use serde_json::json;
use tempfile::TempDir;
use uuid::Uuid;

use thumbnails_labs::backend::auth::{AuthUser, Session};
use thumbnails_labs::config::Config;
use thumbnails_labs::AppState;

pub const TEST_EMAIL: &str = "creator@example.com";
pub const TEST_TOKEN: &str = "test-access-token";

/// App state wired against one mock server standing in for both the hosted
/// service and the product API.
pub struct TestApp {
    pub server: MockServer,
    pub state: AppState,
    pub user_id: Uuid,
    _dir: TempDir,
}

pub fn test_config(server_url: &str, session_file: Option<PathBuf>) -> Config {
    config_with_realtime(server_url, session_file, None)
}

/// Like `test_config`, with realtime sockets opened against `realtime_url`.
pub fn config_with_realtime(
    server_url: &str,
    session_file: Option<PathBuf>,
    realtime_url: Option<String>,
) -> Config {
    let url = server_url.to_string();
    let session_file = session_file.map(|p| p.display().to_string());
    Config::from_lookup(move |key| match key {
        "SUPABASE_URL" | "API_URL" => Some(url.clone()),
        "SUPABASE_REALTIME_URL" => realtime_url.clone(),
        "SUPABASE_ANON_KEY" => Some("test-anon".to_string()),
        "SESSION_FILE" => session_file.clone(),
        "HISTORY_PAGE_SIZE" => Some("12".to_string()),
        _ => None,
    })
    .expect("test config")
}

pub fn write_session(dir: &Path, user_id: Uuid, email: &str) -> PathBuf {
    let path = dir.join("session.json");
    let session = json!({
        "access_token": TEST_TOKEN,
        "refresh_token": "test-refresh-token",
        "expires_at": Utc::now().timestamp() + 24 * 3600,
        "user": { "id": user_id, "email": email, "user_metadata": {} }
    });
    std::fs::write(&path, session.to_string()).expect("write session file");
    path
}

/// Signed in from a persisted session. Only the session provider is started,
/// so no profile fetch or realtime socket happens behind the test's back.
pub async fn signed_in() -> TestApp {
    signed_in_with_realtime(None).await
}

pub async fn signed_in_with_realtime(realtime_url: Option<String>) -> TestApp {
    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let user_id = Uuid::new_v4();
    let path = write_session(dir.path(), user_id, TEST_EMAIL);

    let state = AppState::new(config_with_realtime(&server.url(""), Some(path), realtime_url));
    state.session.start(None).await;

    TestApp {
        server,
        state,
        user_id,
        _dir: dir,
    }
}

pub async fn signed_out() -> TestApp {
    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("session.json");

    let state = AppState::new(test_config(&server.url(""), Some(path)));
    state.session.start(None).await;

    TestApp {
        server,
        state,
        user_id: Uuid::new_v4(),
        _dir: dir,
    }
}

/// A fresh session for another account, for switching users mid-test.
pub fn session_for(user_id: Uuid, email: &str) -> Session {
    Session {
        access_token: format!("token-{user_id}"),
        refresh_token: "other-refresh-token".to_string(),
        expires_at: Utc::now().timestamp() + 3600,
        user: AuthUser {
            id: user_id,
            email: Some(email.to_string()),
            user_metadata: serde_json::Value::Null,
        },
    }
}

pub fn profile_json(user_id: Uuid, credits: i64) -> serde_json::Value {
    json!({
        "id": user_id,
        "credits": credits,
        "referral_code": "REF123",
        "referred_by": null,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z"
    })
}

pub fn generation_json(id: Uuid, user_id: Uuid, generation_type: &str) -> serde_json::Value {
    json!({
        "id": id,
        "profile_id": user_id,
        "generation_type": generation_type,
        "output_image_url": format!("https://cdn.example.com/{id}.png"),
        "credit_cost": 10,
        "created_at": "2024-05-01T12:00:00Z"
    })
}

pub async fn mock_profile<'a>(app: &'a TestApp, credits: i64) -> Mock<'a> {
    let user_id = app.user_id;
    app.server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/profile/{user_id}"));
            then.status(200).json_body(json!({
                "success": true,
                "profile": profile_json(user_id, credits)
            }));
        })
        .await
}
