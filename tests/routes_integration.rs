use actix_web::http::{header, StatusCode};
use actix_web::test::TestRequest;
use actix_web::{test, web, App};
use httpmock::Method::{GET, POST};
use serde_json::json;
use uuid::Uuid;

use thumbnails_labs::api;

mod support;

fn location(resp: &actix_web::dev::ServiceResponse) -> String {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[actix_web::test]
async fn dashboard_redirects_to_login_without_identity() {
    let app = support::signed_out().await;
    let service = test::init_service(
        App::new()
            .app_data(web::Data::new(app.state.clone()))
            .configure(api::configure),
    )
    .await;

    let resp = test::call_service(&service, TestRequest::get().uri("/dashboard").to_request()).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");

    let resp = test::call_service(&service, TestRequest::get().uri("/login").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(&service, TestRequest::get().uri("/api/dashboard").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "not signed in");
}

#[actix_web::test]
async fn auth_pages_redirect_to_dashboard_with_identity() {
    let app = support::signed_in().await;
    let service = test::init_service(
        App::new()
            .app_data(web::Data::new(app.state.clone()))
            .configure(api::configure),
    )
    .await;

    for uri in ["/login", "/signup"] {
        let resp = test::call_service(&service, TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location(&resp), "/dashboard");
    }

    let resp = test::call_service(&service, TestRequest::get().uri("/dashboard").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(&service, TestRequest::get().uri("/api/dashboard").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["email"], support::TEST_EMAIL);
    assert_eq!(body["generating"], false);
    assert_eq!(body["modes"][0]["cost"], 10);
    assert_eq!(body["modes"][1]["cost"], 20);
}

#[actix_web::test]
async fn oauth_round_trip_signs_in_and_logout_signs_out() {
    let app = support::signed_out().await;
    let user_id = Uuid::new_v4();

    let token = app
        .server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/v1/token")
                .query_param("grant_type", "pkce")
                .json_body_partial(r#"{ "auth_code": "code-123" }"#);
            then.status(200).json_body(json!({
                "access_token": "fresh-access",
                "refresh_token": "fresh-refresh",
                "expires_in": 3600,
                "user": { "id": user_id, "email": "new@example.com" }
            }));
        })
        .await;
    let logout = app
        .server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/v1/logout")
                .header("Authorization", "Bearer fresh-access");
            then.status(204);
        })
        .await;

    let service = test::init_service(
        App::new()
            .app_data(web::Data::new(app.state.clone()))
            .configure(api::configure),
    )
    .await;

    let resp = test::call_service(&service, TestRequest::get().uri("/auth/google").to_request()).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let authorize = location(&resp);
    assert!(authorize.starts_with(&format!("{}/auth/v1/authorize?provider=google", app.server.url(""))));
    assert!(authorize.contains("code_challenge_method=s256"));

    let resp = test::call_service(
        &service,
        TestRequest::get().uri("/auth/callback?code=code-123").to_request(),
    )
    .await;
    token.assert_async().await;
    assert_eq!(location(&resp), "/dashboard");
    assert_eq!(app.state.session.identity().map(|i| i.user_id), Some(user_id));

    let resp = test::call_service(&service, TestRequest::post().uri("/auth/logout").to_request()).await;
    logout.assert_async().await;
    assert_eq!(location(&resp), "/login");
    assert!(app.state.session.identity().is_none());
}

#[actix_web::test]
async fn callback_without_started_sign_in_shows_login_with_error() {
    let app = support::signed_out().await;
    let service = test::init_service(
        App::new()
            .app_data(web::Data::new(app.state.clone()))
            .configure(api::configure),
    )
    .await;

    let resp = test::call_service(
        &service,
        TestRequest::get().uri("/auth/callback?code=stray").to_request(),
    )
    .await;
    assert_eq!(location(&resp), "/login");
    assert!(app.state.session.current().error.is_some());

    let resp = test::call_service(&service, TestRequest::get().uri("/login").to_request()).await;
    let body = test::read_body(resp).await;
    assert!(String::from_utf8_lossy(&body).contains("Failed to sign in with google"));
}

#[actix_web::test]
async fn history_endpoint_pages_and_filters() {
    let app = support::signed_in().await;
    let user_id = app.user_id;
    let generation_id = Uuid::new_v4();

    let rows = app
        .server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/generations")
                .query_param("profile_id", format!("eq.{user_id}"))
                .query_param("generation_type", "eq.youtube_to_thumbnail")
                .query_param("order", "created_at.desc")
                .query_param("limit", "12")
                .query_param("offset", "24");
            then.status(200).json_body(json!([support::generation_json(
                generation_id,
                user_id,
                "youtube_to_thumbnail"
            )]));
        })
        .await;

    let service = test::init_service(
        App::new()
            .app_data(web::Data::new(app.state.clone()))
            .configure(api::configure),
    )
    .await;

    let resp = test::call_service(
        &service,
        TestRequest::get()
            .uri("/api/dashboard/history?page=2&filter=youtube")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    rows.assert_async().await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["page"], 2);
    assert_eq!(body["items"][0]["id"], generation_id.to_string());
    // Only the unfiltered first page feeds the recent list.
    assert!(app.state.dashboard.recent(10).is_empty());
}

#[actix_web::test]
async fn youtube_preview_resolves_video_thumbnail() {
    let app = support::signed_in().await;
    let service = test::init_service(
        App::new()
            .app_data(web::Data::new(app.state.clone()))
            .configure(api::configure),
    )
    .await;

    let resp = test::call_service(
        &service,
        TestRequest::get()
            .uri("/api/dashboard/youtube-preview?url=https%3A%2F%2Fyoutu.be%2FdQw4w9WgXcQ")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["video_id"], "dQw4w9WgXcQ");
    assert_eq!(
        body["preview_url"],
        "https://img.youtube.com/vi/dQw4w9WgXcQ/maxresdefault.jpg"
    );

    let resp = test::call_service(
        &service,
        TestRequest::get()
            .uri("/api/dashboard/youtube-preview?url=not-a-video")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn generate_endpoint_returns_the_new_generation() {
    let app = support::signed_in().await;
    let user_id = app.user_id;
    let generation_id = Uuid::new_v4();
    support::mock_profile(&app, 30).await;
    app.server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/generate-thumbnail")
                .json_body_partial(r#"{ "generationType": "youtube_to_thumbnail", "generationOption": "recreate", "aspectRatio": "9:16" }"#);
            then.status(200)
                .json_body(support::generation_json(generation_id, user_id, "youtube_to_thumbnail"));
        })
        .await;

    let service = test::init_service(
        App::new()
            .app_data(web::Data::new(app.state.clone()))
            .configure(api::configure),
    )
    .await;

    let resp = test::call_service(
        &service,
        TestRequest::post()
            .uri("/api/dashboard/generate")
            .set_json(json!({
                "mode": {
                    "type": "youtube",
                    "youtube_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
                    "video_title": "Never gonna",
                    "option": "recreate"
                },
                "aspect_ratio": "9:16"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["id"], generation_id.to_string());
    assert_eq!(app.state.dashboard.balance(), Some(30));
}

#[actix_web::test]
async fn history_rejects_page_beyond_addressable_range() {
    let app = support::signed_in().await;
    let rows = app
        .server
        .mock_async(|when, then| {
            when.method(GET).path("/rest/v1/generations");
            then.status(200).json_body(json!([]));
        })
        .await;

    let service = test::init_service(
        App::new()
            .app_data(web::Data::new(app.state.clone()))
            .configure(api::configure),
    )
    .await;

    let resp = test::call_service(
        &service,
        TestRequest::get()
            .uri(&format!("/api/dashboard/history?page={}", usize::MAX))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Page is out of range");
    assert_eq!(rows.hits_async().await, 0);
}

#[actix_web::test]
async fn truncated_upload_is_rejected_and_not_stored() {
    let app = support::signed_in().await;
    let stored = app
        .server
        .mock_async(|when, then| {
            when.method(POST).path_contains("/storage/v1/object/user_images/");
            then.status(200).json_body(json!({ "Key": "user_images/x.png" }));
        })
        .await;

    let service = test::init_service(
        App::new()
            .app_data(web::Data::new(app.state.clone()))
            .configure(api::configure),
    )
    .await;

    // The closing boundary never arrives.
    let body = "--XBOUNDARY\r\n\
        Content-Disposition: form-data; name=\"file\"; filename=\"thumb.png\"\r\n\
        Content-Type: image/png\r\n\r\n\
        PNG-bytes-cut-off-mid";
    let resp = test::call_service(
        &service,
        TestRequest::post()
            .uri("/api/dashboard/images")
            .insert_header((header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY"))
            .set_payload(body)
            .to_request(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Upload failed");
    assert_eq!(stored.hits_async().await, 0);
}
