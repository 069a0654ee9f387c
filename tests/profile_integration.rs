use httpmock::Method::GET;
use serde_json::json;

use thumbnails_labs::backend::realtime::{ChangeEvent, ChangeKind};

mod support;

fn balance_event(record: serde_json::Value) -> ChangeEvent {
    ChangeEvent {
        topic: "realtime:profile-test".to_string(),
        table: "profiles".to_string(),
        kind: ChangeKind::Update,
        record,
    }
}

#[actix_web::test]
async fn credit_check_is_false_without_a_profile() {
    let app = support::signed_in().await;

    assert!(app.state.profile.profile().is_none());
    assert!(!app.state.profile.has_enough_credits(0));
    assert!(!app.state.profile.has_enough_credits(10));
}

#[actix_web::test]
async fn credit_check_compares_against_fetched_balance() {
    let app = support::signed_in().await;
    let mock = support::mock_profile(&app, 20).await;

    let profile = app
        .state
        .profile
        .refresh()
        .await
        .expect("refresh")
        .expect("profile");

    mock.assert_async().await;
    assert_eq!(profile.credits, 20);
    assert_eq!(profile.referral_code.as_deref(), Some("REF123"));
    assert!(app.state.profile.has_enough_credits(20));
    assert!(!app.state.profile.has_enough_credits(21));
    assert!(!app.state.profile.current().loading);
}

#[actix_web::test]
async fn unsuccessful_lookup_is_an_error_and_keeps_no_profile() {
    let app = support::signed_in().await;
    let user_id = app.user_id;
    app.server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/profile/{user_id}"));
            then.status(200).json_body(json!({ "success": false, "profile": null }));
        })
        .await;

    assert!(app.state.profile.refresh().await.is_err());
    assert!(app.state.profile.profile().is_none());
    assert!(!app.state.profile.current().loading);
}

#[actix_web::test]
async fn refresh_without_identity_clears_profile() {
    let app = support::signed_out().await;

    assert_eq!(app.state.profile.refresh().await.expect("refresh"), None);
    assert!(app.state.profile.profile().is_none());
    assert!(!app.state.profile.current().loading);
}

#[actix_web::test]
async fn pushed_balance_replaces_displayed_balance_exactly() {
    let app = support::signed_in().await;
    support::mock_profile(&app, 100).await;
    app.state.profile.refresh().await.expect("refresh");

    let applied = app
        .state
        .dashboard
        .apply_balance_change(&balance_event(json!({ "id": app.user_id, "credits": 42 })));

    assert_eq!(applied, Some(42));
    assert_eq!(app.state.dashboard.balance(), Some(42));
    assert_eq!(app.state.profile.profile().map(|p| p.credits), Some(42));
}

#[actix_web::test]
async fn pushed_balance_without_integer_credits_is_ignored() {
    let app = support::signed_in().await;
    support::mock_profile(&app, 100).await;
    app.state.profile.refresh().await.expect("refresh");

    for record in [
        json!({ "credits": "42" }),
        json!({ "credits": 4.5 }),
        json!({ "full_name": "x" }),
    ] {
        assert_eq!(app.state.dashboard.apply_balance_change(&balance_event(record)), None);
    }
    assert_eq!(app.state.dashboard.balance(), Some(100));
}

#[actix_web::test]
async fn pushed_balance_is_shown_even_before_the_profile_loads() {
    let app = support::signed_in().await;

    app.state
        .dashboard
        .apply_balance_change(&balance_event(json!({ "credits": 7 })));

    assert_eq!(app.state.dashboard.balance(), Some(7));
    assert!(app.state.profile.profile().is_none());
}
