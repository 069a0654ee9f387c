use actix_web::http::{header, StatusCode};
use actix_web::test::TestRequest;
use actix_web::{test, web, App};
use httpmock::Method::{GET, POST};
use serde_json::json;

use thumbnails_labs::api;
use thumbnails_labs::dashboard::plans::{BillingInterval, PlanKind};
use thumbnails_labs::error::AppError;

mod support;

async fn mock_full_name<'a>(app: &'a support::TestApp, full_name: Option<&str>) -> httpmock::Mock<'a> {
    let user_id = app.user_id;
    let full_name = full_name.map(str::to_string);
    app.server
        .mock_async(move |when, then| {
            when.method(GET)
                .path("/rest/v1/profiles")
                .query_param("select", "full_name")
                .query_param("id", format!("eq.{user_id}"));
            then.status(200).json_body(json!([{ "full_name": full_name }]));
        })
        .await
}

#[actix_web::test]
async fn checkout_posts_identity_and_plan_and_returns_url() {
    let app = support::signed_in().await;
    let user_id = app.user_id;
    mock_full_name(&app, Some("Jane Creator")).await;

    let session = app
        .server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/stripe/create-checkout-session")
                .json_body(json!({
                    "priceType": "pro-yearly",
                    "userId": user_id,
                    "userEmail": support::TEST_EMAIL,
                    "customerDetails": {
                        "name": "Jane Creator",
                        "email": support::TEST_EMAIL,
                        "address": {
                            "country": "IN",
                            "line1": "",
                            "city": "",
                            "state": "",
                            "postal_code": ""
                        }
                    }
                }));
            then.status(200).json_body(json!({
                "sessionId": "cs_test_123",
                "url": "https://checkout.example.com/pay/cs_test_123"
            }));
        })
        .await;

    let identity = app.state.session.identity().expect("identity");
    let result = app
        .state
        .checkout
        .initiate(&identity, PlanKind::Pro, BillingInterval::Yearly)
        .await
        .expect("checkout session");

    session.assert_async().await;
    assert_eq!(result.session_id, "cs_test_123");
    assert_eq!(result.url, "https://checkout.example.com/pay/cs_test_123");
}

#[actix_web::test]
async fn credit_pack_ignores_interval_and_name_falls_back_to_email() {
    let app = support::signed_in().await;
    mock_full_name(&app, None).await;

    let session = app
        .server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/stripe/create-checkout-session")
                .json_body_partial(
                    r#"{ "priceType": "credit-pack", "customerDetails": { "name": "creator" } }"#,
                );
            then.status(200).json_body(json!({
                "sessionId": "cs_pack",
                "url": "https://checkout.example.com/pay/cs_pack"
            }));
        })
        .await;

    let identity = app.state.session.identity().expect("identity");
    app.state
        .checkout
        .initiate(&identity, PlanKind::CreditPack, BillingInterval::Monthly)
        .await
        .expect("checkout session");

    session.assert_async().await;
}

#[actix_web::test]
async fn checkout_error_prefers_details_over_error() {
    let app = support::signed_in().await;
    mock_full_name(&app, Some("Jane")).await;

    app.server
        .mock_async(|when, then| {
            when.method(POST).path("/api/stripe/create-checkout-session");
            then.status(400).json_body(json!({
                "error": "Stripe error",
                "details": "No such price: basic-monthly"
            }));
        })
        .await;

    let identity = app.state.session.identity().expect("identity");
    let err = app
        .state
        .checkout
        .initiate(&identity, PlanKind::Basic, BillingInterval::Monthly)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Failed(ref m) if m == "No such price: basic-monthly"));
}

#[actix_web::test]
async fn checkout_without_message_uses_fallback_text() {
    let app = support::signed_in().await;
    mock_full_name(&app, Some("Jane")).await;

    app.server
        .mock_async(|when, then| {
            when.method(POST).path("/api/stripe/create-checkout-session");
            then.status(500);
        })
        .await;

    let identity = app.state.session.identity().expect("identity");
    let err = app
        .state
        .checkout
        .initiate(&identity, PlanKind::Basic, BillingInterval::Yearly)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Failed to create checkout session");
}

#[actix_web::test]
async fn checkout_redirect_sends_browser_to_payment_page() {
    let app = support::signed_in().await;
    mock_full_name(&app, Some("Jane")).await;
    app.server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/stripe/create-checkout-session")
                .json_body_partial(r#"{ "priceType": "basic-monthly" }"#);
            then.status(200).json_body(json!({
                "sessionId": "cs_redirect",
                "url": "https://checkout.example.com/pay/cs_redirect"
            }));
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
            .uri("/dashboard/checkout?plan=basic&interval=monthly")
            .to_request(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        resp.headers().get(header::LOCATION).unwrap(),
        "https://checkout.example.com/pay/cs_redirect"
    );
}

#[actix_web::test]
async fn subscription_view_lists_active_plan_and_catalog() {
    let app = support::signed_in().await;
    let user_id = app.user_id;
    support::mock_profile(&app, 40).await;
    app.state.profile.refresh().await.expect("profile");

    app.server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/subscriptions")
                .query_param("is_active", "eq.true");
            then.status(200).json_body(json!([{
                "id": uuid::Uuid::new_v4(),
                "profile_id": user_id,
                "plan_name": "basic-monthly",
                "is_active": true,
                "start_date": "2024-05-01T00:00:00Z",
                "end_date": "2024-06-01T00:00:00Z",
                "created_at": "2024-05-01T00:00:00Z"
            }]));
        })
        .await;
    // Payments failing only empties that section.
    app.server
        .mock_async(|when, then| {
            when.method(GET).path("/rest/v1/payments");
            then.status(500);
        })
        .await;

    let view = app
        .state
        .dashboard
        .subscription_view(BillingInterval::Monthly)
        .await
        .expect("view");

    assert_eq!(view.credits, Some(40));
    let active = view.active.expect("active plan");
    assert_eq!(active.plan_type, "Basic");
    assert_eq!(active.billing_cycle, "Monthly");
    assert_eq!(active.max_credits, 250);
    assert!(active.low_credits);
    assert_eq!(view.plans.len(), 3);
    assert_eq!(view.plans[0].price, 15);
    assert!(view.recent_payments.is_empty());
}
