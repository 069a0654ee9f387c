pub mod auth;
pub mod dashboard;
pub mod pages;

use actix_web::web;

use crate::ws;

/// Routes of the local app. Shared by `main` and the integration tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(pages::home)
        .service(pages::login)
        .service(pages::signup)
        .service(pages::dashboard)
        .service(auth::callback)
        .service(auth::logout)
        .service(auth::sign_in)
        .service(
            web::resource("/dashboard/checkout")
                .wrap(auth::SessionGate)
                .route(web::get().to(dashboard::checkout_redirect)),
        )
        .service(
            web::resource("/ws")
                .wrap(auth::SessionGate)
                .route(web::get().to(ws::dashboard_ws)),
        )
        .service(
            web::scope("/api/dashboard")
                .wrap(auth::SessionGate)
                .service(dashboard::overview)
                .service(dashboard::generate)
                .service(dashboard::history)
                .service(dashboard::list_images)
                .service(dashboard::upload_image)
                .service(dashboard::subscription)
                .service(dashboard::checkout)
                .service(dashboard::youtube_preview),
        );
}
