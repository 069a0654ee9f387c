// src/main.rs
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use dotenvy::dotenv;
use std::time::Duration;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use thumbnails_labs::backend::realtime::install_crypto_provider;
use thumbnails_labs::config::Config;
use thumbnails_labs::{api, docs, AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    install_crypto_provider();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            log::error!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    let bind = (config.bind_addr.clone(), config.port);
    let refresh_every = Duration::from_secs(config.token_refresh_check_secs);

    let state = AppState::new(config);
    state.start(Some(refresh_every)).await;

    let data = web::Data::new(state.clone());
    log::info!("listening on {}:{}", bind.0, bind.1);

    let result = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(Logger::default())
            .service(
                SwaggerUi::new("/docs/{_:.*}")
                    .url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
            )
            .configure(api::configure)
    })
    .bind(bind)?
    .run()
    .await;

    state.stop();
    result
}
