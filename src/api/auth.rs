// src/api/auth.rs

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header;
use actix_web::{get, post, web, Error, HttpMessage, HttpResponse, Responder};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use serde::Deserialize;
use std::task::{Context, Poll};

use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error_description: Option<String>,
}

pub(crate) fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location))
        .finish()
}

/// Sends the browser to the OAuth provider.
#[get("/auth/{provider}")]
pub async fn sign_in(state: web::Data<AppState>, provider: web::Path<String>) -> impl Responder {
    let provider = provider.into_inner();
    if provider != state.config.oauth_provider {
        log::warn!("sign-in requested for unconfigured provider={provider}");
        return HttpResponse::NotFound().json(serde_json::json!({
            "error": format!("unknown provider {provider}")
        }));
    }

    match state.session.sign_in_with_provider() {
        Ok(url) => see_other(&url),
        // The login page shows the error held by the session provider.
        Err(_) => see_other("/login"),
    }
}

#[get("/auth/callback")]
pub async fn callback(state: web::Data<AppState>, query: web::Query<CallbackQuery>) -> impl Responder {
    let query = query.into_inner();
    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        log::error!(
            "oauth callback without code: {}",
            query.error_description.as_deref().unwrap_or("-")
        );
        return see_other("/login");
    };

    match state.session.complete_sign_in(&code).await {
        Ok(identity) => {
            log::info!("signed in user={}", identity.user_id);
            see_other("/dashboard")
        }
        Err(_) => see_other("/login"),
    }
}

#[post("/auth/logout")]
pub async fn logout(state: web::Data<AppState>) -> impl Responder {
    match state.session.sign_out().await {
        Ok(()) => see_other("/login"),
        Err(_) => see_other("/dashboard"),
    }
}

/// Middleware that:
/// - reads the current identity from `SessionProvider`
/// - answers 401 when nobody is signed in
/// - puts the `Identity` into `req.extensions_mut()`
pub struct SessionGate;

impl<S, B> Transform<S, ServiceRequest> for SessionGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = SessionGateInner<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionGateInner { service }))
    }
}

pub struct SessionGateInner<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for SessionGateInner<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let identity = req
            .app_data::<web::Data<AppState>>()
            .and_then(|state| state.session.identity());

        match identity {
            Some(identity) => {
                req.extensions_mut().insert(identity);
                let fut = self.service.call(req);
                Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
            }
            None => {
                let resp = req.error_response(AppError::NotSignedIn).map_into_right_body();
                Box::pin(async move { Ok(resp) })
            }
        }
    }
}
