// src/error.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {key}={value}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Failure talking to the hosted service, the product API or the realtime socket.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error status={status} body={body}")]
    Api { status: u16, body: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The endpoint answered with a message meant for the user.
    #[error("{0}")]
    Rejected(String),

    #[error("realtime error: {0}")]
    Realtime(String),

    #[error("session store error: {0}")]
    Store(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not signed in")]
    NotSignedIn,

    #[error("a generation is already in progress")]
    InFlight,

    #[error("{0}")]
    Validation(String),

    /// User-facing failure message, already worded for display.
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotSignedIn => StatusCode::UNAUTHORIZED,
            AppError::InFlight => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Failed(_) => StatusCode::BAD_GATEWAY,
            AppError::Backend(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}
