// src/api/dashboard.rs

use actix_multipart::Multipart;
use actix_web::web::ReqData;
use actix_web::{get, post, web, HttpResponse};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::auth::see_other;
use crate::dashboard::generation::{youtube_preview_url, youtube_video_id, GenerationRequest};
use crate::dashboard::history::HistoryFilter;
use crate::dashboard::plans::{BillingInterval, PlanKind, SubscriptionView};
use crate::dashboard::DashboardOverview;
use crate::error::AppError;
use crate::models::{Generation, UserImage};
use crate::session::Identity;
use crate::AppState;

const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
const UPLOAD_FAILED: &str = "Upload failed";

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Zero-based page index.
    #[serde(default)]
    pub page: usize,
    #[serde(default)]
    pub filter: HistoryFilter,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryPage {
    pub page: usize,
    pub items: Vec<Generation>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IntervalQuery {
    #[serde(default)]
    pub interval: BillingInterval,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub plan: PlanKind,
    #[serde(default)]
    pub interval: BillingInterval,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PreviewQuery {
    pub url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PreviewResponse {
    pub video_id: String,
    pub preview_url: String,
}

#[utoipa::path(
    get,
    path = "/api/dashboard",
    tag = "dashboard",
    responses(
        (status = 200, description = "Balance, recent generations and workflow state", body = DashboardOverview),
        (status = 401, description = "Not signed in")
    )
)]
#[get("")]
pub async fn overview(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.dashboard.overview())
}

#[utoipa::path(
    post,
    path = "/api/dashboard/generate",
    tag = "dashboard",
    request_body = GenerationRequest,
    responses(
        (status = 200, description = "Generated thumbnail", body = Generation),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "A generation is already in progress"),
        (status = 502, description = "Generation failed")
    )
)]
#[post("/generate")]
pub async fn generate(
    state: web::Data<AppState>,
    payload: web::Json<GenerationRequest>,
) -> Result<HttpResponse, AppError> {
    let generation = state.dashboard.submit_generation(&payload).await?;
    Ok(HttpResponse::Ok().json(generation))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/history",
    tag = "dashboard",
    params(HistoryQuery),
    responses(
        (status = 200, description = "One page of generations, newest first", body = HistoryPage),
        (status = 400, description = "Page index out of range")
    )
)]
#[get("/history")]
pub async fn history(
    state: web::Data<AppState>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, AppError> {
    let items = state.dashboard.load_history(query.page, query.filter).await?;
    Ok(HttpResponse::Ok().json(HistoryPage {
        page: query.page,
        items,
    }))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/images",
    tag = "dashboard",
    responses((status = 200, description = "Uploaded reference images", body = [UserImage]))
)]
#[get("/images")]
pub async fn list_images(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let images = state.dashboard.user_images().await?;
    Ok(HttpResponse::Ok().json(images))
}

#[utoipa::path(
    post,
    path = "/api/dashboard/images",
    tag = "dashboard",
    request_body(content = Vec<u8>, content_type = "multipart/form-data", description = "Image file"),
    responses(
        (status = 200, description = "Stored image", body = UserImage),
        (status = 400, description = "No image in the request, or the upload broke off")
    )
)]
#[post("/images")]
pub async fn upload_image(
    mut payload: Multipart,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let mut file_bytes: Vec<u8> = Vec::new();
    let mut extension = "png".to_string();
    let mut content_type = "image/png".to_string();

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| {
            log::warn!("error reading upload field: {e}");
            AppError::Validation(UPLOAD_FAILED.to_string())
        })?;

        if let Some(mime) = field.content_type() {
            if mime.type_().as_str() != "image" {
                return Err(AppError::Validation("Only image files can be uploaded".to_string()));
            }
            content_type = mime.essence_str().to_string();
        }
        let cd = field.content_disposition();
        if let Some(ext) = cd.get_filename().and_then(file_extension) {
            extension = ext;
        }

        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(|e| {
                log::warn!("error reading upload chunk: {e}");
                AppError::Validation(UPLOAD_FAILED.to_string())
            })?;
            if file_bytes.len() + data.len() > MAX_IMAGE_BYTES {
                return Err(AppError::Validation("Image is larger than 10 MB".to_string()));
            }
            file_bytes.extend_from_slice(&data);
        }
    }

    if file_bytes.is_empty() {
        return Err(AppError::Validation("No file uploaded".to_string()));
    }

    let image = state
        .dashboard
        .upload_image(&extension, &content_type, file_bytes)
        .await?;
    Ok(HttpResponse::Ok().json(image))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/subscription",
    tag = "billing",
    params(IntervalQuery),
    responses((status = 200, description = "Active plan, catalog and recent payments", body = SubscriptionView))
)]
#[get("/subscription")]
pub async fn subscription(
    state: web::Data<AppState>,
    query: web::Query<IntervalQuery>,
) -> Result<HttpResponse, AppError> {
    let view = state.dashboard.subscription_view(query.interval).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[utoipa::path(
    post,
    path = "/api/dashboard/checkout",
    tag = "billing",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Hosted payment page", body = CheckoutResponse),
        (status = 502, description = "Checkout session could not be created")
    )
)]
#[post("/checkout")]
pub async fn checkout(
    state: web::Data<AppState>,
    identity: ReqData<Identity>,
    payload: web::Json<CheckoutRequest>,
) -> Result<HttpResponse, AppError> {
    let session = state
        .checkout
        .initiate(&identity, payload.plan, payload.interval)
        .await?;
    Ok(HttpResponse::Ok().json(CheckoutResponse {
        session_id: session.session_id,
        url: session.url,
    }))
}

/// `GET /dashboard/checkout?plan=pro&interval=yearly`: sends the browser straight to the payment page.
pub async fn checkout_redirect(
    state: web::Data<AppState>,
    identity: ReqData<Identity>,
    query: web::Query<CheckoutRequest>,
) -> Result<HttpResponse, AppError> {
    let session = state
        .checkout
        .initiate(&identity, query.plan, query.interval)
        .await?;
    Ok(see_other(&session.url))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/youtube-preview",
    tag = "dashboard",
    params(PreviewQuery),
    responses(
        (status = 200, description = "Thumbnail of the linked video", body = PreviewResponse),
        (status = 400, description = "Not a YouTube URL")
    )
)]
#[get("/youtube-preview")]
pub async fn youtube_preview(query: web::Query<PreviewQuery>) -> Result<HttpResponse, AppError> {
    let (Some(video_id), Some(preview_url)) =
        (youtube_video_id(&query.url), youtube_preview_url(&query.url))
    else {
        return Err(AppError::Validation("Please enter a valid YouTube URL".to_string()));
    };
    Ok(HttpResponse::Ok().json(PreviewResponse {
        video_id: video_id.to_string(),
        preview_url,
    }))
}

fn file_extension(filename: &str) -> Option<String> {
    let ext: String = filename
        .rsplit_once('.')?
        .1
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    (!ext.is_empty() && ext.len() <= 5).then_some(ext)
}
