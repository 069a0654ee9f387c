use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::dashboard::overview,
        crate::api::dashboard::generate,
        crate::api::dashboard::history,
        crate::api::dashboard::list_images,
        crate::api::dashboard::upload_image,
        crate::api::dashboard::subscription,
        crate::api::dashboard::checkout,
        crate::api::dashboard::youtube_preview
    ),
    components(
        schemas(
            crate::models::Profile,
            crate::models::Generation,
            crate::models::GenerationType,
            crate::models::UserImage,
            crate::models::Payment,
            crate::dashboard::DashboardOverview,
            crate::dashboard::ModeCost,
            crate::dashboard::generation::GenerationRequest,
            crate::dashboard::generation::GenerationMode,
            crate::dashboard::generation::GenerationOption,
            crate::dashboard::generation::AspectRatio,
            crate::dashboard::history::HistoryFilter,
            crate::dashboard::plans::PlanKind,
            crate::dashboard::plans::BillingInterval,
            crate::dashboard::plans::PlanView,
            crate::dashboard::plans::ActivePlanView,
            crate::dashboard::plans::SubscriptionView,
            crate::api::dashboard::HistoryPage,
            crate::api::dashboard::CheckoutRequest,
            crate::api::dashboard::CheckoutResponse,
            crate::api::dashboard::PreviewResponse
        )
    ),
    tags(
        (name = "dashboard", description = "Generation, history and images"),
        (name = "billing", description = "Plans and checkout")
    )
)]
pub struct ApiDoc;
