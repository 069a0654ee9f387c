// src/checkout.rs

use std::sync::Arc;

use crate::backend::api::{
    ApiClient, CheckoutSession, CreateCheckoutSessionRequest, CustomerAddress, CustomerDetails,
    CHECKOUT_FALLBACK_ERROR,
};
use crate::backend::database::DatabaseClient;
use crate::dashboard::plans::{BillingInterval, PlanKind};
use crate::error::{AppError, BackendError};
use crate::session::Identity;

/// Turns a plan choice into a hosted payment page URL.
pub struct CheckoutInitiator {
    api: Arc<ApiClient>,
    db: Arc<DatabaseClient>,
    default_country: String,
}

impl CheckoutInitiator {
    pub fn new(api: Arc<ApiClient>, db: Arc<DatabaseClient>, default_country: &str) -> Self {
        Self {
            api,
            db,
            default_country: default_country.to_string(),
        }
    }

    pub async fn initiate(
        &self,
        identity: &Identity,
        plan: PlanKind,
        interval: BillingInterval,
    ) -> Result<CheckoutSession, AppError> {
        let email = identity
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AppError::Validation("Your account has no email address".to_string()))?;

        let price_type = plan.price_type(interval);

        let name = match self
            .db
            .full_name(identity.user_id, &identity.access_token)
            .await
        {
            Ok(Some(name)) => name,
            Ok(None) => display_name_from_email(email),
            Err(e) => {
                log::error!("error fetching profile name user={}: {e}", identity.user_id);
                return Err(AppError::Failed("Failed to fetch user profile".to_string()));
            }
        };

        let customer_details = CustomerDetails {
            name,
            email: email.to_string(),
            address: Some(CustomerAddress {
                country: self.default_country.clone(),
                line1: String::new(),
                city: String::new(),
                state: String::new(),
                postal_code: String::new(),
            }),
        };

        log::info!(
            "creating checkout session user={} price_type={price_type}",
            identity.user_id
        );

        let request = CreateCheckoutSessionRequest {
            price_type,
            user_id: identity.user_id,
            user_email: email,
            customer_details: &customer_details,
        };

        self.api
            .create_checkout_session(&request)
            .await
            .map_err(|e| match e {
                BackendError::Rejected(message) => AppError::Failed(message),
                other => {
                    log::error!("checkout error user={}: {other}", identity.user_id);
                    AppError::Failed(CHECKOUT_FALLBACK_ERROR.to_string())
                }
            })
    }
}

pub fn display_name_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}
