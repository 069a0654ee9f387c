// src/dashboard/plans.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Payment, Subscription};

pub const LOW_CREDITS_THRESHOLD: i64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    Basic,
    Pro,
    CreditPack,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BillingInterval {
    Monthly,
    #[default]
    Yearly,
}

struct Plan {
    kind: PlanKind,
    name: &'static str,
    monthly_price: u32,
    yearly_price: u32,
    credits: i64,
    description: &'static str,
    features: &'static [&'static str],
    popular: bool,
}

const CATALOG: [Plan; 3] = [
    Plan {
        kind: PlanKind::Basic,
        name: "BASIC",
        monthly_price: 15,
        yearly_price: 10,
        credits: 250,
        description: "Perfect for content creators getting started",
        features: &[
            "Up to 25 images per month",
            "Text to thumbnail",
            "Generate thumbnail from YouTube",
            "Generate thumbnail using your face",
            "Thumbnail enhancer",
            "All generations stay private",
        ],
        popular: false,
    },
    Plan {
        kind: PlanKind::Pro,
        name: "PRO",
        monthly_price: 25,
        yearly_price: 20,
        credits: 500,
        description: "Best for professional content creators",
        features: &[
            "Up to 50 images per month",
            "Access to all models",
            "Text to thumbnail",
            "Generate thumbnail from YouTube",
            "Generate thumbnail using your face",
            "Thumbnail enhancer",
            "Generate TOP YouTuber channels style thumbnail",
            "All generations stay private",
        ],
        popular: true,
    },
    Plan {
        kind: PlanKind::CreditPack,
        name: "CREDIT PACKS",
        monthly_price: 10,
        yearly_price: 10,
        credits: 250,
        description: "Additional credits when you need them",
        features: &[
            "Purchase only credits after exhausting monthly credits",
            "Use anytime",
            "Never expires",
        ],
        popular: false,
    },
];

impl PlanKind {
    /// Identifier the checkout endpoint prices against. Credit packs ignore the interval.
    pub fn price_type(&self, interval: BillingInterval) -> &'static str {
        match (self, interval) {
            (PlanKind::Basic, BillingInterval::Monthly) => "basic-monthly",
            (PlanKind::Basic, BillingInterval::Yearly) => "basic-yearly",
            (PlanKind::Pro, BillingInterval::Monthly) => "pro-monthly",
            (PlanKind::Pro, BillingInterval::Yearly) => "pro-yearly",
            (PlanKind::CreditPack, _) => "credit-pack",
        }
    }

    pub fn credits(&self) -> i64 {
        CATALOG
            .iter()
            .find(|p| p.kind == *self)
            .map(|p| p.credits)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PlanView {
    pub kind: PlanKind,
    pub name: String,
    /// Whole dollars.
    pub price: u32,
    pub period: String,
    pub credits: i64,
    pub description: String,
    pub features: Vec<String>,
    pub popular: bool,
    pub price_type: String,
}

/// The catalog priced for `interval`.
pub fn plan_views(interval: BillingInterval) -> Vec<PlanView> {
    CATALOG
        .iter()
        .map(|plan| {
            let (price, period) = match (plan.kind, interval) {
                (PlanKind::CreditPack, _) => (plan.monthly_price, "one-time"),
                (_, BillingInterval::Monthly) => (plan.monthly_price, "per month"),
                (_, BillingInterval::Yearly) => (plan.yearly_price, "per month, billed yearly"),
            };
            PlanView {
                kind: plan.kind,
                name: plan.name.to_string(),
                price,
                period: period.to_string(),
                credits: plan.credits,
                description: plan.description.to_string(),
                features: plan.features.iter().map(|f| f.to_string()).collect(),
                popular: plan.popular,
                price_type: plan.kind.price_type(interval).to_string(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ActivePlanView {
    pub plan_type: String,
    pub billing_cycle: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub max_credits: i64,
    pub low_credits: bool,
}

/// Summary of an active subscription row; `None` for inactive ones.
///
/// `plan_name` is read as `<plan>-<cycle>` (`pro-yearly`); missing parts fall
/// back to Basic and Monthly.
pub fn active_plan_view(subscription: &Subscription, credits: i64) -> Option<ActivePlanView> {
    if !subscription.is_active {
        return None;
    }
    let mut parts = subscription.plan_name.split('-').filter(|p| !p.is_empty());
    let plan_type = capitalize(parts.next().unwrap_or("basic"));
    let billing_cycle = capitalize(parts.next().unwrap_or("monthly"));
    let max_credits = if plan_type.eq_ignore_ascii_case("basic") {
        PlanKind::Basic.credits()
    } else {
        PlanKind::Pro.credits()
    };

    Some(ActivePlanView {
        plan_type,
        billing_cycle,
        start_date: subscription.start_date,
        end_date: subscription.end_date,
        max_credits,
        low_credits: credits < LOW_CREDITS_THRESHOLD,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SubscriptionView {
    pub credits: Option<i64>,
    pub active: Option<ActivePlanView>,
    pub interval: BillingInterval,
    pub plans: Vec<PlanView>,
    pub recent_payments: Vec<Payment>,
}

fn capitalize(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
