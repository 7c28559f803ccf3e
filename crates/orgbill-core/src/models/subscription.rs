//! Organization billing subscription entity.
//!
//! The wire shape mirrors the billing API exactly: snake_case top-level
//! fields, camelCase inside usage-fee pricing, epoch-second timestamps.
//! Payment method and usage-fee pricing are modeled as sum types so that
//! inconsistent tag/field combinations cannot be represented in memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::AppError;

/// Subscription plan tier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PlanId {
    Free,
    Pro,
    Team,
    Enterprise,
}

impl Display for PlanId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PlanId::Free => write!(f, "free"),
            PlanId::Pro => write!(f, "pro"),
            PlanId::Team => write!(f, "team"),
            PlanId::Enterprise => write!(f, "enterprise"),
        }
    }
}

impl FromStr for PlanId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(PlanId::Free),
            "pro" => Ok(PlanId::Pro),
            "team" => Ok(PlanId::Team),
            "enterprise" => Ok(PlanId::Enterprise),
            _ => Err(AppError::Validation(format!("Unknown plan id: {}", s))),
        }
    }
}

/// Plan tier with display name and base price.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub id: PlanId,
    pub name: String,
    pub price: f64,
}

/// Add-on line item attached to the subscription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Addon {
    pub name: String,
    /// External product identifier in the billing provider.
    pub prod_id: String,
    pub price: f64,
}

/// Flat per-unit pricing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnitPricing {
    pub per_unit_price: f64,
    #[serde(default)]
    pub free_units: i64,
}

/// Bundled pricing for a fixed package size.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackagePricing {
    pub package_price: f64,
    pub package_size: i64,
    #[serde(default)]
    pub free_units: i64,
}

/// Pricing strategy for a metered usage fee. Each strategy carries
/// exactly the options it needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "pricingStrategy", content = "pricingOptions")]
pub enum PricingStrategy {
    #[serde(rename = "UNIT")]
    Unit(UnitPricing),
    #[serde(rename = "PACKAGE")]
    Package(PackagePricing),
}

/// Metered usage fee rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageFee {
    pub metric: String,
    #[serde(flatten)]
    pub pricing: PricingStrategy,
}

/// Card details, present only when the payment method is a card.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardDetails {
    pub last_4_digits: String,
    pub brand: String,
    pub expiry_month: u32,
    pub expiry_year: i32,
}

/// Payment method on file. Serialized as a `payment_method_type` tag plus
/// a `payment_method_card_details` object for cards, matching the wire
/// shape while ruling out a card tag without card details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "payment_method_type", rename_all = "lowercase")]
pub enum PaymentMethod {
    Invoice,
    Card {
        #[serde(rename = "payment_method_card_details")]
        details: CardDetails,
    },
    None,
}

impl PaymentMethod {
    pub fn card_details(&self) -> Option<&CardDetails> {
        match self {
            PaymentMethod::Card { details } => Some(details),
            _ => None,
        }
    }
}

/// Billing state of one organization at query time. Read-only: fetched
/// fresh per query and never mutated client-side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrgSubscription {
    pub billing_cycle_anchor: i64,
    pub current_period_start: i64,
    pub current_period_end: i64,
    pub next_invoice_at: i64,
    pub usage_billing_enabled: bool,
    pub plan: Plan,
    pub addons: Vec<Addon>,
    pub usage_fees: Vec<UsageFee>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method_id: Option<String>,
    #[serde(flatten)]
    pub payment_method: PaymentMethod,
}

impl OrgSubscription {
    /// Start of the active billing window.
    pub fn current_period_start_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.current_period_start, 0)
    }

    /// End of the active billing window.
    pub fn current_period_end_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.current_period_end, 0)
    }

    pub fn next_invoice_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.next_invoice_at, 0)
    }

    /// Check the billing-window invariants. Deserialization is
    /// pass-through; callers opt in to range validation.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.current_period_end < self.current_period_start {
            return Err(AppError::Validation(format!(
                "current_period_end {} precedes current_period_start {}",
                self.current_period_end, self.current_period_start
            )));
        }

        if self.next_invoice_at < self.current_period_start {
            return Err(AppError::Validation(format!(
                "next_invoice_at {} precedes current_period_start {}",
                self.next_invoice_at, self.current_period_start
            )));
        }

        Ok(())
    }
}
