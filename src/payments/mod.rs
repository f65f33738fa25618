//! Payment provider boundary. The checkout orchestrator only ever talks to
//! the `PaymentProvider` trait; the Stripe-style HTTP client lives in
//! `stripe`.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod stripe;

pub use stripe::StripeCheckoutProvider;

/// A display line as sent to the provider, in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderLineItem {
    pub name: String,
    pub unit_amount_minor: i64,
    pub quantity: i64,
}

/// Frozen priced line carried through the provider session metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrozenLine {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

/// Snapshot stored in the provider session so that confirmation is
/// self-contained: the callback only carries a session id, everything else
/// is read back from the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutMetadata {
    pub user_id: Uuid,
    pub coupon_code: Option<String>,
    pub coupon_id: Option<Uuid>,
    pub lines: Vec<FrozenLine>,
}

#[derive(Debug, Clone)]
pub struct CreateSessionRequest {
    pub line_items: Vec<ProviderLineItem>,
    pub currency: String,
    /// Whole-percentage discount realized provider-side, if any.
    pub discount_percentage: Option<i32>,
    pub success_url: String,
    pub cancel_url: String,
    pub client_reference: String,
    pub metadata: CheckoutMetadata,
}

/// Provider session handle returned at creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSession {
    pub id: String,
    pub url: String,
}

/// Authoritative session state as re-fetched from the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub paid: bool,
    /// Payment reference, unique per completed payment.
    pub reference: String,
    pub amount_total: Decimal,
    pub metadata: CheckoutMetadata,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider unreachable: {0}")]
    Unreachable(String),

    #[error("provider API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<ProviderSession, ProviderError>;

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionStatus, ProviderError>;
}
