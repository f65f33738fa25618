use axum::{extract::State, response::Response, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::errors::ApiError;
use crate::handlers::common::{created_response, success_response, validate_input};
use crate::handlers::AuthenticatedUser;
use crate::services::cart_reconciler::{CartLineInput, DroppedLine};
use crate::services::checkout::{CheckoutStarted, ConfirmedCheckout};
use crate::services::coupons::CouponRejection;
use crate::AppState;

pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(begin_checkout))
        .route("/confirm", post(confirm_checkout))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CheckoutRequest {
    /// Cart lines to purchase. Prices are looked up server-side.
    #[validate(length(min = 1, max = 100))]
    pub items: Vec<CartLineInput>,
    /// Optional coupon code to apply.
    #[validate(length(min = 1, max = 64))]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CouponRejectionDetail {
    pub reason: CouponRejection,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    /// Provider session id; post it back to `/checkout/confirm` after payment.
    pub session_id: String,
    /// Hosted payment page to redirect the shopper to.
    pub checkout_url: String,
    pub subtotal: Decimal,
    pub discount_percentage: i32,
    pub total: Decimal,
    pub currency: String,
    /// Lines excluded during reconciliation, if any.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dropped: Vec<DroppedLine>,
    /// Set when a coupon code was supplied but did not apply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_rejection: Option<CouponRejectionDetail>,
}

impl From<CheckoutStarted> for CheckoutResponse {
    fn from(started: CheckoutStarted) -> Self {
        Self {
            session_id: started.session_id,
            checkout_url: started.checkout_url,
            subtotal: started.subtotal,
            discount_percentage: started.discount_percentage,
            total: started.total,
            currency: started.currency,
            dropped: started.dropped,
            coupon_rejection: started.coupon_rejection.map(|reason| CouponRejectionDetail {
                reason,
                message: reason.message().to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ConfirmCheckoutRequest {
    /// Provider session id from the success redirect or webhook.
    #[validate(length(min = 1, max = 255))]
    pub session_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfirmCheckoutResponse {
    pub order_id: Uuid,
    pub provider_reference: String,
    pub total_amount: Decimal,
    pub currency: String,
    /// True when a previous confirmation already created this order.
    pub already_confirmed: bool,
    pub created_at: DateTime<Utc>,
}

impl From<ConfirmedCheckout> for ConfirmCheckoutResponse {
    fn from(confirmed: ConfirmedCheckout) -> Self {
        Self {
            order_id: confirmed.order.id,
            provider_reference: confirmed.order.provider_reference,
            total_amount: confirmed.order.total_amount,
            currency: confirmed.order.currency,
            already_confirmed: confirmed.already_confirmed,
            created_at: confirmed.order.created_at,
        }
    }
}

/// Initiates a checkout: re-prices the cart, applies the coupon when valid,
/// and creates a payment session for the computed total.
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body = CheckoutRequest,
    params(
        ("x-user-id" = String, Header, description = "Authenticated user id")
    ),
    responses(
        (status = 201, description = "Checkout session created", body = CheckoutResponse),
        (status = 400, description = "Empty cart or invalid input", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or invalid identity header", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment session could not be created", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
#[instrument(skip(state, payload), fields(user_id = %user.user_id))]
pub async fn begin_checkout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Response, ApiError> {
    validate_input(&payload)?;

    let started = state
        .services
        .checkout
        .begin_checkout(user.user_id, &payload.items, payload.coupon_code)
        .await?;

    Ok(created_response(CheckoutResponse::from(started)))
}

/// Confirms a checkout session after payment. Idempotent: repeated calls
/// for the same session return the same order.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/confirm",
    request_body = ConfirmCheckoutRequest,
    responses(
        (status = 200, description = "Order confirmed", body = ConfirmCheckoutResponse),
        (status = 400, description = "Session is not paid", body = crate::errors::ErrorResponse),
        (status = 404, description = "Session not found", body = crate::errors::ErrorResponse),
        (status = 503, description = "Payment provider unreachable, retry later", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
#[instrument(skip(state, payload))]
pub async fn confirm_checkout(
    State(state): State<AppState>,
    Json(payload): Json<ConfirmCheckoutRequest>,
) -> Result<Response, ApiError> {
    validate_input(&payload)?;

    let confirmed = state
        .services
        .checkout
        .confirm_session(&payload.session_id)
        .await?;

    Ok(success_response(ConfirmCheckoutResponse::from(confirmed)))
}
