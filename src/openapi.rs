use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

use crate::handlers;
use crate::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront Checkout API",
        version = "0.1.0",
        description = r#"
Checkout and pricing reconciliation service for a storefront.

Carts submitted by clients carry product ids and quantities only; every
price is re-read from the catalog server-side. Coupons are validated and
applied as whole-percentage discounts, payment runs through a hosted
provider session, and confirmation converts a paid session into exactly
one order no matter how many times it is delivered.

## Identity

Requests to checkout endpoints carry the authenticated user id in the
`x-user-id` header, asserted by the upstream gateway.
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    paths(
        handlers::checkout::begin_checkout,
        handlers::checkout::confirm_checkout,
        handlers::webhooks::payment_webhook,
    ),
    components(schemas(
        handlers::checkout::CheckoutRequest,
        handlers::checkout::CheckoutResponse,
        handlers::checkout::ConfirmCheckoutRequest,
        handlers::checkout::ConfirmCheckoutResponse,
        handlers::checkout::CouponRejectionDetail,
        crate::services::cart_reconciler::CartLineInput,
        crate::services::cart_reconciler::PricedLine,
        crate::services::cart_reconciler::DroppedLine,
        crate::services::cart_reconciler::DropReason,
        crate::services::coupons::CouponRejection,
        crate::errors::ErrorResponse,
    )),
    tags(
        (name = "Checkout", description = "Cart reconciliation and checkout orchestration"),
        (name = "Payments", description = "Payment provider callbacks")
    )
)]
pub struct ApiDoc;

/// Serves the OpenAPI document as JSON.
pub fn openapi_routes() -> Router<AppState> {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}
