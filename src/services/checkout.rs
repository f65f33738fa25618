use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::order;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::payments::{
    CheckoutMetadata, CreateSessionRequest, FrozenLine, PaymentProvider, ProviderError,
    ProviderLineItem,
};
use crate::repositories::{
    CartRepository, CatalogRepository, CouponConsumption, CouponRepository, NewOrder,
    NewOrderLine, OrderInsert, OrderRepository,
};
use crate::services::cart_reconciler::{CartLineInput, CartReconciler, DroppedLine};
use crate::services::coupons::{CouponRejection, CouponService, CouponValidation};

/// Checkout-wide settings taken from configuration.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// Result of initiating a checkout: the provider session to redirect to,
/// plus the server-computed totals and anything that was dropped or
/// rejected along the way.
#[derive(Debug, Clone)]
pub struct CheckoutStarted {
    pub session_id: String,
    pub checkout_url: String,
    pub subtotal: Decimal,
    pub discount_percentage: i32,
    pub total: Decimal,
    pub currency: String,
    pub dropped: Vec<DroppedLine>,
    pub coupon_rejection: Option<CouponRejection>,
}

/// Result of confirming a checkout session. `already_confirmed` is set when
/// a duplicate callback found the order in place.
#[derive(Debug, Clone)]
pub struct ConfirmedCheckout {
    pub order: order::Model,
    pub already_confirmed: bool,
}

/// Checkout orchestrator: reconciles the cart, applies a validated coupon,
/// creates the provider session, and turns a confirmed session into an
/// order exactly once.
#[derive(Clone)]
pub struct CheckoutService {
    reconciler: CartReconciler,
    coupon_validator: CouponService,
    coupons: Arc<dyn CouponRepository>,
    orders: Arc<dyn OrderRepository>,
    carts: Arc<dyn CartRepository>,
    provider: Arc<dyn PaymentProvider>,
    event_sender: EventSender,
    settings: CheckoutSettings,
}

impl CheckoutService {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        coupons: Arc<dyn CouponRepository>,
        orders: Arc<dyn OrderRepository>,
        carts: Arc<dyn CartRepository>,
        provider: Arc<dyn PaymentProvider>,
        event_sender: EventSender,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            reconciler: CartReconciler::new(catalog),
            coupon_validator: CouponService::new(coupons.clone()),
            coupons,
            orders,
            carts,
            provider,
            event_sender,
            settings,
        }
    }

    /// Initiates a checkout attempt: re-prices the cart, applies the coupon
    /// if it validates, and creates a provider session for the computed
    /// total. Nothing is persisted until the provider confirms payment.
    #[instrument(skip(self, lines), fields(%user_id, line_count = lines.len()))]
    pub async fn begin_checkout(
        &self,
        user_id: Uuid,
        lines: &[CartLineInput],
        coupon_code: Option<String>,
    ) -> Result<CheckoutStarted, ServiceError> {
        let reconciled = self.reconciler.reconcile(lines).await?;
        if reconciled.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let mut discount_percentage = 0;
        let mut coupon_rejection = None;
        let mut applied_coupon = None;

        if let Some(code) = coupon_code {
            match self.coupon_validator.validate(user_id, &code).await? {
                CouponValidation::Valid { coupon } => {
                    discount_percentage = coupon.discount_percentage;
                    applied_coupon = Some((coupon.id, code));
                }
                CouponValidation::Rejected(reason) => {
                    // Checkout proceeds at full price; the rejection reason
                    // is reported back to the shopper.
                    info!(?reason, "coupon rejected, proceeding without discount");
                    coupon_rejection = Some(reason);
                }
            }
        }

        let subtotal = reconciled.subtotal;
        let total = apply_discount(subtotal, discount_percentage);

        let frozen_lines: Vec<FrozenLine> = reconciled
            .lines
            .iter()
            .map(|l| FrozenLine {
                product_id: l.product_id,
                name: l.name.clone(),
                unit_price: l.unit_price,
                quantity: l.quantity,
            })
            .collect();

        let line_items = reconciled
            .lines
            .iter()
            .map(|l| {
                Ok(ProviderLineItem {
                    name: l.name.clone(),
                    unit_amount_minor: to_minor_units(l.unit_price)?,
                    quantity: i64::from(l.quantity),
                })
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;

        let (coupon_id, coupon_code) = match &applied_coupon {
            Some((id, code)) => (Some(*id), Some(code.clone())),
            None => (None, None),
        };

        let client_reference = Uuid::new_v4().to_string();
        let request = CreateSessionRequest {
            line_items,
            currency: self.settings.currency.clone(),
            discount_percentage: (discount_percentage > 0).then_some(discount_percentage),
            success_url: format!(
                "{}?session_id={{CHECKOUT_SESSION_ID}}",
                self.settings.success_url
            ),
            cancel_url: self.settings.cancel_url.clone(),
            client_reference,
            metadata: CheckoutMetadata {
                user_id,
                coupon_code,
                coupon_id,
                lines: frozen_lines,
            },
        };

        // Session creation failure aborts the whole checkout; nothing has
        // been persisted at this point.
        let session = self
            .provider
            .create_session(request)
            .await
            .map_err(|e| ServiceError::PaymentSessionFailed(e.to_string()))?;

        self.event_sender
            .send_or_log(Event::CheckoutStarted {
                user_id,
                session_id: session.id.clone(),
            })
            .await;

        info!(session_id = %session.id, %subtotal, %total, "checkout session created");

        Ok(CheckoutStarted {
            session_id: session.id,
            checkout_url: session.url,
            subtotal,
            discount_percentage,
            total,
            currency: self.settings.currency.clone(),
            dropped: reconciled.dropped,
            coupon_rejection,
        })
    }

    /// Confirms a checkout session. The session is re-fetched from the
    /// provider; a client-supplied "success" flag is never trusted. Safe to
    /// call any number of times for the same session: the unique provider
    /// reference guarantees at most one order.
    #[instrument(skip(self))]
    pub async fn confirm_session(&self, session_id: &str) -> Result<ConfirmedCheckout, ServiceError> {
        let status = self
            .provider
            .retrieve_session(session_id)
            .await
            .map_err(map_retrieve_error)?;

        if !status.paid {
            return Err(ServiceError::InvalidOperation(format!(
                "session {} is not paid",
                session_id
            )));
        }

        let metadata = status.metadata;
        let new_order = NewOrder {
            user_id: metadata.user_id,
            total_amount: status.amount_total,
            currency: self.settings.currency.clone(),
            provider_reference: status.reference.clone(),
            lines: metadata
                .lines
                .iter()
                .map(|l| NewOrderLine {
                    product_id: l.product_id,
                    name: l.name.clone(),
                    price_at_purchase: l.unit_price,
                    quantity: l.quantity,
                })
                .collect(),
        };

        match self.orders.create_if_absent(new_order).await? {
            OrderInsert::Created(order) => {
                if let Some(coupon_id) = metadata.coupon_id {
                    match self.coupons.consume(coupon_id).await? {
                        CouponConsumption::Consumed => {
                            self.event_sender
                                .send_or_log(Event::CouponRedeemed {
                                    coupon_id,
                                    code: metadata.coupon_code.clone().unwrap_or_default(),
                                })
                                .await;
                        }
                        CouponConsumption::AlreadyUsed => {
                            warn!(%coupon_id, "coupon was already consumed at confirmation");
                        }
                    }
                }

                // Cart clearing is best-effort: the order exists and a
                // retry of this callback must not create another one.
                if let Err(err) = self.carts.clear_cart(metadata.user_id).await {
                    warn!(user_id = %metadata.user_id, %err, "failed to clear cart after order");
                } else {
                    self.event_sender
                        .send_or_log(Event::CartCleared {
                            user_id: metadata.user_id,
                        })
                        .await;
                }

                self.event_sender
                    .send_or_log(Event::CheckoutCompleted {
                        order_id: order.id,
                        provider_reference: status.reference.clone(),
                    })
                    .await;
                self.event_sender
                    .send_or_log(Event::OrderCreated(order.id))
                    .await;

                info!(order_id = %order.id, reference = %status.reference, "order created");
                Ok(ConfirmedCheckout {
                    order,
                    already_confirmed: false,
                })
            }
            OrderInsert::AlreadyExists(order) => {
                // Duplicate confirmation delivery: idempotent success, no
                // further side effects.
                info!(order_id = %order.id, reference = %status.reference, "duplicate confirmation ignored");
                Ok(ConfirmedCheckout {
                    order,
                    already_confirmed: true,
                })
            }
        }
    }
}

/// Applies a whole-percentage discount and rounds to cents.
fn apply_discount(subtotal: Decimal, discount_percentage: i32) -> Decimal {
    let factor = Decimal::ONE - Decimal::from(discount_percentage) / Decimal::ONE_HUNDRED;
    (subtotal * factor).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| {
            ServiceError::InternalError(format!("amount {} not representable in minor units", amount))
        })
}

fn map_retrieve_error(err: ProviderError) -> ServiceError {
    match err {
        // Confirmation is deferred and retried on the next delivery; the
        // payment is never assumed successful.
        ProviderError::Unreachable(msg) => ServiceError::ProviderUnreachable(msg),
        ProviderError::Api { status: 404, .. } => {
            ServiceError::NotFound("checkout session not found".to_string())
        }
        other => ServiceError::ProviderUnreachable(other.to_string()),
    }
}
