//! Repository seams for the checkout flow. One trait per entity so the
//! reconciliation logic stays independent of the storage backend.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::entities::{coupon, order, product};
use crate::errors::ServiceError;

pub mod cart_repository;
pub mod catalog_repository;
pub mod coupon_repository;
pub mod order_repository;

pub use cart_repository::SqlCartRepository;
pub use catalog_repository::SqlCatalogRepository;
pub use coupon_repository::SqlCouponRepository;
pub use order_repository::SqlOrderRepository;

/// Read access to the product catalog. Identifiers that do not resolve are
/// simply absent from the result.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn get_products(&self, ids: &[Uuid]) -> Result<Vec<product::Model>, ServiceError>;
}

/// Outcome of a conditional coupon consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouponConsumption {
    Consumed,
    AlreadyUsed,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait CouponRepository: Send + Sync {
    /// Looks up a user's coupon by code regardless of its active flag, so
    /// the validator can distinguish "never existed" from "already used".
    async fn find_by_code(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> Result<Option<coupon::Model>, ServiceError>;

    /// Flips the active flag off, conditional on it still being set.
    /// Must be atomic: two concurrent confirmations may both observe an
    /// active coupon, but only one may consume it.
    async fn consume(&self, coupon_id: Uuid) -> Result<CouponConsumption, ServiceError>;
}

/// A frozen order line as captured at checkout time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderLine {
    pub product_id: Uuid,
    pub name: String,
    pub price_at_purchase: Decimal,
    pub quantity: i32,
}

/// Order payload assembled by the checkout orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub total_amount: Decimal,
    pub currency: String,
    pub provider_reference: String,
    pub lines: Vec<NewOrderLine>,
}

/// Outcome of an idempotent order insert keyed by provider reference.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderInsert {
    Created(order::Model),
    AlreadyExists(order::Model),
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts the order unless one already exists for the same provider
    /// reference. The uniqueness constraint on the reference is what makes
    /// duplicate confirmation callbacks safe.
    async fn create_if_absent(&self, order: NewOrder) -> Result<OrderInsert, ServiceError>;

    async fn find_by_provider_reference(
        &self,
        reference: &str,
    ) -> Result<Option<order::Model>, ServiceError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Removes every cart line for the user, returning how many were removed.
    async fn clear_cart(&self, user_id: Uuid) -> Result<u64, ServiceError>;
}
