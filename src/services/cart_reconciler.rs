use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::product;
use crate::errors::ServiceError;
use crate::repositories::CatalogRepository;

/// A client-submitted cart line. Deliberately carries no price field; prices
/// come from the catalog only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CartLineInput {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// A line re-priced from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    ProductUnavailable,
    NonPositiveQuantity,
}

/// A line excluded during reconciliation, reported back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct DroppedLine {
    pub product_id: Uuid,
    pub reason: DropReason,
}

/// Result of re-pricing a client cart against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledCart {
    pub lines: Vec<PricedLine>,
    pub dropped: Vec<DroppedLine>,
    pub subtotal: Decimal,
}

impl ReconciledCart {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Re-prices client-submitted cart lines against authoritative catalog
/// prices. A tampered client cart asserting its own prices has no effect:
/// the input never carries a price to begin with.
#[derive(Clone)]
pub struct CartReconciler {
    catalog: Arc<dyn CatalogRepository>,
}

impl CartReconciler {
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { catalog }
    }

    /// Re-prices the given lines. Missing products and non-positive
    /// quantities drop the line without failing the request.
    #[instrument(skip(self, lines), fields(line_count = lines.len()))]
    pub async fn reconcile(&self, lines: &[CartLineInput]) -> Result<ReconciledCart, ServiceError> {
        let ids: Vec<Uuid> = lines
            .iter()
            .filter(|l| l.quantity > 0)
            .map(|l| l.product_id)
            .collect();

        let products = self.catalog.get_products(&ids).await?;
        let cart = price_lines(lines, &products);

        if !cart.dropped.is_empty() {
            debug!(dropped = cart.dropped.len(), "dropped cart lines during reconciliation");
        }

        Ok(cart)
    }
}

/// Pure pricing core: pairs each input line with its catalog product.
pub fn price_lines(lines: &[CartLineInput], products: &[product::Model]) -> ReconciledCart {
    let by_id: HashMap<Uuid, &product::Model> =
        products.iter().map(|p| (p.id, p)).collect();

    let mut priced = Vec::new();
    let mut dropped = Vec::new();
    let mut subtotal = Decimal::ZERO;

    for line in lines {
        if line.quantity <= 0 {
            dropped.push(DroppedLine {
                product_id: line.product_id,
                reason: DropReason::NonPositiveQuantity,
            });
            continue;
        }

        match by_id.get(&line.product_id) {
            Some(product) => {
                let line_total = product.price * Decimal::from(line.quantity);
                subtotal += line_total;
                priced.push(PricedLine {
                    product_id: product.id,
                    name: product.name.clone(),
                    unit_price: product.price,
                    quantity: line.quantity,
                    line_total,
                });
            }
            None => {
                dropped.push(DroppedLine {
                    product_id: line.product_id,
                    reason: DropReason::ProductUnavailable,
                });
            }
        }
    }

    ReconciledCart {
        lines: priced,
        dropped,
        subtotal,
    }
}
