use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::OnConflict, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait, TryInsertResult,
};
use uuid::Uuid;

use crate::entities::{order, order_item, Order};
use crate::errors::ServiceError;

use super::{NewOrder, OrderInsert, OrderRepository};

#[derive(Debug, Clone)]
pub struct SqlOrderRepository {
    db: Arc<DatabaseConnection>,
}

impl SqlOrderRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn create_if_absent(&self, new_order: NewOrder) -> Result<OrderInsert, ServiceError> {
        let txn = self.db.begin().await?;

        let order_id = Uuid::new_v4();
        let created_at = Utc::now();

        let order_model = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(new_order.user_id),
            total_amount: Set(new_order.total_amount),
            currency: Set(new_order.currency.clone()),
            provider_reference: Set(new_order.provider_reference.clone()),
            created_at: Set(created_at),
        };

        let insert = Order::insert(order_model)
            .on_conflict(
                OnConflict::column(order::Column::ProviderReference)
                    .do_nothing()
                    .to_owned(),
            )
            .do_nothing()
            .exec(&txn)
            .await?;

        match insert {
            TryInsertResult::Inserted(_) => {
                for line in &new_order.lines {
                    let item = order_item::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        order_id: Set(order_id),
                        product_id: Set(line.product_id),
                        name: Set(line.name.clone()),
                        price_at_purchase: Set(line.price_at_purchase),
                        quantity: Set(line.quantity),
                        line_total: Set(line.price_at_purchase * Decimal::from(line.quantity)),
                    };
                    order_item::Entity::insert(item).exec(&txn).await?;
                }

                txn.commit().await?;

                Ok(OrderInsert::Created(order::Model {
                    id: order_id,
                    user_id: new_order.user_id,
                    total_amount: new_order.total_amount,
                    currency: new_order.currency,
                    provider_reference: new_order.provider_reference,
                    created_at,
                }))
            }
            _ => {
                txn.commit().await?;

                let existing = self
                    .find_by_provider_reference(&new_order.provider_reference)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::InternalError(format!(
                            "order insert conflicted but no order found for reference {}",
                            new_order.provider_reference
                        ))
                    })?;

                Ok(OrderInsert::AlreadyExists(existing))
            }
        }
    }

    async fn find_by_provider_reference(
        &self,
        reference: &str,
    ) -> Result<Option<order::Model>, ServiceError> {
        let found = Order::find()
            .filter(order::Column::ProviderReference.eq(reference))
            .one(&*self.db)
            .await?;

        Ok(found)
    }
}
