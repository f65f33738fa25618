use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::entities::{cart_item, CartItem};
use crate::errors::ServiceError;

use super::CartRepository;

#[derive(Debug, Clone)]
pub struct SqlCartRepository {
    db: Arc<DatabaseConnection>,
}

impl SqlCartRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CartRepository for SqlCartRepository {
    async fn clear_cart(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        let result = CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .exec(&*self.db)
            .await?;

        Ok(result.rows_affected)
    }
}
