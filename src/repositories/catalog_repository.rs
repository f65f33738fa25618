use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::entities::{product, Product};
use crate::errors::ServiceError;

use super::CatalogRepository;

/// sea-orm backed catalog reads.
#[derive(Debug, Clone)]
pub struct SqlCatalogRepository {
    db: Arc<DatabaseConnection>,
}

impl SqlCatalogRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CatalogRepository for SqlCatalogRepository {
    async fn get_products(&self, ids: &[Uuid]) -> Result<Vec<product::Model>, ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let products = Product::find()
            .filter(product::Column::Id.is_in(ids.iter().copied()))
            .all(&*self.db)
            .await?;

        Ok(products)
    }
}
