use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};
use uuid::Uuid;

use crate::entities::{coupon, Coupon};
use crate::errors::ServiceError;

use super::{CouponConsumption, CouponRepository};

#[derive(Debug, Clone)]
pub struct SqlCouponRepository {
    db: Arc<DatabaseConnection>,
}

impl SqlCouponRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CouponRepository for SqlCouponRepository {
    async fn find_by_code(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> Result<Option<coupon::Model>, ServiceError> {
        let found = Coupon::find()
            .filter(coupon::Column::UserId.eq(user_id))
            .filter(coupon::Column::Code.eq(code))
            .one(&*self.db)
            .await?;

        Ok(found)
    }

    async fn consume(&self, coupon_id: Uuid) -> Result<CouponConsumption, ServiceError> {
        // Compare-and-set on the active flag: a plain read-then-write would
        // let two concurrent confirmations both mark the coupon used.
        let result = Coupon::update_many()
            .col_expr(coupon::Column::IsActive, Expr::value(false))
            .col_expr(coupon::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(coupon::Column::Id.eq(coupon_id))
            .filter(coupon::Column::IsActive.eq(true))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 1 {
            Ok(CouponConsumption::Consumed)
        } else {
            Ok(CouponConsumption::AlreadyUsed)
        }
    }
}
