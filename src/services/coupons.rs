use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::coupon;
use crate::errors::ServiceError;
use crate::repositories::CouponRepository;

/// Why a coupon was rejected. Each outcome is distinct so the caller can
/// give a precise user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CouponRejection {
    NotFound,
    Expired,
    AlreadyUsed,
}

impl CouponRejection {
    pub fn message(&self) -> &'static str {
        match self {
            Self::NotFound => "Coupon code not found",
            Self::Expired => "Coupon has expired",
            Self::AlreadyUsed => "Coupon has already been used",
        }
    }
}

/// Result of validating a coupon code against a user's coupon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouponValidation {
    Valid { coupon: coupon::Model },
    Rejected(CouponRejection),
}

impl CouponValidation {
    pub fn rejection(&self) -> Option<CouponRejection> {
        match self {
            Self::Valid { .. } => None,
            Self::Rejected(reason) => Some(*reason),
        }
    }
}

/// Read-only coupon validation. Consumption happens at checkout
/// confirmation, not here.
#[derive(Clone)]
pub struct CouponService {
    coupons: Arc<dyn CouponRepository>,
}

impl CouponService {
    pub fn new(coupons: Arc<dyn CouponRepository>) -> Self {
        Self { coupons }
    }

    #[instrument(skip(self))]
    pub async fn validate(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> Result<CouponValidation, ServiceError> {
        let Some(coupon) = self.coupons.find_by_code(user_id, code).await? else {
            return Ok(CouponValidation::Rejected(CouponRejection::NotFound));
        };

        if !coupon.is_active {
            return Ok(CouponValidation::Rejected(CouponRejection::AlreadyUsed));
        }

        if coupon.is_expired(Utc::now()) {
            return Ok(CouponValidation::Rejected(CouponRejection::Expired));
        }

        Ok(CouponValidation::Valid { coupon })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MockCouponRepository;
    use chrono::Duration;

    fn sample_coupon(user_id: Uuid, active: bool, expires_in_days: i64) -> coupon::Model {
        coupon::Model {
            id: Uuid::new_v4(),
            code: "WELCOME10".to_string(),
            user_id,
            discount_percentage: 10,
            expiration_date: Utc::now() + Duration::days(expires_in_days),
            is_active: active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn valid_coupon_passes() {
        let user_id = Uuid::new_v4();
        let coupon = sample_coupon(user_id, true, 30);
        let mut repo = MockCouponRepository::new();
        let returned = coupon.clone();
        repo.expect_find_by_code()
            .returning(move |_, _| Ok(Some(returned.clone())));

        let service = CouponService::new(Arc::new(repo));
        let validation = service.validate(user_id, "WELCOME10").await.unwrap();
        assert_eq!(validation, CouponValidation::Valid { coupon });
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let mut repo = MockCouponRepository::new();
        repo.expect_find_by_code().returning(|_, _| Ok(None));

        let service = CouponService::new(Arc::new(repo));
        let validation = service
            .validate(Uuid::new_v4(), "NOPE")
            .await
            .unwrap();
        assert_eq!(validation.rejection(), Some(CouponRejection::NotFound));
    }

    #[tokio::test]
    async fn inactive_coupon_is_already_used() {
        let user_id = Uuid::new_v4();
        let coupon = sample_coupon(user_id, false, 30);
        let mut repo = MockCouponRepository::new();
        repo.expect_find_by_code()
            .returning(move |_, _| Ok(Some(coupon.clone())));

        let service = CouponService::new(Arc::new(repo));
        let validation = service.validate(user_id, "WELCOME10").await.unwrap();
        assert_eq!(validation.rejection(), Some(CouponRejection::AlreadyUsed));
    }

    #[tokio::test]
    async fn expired_coupon_is_rejected() {
        let user_id = Uuid::new_v4();
        let coupon = sample_coupon(user_id, true, -1);
        let mut repo = MockCouponRepository::new();
        repo.expect_find_by_code()
            .returning(move |_, _| Ok(Some(coupon.clone())));

        let service = CouponService::new(Arc::new(repo));
        let validation = service.validate(user_id, "WELCOME10").await.unwrap();
        assert_eq!(validation.rejection(), Some(CouponRejection::Expired));
    }
}
