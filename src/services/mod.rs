pub mod cart_reconciler;
pub mod checkout;
pub mod coupons;

pub use cart_reconciler::{CartLineInput, CartReconciler, ReconciledCart};
pub use checkout::{CheckoutService, CheckoutSettings};
pub use coupons::{CouponService, CouponValidation};
