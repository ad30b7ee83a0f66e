use crate::coupons::conditions::{ConditionHandler, Evaluation};
use crate::coupons::error::{CouponError, CouponResult};

/// Built-in check that runs first in every pipeline
///
/// Rejects coupons whose usage limit is reached, then coupons evaluated outside their
/// validity window. Usage is checked before time so a coupon violating both always
/// reports the usage limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidityCheck;

impl ValidityCheck {
    /// Identifier the check reports under in logs
    pub const NAME: &'static str = "validity";
}

impl ConditionHandler for ValidityCheck {
    fn handle(&self, evaluation: &Evaluation<'_>) -> CouponResult<()> {
        let coupon = evaluation.coupon;

        if coupon.remaining_count() == 0 {
            return Err(CouponError::CouponUsageLimitReached);
        }

        if !coupon.is_within_window(evaluation.now) {
            return Err(CouponError::CouponTimeLimitReached);
        }

        Ok(())
    }
}
