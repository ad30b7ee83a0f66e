use rust_decimal::Decimal;

use crate::coupons::error::{CouponError, CouponResult};

/// Discount applied to an order and what is left to pay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscountBreakdown {
    pub discount_amount: Decimal,
    pub payable_amount: Decimal,
}

/// Service for calculating coupon discounts
pub struct DiscountCalculator;

impl DiscountCalculator {
    /// Compute the discount for an order amount
    ///
    /// # Arguments
    /// * `amount` - Order amount
    /// * `discount_percentage` - Percentage off, 0 to 100
    /// * `discount_amount` - Fixed amount off, also the ceiling when both are set
    ///
    /// # Policy
    /// A field counts only when it is strictly positive.
    /// 1. Both set: the smaller of `amount * percentage / 100` and the fixed amount
    /// 2. Only fixed: the fixed amount
    /// 3. Only percentage: `amount * percentage / 100`
    /// 4. Neither: `MissingDiscountConfiguration`
    ///
    /// The discount never exceeds the order amount, so the payable amount is never negative.
    /// An amount too large to multiply by the percentage is `AmountOutOfRange`.
    pub fn compute(
        amount: Decimal,
        discount_percentage: Option<Decimal>,
        discount_amount: Option<Decimal>,
    ) -> CouponResult<DiscountBreakdown> {
        let percentage = positive(discount_percentage);
        let fixed = positive(discount_amount);

        let discount = match (percentage, fixed) {
            (Some(percentage), Some(fixed)) => Self::percentage_of(amount, percentage)?.min(fixed),
            (None, Some(fixed)) => fixed,
            (Some(percentage), None) => Self::percentage_of(amount, percentage)?,
            (None, None) => return Err(CouponError::MissingDiscountConfiguration),
        };

        Ok(Self::apply(amount, discount))
    }

    /// `amount * percentage / 100`
    pub fn percentage_of(amount: Decimal, percentage: Decimal) -> CouponResult<Decimal> {
        amount
            .checked_mul(percentage)
            .and_then(|product| product.checked_div(Decimal::ONE_HUNDRED))
            .ok_or(CouponError::AmountOutOfRange)
    }

    /// Subtract a discount, clamping at zero
    fn apply(amount: Decimal, discount: Decimal) -> DiscountBreakdown {
        let payable_amount = amount - discount;

        if payable_amount < Decimal::ZERO {
            return DiscountBreakdown {
                discount_amount: amount,
                payable_amount: Decimal::ZERO,
            };
        }

        DiscountBreakdown {
            discount_amount: discount,
            payable_amount,
        }
    }
}

/// Zero and null are both "not configured"
fn positive(value: Option<Decimal>) -> Option<Decimal> {
    value.filter(|v| *v > Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_fixed_amount_only() {
        let result = DiscountCalculator::compute(dec!(100), Some(dec!(0)), Some(dec!(50.5))).unwrap();
        assert_eq!(result.discount_amount, dec!(50.5));
        assert_eq!(result.payable_amount, dec!(49.5));
    }

    #[test]
    fn test_percentage_only() {
        let result = DiscountCalculator::compute(dec!(100), Some(dec!(50)), Some(dec!(0))).unwrap();
        assert_eq!(result.discount_amount, dec!(50));
        assert_eq!(result.payable_amount, dec!(50));
    }

    #[test]
    fn test_fixed_amount_caps_larger_percentage() {
        let result = DiscountCalculator::compute(dec!(100), Some(dec!(52)), Some(dec!(50.5))).unwrap();
        assert_eq!(result.discount_amount, dec!(50.5));
        assert_eq!(result.payable_amount, dec!(49.5));
    }

    #[test]
    fn test_smaller_percentage_wins() {
        let result = DiscountCalculator::compute(dec!(100), Some(dec!(47)), Some(dec!(50.5))).unwrap();
        assert_eq!(result.discount_amount, dec!(47));
        assert_eq!(result.payable_amount, dec!(53));
    }

    #[test]
    fn test_equal_candidates_give_same_discount() {
        let result = DiscountCalculator::compute(dec!(100), Some(dec!(50)), Some(dec!(50))).unwrap();
        assert_eq!(result.discount_amount, dec!(50));
        assert_eq!(result.payable_amount, dec!(50));
    }

    #[test]
    fn test_overflowing_amount_is_rejected() {
        let result = DiscountCalculator::compute(Decimal::MAX, Some(dec!(50)), None);
        assert!(matches!(result, Err(CouponError::AmountOutOfRange)));

        let result = DiscountCalculator::compute(Decimal::MAX, Some(dec!(50)), Some(dec!(10)));
        assert!(matches!(result, Err(CouponError::AmountOutOfRange)));
    }

    #[test]
    fn test_huge_amount_with_fixed_discount_only() {
        let result = DiscountCalculator::compute(Decimal::MAX, None, Some(dec!(10))).unwrap();
        assert_eq!(result.discount_amount, dec!(10));
        assert_eq!(result.payable_amount, Decimal::MAX - dec!(10));
    }

    #[test]
    fn test_fixed_amount_larger_than_order_is_clamped() {
        let result = DiscountCalculator::compute(dec!(30), None, Some(dec!(50))).unwrap();
        assert_eq!(result.discount_amount, dec!(30));
        assert_eq!(result.payable_amount, dec!(0));
    }

    #[test]
    fn test_missing_configuration() {
        for (percentage, fixed) in [
            (None, None),
            (Some(dec!(0)), Some(dec!(0))),
            (Some(dec!(-5)), None),
        ] {
            let result = DiscountCalculator::compute(dec!(100), percentage, fixed);
            assert!(matches!(result, Err(CouponError::MissingDiscountConfiguration)));
        }
    }

    #[test]
    fn test_decimal_precision() {
        let result = DiscountCalculator::compute(dec!(19.99), Some(dec!(15)), None).unwrap();
        assert_eq!(result.discount_amount, dec!(2.9985));
        assert_eq!(result.payable_amount, dec!(16.9915));
    }
}
