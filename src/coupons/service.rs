use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::CouponConfig;
use crate::coupons::conditions::{ConditionRegistry, Evaluation};
use crate::coupons::discount_calculator::DiscountCalculator;
use crate::coupons::error::{CouponError, CouponResult};
use crate::coupons::metrics::InquiryMetrics;
use crate::coupons::models::EvaluationResult;
use crate::coupons::pipeline::EvaluationPipeline;
use crate::coupons::repository::CouponStore;

/// Service for coupon inquiry and redemption
///
/// Generic over the store so the same flow runs against a pool, a transaction or
/// the in-memory store.
pub struct CouponInquiry<S: CouponStore> {
    store: S,
    registry: Arc<ConditionRegistry>,
    metrics: InquiryMetrics,
}

impl<S: CouponStore> CouponInquiry<S> {
    /// Create a new CouponInquiry
    ///
    /// Metrics use the default slow-inquiry threshold; use `from_config` to apply
    /// `COUPON_SLOW_INQUIRY_MS`.
    pub fn new(store: S, registry: Arc<ConditionRegistry>) -> Self {
        Self::with_metrics(store, registry, InquiryMetrics::new())
    }

    /// Create a new CouponInquiry with metrics tuned by configuration
    pub fn from_config(store: S, registry: Arc<ConditionRegistry>, config: &CouponConfig) -> Self {
        Self::with_metrics(store, registry, InquiryMetrics::from_config(config))
    }

    /// Create a new CouponInquiry that records into shared metrics
    pub fn with_metrics(store: S, registry: Arc<ConditionRegistry>, metrics: InquiryMetrics) -> Self {
        Self {
            store,
            registry,
            metrics,
        }
    }

    /// Evaluate a coupon code against an order amount at the current instant
    ///
    /// # Arguments
    /// * `code` - Coupon code, matched exactly
    /// * `amount` - Order amount before discount
    /// * `exclusive_lock` - Read the coupon row with an exclusive lock
    ///
    /// # Returns
    /// The discount and payable amount, or the first rejection
    ///
    /// # Evaluation order
    /// - Non-positive amount: `FreeOrder`, the store is not consulted
    /// - No active coupon with the code: `CouponNotFound`
    /// - Every condition identifier is resolved, then the validity check and the
    ///   coupon's conditions run in order, stopping at the first failure
    /// - The discount is computed from the coupon's discount fields
    ///
    /// `used_count` is never changed; see `redeem`.
    pub async fn inquire(
        &self,
        code: &str,
        amount: Decimal,
        exclusive_lock: bool,
    ) -> CouponResult<EvaluationResult> {
        self.inquire_at(code, amount, exclusive_lock, Utc::now()).await
    }

    /// Same as `inquire` with an explicit evaluation instant
    pub async fn inquire_at(
        &self,
        code: &str,
        amount: Decimal,
        exclusive_lock: bool,
        now: DateTime<Utc>,
    ) -> CouponResult<EvaluationResult> {
        let span = tracing::debug_span!("coupon_inquiry", inquiry_id = %Uuid::new_v4(), code = %code);
        let _timer = self.metrics.start_inquiry(code);

        let result = self
            .evaluate(code, amount, exclusive_lock, now)
            .instrument(span)
            .await;

        match &result {
            Ok(evaluation) => {
                self.metrics.record_accepted();
                tracing::info!(
                    "Coupon {} accepted: amount {}, discount {}, payable {}",
                    code,
                    evaluation.amount,
                    evaluation.discount_amount,
                    evaluation.payable_amount
                );
            }
            Err(e) => {
                self.metrics.record_failure(e);
                e.report();
            }
        }

        result
    }

    async fn evaluate(
        &self,
        code: &str,
        amount: Decimal,
        exclusive_lock: bool,
        now: DateTime<Utc>,
    ) -> CouponResult<EvaluationResult> {
        if amount <= Decimal::ZERO {
            return Err(CouponError::FreeOrder);
        }

        let coupon = self
            .store
            .find_active_coupon_by_code(code, exclusive_lock)
            .await?
            .ok_or(CouponError::CouponNotFound)?;

        let pipeline = EvaluationPipeline::assemble(&self.registry, &coupon)?;
        pipeline.run(&Evaluation {
            coupon: &coupon,
            amount,
            now,
        })?;

        let breakdown = DiscountCalculator::compute(
            amount,
            coupon.discount_percentage,
            coupon.discount_amount,
        )?;

        Ok(EvaluationResult {
            currency: coupon.currency,
            amount,
            discount_amount: breakdown.discount_amount,
            payable_amount: breakdown.payable_amount,
            coupon,
        })
    }

    /// Inquire with an exclusive lock and consume one use of the coupon
    ///
    /// The increment only succeeds while `used_count < total_count`, so a concurrent
    /// redemption that took the last use surfaces as `CouponUsageLimitReached`.
    /// Run this on a `PgCouponTransaction` and commit afterwards to hold the row lock
    /// across both steps.
    ///
    /// The inquiry is counted once by `inquire`; a lost race is counted as a
    /// redemption conflict, not as a second rejected inquiry.
    pub async fn redeem(&self, code: &str, amount: Decimal) -> CouponResult<EvaluationResult> {
        let mut result = self.inquire(code, amount, true).await?;

        if !self.store.increment_used_count(result.coupon.id).await? {
            let error = CouponError::CouponUsageLimitReached;
            self.metrics.record_redemption_conflict();
            error.report();
            return Err(error);
        }

        result.coupon.used_count += 1;
        self.metrics.record_redemption();
        tracing::info!(
            "Coupon {} redeemed ({}/{} used)",
            code,
            result.coupon.used_count,
            result.coupon.total_count
        );

        Ok(result)
    }

    pub fn registry(&self) -> &ConditionRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &InquiryMetrics {
        &self.metrics
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Give the store back, e.g. to commit a transaction
    pub fn into_store(self) -> S {
        self.store
    }
}
