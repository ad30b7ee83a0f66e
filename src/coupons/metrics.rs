// Inquiry Metrics
//
// Counts inquiry outcomes and tracks inquiry latency so slow store lookups and
// misconfigured coupons show up without a metrics backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::CouponConfig;
use crate::coupons::error::CouponError;

/// Default threshold for slow inquiries (100ms)
pub const DEFAULT_SLOW_INQUIRY_MS: u64 = 100;

/// Outcome counters and timings for coupon inquiries
#[derive(Debug, Clone)]
pub struct InquiryMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    slow_threshold_ms: u64,

    // Outcome counts
    inquiries: AtomicU64,
    accepted: AtomicU64,
    rejected: AtomicU64,
    configuration_defects: AtomicU64,
    redemptions: AtomicU64,
    redemption_conflicts: AtomicU64,

    // Timing (in microseconds)
    total_inquiry_time_us: AtomicU64,
    slow_inquiries: AtomicU64,
}

impl InquiryMetrics {
    /// Create metrics with the default slow threshold
    pub fn new() -> Self {
        Self::with_slow_threshold(DEFAULT_SLOW_INQUIRY_MS)
    }

    /// Create metrics that flag inquiries slower than `slow_threshold_ms`
    pub fn with_slow_threshold(slow_threshold_ms: u64) -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                slow_threshold_ms,
                inquiries: AtomicU64::new(0),
                accepted: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
                configuration_defects: AtomicU64::new(0),
                redemptions: AtomicU64::new(0),
                redemption_conflicts: AtomicU64::new(0),
                total_inquiry_time_us: AtomicU64::new(0),
                slow_inquiries: AtomicU64::new(0),
            }),
        }
    }

    /// Create metrics using the configured slow threshold
    pub fn from_config(config: &CouponConfig) -> Self {
        Self::with_slow_threshold(config.slow_inquiry_ms)
    }

    /// Start timing an inquiry; the duration is recorded when the timer drops
    pub fn start_inquiry(&self, code: &str) -> InquiryTimer {
        InquiryTimer {
            start: Instant::now(),
            code: code.to_string(),
            metrics: self.clone(),
        }
    }

    /// Record an accepted inquiry
    pub fn record_accepted(&self) {
        self.inner.accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed inquiry under the class of its error
    pub fn record_failure(&self, error: &CouponError) {
        if error.is_configuration_defect() {
            self.inner.configuration_defects.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a completed redemption
    pub fn record_redemption(&self) {
        self.inner.redemptions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a redemption whose inquiry passed but whose last use was already taken
    pub fn record_redemption_conflict(&self) {
        self.inner.redemption_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn slow_threshold_ms(&self) -> u64 {
        self.inner.slow_threshold_ms
    }

    fn record_inquiry(&self, code: &str, duration: Duration) {
        self.inner.inquiries.fetch_add(1, Ordering::Relaxed);
        self.inner
            .total_inquiry_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);

        if duration.as_millis() as u64 > self.inner.slow_threshold_ms {
            self.inner.slow_inquiries.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Slow coupon inquiry for {}: {}ms", code, duration.as_millis());
        }
    }

    /// Average inquiry time in milliseconds
    pub fn avg_inquiry_time_ms(&self) -> f64 {
        let count = self.inner.inquiries.load(Ordering::Relaxed);
        let total_us = self.inner.total_inquiry_time_us.load(Ordering::Relaxed);

        if count == 0 {
            0.0
        } else {
            (total_us as f64 / count as f64) / 1000.0
        }
    }

    /// Snapshot of all counters
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            inquiries: self.inner.inquiries.load(Ordering::Relaxed),
            accepted: self.inner.accepted.load(Ordering::Relaxed),
            rejected: self.inner.rejected.load(Ordering::Relaxed),
            configuration_defects: self.inner.configuration_defects.load(Ordering::Relaxed),
            redemptions: self.inner.redemptions.load(Ordering::Relaxed),
            redemption_conflicts: self.inner.redemption_conflicts.load(Ordering::Relaxed),
            avg_inquiry_time_ms: self.avg_inquiry_time_ms(),
            slow_inquiries: self.inner.slow_inquiries.load(Ordering::Relaxed),
        }
    }

    pub fn log_summary(&self) {
        let summary = self.summary();
        tracing::info!(
            "Coupon Inquiry Metrics:\n\
             Inquiries: {} total, {} accepted, {} rejected, {} configuration defects\n\
             Redemptions: {}, {} conflicts\n\
             Timing: avg {:.2}ms, {} slow",
            summary.inquiries,
            summary.accepted,
            summary.rejected,
            summary.configuration_defects,
            summary.redemptions,
            summary.redemption_conflicts,
            summary.avg_inquiry_time_ms,
            summary.slow_inquiries,
        );
    }
}

impl Default for InquiryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Timer for one inquiry
pub struct InquiryTimer {
    start: Instant,
    code: String,
    metrics: InquiryMetrics,
}

impl Drop for InquiryTimer {
    fn drop(&mut self) {
        self.metrics.record_inquiry(&self.code, self.start.elapsed());
    }
}

/// Summary of inquiry metrics
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSummary {
    pub inquiries: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub configuration_defects: u64,
    pub redemptions: u64,
    pub redemption_conflicts: u64,
    pub avg_inquiry_time_ms: f64,
    pub slow_inquiries: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_metrics_creation() {
        let metrics = InquiryMetrics::new();
        let summary = metrics.summary();
        assert_eq!(summary.inquiries, 0);
        assert_eq!(summary.avg_inquiry_time_ms, 0.0);
    }

    #[test]
    fn test_threshold_from_config() {
        let mut config = CouponConfig::default();
        config.slow_inquiry_ms = 0;
        let metrics = InquiryMetrics::from_config(&config);
        assert_eq!(metrics.slow_threshold_ms(), 0);

        {
            let _timer = metrics.start_inquiry("WELCOME");
            thread::sleep(Duration::from_millis(2));
        }

        assert_eq!(metrics.summary().slow_inquiries, 1);
    }

    #[test]
    fn test_outcome_classes() {
        let metrics = InquiryMetrics::new();

        metrics.record_accepted();
        metrics.record_failure(&CouponError::CouponNotFound);
        metrics.record_failure(&CouponError::MissingDiscountConfiguration);
        metrics.record_redemption();
        metrics.record_redemption_conflict();

        let summary = metrics.summary();
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.configuration_defects, 1);
        assert_eq!(summary.redemptions, 1);
        assert_eq!(summary.redemption_conflicts, 1);
    }

    #[test]
    fn test_inquiry_timer() {
        let metrics = InquiryMetrics::new();

        {
            let _timer = metrics.start_inquiry("WELCOME");
            thread::sleep(Duration::from_millis(10));
        }

        let summary = metrics.summary();
        assert_eq!(summary.inquiries, 1);
        assert!(summary.avg_inquiry_time_ms >= 10.0);
        assert_eq!(summary.slow_inquiries, 0);
    }

    #[test]
    fn test_slow_inquiry_detection() {
        let metrics = InquiryMetrics::with_slow_threshold(5);

        {
            let _timer = metrics.start_inquiry("WELCOME");
            thread::sleep(Duration::from_millis(20));
        }

        assert_eq!(metrics.summary().slow_inquiries, 1);
    }
}
