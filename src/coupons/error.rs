// Error types for coupon inquiry and redemption
// Separates expected customer-facing rejections from deployment defects

use thiserror::Error;
use tracing::{debug, error};

/// Capability every condition identifier must resolve to
pub const CONDITION_HANDLER_CAPABILITY: &str = "ConditionHandler";

/// Main error type for coupon evaluation
///
/// Every variant is terminal for the inquiry that produced it. Variants are split into
/// two classes: rejections the customer should see (bad code, exhausted coupon, failed
/// condition) and configuration defects that point at broken coupon data or a broken
/// deployment and must be reported to operators instead.
#[derive(Debug, Error)]
pub enum CouponError {
    /// The order amount is zero or negative
    #[error("The order is a free.")]
    FreeOrder,

    /// The order amount is too large for the discount arithmetic
    #[error("The order amount is out of range.")]
    AmountOutOfRange,

    /// No active coupon matches the code
    #[error("Coupon does not exist.")]
    CouponNotFound,

    /// `used_count` already reached `total_count`
    #[error("Coupon usage limit reached.")]
    CouponUsageLimitReached,

    /// The evaluation instant lies outside `[start_at, end_at]`
    #[error("Coupon time limit reached.")]
    CouponTimeLimitReached,

    /// A pluggable condition rejected the order
    /// Carries the handler's own message and numeric code
    #[error("{message}")]
    ConditionFailed {
        message: String,
        code: u16,
    },

    /// A condition identifier is not known to the registry
    #[error("Condition {condition} does not exist.")]
    UnknownConditionType {
        condition: String,
    },

    /// A condition identifier is known but has no handler behind it
    #[error("Condition {condition} does not implement {capability}.")]
    InvalidConditionType {
        condition: String,
        capability: String,
    },

    /// Neither discount field holds a positive value
    #[error("One of discount_amount or discount_percentage is required.")]
    MissingDiscountConfiguration,

    /// A condition's data payload does not have the shape its handler expects
    #[error("Invalid data for condition {condition}: {reason}")]
    MalformedConditionData {
        condition: String,
        reason: String,
    },

    /// Crate configuration could not be loaded or failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Store failure, automatically converted from sqlx::Error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type alias for coupon operations
pub type CouponResult<T> = Result<T, CouponError>;

impl CouponError {
    /// Build the error a condition handler returns to reject an order
    pub fn condition_failed(message: impl Into<String>, code: u16) -> Self {
        CouponError::ConditionFailed {
            message: message.into(),
            code,
        }
    }

    /// True for errors caused by bad coupon data, bad configuration or the store
    ///
    /// These must never be shown raw to customers; callers route them to their
    /// operational error channel.
    pub fn is_configuration_defect(&self) -> bool {
        matches!(
            self,
            CouponError::UnknownConditionType { .. }
                | CouponError::InvalidConditionType { .. }
                | CouponError::MissingDiscountConfiguration
                | CouponError::MalformedConditionData { .. }
                | CouponError::InvalidConfiguration(_)
                | CouponError::Database(_)
        )
    }

    /// Numeric code of the error
    ///
    /// Customer-facing rejections use 400, condition failures keep the code chosen by
    /// their handler, defects use 500.
    pub fn code(&self) -> u16 {
        match self {
            CouponError::ConditionFailed { code, .. } => *code,
            e if e.is_configuration_defect() => 500,
            _ => 400,
        }
    }

    /// Machine-readable error code (e.g. "COUPON_NOT_FOUND")
    pub fn error_code(&self) -> &'static str {
        match self {
            CouponError::FreeOrder => "FREE_ORDER",
            CouponError::AmountOutOfRange => "AMOUNT_OUT_OF_RANGE",
            CouponError::CouponNotFound => "COUPON_NOT_FOUND",
            CouponError::CouponUsageLimitReached => "COUPON_USAGE_LIMIT_REACHED",
            CouponError::CouponTimeLimitReached => "COUPON_TIME_LIMIT_REACHED",
            CouponError::ConditionFailed { .. } => "CONDITION_FAILED",
            CouponError::UnknownConditionType { .. } => "UNKNOWN_CONDITION_TYPE",
            CouponError::InvalidConditionType { .. } => "INVALID_CONDITION_TYPE",
            CouponError::MissingDiscountConfiguration => "MISSING_DISCOUNT_CONFIGURATION",
            CouponError::MalformedConditionData { .. } => "MALFORMED_CONDITION_DATA",
            CouponError::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            CouponError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Log the error on the channel matching its class
    ///
    /// - error!: configuration defects and store failures
    /// - debug!: expected rejections
    pub fn report(&self) {
        if self.is_configuration_defect() {
            error!(error_code = self.error_code(), "Coupon configuration defect: {}", self);
        } else {
            debug!(error_code = self.error_code(), "Coupon rejected: {}", self);
        }
    }
}

impl From<validator::ValidationErrors> for CouponError {
    fn from(err: validator::ValidationErrors) -> Self {
        CouponError::InvalidConfiguration(err.to_string())
    }
}
