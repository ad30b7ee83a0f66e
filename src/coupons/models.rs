use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::coupons::error::{CouponError, CouponResult};

/// Coupon status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CouponStatus {
    Active,
    Inactive,
}

impl CouponStatus {
    /// Convert status to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponStatus::Active => "active",
            CouponStatus::Inactive => "inactive",
        }
    }
}

impl Default for CouponStatus {
    fn default() -> Self {
        CouponStatus::Inactive
    }
}

impl std::fmt::Display for CouponStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Currency a coupon's fixed discount is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Irr,
    Usd,
    Eur,
    Gbp,
}

impl Currency {
    /// ISO 4217 code
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Irr => "IRR",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "IRR" => Ok(Currency::Irr),
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            _ => Err(format!("Invalid currency: {}", s)),
        }
    }
}

/// Coupon entity
///
/// Owned by the store. `used_count <= total_count` is not enforced here; the
/// validity check in the pipeline is responsible for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Coupon {
    pub id: i64,
    pub title: Option<String>,
    pub code: String,
    pub discount_percentage: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
    pub currency: Currency,
    pub total_count: i32,
    pub used_count: i32,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub provider: Option<String>,
    pub status: CouponStatus,
    pub description: Option<String>,
    /// Attached conditions in execution order
    #[sqlx(skip)]
    #[serde(default)]
    pub conditions: Vec<CouponCondition>,
}

impl Coupon {
    /// Remaining redemptions, never negative
    pub fn remaining_count(&self) -> i32 {
        (self.total_count - self.used_count).max(0)
    }

    /// True when `now` lies inside `[start_at, end_at]`
    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_at && now <= self.end_at
    }
}

/// Condition attached to a coupon
///
/// `condition` is the registry identifier of the handler; `data` is opaque to
/// everything except that handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CouponCondition {
    pub id: i64,
    pub coupon_id: i64,
    pub condition: String,
    pub data: serde_json::Value,
}

impl CouponCondition {
    /// Deserialize the payload into the shape a handler expects
    ///
    /// A payload that does not match is reported as `MalformedConditionData`
    /// for this condition.
    pub fn data_as<T: DeserializeOwned>(&self) -> CouponResult<T> {
        serde_json::from_value(self.data.clone()).map_err(|e| CouponError::MalformedConditionData {
            condition: self.condition.clone(),
            reason: e.to_string(),
        })
    }
}

/// Result of a successful inquiry
///
/// Produced once per call; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub currency: Currency,
    pub amount: Decimal,
    pub discount_amount: Decimal,
    pub payable_amount: Decimal,
    pub coupon: Coupon,
}
