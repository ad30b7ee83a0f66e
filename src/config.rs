// Configuration for the coupon engine
//
// Values come from the process environment, with a `.env` file loaded first when
// present. Every value except DATABASE_URL has a default.

use std::collections::BTreeMap;
use std::time::Duration;
use validator::{Validate, ValidationError};

use crate::coupons::error::{CouponError, CouponResult};
use crate::coupons::metrics::DEFAULT_SLOW_INQUIRY_MS;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 3;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct CouponConfig {
    /// PostgreSQL connection string, only needed by `db::create_pool`
    pub database_url: Option<String>,

    #[validate(range(min = 1, max = 100, message = "DB_MAX_CONNECTIONS must be between 1 and 100"))]
    pub max_connections: u32,

    #[validate(range(min = 1, message = "DB_ACQUIRE_TIMEOUT_SECS must be at least 1"))]
    pub acquire_timeout_secs: u64,

    /// Declared condition identifiers and their labels
    #[validate(custom = "validate_condition_labels")]
    pub conditions: BTreeMap<String, String>,

    pub slow_inquiry_ms: u64,
}

impl Default for CouponConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
            conditions: BTreeMap::new(),
            slow_inquiry_ms: DEFAULT_SLOW_INQUIRY_MS,
        }
    }
}

impl CouponConfig {
    /// Load configuration from `.env` and the environment
    ///
    /// # Variables
    /// - `DATABASE_URL`
    /// - `DB_MAX_CONNECTIONS` (default 5)
    /// - `DB_ACQUIRE_TIMEOUT_SECS` (default 3)
    /// - `COUPON_CONDITIONS`: JSON object of identifier to label
    /// - `COUPON_SLOW_INQUIRY_MS` (default 100)
    pub fn from_env() -> CouponResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> CouponResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let conditions = match lookup("COUPON_CONDITIONS") {
            Some(raw) => serde_json::from_str::<BTreeMap<String, String>>(&raw).map_err(|e| {
                CouponError::InvalidConfiguration(format!("COUPON_CONDITIONS: {}", e))
            })?,
            None => defaults.conditions,
        };

        let config = Self {
            database_url: lookup("DATABASE_URL"),
            max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", defaults.max_connections)?,
            acquire_timeout_secs: parse_or(
                &lookup,
                "DB_ACQUIRE_TIMEOUT_SECS",
                defaults.acquire_timeout_secs,
            )?,
            conditions,
            slow_inquiry_ms: parse_or(&lookup, "COUPON_SLOW_INQUIRY_MS", defaults.slow_inquiry_ms)?,
        };

        config.validate()?;
        tracing::debug!("Loaded coupon configuration with {} declared conditions", config.conditions.len());

        Ok(config)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> CouponResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| CouponError::InvalidConfiguration(format!("{}: {}", key, e))),
        None => Ok(default),
    }
}

/// Identifiers and labels must be non-blank
fn validate_condition_labels(conditions: &BTreeMap<String, String>) -> Result<(), ValidationError> {
    let blank = conditions
        .iter()
        .any(|(condition, label)| condition.trim().is_empty() || label.trim().is_empty());

    if blank {
        return Err(ValidationError::new("blank_condition_identifier_or_label"));
    }

    Ok(())
}
