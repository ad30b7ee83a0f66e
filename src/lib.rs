//! Conditional coupon evaluation
//!
//! Looks up a coupon by code, runs its validity check and pluggable conditions in
//! order, and computes the discount for an order amount.
//!
//! ```no_run
//! use std::sync::Arc;
//! use conditional_coupon::{ConditionRegistry, CouponConfig, CouponInquiry, PgCouponStore};
//! use rust_decimal::Decimal;
//!
//! # async fn run() -> conditional_coupon::CouponResult<()> {
//! conditional_coupon::logging::init_tracing();
//! let config = CouponConfig::from_env()?;
//! let pool = conditional_coupon::db::create_pool(&config).await?;
//!
//! let registry = Arc::new(ConditionRegistry::from_config(&config));
//! let inquiry = CouponInquiry::new(PgCouponStore::new(pool), registry);
//! let result = inquiry.inquire("WELCOME", Decimal::from(100), false).await?;
//! println!("pay {}", result.payable_amount);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coupons;
pub mod db;
pub mod logging;

pub use config::CouponConfig;
pub use coupons::*;
