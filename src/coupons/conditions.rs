// Condition handlers and the registry that resolves them
//
// A coupon carries a list of condition records. Each record names a handler by
// identifier; the registry turns that identifier into a factory, and the factory binds
// a handler to the coupon, the record and the order amount for one evaluation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::config::CouponConfig;
use crate::coupons::error::{CouponError, CouponResult, CONDITION_HANDLER_CAPABILITY};
use crate::coupons::models::{Coupon, CouponCondition};

/// Payload passed along the chain
#[derive(Debug, Clone, Copy)]
pub struct Evaluation<'a> {
    pub coupon: &'a Coupon,
    pub amount: Decimal,
    pub now: DateTime<Utc>,
}

/// One eligibility rule
///
/// `Ok(())` hands control to the next handler in the chain; an error aborts the
/// whole evaluation. Rejections use `CouponError::condition_failed`.
pub trait ConditionHandler: Send {
    fn handle(&self, evaluation: &Evaluation<'_>) -> CouponResult<()>;
}

/// Builds a handler for one evaluation
///
/// Implemented for every closure `Fn(&Coupon, &CouponCondition, Decimal) -> CouponResult<H>`.
pub trait ConditionFactory: Send + Sync {
    fn bind(
        &self,
        coupon: &Coupon,
        condition: &CouponCondition,
        amount: Decimal,
    ) -> CouponResult<Box<dyn ConditionHandler>>;
}

impl<F, H> ConditionFactory for F
where
    F: Fn(&Coupon, &CouponCondition, Decimal) -> CouponResult<H> + Send + Sync,
    H: ConditionHandler + 'static,
{
    fn bind(
        &self,
        coupon: &Coupon,
        condition: &CouponCondition,
        amount: Decimal,
    ) -> CouponResult<Box<dyn ConditionHandler>> {
        let handler = self(coupon, condition, amount)?;
        Ok(Box::new(handler))
    }
}

/// Registry of condition identifiers
///
/// Identifiers come from two places: labels declared in configuration, and handler
/// factories registered in code. Only identifiers with a factory can run.
#[derive(Default, Clone)]
pub struct ConditionRegistry {
    labels: BTreeMap<String, String>,
    factories: HashMap<String, Arc<dyn ConditionFactory>>,
}

impl ConditionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the labels declared in configuration
    pub fn from_config(config: &CouponConfig) -> Self {
        let mut registry = Self::new();
        for (condition, label) in &config.conditions {
            registry.declare(condition.clone(), label.clone());
        }
        registry
    }

    /// Declare a condition identifier with a human-readable label
    pub fn declare(&mut self, condition: impl Into<String>, label: impl Into<String>) -> &mut Self {
        self.labels.insert(condition.into(), label.into());
        self
    }

    /// Register the handler factory for a condition identifier
    ///
    /// Registering the same identifier twice replaces the earlier factory.
    pub fn register<F>(&mut self, condition: impl Into<String>, factory: F) -> &mut Self
    where
        F: ConditionFactory + 'static,
    {
        let condition = condition.into();
        tracing::debug!("Registering coupon condition: {}", condition);
        self.factories.insert(condition, Arc::new(factory));
        self
    }

    /// True when a factory is registered for the identifier
    pub fn is_registered(&self, condition: &str) -> bool {
        self.factories.contains_key(condition)
    }

    /// Resolve an identifier to its factory
    ///
    /// # Errors
    /// - `UnknownConditionType` when neither declared nor registered
    /// - `InvalidConditionType` when declared but no handler is registered
    pub fn resolve(&self, condition: &str) -> CouponResult<Arc<dyn ConditionFactory>> {
        if let Some(factory) = self.factories.get(condition) {
            return Ok(factory.clone());
        }

        if self.labels.contains_key(condition) {
            return Err(CouponError::InvalidConditionType {
                condition: condition.to_string(),
                capability: CONDITION_HANDLER_CAPABILITY.to_string(),
            });
        }

        Err(CouponError::UnknownConditionType {
            condition: condition.to_string(),
        })
    }

    /// All known conditions as `(identifier, label)` sorted by identifier
    ///
    /// Registered conditions without a declared label are listed under their identifier.
    pub fn available_conditions(&self) -> Vec<(String, String)> {
        let mut conditions = self.labels.clone();
        for condition in self.factories.keys() {
            conditions
                .entry(condition.clone())
                .or_insert_with(|| condition.clone());
        }
        conditions.into_iter().collect()
    }
}

impl fmt::Debug for ConditionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut registered: Vec<&String> = self.factories.keys().collect();
        registered.sort();
        f.debug_struct("ConditionRegistry")
            .field("labels", &self.labels)
            .field("registered", &registered)
            .finish()
    }
}
