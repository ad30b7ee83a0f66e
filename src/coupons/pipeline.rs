// Evaluation Pipeline
//
// Assembles the ordered chain [validity, condition 1, ..., condition n] for a coupon and
// runs it. Execution stops at the first handler that fails.

use std::sync::Arc;

use crate::coupons::conditions::{ConditionFactory, ConditionHandler, ConditionRegistry, Evaluation};
use crate::coupons::error::CouponResult;
use crate::coupons::models::{Coupon, CouponCondition};
use crate::coupons::validity::ValidityCheck;

/// One link of the chain
///
/// Condition stages keep their resolved factory and bind it only when the stage is
/// reached, so no factory runs for a coupon an earlier stage already rejected.
enum Stage {
    Validity(ValidityCheck),
    Condition {
        condition: CouponCondition,
        factory: Arc<dyn ConditionFactory>,
    },
}

impl Stage {
    fn name(&self) -> &str {
        match self {
            Stage::Validity(_) => ValidityCheck::NAME,
            Stage::Condition { condition, .. } => &condition.condition,
        }
    }

    fn handle(&self, evaluation: &Evaluation<'_>) -> CouponResult<()> {
        match self {
            Stage::Validity(check) => check.handle(evaluation),
            Stage::Condition { condition, factory } => factory
                .bind(evaluation.coupon, condition, evaluation.amount)?
                .handle(evaluation),
        }
    }
}

/// Ordered chain of handlers for one coupon evaluation
pub struct EvaluationPipeline {
    stages: Vec<Stage>,
}

impl EvaluationPipeline {
    /// Assemble the chain for a coupon
    ///
    /// Every condition identifier is resolved here, so an unknown or invalid
    /// identifier fails the assembly before any stage runs.
    pub fn assemble(registry: &ConditionRegistry, coupon: &Coupon) -> CouponResult<Self> {
        let mut stages = Vec::with_capacity(coupon.conditions.len() + 1);
        stages.push(Stage::Validity(ValidityCheck));

        for condition in &coupon.conditions {
            stages.push(Stage::Condition {
                factory: registry.resolve(&condition.condition)?,
                condition: condition.clone(),
            });
        }

        tracing::debug!(
            "Assembled pipeline for coupon {} with {} stages",
            coupon.code,
            stages.len()
        );

        Ok(Self { stages })
    }

    /// Run the chain in order, stopping at the first failure
    ///
    /// A condition's factory is bound right before its handler runs; a bind error
    /// stops the chain like a rejection.
    pub fn run(&self, evaluation: &Evaluation<'_>) -> CouponResult<()> {
        for stage in &self.stages {
            if let Err(e) = stage.handle(evaluation) {
                tracing::debug!(
                    "Coupon {} rejected by {}: {}",
                    evaluation.coupon.code,
                    stage.name(),
                    e
                );
                return Err(e);
            }
        }

        Ok(())
    }

    /// Stage identifiers in execution order
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(Stage::name).collect()
    }

    /// Number of stages, the validity check included
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false; the validity check is always present
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
