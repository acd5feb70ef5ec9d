//! Behavior scoring: workflow metrics to a bounded trust score.
//!
//! The score starts at [`BASE_SCORE`] and adds the delta of every rule in
//! [`RULES`] that fires. Rules are independent, so the breakdown reads as a
//! plain sum; the total is clamped to `0..=100`.

pub mod recommendation;
pub mod rules;

use serde::Serialize;

use crate::metrics::WorkflowMetrics;

pub use recommendation::{recommend, Recommendation};
pub use rules::{Rule, RULES};

pub const BASE_SCORE: i32 = 50;
pub const MIN_SCORE: i32 = 0;
pub const MAX_SCORE: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuleContribution {
    pub rule: Rule,
    pub delta: i32,
    pub description: &'static str,
}

impl From<Rule> for RuleContribution {
    fn from(rule: Rule) -> Self {
        Self {
            rule,
            delta: rule.delta(),
            description: rule.describe(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BehaviorScore {
    pub value: u8,
    /// Base plus deltas before clamping.
    pub unclamped: i32,
    /// Rules that fired, in table order.
    pub breakdown: Vec<RuleContribution>,
}

impl BehaviorScore {
    pub fn contribution(&self, rule: Rule) -> Option<i32> {
        self.breakdown
            .iter()
            .find(|c| c.rule == rule)
            .map(|c| c.delta)
    }
}

pub fn score(metrics: &WorkflowMetrics) -> BehaviorScore {
    let breakdown: Vec<RuleContribution> = RULES
        .iter()
        .copied()
        .filter(|rule| rule.applies(metrics))
        .map(RuleContribution::from)
        .collect();

    let unclamped = BASE_SCORE + breakdown.iter().map(|c| c.delta).sum::<i32>();
    let value = unclamped.clamp(MIN_SCORE, MAX_SCORE) as u8;

    BehaviorScore {
        value,
        unclamped,
        breakdown,
    }
}
