use serde::{Deserialize, Serialize};

use crate::metrics::WorkflowMetrics;

/// One independent scoring rule. Each rule looks at the metrics on its own
/// and contributes a fixed delta when it fires; rules never see each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// More than half of classified edits were incremental typing.
    LinearTyping,
    /// At least two edit-then-rerun iterations.
    IterativeRefinement,
    NoLargePastes,
    ModerateAiUsage,
    RepeatedLargePastes,
    HeavyAiUsage,
    /// Tab hidden for more than 30% of the session.
    FrequentTabAway,
    /// Tab hidden for more than 50% of the session. Stacks with `FrequentTabAway`.
    ExtendedTabAway,
}

/// Evaluation order of the table. Order does not affect the result.
pub const RULES: [Rule; 8] = [
    Rule::LinearTyping,
    Rule::IterativeRefinement,
    Rule::NoLargePastes,
    Rule::ModerateAiUsage,
    Rule::RepeatedLargePastes,
    Rule::HeavyAiUsage,
    Rule::FrequentTabAway,
    Rule::ExtendedTabAway,
];

impl Rule {
    pub fn delta(self) -> i32 {
        match self {
            Rule::LinearTyping => 20,
            Rule::IterativeRefinement => 15,
            Rule::NoLargePastes => 15,
            Rule::ModerateAiUsage => 10,
            Rule::RepeatedLargePastes => -30,
            Rule::HeavyAiUsage => -20,
            Rule::FrequentTabAway => -15,
            Rule::ExtendedTabAway => -15,
        }
    }

    pub fn applies(self, metrics: &WorkflowMetrics) -> bool {
        match self {
            Rule::LinearTyping => metrics.linear_typing_ratio > 0.5,
            Rule::IterativeRefinement => metrics.refine_cycles >= 2,
            Rule::NoLargePastes => metrics.large_paste_count == 0,
            Rule::ModerateAiUsage => metrics.ai_usage_count <= 3,
            Rule::RepeatedLargePastes => metrics.large_paste_count > 2,
            Rule::HeavyAiUsage => metrics.ai_usage_count > 8,
            Rule::FrequentTabAway => metrics.away_ratio() > 0.3,
            Rule::ExtendedTabAway => metrics.away_ratio() > 0.5,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Rule::LinearTyping => "linear typing ratio above 0.5",
            Rule::IterativeRefinement => "two or more refine cycles",
            Rule::NoLargePastes => "no large pastes",
            Rule::ModerateAiUsage => "AI assistant used at most 3 times",
            Rule::RepeatedLargePastes => "more than 2 large pastes",
            Rule::HeavyAiUsage => "AI assistant used more than 8 times",
            Rule::FrequentTabAway => "tab hidden for more than 30% of the session",
            Rule::ExtendedTabAway => "tab hidden for more than 50% of the session",
        }
    }
}
