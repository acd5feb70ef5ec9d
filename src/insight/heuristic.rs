use async_trait::async_trait;

use super::{Insight, InsightRequest, InsightSynthesizer};
use crate::error::SignalResult;
use crate::metrics::WorkflowMetrics;
use crate::scoring::recommend;

const NO_ACTIVITY: &str = "Limited activity recorded.";

/// Rule-based synthesizer. Deterministic and offline, so it also serves as
/// the recruiter overview's one-line summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicSynthesizer;

#[async_trait]
impl InsightSynthesizer for HeuristicSynthesizer {
    fn name(&self) -> &'static str {
        "heuristic synthesizer"
    }

    async fn synthesize(&self, request: &InsightRequest) -> SignalResult<Insight> {
        Ok(Insight {
            insight: insight_line(&request.metrics),
            conclusion: Some(conclusion(&request.metrics)),
        })
    }
}

/// Short summary of notable signals, e.g. "Used AI 2x. 1 large paste(s) detected".
pub fn insight_line(metrics: &WorkflowMetrics) -> String {
    let mut parts = Vec::new();

    if metrics.edit_count > 20 {
        parts.push("High editing activity".to_string());
    }
    if metrics.refine_cycles > 3 {
        parts.push("Good iterative refinement".to_string());
    }
    if metrics.ai_usage_count > 0 {
        parts.push(format!("Used AI {}x", metrics.ai_usage_count));
    }
    match metrics.large_paste_count {
        0 => {}
        n if n > 2 => parts.push("Multiple large pastes detected".to_string()),
        n => parts.push(format!("{n} large paste(s) detected")),
    }
    if metrics.linear_typing_ratio > 0.6 {
        parts.push("Linear typing pattern (likely manual coding)".to_string());
    }
    if metrics.context_switch_seconds > 60.0 {
        parts.push(format!(
            "~{}s away from task",
            metrics.context_switch_seconds.trunc() as i64
        ));
    }

    if parts.is_empty() {
        NO_ACTIVITY.to_string()
    } else {
        parts.join(". ")
    }
}

/// Multi-part assessment ending with the recommendation tier.
pub fn conclusion(metrics: &WorkflowMetrics) -> String {
    let linear = metrics.linear_typing_ratio;
    let pastes = metrics.large_paste_count;
    let focus = metrics.focus_percent();
    let mut parts: Vec<String> = Vec::new();

    if linear > 0.6 && pastes == 0 {
        parts.push("Strong evidence of authentic, manual coding".into());
    } else if linear > 0.4 && pastes <= 1 {
        parts.push("Mostly original work with minimal external code".into());
    } else if pastes > 2 || (pastes > 0 && linear < 0.3) {
        parts.push(
            "Significant reliance on copy-pasted code - review pasted content carefully".into(),
        );
    }

    if metrics.refine_cycles >= 4 {
        parts.push(
            "Excellent iterative problem-solving approach with multiple test-and-refine cycles"
                .into(),
        );
    } else if metrics.refine_cycles >= 2 {
        parts.push("Good iterative development pattern".into());
    } else if metrics.run_count == 0 {
        parts.push(
            "Did not test code before submission - may indicate uncertainty or time pressure"
                .into(),
        );
    } else if metrics.refine_cycles == 0 {
        parts.push(
            "Limited iteration - code may have worked on first attempt or candidate gave up early"
                .into(),
        );
    }

    parts.push(match metrics.ai_usage_count {
        0 => "Completed task independently without AI assistance".into(),
        1..=2 => "Minimal AI usage - shows self-reliance".into(),
        3..=5 => "Moderate AI assistance - reasonable use of available tools".into(),
        n => format!("Heavy AI reliance ({n} queries) - may indicate struggle with core concepts"),
    });

    if focus >= 90.0 {
        parts.push("Highly focused throughout the assessment".into());
    } else if focus >= 70.0 {
        parts.push("Good focus with minimal distractions".into());
    } else if focus < 50.0 {
        parts.push(format!(
            "Spent {}% of time away from task - possible external research or distraction",
            100 - focus.trunc() as i64
        ));
    }

    if metrics.total_time_seconds > 0.0 {
        let per_run = metrics.edits_per_run;
        if per_run > 10.0 {
            parts.push("Thoughtful approach - makes many changes before testing".into());
        } else if per_run > 0.0 && per_run < 3.0 {
            parts.push("Quick iteration style - tests frequently".into());
        }
    }

    format!("{}.\n\n{}", parts.join(". "), recommend(metrics))
}
