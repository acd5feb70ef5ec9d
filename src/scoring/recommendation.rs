use std::fmt;

use serde::{Deserialize, Serialize};

use crate::metrics::WorkflowMetrics;

/// Recruiter-facing verdict shown at the end of a conclusion. It uses its own
/// weighting, separate from the behavior score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    StrongCandidate,
    PromisingCandidate,
    NeedsReview,
    ConcernsNoted,
}

impl Recommendation {
    pub fn from_points(points: u32) -> Self {
        match points {
            80.. => Recommendation::StrongCandidate,
            60..=79 => Recommendation::PromisingCandidate,
            40..=59 => Recommendation::NeedsReview,
            _ => Recommendation::ConcernsNoted,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Recommendation::StrongCandidate => "STRONG CANDIDATE",
            Recommendation::PromisingCandidate => "PROMISING CANDIDATE",
            Recommendation::NeedsReview => "NEEDS REVIEW",
            Recommendation::ConcernsNoted => "CONCERNS NOTED",
        }
    }

    pub fn summary(self) -> &'static str {
        match self {
            Recommendation::StrongCandidate => {
                "Shows authentic problem-solving skills and good development practices."
            }
            Recommendation::PromisingCandidate => {
                "Demonstrates competence with some areas for discussion in interview."
            }
            Recommendation::NeedsReview => {
                "Mixed signals; recommend deeper technical interview to assess true ability."
            }
            Recommendation::ConcernsNoted => {
                "Multiple red flags suggest possible over-reliance on external resources."
            }
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.label(), self.summary())
    }
}

/// Points out of 100 backing the recommendation tier.
pub fn recommendation_points(metrics: &WorkflowMetrics) -> u32 {
    let mut points = 0;
    if metrics.linear_typing_ratio > 0.5 {
        points += 25;
    }
    if metrics.refine_cycles >= 2 {
        points += 20;
    }
    if metrics.large_paste_count == 0 {
        points += 20;
    }
    if metrics.ai_usage_count <= 3 {
        points += 15;
    }
    if metrics.focus_percent() >= 70.0 {
        points += 10;
    }
    if metrics.run_count >= 2 {
        points += 10;
    }
    points
}

pub fn recommend(metrics: &WorkflowMetrics) -> Recommendation {
    Recommendation::from_points(recommendation_points(metrics))
}
