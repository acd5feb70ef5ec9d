use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::{CaseResult, NewEvent, SessionKey, Submission, Task};
use crate::error::SignalResult;
use crate::event_log::validation::{parse_event_type, parse_metadata};
use crate::metrics::WorkflowMetrics;
use crate::scoring::{BehaviorScore, Recommendation};

/// Raw ingestion payload as sent by the candidate's client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRequest {
    pub candidate_id: i64,
    pub task_id: i64,
    pub event_type: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl EventRequest {
    pub fn into_new_event(self) -> SignalResult<NewEvent> {
        let event_type = parse_event_type(&self.event_type)?;
        let metadata = parse_metadata(self.metadata)?;

        Ok(NewEvent {
            candidate_id: self.candidate_id,
            task_id: self.task_id,
            event_type,
            timestamp: self.timestamp,
            metadata,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub candidate_id: i64,
    pub task_id: i64,
    pub final_code: String,
    #[serde(default)]
    pub reflection: Option<String>,
}

impl SubmitRequest {
    pub fn key(&self) -> SessionKey {
        SessionKey::new(self.candidate_id, self.task_id)
    }
}

/// A free run of work in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub candidate_id: i64,
    pub task_id: i64,
    #[serde(default)]
    pub code: String,
}

impl RunRequest {
    pub fn key(&self) -> SessionKey {
        SessionKey::new(self.candidate_id, self.task_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub submission_id: String,
    pub tests_passed: u32,
    pub tests_total: u32,
    pub results: Vec<CaseResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_error: Option<String>,
}

impl From<&Submission> for SubmitResponse {
    fn from(submission: &Submission) -> Self {
        Self {
            submission_id: submission.id.clone(),
            tests_passed: submission.tests_passed,
            tests_total: submission.tests_total,
            results: submission.results.clone(),
            run_error: submission.run_error.clone(),
        }
    }
}

/// Everything a recruiter sees for one session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub candidate_id: i64,
    pub task_id: i64,
    pub task: Option<Task>,
    pub metrics: WorkflowMetrics,
    pub score: BehaviorScore,
    pub recommendation: Recommendation,
    /// `None` when the insight synthesizer failed or timed out.
    pub insight: Option<String>,
    pub conclusion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insight_error: Option<String>,
    pub submission: Option<Submission>,
}

/// One row of the recruiter overview.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateSummary {
    pub candidate_id: i64,
    pub task_id: i64,
    pub task_title: Option<String>,
    pub metrics: WorkflowMetrics,
    pub score: u8,
    pub insight: String,
    pub submitted: bool,
    pub tests_passed: Option<u32>,
    pub tests_total: Option<u32>,
}

/// A catalogue entry as one candidate sees it.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateTask {
    #[serde(flatten)]
    pub task: Task,
    pub submitted: bool,
    pub tests_passed: Option<u32>,
    pub tests_total: Option<u32>,
}
