use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of a single hidden test case as reported by the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
    pub input: Value,
    pub expected: Value,
    #[serde(default, alias = "got")]
    pub actual: Value,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The terminal record of a session, written once when the candidate submits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub candidate_id: i64,
    pub task_id: i64,
    pub final_code: Option<String>,
    pub reflection: Option<String>,
    pub tests_passed: u32,
    pub tests_total: u32,
    pub results: Vec<CaseResult>,
    pub run_error: Option<String>,
    pub created_at: DateTime<Utc>,
}
