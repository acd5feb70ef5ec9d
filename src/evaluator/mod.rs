//! Submission evaluation: run the candidate's final code against the task's
//! hidden test cases, or run work in progress once and hand back its output.
//! Sandboxing is the harness's job, not ours.

pub mod process;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::db::{CaseResult, TestCase};
use crate::error::SignalResult;

pub use process::ProcessEvaluator;

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationRequest {
    pub code: String,
    pub test_cases: Vec<TestCase>,
}

/// Per-case results, or a `run_error` when the code could not run at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub results: Vec<CaseResult>,
    pub run_error: Option<String>,
}

impl EvaluationOutcome {
    pub fn run_error(message: impl Into<String>) -> Self {
        Self {
            results: Vec::new(),
            run_error: Some(message.into()),
        }
    }

    pub fn tests_passed(&self) -> u32 {
        self.results.iter().filter(|r| r.passed).count() as u32
    }

    pub fn tests_total(&self) -> u32 {
        self.results.len() as u32
    }
}

/// Output of a free run. `run_error` is set when the code never ran.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    pub run_error: Option<String>,
}

impl RunOutput {
    pub fn run_error(message: impl Into<String>) -> Self {
        Self {
            run_error: Some(message.into()),
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait SubmissionEvaluator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn evaluate(&self, request: &EvaluationRequest) -> SignalResult<EvaluationOutcome>;

    /// Executes `code` without test cases.
    async fn run(&self, code: &str) -> SignalResult<RunOutput>;
}
