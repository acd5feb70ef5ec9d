use std::process::{Output, Stdio};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{io::AsyncWriteExt, process::Command};

use super::{EvaluationOutcome, EvaluationRequest, RunOutput, SubmissionEvaluator};
use crate::config::EvaluatorConfig;
use crate::db::CaseResult;
use crate::error::{SignalError, SignalResult};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

const COLLABORATOR: &str = "submission evaluator";

#[derive(Debug, Deserialize)]
struct HarnessReport {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    results: Vec<CaseResult>,
}

/// What the harness reads from stdin. A test request carries the hidden
/// cases; a free run carries only the code.
#[derive(Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
enum HarnessInput<'a> {
    Test(&'a EvaluationRequest),
    Run { code: &'a str },
}

/// Runs an external test harness. The request goes to its stdin as JSON and
/// the report is read back from stdout. Free runs hand back stdout and
/// stderr untouched.
///
/// The child is killed when the evaluation future is dropped, so an outer
/// timeout does not leak processes.
#[derive(Debug, Clone)]
pub struct ProcessEvaluator {
    program: String,
    args: Vec<String>,
}

impl ProcessEvaluator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `None` when no command is configured.
    pub fn from_config(config: &EvaluatorConfig) -> Option<Self> {
        let (program, args) = config.command.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }
}

#[async_trait]
impl SubmissionEvaluator for ProcessEvaluator {
    fn name(&self) -> &'static str {
        COLLABORATOR
    }

    async fn evaluate(&self, request: &EvaluationRequest) -> SignalResult<EvaluationOutcome> {
        let output = self.exchange(&HarnessInput::Test(request)).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(parse_report(&stdout, &stderr, output.status.success()))
    }

    async fn run(&self, code: &str) -> SignalResult<RunOutput> {
        let output = self.exchange(&HarnessInput::Run { code }).await?;
        Ok(RunOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            run_error: None,
        })
    }
}

impl ProcessEvaluator {
    /// Spawns the harness, feeds it `input` and waits for it to exit.
    async fn exchange(&self, input: &HarnessInput<'_>) -> SignalResult<Output> {
        let payload = serde_json::to_vec(input).map_err(|err| SignalError::EvaluatorFailure {
            collaborator: COLLABORATOR,
            message: format!("failed to encode request: {err}"),
        })?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| SignalError::EvaluatorFailure {
                collaborator: COLLABORATOR,
                message: format!("failed to start {}: {err}", self.program),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            tokio::spawn(async move {
                if let Err(err) = stdin.write_all(&payload).await {
                    log_warn!("Failed to write request to evaluator: {err}");
                }
            });
        }

        child
            .wait_with_output()
            .await
            .map_err(|err| SignalError::EvaluatorFailure {
                collaborator: COLLABORATOR,
                message: format!("failed to collect output: {err}"),
            })
    }
}

/// Interprets the harness output. Anything short of a clean report becomes a
/// `run_error` rather than a pass/fail count.
fn parse_report(stdout: &str, stderr: &str, success: bool) -> EvaluationOutcome {
    let stdout = stdout.trim();
    if stdout.is_empty() {
        let detail = stderr.trim();
        return EvaluationOutcome::run_error(if detail.is_empty() {
            if success {
                "evaluator produced no output".to_string()
            } else {
                "evaluator exited with an error".to_string()
            }
        } else {
            detail.to_string()
        });
    }

    match serde_json::from_str::<HarnessReport>(stdout) {
        Ok(HarnessReport {
            error: Some(error), ..
        }) => EvaluationOutcome::run_error(error),
        Ok(report) => EvaluationOutcome {
            results: report.results,
            run_error: None,
        },
        Err(err) => EvaluationOutcome::run_error(format!("unparsable evaluator output: {err}")),
    }
}
