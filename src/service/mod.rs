//! Orchestration over the event log and the two external collaborators.
//!
//! Metrics and scores are recomputed from the log on every read. The
//! synthesizer and evaluator run under configured timeouts and a shared
//! cancellation token; their failures degrade the response instead of
//! failing it.

pub mod api;

use std::{
    collections::HashSet,
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{SubsecRound, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::SignalConfig;
use crate::db::{
    Database, Event, EventMetadata, EventType, NewEvent, SessionKey, Submission, Task,
};
use crate::error::{SignalError, SignalResult};
use crate::evaluator::{
    EvaluationOutcome, EvaluationRequest, ProcessEvaluator, RunOutput, SubmissionEvaluator,
};
use crate::event_log::EventLog;
use crate::insight::{
    heuristic, HeuristicSynthesizer, InsightRequest, InsightSynthesizer, LlmSynthesizer,
};
use crate::metrics::{compute_metrics, MetricsConfig, WorkflowMetrics};
use crate::scoring::{recommend, score};

pub use api::{
    CandidateSummary, CandidateTask, EventRequest, RunRequest, SessionReport, SubmitRequest,
    SubmitResponse,
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

#[derive(Clone)]
pub struct SignalService {
    db: Database,
    log: EventLog,
    metrics_config: MetricsConfig,
    synthesizer: Arc<dyn InsightSynthesizer>,
    insight_timeout: Duration,
    evaluator: Option<Arc<dyn SubmissionEvaluator>>,
    evaluator_timeout: Duration,
    cancel_token: CancellationToken,
    submitting: Arc<Mutex<HashSet<SessionKey>>>,
}

/// Marks a session as mid-submission until dropped.
struct SubmissionClaim {
    submitting: Arc<Mutex<HashSet<SessionKey>>>,
    key: SessionKey,
}

impl SubmissionClaim {
    fn acquire(submitting: &Arc<Mutex<HashSet<SessionKey>>>, key: SessionKey) -> Option<Self> {
        let mut pending = match submitting.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        pending.insert(key).then(|| Self {
            submitting: Arc::clone(submitting),
            key,
        })
    }
}

impl Drop for SubmissionClaim {
    fn drop(&mut self) {
        let mut pending = match self.submitting.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        pending.remove(&self.key);
    }
}

impl SignalService {
    /// Opens the store at `config.database_path`, seeds the default task on a
    /// fresh store, and wires the configured collaborators.
    pub async fn open(config: &SignalConfig) -> SignalResult<Self> {
        config.validate()?;
        let db = Database::new(config.database_path.clone())?;

        if db.seed_default_task().await? {
            log_info!("Seeded default task into {}", db.path().display());
        }

        let llm = LlmSynthesizer::from_config(&config.insight)?;
        let synthesizer: Arc<dyn InsightSynthesizer> = match llm {
            Some(llm) => Arc::new(llm),
            None => {
                if config.insight.enabled {
                    log_warn!(
                        "{} is not set; falling back to heuristic insight",
                        config.insight.api_key_env
                    );
                }
                Arc::new(HeuristicSynthesizer)
            }
        };

        let evaluator = ProcessEvaluator::from_config(&config.evaluator)
            .map(|evaluator| Arc::new(evaluator) as Arc<dyn SubmissionEvaluator>);

        Ok(Self {
            log: EventLog::new(db.clone(), config.content_preview_chars),
            db,
            metrics_config: config.metrics_config(),
            synthesizer,
            insight_timeout: config.insight_timeout(),
            evaluator,
            evaluator_timeout: config.evaluator_timeout(),
            cancel_token: CancellationToken::new(),
            submitting: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn InsightSynthesizer>) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn SubmissionEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    pub async fn ingest_event(&self, request: EventRequest) -> SignalResult<Event> {
        let event = match request.into_new_event() {
            Ok(event) => event,
            Err(err) => {
                log_warn!("Rejected ingestion request: {err}");
                return Err(err);
            }
        };
        self.log.append(event).await
    }

    /// Metrics, score and prose for one session. A session without events
    /// yields default metrics rather than an error.
    pub async fn session_report(
        &self,
        candidate_id: i64,
        task_id: i64,
    ) -> SignalResult<SessionReport> {
        let key = SessionKey::new(candidate_id, task_id);
        let events = self.log.query_by_session(key).await?;
        let metrics = compute_metrics(&events, &self.metrics_config);
        let behavior = score(&metrics);
        let recommendation = recommend(&metrics);

        let task = self.db.get_task(task_id).await?;
        let submission = self.db.get_submission(key).await?;

        let mut request = insight_request(task.as_ref(), task_id, metrics.clone());
        if let Some(submission) = &submission {
            request.code = submission.final_code.clone();
            request.reflection = submission.reflection.clone();
        }

        let synthesizer = Arc::clone(&self.synthesizer);
        let call = synthesizer.synthesize(&request);
        let (insight, conclusion, insight_error) = match self
            .call_collaborator(synthesizer.name(), self.insight_timeout, call)
            .await
        {
            Ok(insight) => (Some(insight.insight), insight.conclusion, None),
            Err(err) => {
                if err.is_collaborator_failure() {
                    log_warn!("Insight unavailable for {key}: {err}");
                } else {
                    log_error!("Insight failed for {key}: {err}");
                }
                (None, None, Some(err.to_string()))
            }
        };

        Ok(SessionReport {
            candidate_id,
            task_id,
            task,
            metrics,
            score: behavior,
            recommendation,
            insight,
            conclusion,
            insight_error,
            submission,
        })
    }

    /// Evaluates and records the final submission of a session.
    ///
    /// The session must have at least one event and no earlier or concurrent
    /// submission. Evaluator failures are stored as `run_error`; the
    /// submission and its `submitted` event are recorded regardless.
    pub async fn submit(&self, request: SubmitRequest) -> SignalResult<SubmitResponse> {
        let key = request.key();

        if self.log.query_by_session(key).await?.is_empty() {
            return Err(SignalError::MissingSession {
                candidate_id: key.candidate_id,
                task_id: key.task_id,
            });
        }

        let Some(_claim) = SubmissionClaim::acquire(&self.submitting, key) else {
            log_warn!("Rejected concurrent submission for {key}");
            return Err(already_submitted(key));
        };
        if self.db.get_submission(key).await?.is_some() {
            log_warn!("Rejected second submission for {key}");
            return Err(already_submitted(key));
        }

        let test_cases = self
            .db
            .get_task(key.task_id)
            .await?
            .map(|task| task.test_cases)
            .unwrap_or_default();

        let evaluation = EvaluationRequest {
            code: request.final_code.clone(),
            test_cases,
        };
        let outcome = self.evaluate(key, &evaluation).await;

        let submission = Submission {
            id: Uuid::new_v4().to_string(),
            candidate_id: key.candidate_id,
            task_id: key.task_id,
            final_code: Some(request.final_code),
            reflection: request.reflection.filter(|r| !r.trim().is_empty()),
            tests_passed: outcome.tests_passed(),
            tests_total: outcome.tests_total(),
            results: outcome.results,
            run_error: outcome.run_error,
            created_at: Utc::now().trunc_subsecs(3),
        };

        match self.db.insert_submission(&submission).await {
            Ok(true) => {}
            // Another process sharing the store got there first.
            Ok(false) => {
                log_warn!("Submission for {key} was recorded elsewhere first");
                return Err(already_submitted(key));
            }
            Err(err) => {
                log_error!("Failed to store submission for {key}: {err:?}");
                return Err(err.into());
            }
        }

        let terminal = NewEvent::new(key.candidate_id, key.task_id, EventType::Submitted)
            .with_metadata(EventMetadata {
                submission_id: Some(submission.id.clone()),
                ..EventMetadata::default()
            });
        self.log.append(terminal).await?;

        log_info!(
            "Recorded submission {} for {key}: {}/{} passed",
            submission.id,
            submission.tests_passed,
            submission.tests_total
        );
        Ok(SubmitResponse::from(&submission))
    }

    /// Records a `run_executed` event, then runs the code once without tests.
    /// Harness failures come back as `run_error`.
    pub async fn run(&self, request: RunRequest) -> SignalResult<RunOutput> {
        let key = request.key();
        self.log
            .append(NewEvent::new(key.candidate_id, key.task_id, EventType::RunExecuted))
            .await?;

        let Some(evaluator) = self.evaluator.clone() else {
            return Ok(RunOutput::run_error("no submission evaluator configured"));
        };

        let call = evaluator.run(&request.code);
        match self
            .call_collaborator(evaluator.name(), self.evaluator_timeout, call)
            .await
        {
            Ok(output) => Ok(output),
            Err(err) => {
                log_warn!("Run failed for {key}: {err}");
                Ok(RunOutput::run_error(err.to_string()))
            }
        }
    }

    /// Every session with events, for the recruiter list. Uses the
    /// heuristic insight line so the listing never waits on a remote model.
    pub async fn candidate_overview(&self) -> SignalResult<Vec<CandidateSummary>> {
        let tasks = self.db.list_tasks().await?;
        let mut summaries = Vec::new();

        for key in self.log.sessions().await? {
            let events = self.log.query_by_session(key).await?;
            let metrics = compute_metrics(&events, &self.metrics_config);
            let submission = self.db.get_submission(key).await?;

            summaries.push(CandidateSummary {
                candidate_id: key.candidate_id,
                task_id: key.task_id,
                task_title: tasks
                    .iter()
                    .find(|task| task.id == key.task_id)
                    .map(|task| task.title.clone()),
                score: score(&metrics).value,
                insight: heuristic::insight_line(&metrics),
                submitted: submission.is_some()
                    || events.iter().any(|e| e.event_type == EventType::Submitted),
                tests_passed: submission.as_ref().map(|s| s.tests_passed),
                tests_total: submission.as_ref().map(|s| s.tests_total),
                metrics,
            });
        }

        Ok(summaries)
    }

    pub async fn tasks(&self) -> SignalResult<Vec<Task>> {
        Ok(self.db.list_tasks().await?)
    }

    /// The task catalogue annotated with one candidate's submission state.
    pub async fn candidate_tasks(&self, candidate_id: i64) -> SignalResult<Vec<CandidateTask>> {
        let tasks = self.db.list_tasks().await?;
        let submissions = self.db.list_submissions_for_candidate(candidate_id).await?;

        Ok(tasks
            .into_iter()
            .map(|task| {
                let submission = submissions.iter().find(|s| s.task_id == task.id);
                CandidateTask {
                    submitted: submission.is_some(),
                    tests_passed: submission.map(|s| s.tests_passed),
                    tests_total: submission.map(|s| s.tests_total),
                    task,
                }
            })
            .collect())
    }

    /// Aborts in-flight collaborator calls. Storage stays usable.
    pub fn shutdown(&self) {
        log_info!("Signal service shutting down");
        self.cancel_token.cancel();
    }

    async fn evaluate(&self, key: SessionKey, request: &EvaluationRequest) -> EvaluationOutcome {
        let Some(evaluator) = self.evaluator.clone() else {
            log_warn!("No submission evaluator configured; recording {key} without test results");
            return EvaluationOutcome::run_error("no submission evaluator configured");
        };

        let call = evaluator.evaluate(request);
        match self
            .call_collaborator(evaluator.name(), self.evaluator_timeout, call)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                log_warn!("Evaluation failed for {key}: {err}");
                EvaluationOutcome::run_error(err.to_string())
            }
        }
    }

    async fn call_collaborator<T, F>(
        &self,
        collaborator: &'static str,
        timeout: Duration,
        call: F,
    ) -> SignalResult<T>
    where
        F: Future<Output = SignalResult<T>>,
    {
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);

        tokio::select! {
            _ = self.cancel_token.cancelled() => Err(SignalError::EvaluatorFailure {
                collaborator,
                message: "cancelled by shutdown".into(),
            }),
            outcome = tokio::time::timeout(timeout, call) => match outcome {
                Ok(result) => result,
                Err(_) => Err(SignalError::EvaluatorTimeout {
                    collaborator,
                    timeout_ms,
                }),
            },
        }
    }
}

fn already_submitted(key: SessionKey) -> SignalError {
    SignalError::invalid_event(format!("{key} has already been submitted"))
}

fn insight_request(task: Option<&Task>, task_id: i64, metrics: WorkflowMetrics) -> InsightRequest {
    match task {
        Some(task) => InsightRequest::new(task.title.clone(), task.description.clone(), metrics),
        None => InsightRequest::new(format!("Task {task_id}"), String::new(), metrics),
    }
}
