//! Workflow signal engine for timed coding assessments.
//!
//! Candidate actions are appended to an immutable per-session event log.
//! Metrics, the behavior score and the narrative insight are all recomputed
//! from that log on demand.

pub mod config;
pub mod db;
pub mod error;
pub mod evaluator;
pub mod event_log;
pub mod insight;
pub mod metrics;
pub mod scoring;
pub mod service;
pub mod utils;

pub use config::SignalConfig;
pub use db::{Database, Event, EventMetadata, EventType, NewEvent, SessionKey};
pub use error::{SignalError, SignalResult};
pub use event_log::EventLog;
pub use metrics::{compute_metrics, MetricsConfig, WorkflowMetrics};
pub use scoring::{score, BehaviorScore};
pub use service::SignalService;
