pub mod aggregator;
pub mod config;
mod types;

pub use aggregator::compute_metrics;
pub use config::{MetricsConfig, PASTE_THRESHOLD_CHARS};
pub use types::{AiPrompt, Diagnostic, PasteEvent, WorkflowMetrics};
