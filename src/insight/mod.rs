//! Narrative insight over a session's metrics.
//!
//! The synthesizer is an external collaborator: the core only defines what
//! goes in and what comes out, and treats any failure as "no prose".

pub mod heuristic;
pub mod llm;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SignalResult;
use crate::metrics::WorkflowMetrics;

pub use heuristic::HeuristicSynthesizer;
pub use llm::LlmSynthesizer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct InsightRequest {
    pub task_title: String,
    pub task_description: String,
    pub metrics: WorkflowMetrics,
    pub code: Option<String>,
    pub reflection: Option<String>,
    /// Prior assistant conversation, oldest first.
    pub history: Vec<ChatTurn>,
}

impl InsightRequest {
    pub fn new(
        task_title: impl Into<String>,
        task_description: impl Into<String>,
        metrics: WorkflowMetrics,
    ) -> Self {
        Self {
            task_title: task_title.into(),
            task_description: task_description.into(),
            metrics,
            code: None,
            reflection: None,
            history: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub insight: String,
    pub conclusion: Option<String>,
}

#[async_trait]
pub trait InsightSynthesizer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn synthesize(&self, request: &InsightRequest) -> SignalResult<Insight>;
}
