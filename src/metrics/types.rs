use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiPrompt {
    pub prompt: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasteEvent {
    /// Zero when the paste event carried no `chars_added`.
    pub chars_added: i64,
    pub content_preview: String,
    pub timestamp: DateTime<Utc>,
}

/// Why an event did not contribute (fully) to the metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Timestamp earlier than an event already folded; the event was skipped.
    OutOfOrder { event_id: Option<i64> },
    /// Event belongs to a different session; the event was skipped.
    ForeignSession { event_id: Option<i64> },
    /// `code_edit` without `chars_added`; counted as an edit but not classified.
    MissingCharsAdded { event_id: Option<i64> },
    /// `tab_visible` with no open `tab_hidden`; ignored.
    UnmatchedTabVisible { event_id: Option<i64> },
    /// `tab_hidden` while already hidden; the hidden interval restarts here.
    RepeatedTabHidden { event_id: Option<i64> },
}

/// Derived workflow metrics for one session.
///
/// Always recomputed from the event log, never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetrics {
    pub total_time_seconds: f64,
    pub edit_count: u64,
    pub run_count: u64,
    pub ai_usage_count: u64,
    pub large_paste_count: u64,
    pub refine_cycles: u64,
    pub edits_per_run: f64,
    pub linear_typing_ratio: f64,
    pub linear_typing_edits: u64,
    pub context_switch_seconds: f64,
    pub ai_prompts: Vec<AiPrompt>,
    pub paste_events: Vec<PasteEvent>,
    /// No `task_started` was seen; time is measured from the first event.
    #[serde(default)]
    pub missing_start: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl WorkflowMetrics {
    /// Share of the session spent with the assessment tab hidden.
    /// Zero when the session has no measurable duration.
    pub fn away_ratio(&self) -> f64 {
        if self.total_time_seconds > 0.0 {
            self.context_switch_seconds / self.total_time_seconds
        } else {
            0.0
        }
    }

    /// Percentage of the session spent on the task, 100 for empty sessions.
    pub fn focus_percent(&self) -> f64 {
        if self.total_time_seconds > 0.0 {
            ((self.total_time_seconds - self.context_switch_seconds) / self.total_time_seconds
                * 100.0)
                .max(0.0)
        } else {
            100.0
        }
    }
}
