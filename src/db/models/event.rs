//! Behavioral event data model.
//!
//! One `Event` is one observed candidate action inside a session, where a
//! session is identified by the `(candidate_id, task_id)` pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    TaskStarted,
    CodeEdit,
    LargePaste,
    AiUsed,
    TabHidden,
    TabVisible,
    #[serde(alias = "code_run")]
    RunExecuted,
    #[serde(alias = "task_submitted")]
    Submitted,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::TaskStarted => "task_started",
            EventType::CodeEdit => "code_edit",
            EventType::LargePaste => "large_paste",
            EventType::AiUsed => "ai_used",
            EventType::TabHidden => "tab_hidden",
            EventType::TabVisible => "tab_visible",
            EventType::RunExecuted => "run_executed",
            EventType::Submitted => "submitted",
        }
    }

    /// Parses a stored or submitted type name, accepting the legacy
    /// `code_run` and `task_submitted` spellings.
    pub fn parse(value: &str) -> Option<EventType> {
        match value {
            "task_started" => Some(EventType::TaskStarted),
            "code_edit" => Some(EventType::CodeEdit),
            "large_paste" => Some(EventType::LargePaste),
            "ai_used" => Some(EventType::AiUsed),
            "tab_hidden" => Some(EventType::TabHidden),
            "tab_visible" => Some(EventType::TabVisible),
            "run_executed" | "code_run" => Some(EventType::RunExecuted),
            "submitted" | "task_submitted" => Some(EventType::Submitted),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload attached to an event. Which fields are meaningful depends on the
/// event type; absent fields stay `None` and are skipped on serialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chars_added: Option<i64>,
    #[serde(default, alias = "chars", skip_serializing_if = "Option::is_none")]
    pub chars_total: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
}

impl EventMetadata {
    pub fn is_empty(&self) -> bool {
        *self == EventMetadata::default()
    }

    pub fn edit(chars_added: i64, chars_total: i64) -> Self {
        Self {
            chars_added: Some(chars_added),
            chars_total: Some(chars_total),
            ..Self::default()
        }
    }

    pub fn paste(chars_added: i64, content_preview: impl Into<String>) -> Self {
        Self {
            chars_added: Some(chars_added),
            content_preview: Some(content_preview.into()),
            ..Self::default()
        }
    }

    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Self::default()
        }
    }
}

/// A recorded event. `id` is assigned by storage and breaks ties between
/// events sharing a timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Option<i64>,
    pub candidate_id: i64,
    pub task_id: i64,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: EventMetadata,
}

/// An event on its way into the log. A missing timestamp is assigned by the
/// server at append time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub candidate_id: i64,
    pub task_id: i64,
    pub event_type: EventType,
    pub timestamp: Option<DateTime<Utc>>,
    pub metadata: EventMetadata,
}

impl NewEvent {
    pub fn new(candidate_id: i64, task_id: i64, event_type: EventType) -> Self {
        Self {
            candidate_id,
            task_id,
            event_type,
            timestamp: None,
            metadata: EventMetadata::default(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Identifies one session: a candidate attempting one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    pub candidate_id: i64,
    pub task_id: i64,
}

impl SessionKey {
    pub fn new(candidate_id: i64, task_id: i64) -> Self {
        Self {
            candidate_id,
            task_id,
        }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "candidate {} / task {}", self.candidate_id, self.task_id)
    }
}
