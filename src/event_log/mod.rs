//! Append-only behavioral event log.
//!
//! The log is the single source of truth for a session. Events are never
//! updated or deleted; a correction is a new event. Everything else in the
//! crate is a view recomputed from what this module returns.

pub mod validation;

use chrono::{SubsecRound, Utc};

use crate::db::{AppendOutcome, Database, Event, NewEvent, SessionKey};
use crate::error::{SignalError, SignalResult};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

#[derive(Clone)]
pub struct EventLog {
    db: Database,
    preview_chars: usize,
}

impl EventLog {
    pub fn new(db: Database, preview_chars: usize) -> Self {
        Self { db, preview_chars }
    }

    /// Validates and durably appends one event, returning it as stored.
    ///
    /// Fails with [`SignalError::InvalidEvent`] when required metadata is
    /// missing or the timestamp precedes the session's last recorded event.
    pub async fn append(&self, event: NewEvent) -> SignalResult<Event> {
        let key = SessionKey::new(event.candidate_id, event.task_id);

        if let Err(err) = validation::check_required_metadata(event.event_type, &event.metadata) {
            log_warn!("Rejected {} event for {key}: {err}", event.event_type);
            return Err(err);
        }

        let event = validation::normalize(event, self.preview_chars);
        let now = Utc::now().trunc_subsecs(3);

        match self.db.append_event(event, now).await? {
            AppendOutcome::Appended(stored) => {
                log_debug!(
                    "Appended {} event {:?} for {key}",
                    stored.event_type,
                    stored.id
                );
                Ok(stored)
            }
            AppendOutcome::Rejected(reason) => {
                log_warn!("Rejected event for {key}: {reason}");
                Err(SignalError::invalid_event(reason))
            }
        }
    }

    /// The ordered events of one session. An unknown session yields an empty
    /// sequence, not an error.
    pub async fn query_by_session(&self, key: SessionKey) -> SignalResult<Vec<Event>> {
        Ok(self.db.get_events_for_session(key).await?)
    }

    pub async fn sessions(&self) -> SignalResult<Vec<SessionKey>> {
        Ok(self.db.list_sessions().await?)
    }
}
