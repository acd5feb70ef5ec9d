use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::warn;
use rusqlite::{params, OptionalExtension};

use crate::db::{
    connection::Database,
    helpers::{format_timestamp, parse_datetime, parse_event_type},
    models::{Event, EventMetadata, NewEvent, SessionKey},
};

/// Result of an append attempt. Rejections are domain outcomes, not storage
/// failures, so they travel in `Ok`.
#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
    Appended(Event),
    Rejected(String),
}

struct EventRow {
    id: i64,
    candidate_id: i64,
    task_id: i64,
    event_type: String,
    timestamp: String,
    metadata_json: Option<String>,
}

fn decode_event(row: EventRow) -> Result<Event> {
    let metadata = match row.metadata_json.as_deref() {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str::<EventMetadata>(raw)
            .with_context(|| format!("failed to parse metadata of event {}", row.id))?,
        _ => EventMetadata::default(),
    };

    Ok(Event {
        id: Some(row.id),
        candidate_id: row.candidate_id,
        task_id: row.task_id,
        event_type: parse_event_type(&row.event_type)?,
        timestamp: parse_datetime(&row.timestamp, "timestamp")?,
        metadata,
    })
}

impl Database {
    /// Appends one event, checking ordering against the newest stored event of
    /// the same session inside the same worker task so no other append can
    /// interleave.
    ///
    /// A client-supplied timestamp that precedes the newest event is rejected.
    /// A server-assigned timestamp (`event.timestamp == None`) is clamped to
    /// never precede it.
    pub async fn append_event(&self, event: NewEvent, now: DateTime<Utc>) -> Result<AppendOutcome> {
        self.transact(move |tx| {
            let last_raw: Option<String> = tx
                .query_row(
                    "SELECT timestamp FROM events
                     WHERE candidate_id = ?1 AND task_id = ?2
                     ORDER BY timestamp DESC, id DESC
                     LIMIT 1",
                    params![event.candidate_id, event.task_id],
                    |row| row.get(0),
                )
                .optional()
                .context("failed to read last event timestamp")?;
            let last = last_raw
                .map(|raw| parse_datetime(&raw, "timestamp"))
                .transpose()?;

            let timestamp = match (event.timestamp, last) {
                (Some(ts), Some(last)) if ts < last => {
                    return Ok(AppendOutcome::Rejected(format!(
                        "timestamp {} precedes last recorded event at {} for {}",
                        format_timestamp(&ts),
                        format_timestamp(&last),
                        SessionKey::new(event.candidate_id, event.task_id),
                    )));
                }
                (Some(ts), _) => ts,
                (None, Some(last)) => now.max(last),
                (None, None) => now,
            };

            let metadata_json = if event.metadata.is_empty() {
                None
            } else {
                Some(
                    serde_json::to_string(&event.metadata)
                        .context("failed to serialize event metadata")?,
                )
            };

            tx.execute(
                "INSERT INTO events (candidate_id, task_id, event_type, timestamp, metadata_json)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    event.candidate_id,
                    event.task_id,
                    event.event_type.as_str(),
                    format_timestamp(&timestamp),
                    metadata_json,
                ],
            )
            .context("failed to insert event")?;
            let id = tx.last_insert_rowid();

            Ok(AppendOutcome::Appended(Event {
                id: Some(id),
                candidate_id: event.candidate_id,
                task_id: event.task_id,
                event_type: event.event_type,
                timestamp,
                metadata: event.metadata,
            }))
        })
        .await
    }

    /// Returns the session's events ordered by `(timestamp, id)`. Rows that
    /// cannot be decoded (unknown type, unreadable metadata) are skipped.
    pub async fn get_events_for_session(&self, key: SessionKey) -> Result<Vec<Event>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, candidate_id, task_id, event_type, timestamp, metadata_json
                 FROM events
                 WHERE candidate_id = ?1 AND task_id = ?2
                 ORDER BY timestamp ASC, id ASC",
            )?;

            let rows = stmt.query_map(params![key.candidate_id, key.task_id], |row| {
                Ok(EventRow {
                    id: row.get(0)?,
                    candidate_id: row.get(1)?,
                    task_id: row.get(2)?,
                    event_type: row.get(3)?,
                    timestamp: row.get(4)?,
                    metadata_json: row.get(5)?,
                })
            })?;

            let mut events = Vec::new();
            for row in rows {
                let row = row?;
                let id = row.id;
                match decode_event(row) {
                    Ok(event) => events.push(event),
                    Err(err) => warn!("Skipping undecodable event {id} for {key}: {err:#}"),
                }
            }

            Ok(events)
        })
        .await
    }

    /// Every session that has at least one event, ordered by candidate then task.
    pub async fn list_sessions(&self) -> Result<Vec<SessionKey>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT candidate_id, task_id
                 FROM events
                 ORDER BY candidate_id ASC, task_id ASC",
            )?;

            let keys = stmt
                .query_map([], |row| Ok(SessionKey::new(row.get(0)?, row.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(keys)
        })
        .await
    }
}
