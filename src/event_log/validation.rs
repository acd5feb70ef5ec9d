use chrono::SubsecRound;
use serde_json::Value;

use crate::db::{EventMetadata, EventType, NewEvent};
use crate::error::{SignalError, SignalResult};

pub fn parse_event_type(raw: &str) -> SignalResult<EventType> {
    EventType::parse(raw.trim())
        .ok_or_else(|| SignalError::invalid_event(format!("unknown event_type '{raw}'")))
}

/// Decodes the free-form `metadata` object of an ingestion request.
/// `null` and absent metadata both mean "no payload".
pub fn parse_metadata(value: Option<Value>) -> SignalResult<EventMetadata> {
    match value {
        None | Some(Value::Null) => Ok(EventMetadata::default()),
        Some(value @ Value::Object(_)) => serde_json::from_value(value)
            .map_err(|err| SignalError::invalid_event(format!("malformed metadata: {err}"))),
        Some(other) => Err(SignalError::invalid_event(format!(
            "metadata must be an object, got {other}"
        ))),
    }
}

/// Rejects events whose type requires payload fields that are missing.
///
/// `code_edit` needs `chars_added`; `large_paste` needs `content_preview`.
/// Everything else, including an `ai_used` without a prompt, is accepted.
pub fn check_required_metadata(event_type: EventType, metadata: &EventMetadata) -> SignalResult<()> {
    let missing = match event_type {
        EventType::CodeEdit if metadata.chars_added.is_none() => Some("chars_added"),
        EventType::LargePaste if metadata.content_preview.is_none() => Some("content_preview"),
        _ => None,
    };

    match missing {
        Some(field) => Err(SignalError::invalid_event(format!(
            "{event_type} event is missing required metadata field '{field}'"
        ))),
        None => Ok(()),
    }
}

/// Truncates to `max_chars` characters, appending `...` when anything was cut.
pub fn truncate_preview(preview: &str, max_chars: usize) -> String {
    if preview.chars().count() <= max_chars {
        return preview.to_string();
    }
    let mut truncated: String = preview.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}

/// Brings an accepted event to its stored shape: millisecond timestamps and
/// bounded paste previews.
pub fn normalize(mut event: NewEvent, preview_chars: usize) -> NewEvent {
    event.timestamp = event.timestamp.map(|ts| ts.trunc_subsecs(3));
    if let Some(preview) = event.metadata.content_preview.take() {
        event.metadata.content_preview = Some(truncate_preview(&preview, preview_chars));
    }
    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn code_edit_without_chars_added_is_rejected() {
        let err = check_required_metadata(EventType::CodeEdit, &EventMetadata::default())
            .unwrap_err();
        assert!(matches!(err, SignalError::InvalidEvent { .. }));
        assert!(err.to_string().contains("chars_added"));
    }

    #[test]
    fn paste_without_chars_added_is_accepted() {
        let metadata = EventMetadata {
            content_preview: Some("def fizzbuzz(n):".into()),
            ..EventMetadata::default()
        };
        assert!(check_required_metadata(EventType::LargePaste, &metadata).is_ok());
    }

    #[test]
    fn ai_used_without_prompt_is_accepted() {
        assert!(check_required_metadata(EventType::AiUsed, &EventMetadata::default()).is_ok());
    }

    #[test]
    fn legacy_chars_field_maps_to_chars_total() {
        let metadata = parse_metadata(Some(json!({ "chars_added": 3, "chars": 40 }))).unwrap();
        assert_eq!(metadata.chars_added, Some(3));
        assert_eq!(metadata.chars_total, Some(40));
    }

    #[test]
    fn non_object_metadata_is_rejected() {
        assert!(parse_metadata(Some(json!([1, 2]))).is_err());
        assert!(parse_metadata(Some(Value::Null)).unwrap().is_empty());
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        assert!(parse_event_type("mouse_move").is_err());
        assert_eq!(parse_event_type(" code_run ").unwrap(), EventType::RunExecuted);
    }

    #[test]
    fn long_previews_are_truncated() {
        let long = "x".repeat(250);
        let preview = truncate_preview(&long, 200);
        assert_eq!(preview.chars().count(), 203);
        assert!(preview.ends_with("..."));
        assert_eq!(truncate_preview("short", 200), "short");
    }

    #[test]
    fn normalize_drops_sub_millisecond_precision() {
        let ts = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let event = normalize(NewEvent::new(1, 1, EventType::TabHidden).at(ts), 200);
        assert_eq!(event.timestamp.unwrap().timestamp_subsec_nanos(), 123_000_000);
    }
}
