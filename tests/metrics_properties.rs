use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use workflow_signal::{
    compute_metrics,
    db::{Event, EventMetadata, EventType},
    score, MetricsConfig, WorkflowMetrics,
};

fn arb_event_type() -> impl Strategy<Value = EventType> {
    prop::sample::select(vec![
        EventType::TaskStarted,
        EventType::CodeEdit,
        EventType::LargePaste,
        EventType::AiUsed,
        EventType::TabHidden,
        EventType::TabVisible,
        EventType::RunExecuted,
        EventType::Submitted,
    ])
}

/// Sessions opened by `task_started`, followed by up to 60 events with
/// non-decreasing timestamps.
fn arb_session() -> impl Strategy<Value = Vec<Event>> {
    prop::collection::vec(
        (arb_event_type(), 0i64..5_000, -200i64..400, any::<bool>()),
        0..60,
    )
    .prop_map(|steps| {
        let origin = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let mut offset_ms = 0;
        let start = Event {
            id: Some(0),
            candidate_id: 3,
            task_id: 1,
            event_type: EventType::TaskStarted,
            timestamp: origin,
            metadata: EventMetadata::default(),
        };
        let rest = steps
            .into_iter()
            .enumerate()
            .map(|(index, (event_type, gap_ms, chars_added, with_chars))| {
                offset_ms += gap_ms;
                let metadata = match event_type {
                    EventType::CodeEdit if with_chars => EventMetadata::edit(chars_added, 500),
                    EventType::LargePaste => EventMetadata {
                        chars_added: with_chars.then_some(chars_added),
                        content_preview: Some("pasted".into()),
                        ..EventMetadata::default()
                    },
                    EventType::AiUsed if with_chars => EventMetadata::prompt("why does this fail?"),
                    _ => EventMetadata::default(),
                };
                Event {
                    id: Some(index as i64 + 1),
                    candidate_id: 3,
                    task_id: 1,
                    event_type,
                    timestamp: origin + Duration::milliseconds(offset_ms),
                    metadata,
                }
            });
        std::iter::once(start).chain(rest).collect()
    })
}

fn arb_metrics() -> impl Strategy<Value = WorkflowMetrics> {
    (
        0.0f64..1e7,
        0.0f64..2e7,
        0.0f64..=1.0,
        0u64..10_000,
        0u64..10_000,
        0u64..10_000,
    )
        .prop_map(
            |(total, away, linear, pastes, ai, refine)| WorkflowMetrics {
                total_time_seconds: total,
                context_switch_seconds: away,
                linear_typing_ratio: linear,
                large_paste_count: pastes,
                ai_usage_count: ai,
                refine_cycles: refine,
                ..WorkflowMetrics::default()
            },
        )
}

proptest! {
    #[test]
    fn linear_ratio_stays_in_unit_interval(events in arb_session()) {
        let metrics = compute_metrics(&events, &MetricsConfig::default());
        prop_assert!((0.0..=1.0).contains(&metrics.linear_typing_ratio));
        prop_assert!(metrics.linear_typing_edits <= metrics.edit_count);
    }

    #[test]
    fn recomputation_is_identical(events in arb_session()) {
        let config = MetricsConfig::default();
        let first = serde_json::to_string(&compute_metrics(&events, &config)).unwrap();
        let second = serde_json::to_string(&compute_metrics(&events, &config)).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn time_away_never_exceeds_session(events in arb_session()) {
        let metrics = compute_metrics(&events, &MetricsConfig::default());
        prop_assert!(metrics.context_switch_seconds >= 0.0);
        prop_assert!(metrics.context_switch_seconds <= metrics.total_time_seconds);
    }

    #[test]
    fn score_is_bounded(metrics in arb_metrics()) {
        let result = score(&metrics);
        prop_assert!(result.value <= 100);
        let sum: i32 = 50 + result.breakdown.iter().map(|c| c.delta).sum::<i32>();
        prop_assert_eq!(sum, result.unclamped);
    }

    #[test]
    fn session_scores_are_bounded(events in arb_session()) {
        let metrics = compute_metrics(&events, &MetricsConfig::default());
        prop_assert!(score(&metrics).value <= 100);
    }
}

#[test]
fn oversized_edits_and_deletions_never_count_as_linear() {
    let origin = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let events: Vec<Event> = [0, -12, 50, 400]
        .into_iter()
        .enumerate()
        .map(|(i, chars)| Event {
            id: Some(i as i64),
            candidate_id: 3,
            task_id: 1,
            event_type: EventType::CodeEdit,
            timestamp: origin + Duration::seconds(i as i64),
            metadata: EventMetadata::edit(chars, 100),
        })
        .collect();

    let metrics = compute_metrics(&events, &MetricsConfig::default());
    assert_eq!(metrics.linear_typing_ratio, 0.0);
    assert_eq!(metrics.edit_count, 4);
}
