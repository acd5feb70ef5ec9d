use chrono::{DateTime, Utc};

use crate::db::{Event, EventType, SessionKey};

use super::config::MetricsConfig;
use super::types::{AiPrompt, Diagnostic, PasteEvent, WorkflowMetrics};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Running state of the fold. Every field is reconstructible from the
/// events folded so far; nothing outlives a single `compute_metrics` call.
struct Accumulator<'a> {
    config: &'a MetricsConfig,
    session: Option<SessionKey>,
    first_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    last_at: Option<DateTime<Utc>>,

    edit_count: u64,
    run_count: u64,
    ai_usage_count: u64,
    large_paste_count: u64,

    classified_edits: u64,
    linear_edits: u64,

    seen_run: bool,
    edited_since_run: bool,
    refine_cycles: u64,

    hidden_since: Option<DateTime<Utc>>,
    context_switch_ms: i64,

    ai_prompts: Vec<AiPrompt>,
    paste_events: Vec<PasteEvent>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Accumulator<'a> {
    fn new(config: &'a MetricsConfig) -> Self {
        Self {
            config,
            session: None,
            first_at: None,
            started_at: None,
            last_at: None,
            edit_count: 0,
            run_count: 0,
            ai_usage_count: 0,
            large_paste_count: 0,
            classified_edits: 0,
            linear_edits: 0,
            seen_run: false,
            edited_since_run: false,
            refine_cycles: 0,
            hidden_since: None,
            context_switch_ms: 0,
            ai_prompts: Vec::new(),
            paste_events: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn skip(mut self, diagnostic: Diagnostic) -> Self {
        log_debug!("Skipping event during aggregation: {diagnostic:?}");
        self.diagnostics.push(diagnostic);
        self
    }

    fn step(mut self, event: &Event) -> Self {
        let key = SessionKey::new(event.candidate_id, event.task_id);
        match self.session {
            Some(session) if session != key => {
                return self.skip(Diagnostic::ForeignSession { event_id: event.id });
            }
            Some(_) => {}
            None => self.session = Some(key),
        }

        if matches!(self.last_at, Some(last) if event.timestamp < last) {
            return self.skip(Diagnostic::OutOfOrder { event_id: event.id });
        }

        self.first_at.get_or_insert(event.timestamp);
        self.last_at = Some(event.timestamp);

        match event.event_type {
            EventType::TaskStarted => {
                self.started_at.get_or_insert(event.timestamp);
            }
            EventType::CodeEdit => {
                self.edit_count += 1;
                self.edited_since_run = true;
                match event.metadata.chars_added {
                    Some(added) if added > 0 => {
                        self.classified_edits += 1;
                        if added < self.config.paste_threshold_chars {
                            self.linear_edits += 1;
                        }
                    }
                    // Deletions are neither linear nor paste-like.
                    Some(_) => {}
                    None => self
                        .diagnostics
                        .push(Diagnostic::MissingCharsAdded { event_id: event.id }),
                }
            }
            EventType::LargePaste => {
                self.large_paste_count += 1;
                self.paste_events.push(PasteEvent {
                    chars_added: event.metadata.chars_added.unwrap_or(0),
                    content_preview: event.metadata.content_preview.clone().unwrap_or_default(),
                    timestamp: event.timestamp,
                });
            }
            EventType::AiUsed => {
                self.ai_usage_count += 1;
                if let Some(prompt) = event.metadata.prompt.as_ref().filter(|p| !p.is_empty()) {
                    self.ai_prompts.push(AiPrompt {
                        prompt: prompt.clone(),
                        timestamp: event.timestamp,
                    });
                }
            }
            EventType::RunExecuted => {
                self.run_count += 1;
                if self.seen_run && self.edited_since_run {
                    self.refine_cycles += 1;
                }
                self.seen_run = true;
                self.edited_since_run = false;
            }
            EventType::TabHidden => {
                if self.hidden_since.is_some() {
                    self.diagnostics
                        .push(Diagnostic::RepeatedTabHidden { event_id: event.id });
                }
                self.hidden_since = Some(event.timestamp);
            }
            EventType::TabVisible => match self.hidden_since.take() {
                Some(hidden_at) => {
                    self.context_switch_ms += (event.timestamp - hidden_at).num_milliseconds();
                }
                None => self
                    .diagnostics
                    .push(Diagnostic::UnmatchedTabVisible { event_id: event.id }),
            },
            EventType::Submitted => {}
        }

        self
    }

    fn finish(self) -> WorkflowMetrics {
        let (Some(first_at), Some(last_at)) = (self.first_at, self.last_at) else {
            return WorkflowMetrics {
                diagnostics: self.diagnostics,
                ..WorkflowMetrics::default()
            };
        };

        let origin = self.started_at.unwrap_or(first_at);
        let total_ms = (last_at - origin).num_milliseconds().max(0);

        // A session that ended while hidden stays hidden until its last event.
        let trailing_hidden_ms = self
            .hidden_since
            .map(|hidden_at| (last_at - hidden_at).num_milliseconds().max(0))
            .unwrap_or(0);
        let context_switch_ms = self.context_switch_ms + trailing_hidden_ms;

        let linear_typing_ratio = if self.classified_edits > 0 {
            self.linear_edits as f64 / self.classified_edits as f64
        } else {
            0.0
        };

        WorkflowMetrics {
            total_time_seconds: millis_to_seconds(total_ms),
            edit_count: self.edit_count,
            run_count: self.run_count,
            ai_usage_count: self.ai_usage_count,
            large_paste_count: self.large_paste_count,
            refine_cycles: self.refine_cycles,
            edits_per_run: self.edit_count as f64 / self.run_count.max(1) as f64,
            linear_typing_ratio,
            linear_typing_edits: self.linear_edits,
            context_switch_seconds: millis_to_seconds(context_switch_ms),
            ai_prompts: self.ai_prompts,
            paste_events: self.paste_events,
            missing_start: self.started_at.is_none(),
            diagnostics: self.diagnostics,
        }
    }
}

fn millis_to_seconds(ms: i64) -> f64 {
    ms as f64 / 1000.0
}

/// Replays an ordered event sequence into a [`WorkflowMetrics`] snapshot.
///
/// Total over its input: out-of-order or foreign events are skipped and
/// reported in `diagnostics`, never fatal. The session is taken from the
/// first event.
pub fn compute_metrics(events: &[Event], config: &MetricsConfig) -> WorkflowMetrics {
    events
        .iter()
        .fold(Accumulator::new(config), Accumulator::step)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::EventMetadata;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
    }

    fn event(event_type: EventType, secs: i64) -> Event {
        Event {
            id: Some(secs),
            candidate_id: 7,
            task_id: 1,
            event_type,
            timestamp: at(secs),
            metadata: EventMetadata::default(),
        }
    }

    fn edit(secs: i64, chars_added: i64) -> Event {
        Event {
            metadata: EventMetadata::edit(chars_added, 100),
            ..event(EventType::CodeEdit, secs)
        }
    }

    fn paste(secs: i64, chars_added: i64) -> Event {
        Event {
            metadata: EventMetadata::paste(chars_added, "x".repeat(chars_added as usize)),
            ..event(EventType::LargePaste, secs)
        }
    }

    fn metrics(events: &[Event]) -> WorkflowMetrics {
        compute_metrics(events, &MetricsConfig::default())
    }

    #[test]
    fn empty_log_yields_default_metrics() {
        let m = metrics(&[]);
        assert_eq!(m, WorkflowMetrics::default());
        assert_eq!(m.edits_per_run, 0.0);
    }

    #[test]
    fn reference_session() {
        let events = vec![
            event(EventType::TaskStarted, 0),
            edit(5, 10),
            event(EventType::RunExecuted, 10),
            edit(15, 80),
            paste(15, 80),
            event(EventType::RunExecuted, 20),
            event(EventType::Submitted, 25),
        ];
        let m = metrics(&events);
        assert_eq!(m.edit_count, 2);
        assert_eq!(m.run_count, 2);
        assert_eq!(m.refine_cycles, 1);
        assert_eq!(m.large_paste_count, 1);
        assert_eq!(m.total_time_seconds, 25.0);
        assert_eq!(m.edits_per_run, 1.0);
        assert_eq!(m.linear_typing_edits, 1);
        assert_eq!(m.linear_typing_ratio, 0.5);
        assert_eq!(m.paste_events.len(), 1);
        assert_eq!(m.paste_events[0].chars_added, 80);
        assert!(!m.missing_start);
        assert!(m.diagnostics.is_empty());
    }

    #[test]
    fn refine_cycles_count_runs_closed_after_edits() {
        let mut events = vec![event(EventType::TaskStarted, 0)];
        for i in 0..4 {
            events.push(edit(10 * i + 1, 3));
            events.push(event(EventType::RunExecuted, 10 * i + 5));
        }
        assert_eq!(metrics(&events).refine_cycles, 3);
    }

    #[test]
    fn runs_without_edits_between_do_not_refine() {
        let events = vec![
            event(EventType::TaskStarted, 0),
            edit(1, 3),
            event(EventType::RunExecuted, 2),
            event(EventType::RunExecuted, 3),
            event(EventType::RunExecuted, 4),
        ];
        assert_eq!(metrics(&events).refine_cycles, 0);
    }

    #[test]
    fn first_run_never_counts() {
        let events = vec![edit(1, 3), event(EventType::RunExecuted, 2)];
        assert_eq!(metrics(&events).refine_cycles, 0);
    }

    #[test]
    fn single_hidden_visible_pair() {
        let events = vec![
            event(EventType::TaskStarted, 0),
            event(EventType::TabHidden, 10),
            event(EventType::TabVisible, 25),
            event(EventType::Submitted, 40),
        ];
        assert_eq!(metrics(&events).context_switch_seconds, 15.0);
    }

    #[test]
    fn trailing_hidden_runs_to_session_end() {
        let events = vec![
            event(EventType::TaskStarted, 0),
            event(EventType::TabHidden, 10),
            event(EventType::TabVisible, 20),
            event(EventType::TabHidden, 30),
            edit(50, 2),
        ];
        let m = metrics(&events);
        assert_eq!(m.total_time_seconds, 50.0);
        assert_eq!(m.context_switch_seconds, 30.0);
    }

    #[test]
    fn unmatched_visible_is_ignored_with_diagnostic() {
        let events = vec![
            event(EventType::TaskStarted, 0),
            event(EventType::TabVisible, 5),
        ];
        let m = metrics(&events);
        assert_eq!(m.context_switch_seconds, 0.0);
        assert_eq!(
            m.diagnostics,
            vec![Diagnostic::UnmatchedTabVisible { event_id: Some(5) }]
        );
    }

    #[test]
    fn repeated_hidden_restarts_the_interval() {
        let events = vec![
            event(EventType::TaskStarted, 0),
            event(EventType::TabHidden, 10),
            event(EventType::TabHidden, 20),
            event(EventType::TabVisible, 25),
        ];
        let m = metrics(&events);
        assert_eq!(m.context_switch_seconds, 5.0);
        assert_eq!(
            m.diagnostics,
            vec![Diagnostic::RepeatedTabHidden { event_id: Some(20) }]
        );
    }

    #[test]
    fn linear_typing_boundaries() {
        let events = vec![
            edit(1, 1),
            edit(2, 49),
            edit(3, 50),
            edit(4, 0),
            edit(5, -20),
        ];
        let m = metrics(&events);
        assert_eq!(m.edit_count, 5);
        assert_eq!(m.linear_typing_edits, 2);
        assert!((m.linear_typing_ratio - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ratio_is_zero_when_nothing_is_classified() {
        let events = vec![edit(1, -5), edit(2, 0), edit(3, 120)];
        assert_eq!(metrics(&events).linear_typing_ratio, 0.0);
    }

    #[test]
    fn paste_without_chars_added_still_counts() {
        let mut p = event(EventType::LargePaste, 3);
        p.metadata.content_preview = Some("print('hi')".into());
        let m = metrics(&[p]);
        assert_eq!(m.large_paste_count, 1);
        assert_eq!(m.paste_events[0].chars_added, 0);
        assert_eq!(m.linear_typing_ratio, 0.0);
    }

    #[test]
    fn edit_without_chars_added_is_counted_but_unclassified() {
        let m = metrics(&[event(EventType::CodeEdit, 1), edit(2, 4)]);
        assert_eq!(m.edit_count, 2);
        assert_eq!(m.linear_typing_ratio, 1.0);
        assert_eq!(
            m.diagnostics,
            vec![Diagnostic::MissingCharsAdded { event_id: Some(1) }]
        );
    }

    #[test]
    fn ai_prompts_are_collected_in_order() {
        let mut first = event(EventType::AiUsed, 3);
        first.metadata = EventMetadata::prompt("how do I loop?");
        let silent = event(EventType::AiUsed, 4);
        let mut second = event(EventType::AiUsed, 8);
        second.metadata = EventMetadata::prompt("what is modulo?");
        let m = metrics(&[first, silent, second]);
        assert_eq!(m.ai_usage_count, 3);
        let prompts: Vec<_> = m.ai_prompts.iter().map(|p| p.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["how do I loop?", "what is modulo?"]);
    }

    #[test]
    fn missing_start_measures_from_first_event() {
        let m = metrics(&[edit(10, 3), event(EventType::RunExecuted, 40)]);
        assert!(m.missing_start);
        assert_eq!(m.total_time_seconds, 30.0);
    }

    #[test]
    fn out_of_order_and_foreign_events_are_skipped() {
        let mut foreign = edit(12, 3);
        foreign.candidate_id = 99;
        let events = vec![
            event(EventType::TaskStarted, 0),
            edit(10, 3),
            edit(5, 3),
            foreign,
            event(EventType::RunExecuted, 20),
        ];
        let m = metrics(&events);
        assert_eq!(m.edit_count, 1);
        assert_eq!(m.total_time_seconds, 20.0);
        assert_eq!(
            m.diagnostics,
            vec![
                Diagnostic::OutOfOrder { event_id: Some(5) },
                Diagnostic::ForeignSession { event_id: Some(12) },
            ]
        );
    }

    #[test]
    fn recomputation_is_deterministic() {
        let events = vec![
            event(EventType::TaskStarted, 0),
            edit(1, 4),
            paste(2, 300),
            event(EventType::TabHidden, 3),
            event(EventType::TabVisible, 9),
            event(EventType::RunExecuted, 11),
        ];
        let first = serde_json::to_vec(&metrics(&events)).unwrap();
        for _ in 0..5 {
            assert_eq!(serde_json::to_vec(&metrics(&events)).unwrap(), first);
        }
    }

    #[test]
    fn custom_threshold_moves_the_linear_boundary() {
        let config = MetricsConfig {
            paste_threshold_chars: 10,
        };
        let m = compute_metrics(&[edit(1, 9), edit(2, 10)], &config);
        assert_eq!(m.linear_typing_edits, 1);
        assert_eq!(m.linear_typing_ratio, 0.5);
    }
}
