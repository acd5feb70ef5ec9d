use chrono::{DateTime, Duration, SubsecRound, TimeZone, Utc};
use tempfile::TempDir;
use workflow_signal::{
    db::{Database, EventMetadata, EventType, NewEvent, SessionKey},
    EventLog, SignalError,
};

fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap() + Duration::seconds(secs)
}

fn open_log(dir: &TempDir) -> EventLog {
    let db = Database::new(dir.path().join("events.sqlite3")).unwrap();
    EventLog::new(db, 200)
}

fn started(secs: i64) -> NewEvent {
    NewEvent::new(1, 1, EventType::TaskStarted).at(at(secs))
}

fn edit(secs: i64, chars_added: i64) -> NewEvent {
    NewEvent::new(1, 1, EventType::CodeEdit)
        .at(at(secs))
        .with_metadata(EventMetadata::edit(chars_added, 100))
}

#[tokio::test]
async fn appended_events_come_back_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let log = open_log(&dir);

    log.append(started(0)).await.unwrap();
    log.append(edit(5, 3)).await.unwrap();
    log.append(NewEvent::new(1, 1, EventType::RunExecuted).at(at(10)))
        .await
        .unwrap();

    let events = log.query_by_session(SessionKey::new(1, 1)).await.unwrap();
    let types: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        types,
        vec![EventType::TaskStarted, EventType::CodeEdit, EventType::RunExecuted]
    );
    assert!(events.iter().all(|e| e.id.is_some()));
    assert_eq!(events[1].metadata.chars_added, Some(3));
    assert_eq!(events[2].timestamp, at(10));
}

#[tokio::test]
async fn unknown_session_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let log = open_log(&dir);
    log.append(started(0)).await.unwrap();

    let events = log.query_by_session(SessionKey::new(99, 1)).await.unwrap();
    assert!(events.is_empty());
}

#[tokio::test]
async fn earlier_timestamp_is_rejected_without_touching_the_log() {
    let dir = tempfile::tempdir().unwrap();
    let log = open_log(&dir);

    log.append(started(0)).await.unwrap();
    log.append(edit(20, 4)).await.unwrap();

    let err = log.append(edit(10, 4)).await.unwrap_err();
    assert!(matches!(err, SignalError::InvalidEvent { .. }));

    let events = log.query_by_session(SessionKey::new(1, 1)).await.unwrap();
    assert_eq!(events.len(), 2);
}

#[tokio::test]
async fn equal_timestamps_keep_insertion_order() {
    let dir = tempfile::tempdir().unwrap();
    let log = open_log(&dir);

    log.append(edit(15, 80)).await.unwrap();
    log.append(
        NewEvent::new(1, 1, EventType::LargePaste)
            .at(at(15))
            .with_metadata(EventMetadata::paste(80, "fn main() {}")),
    )
    .await
    .unwrap();

    let events = log.query_by_session(SessionKey::new(1, 1)).await.unwrap();
    assert_eq!(events[0].event_type, EventType::CodeEdit);
    assert_eq!(events[1].event_type, EventType::LargePaste);
}

#[tokio::test]
async fn ordering_is_per_session() {
    let dir = tempfile::tempdir().unwrap();
    let log = open_log(&dir);

    log.append(edit(50, 2)).await.unwrap();
    // Another candidate may be behind in time.
    log.append(NewEvent::new(2, 1, EventType::TaskStarted).at(at(0)))
        .await
        .unwrap();

    let sessions = log.sessions().await.unwrap();
    assert_eq!(sessions, vec![SessionKey::new(1, 1), SessionKey::new(2, 1)]);
}

#[tokio::test]
async fn missing_required_metadata_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let log = open_log(&dir);

    let bare_edit = NewEvent::new(1, 1, EventType::CodeEdit).at(at(1));
    assert!(matches!(
        log.append(bare_edit).await,
        Err(SignalError::InvalidEvent { .. })
    ));

    let bare_paste = NewEvent::new(1, 1, EventType::LargePaste)
        .at(at(1))
        .with_metadata(EventMetadata {
            chars_added: Some(90),
            ..EventMetadata::default()
        });
    assert!(matches!(
        log.append(bare_paste).await,
        Err(SignalError::InvalidEvent { .. })
    ));

    // A prompt is optional for ai_used.
    log.append(NewEvent::new(1, 1, EventType::AiUsed).at(at(2)))
        .await
        .unwrap();
}

#[tokio::test]
async fn server_timestamp_never_precedes_last_event() {
    let dir = tempfile::tempdir().unwrap();
    let log = open_log(&dir);

    let ahead = (Utc::now() + Duration::hours(1)).trunc_subsecs(3);

    log.append(NewEvent::new(1, 1, EventType::TaskStarted).at(ahead))
        .await
        .unwrap();
    let stored = log
        .append(NewEvent::new(1, 1, EventType::TabHidden))
        .await
        .unwrap();

    assert_eq!(stored.timestamp, ahead);
}

#[tokio::test]
async fn long_paste_previews_are_truncated() {
    let dir = tempfile::tempdir().unwrap();
    let log = open_log(&dir);

    let preview = "x".repeat(300);
    let stored = log
        .append(
            NewEvent::new(1, 1, EventType::LargePaste)
                .at(at(3))
                .with_metadata(EventMetadata::paste(300, preview)),
        )
        .await
        .unwrap();

    let kept = stored.metadata.content_preview.unwrap();
    assert_eq!(kept.chars().count(), 203);
    assert!(kept.ends_with("..."));
}

#[tokio::test]
async fn events_survive_reopening_the_store() {
    let dir = tempfile::tempdir().unwrap();
    {
        let log = open_log(&dir);
        log.append(started(0)).await.unwrap();
        log.append(edit(4, 6)).await.unwrap();
    }

    let log = open_log(&dir);
    let events = log.query_by_session(SessionKey::new(1, 1)).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].metadata, EventMetadata::edit(6, 100));
}

#[tokio::test]
async fn custom_tasks_keep_their_hidden_cases() {
    use serde_json::json;
    use workflow_signal::db::{Task, TestCase};

    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("tasks.sqlite3")).unwrap();
    assert!(db.seed_default_task().await.unwrap());
    assert!(!db.seed_default_task().await.unwrap());

    let id = db
        .insert_task(&Task {
            id: 0,
            title: "Reverse".into(),
            description: "Reverse a string.".into(),
            expected_time_minutes: 10,
            test_cases: vec![TestCase {
                args: json!(["abc"]),
                expected: json!("cba"),
            }],
        })
        .await
        .unwrap();

    let task = db.get_task(id).await.unwrap().unwrap();
    assert_eq!(task.title, "Reverse");
    assert_eq!(task.test_cases.len(), 1);
    assert_eq!(db.list_tasks().await.unwrap().len(), 2);
    assert!(db.get_task(id + 100).await.unwrap().is_none());

    // Candidates never see the hidden cases.
    let public = serde_json::to_value(&task).unwrap();
    assert!(public.get("test_cases").is_none());
    assert_eq!(public["expected_time"], json!(10));
}

#[tokio::test]
async fn one_submission_row_per_session() {
    use workflow_signal::db::Submission;

    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("submissions.sqlite3")).unwrap();

    let submission = |id: &str, task_id: i64| Submission {
        id: id.into(),
        candidate_id: 4,
        task_id,
        final_code: Some("def fizzbuzz(n): ...".into()),
        reflection: None,
        tests_passed: 2,
        tests_total: 5,
        results: Vec::new(),
        run_error: None,
        created_at: at(30),
    };

    assert!(db.insert_submission(&submission("first", 1)).await.unwrap());
    assert!(!db.insert_submission(&submission("second", 1)).await.unwrap());
    assert!(db.insert_submission(&submission("other-task", 2)).await.unwrap());

    let stored = db.get_submission(SessionKey::new(4, 1)).await.unwrap().unwrap();
    assert_eq!(stored.id, "first");
    assert_eq!(stored.created_at, at(30));

    let listed = db.list_submissions_for_candidate(4).await.unwrap();
    let ids: Vec<&str> = listed.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["first", "other-task"]);
    assert!(db.list_submissions_for_candidate(5).await.unwrap().is_empty());
}
