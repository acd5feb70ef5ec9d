use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{conversion_error, format_timestamp, parse_datetime, to_i64, to_u32},
    models::{CaseResult, SessionKey, Submission},
};

fn row_to_submission(row: &Row) -> Result<Submission, rusqlite::Error> {
    let created_at: String = row.get("created_at")?;
    let results_json: String = row.get("results_json")?;
    let tests_passed: i64 = row.get("tests_passed")?;
    let tests_total: i64 = row.get("tests_total")?;

    let results: Vec<CaseResult> = serde_json::from_str(&results_json)
        .map_err(|e| conversion_error(anyhow::Error::new(e)))?;

    Ok(Submission {
        id: row.get("id")?,
        candidate_id: row.get("candidate_id")?,
        task_id: row.get("task_id")?,
        final_code: row.get("final_code")?,
        reflection: row.get("reflection")?,
        tests_passed: to_u32(tests_passed, "tests_passed").map_err(conversion_error)?,
        tests_total: to_u32(tests_total, "tests_total").map_err(conversion_error)?,
        results,
        run_error: row.get("run_error")?,
        created_at: parse_datetime(&created_at, "created_at").map_err(conversion_error)?,
    })
}

const SELECT_SUBMISSIONS: &str = "SELECT id, candidate_id, task_id, final_code, reflection,
        tests_passed, tests_total, results_json, run_error, created_at
     FROM submissions";

impl Database {
    /// Stores the session's submission unless one already exists. Returns
    /// false, writing nothing, when the session was submitted before.
    pub async fn insert_submission(&self, submission: &Submission) -> Result<bool> {
        let record = submission.clone();
        self.transact(move |tx| {
            let results_json = serde_json::to_string(&record.results)
                .context("failed to serialize test results")?;

            let inserted = tx
                .execute(
                    "INSERT INTO submissions (
                        id,
                        candidate_id,
                        task_id,
                        final_code,
                        reflection,
                        tests_passed,
                        tests_total,
                        results_json,
                        run_error,
                        created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    ON CONFLICT (candidate_id, task_id) DO NOTHING",
                    params![
                        record.id,
                        record.candidate_id,
                        record.task_id,
                        record.final_code,
                        record.reflection,
                        to_i64(u64::from(record.tests_passed))?,
                        to_i64(u64::from(record.tests_total))?,
                        results_json,
                        record.run_error,
                        format_timestamp(&record.created_at),
                    ],
                )
                .with_context(|| "failed to insert submission")?;
            Ok(inserted == 1)
        })
        .await
    }

    /// Every submission by one candidate, ordered by task.
    pub async fn list_submissions_for_candidate(
        &self,
        candidate_id: i64,
    ) -> Result<Vec<Submission>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_SUBMISSIONS} WHERE candidate_id = ?1 ORDER BY task_id"
            ))?;
            let submissions = stmt
                .query_map(params![candidate_id], row_to_submission)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(submissions)
        })
        .await
    }

    pub async fn get_submission(&self, key: SessionKey) -> Result<Option<Submission>> {
        self.execute(move |conn| {
            let submission = conn
                .query_row(
                    &format!("{SELECT_SUBMISSIONS} WHERE candidate_id = ?1 AND task_id = ?2"),
                    params![key.candidate_id, key.task_id],
                    row_to_submission,
                )
                .optional()?;
            Ok(submission)
        })
        .await
    }
}
