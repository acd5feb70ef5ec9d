use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::json;

use crate::db::{
    connection::Database,
    helpers::{conversion_error, to_u32},
    models::{Task, TestCase},
};

fn row_to_task(row: &Row) -> Result<Task, rusqlite::Error> {
    let expected_time: i64 = row.get("expected_time_minutes")?;
    let test_cases_json: String = row.get("test_cases_json")?;
    let test_cases: Vec<TestCase> = serde_json::from_str(&test_cases_json)
        .map_err(|e| conversion_error(anyhow::Error::new(e)))?;

    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        expected_time_minutes: to_u32(expected_time, "expected_time_minutes")
            .map_err(conversion_error)?,
        test_cases,
    })
}

fn fizzbuzz_case(n: u32) -> TestCase {
    let expected: Vec<String> = (1..=n)
        .map(|i| match (i % 3, i % 5) {
            (0, 0) => "FizzBuzz".to_string(),
            (0, _) => "Fizz".to_string(),
            (_, 0) => "Buzz".to_string(),
            _ => i.to_string(),
        })
        .collect();
    TestCase {
        args: json!([n]),
        expected: json!(expected),
    }
}

/// The task every fresh store starts with.
pub fn default_task() -> Task {
    Task {
        id: 0,
        title: "FizzBuzz".into(),
        description: "Write a function fizzbuzz(n) that returns a list of strings from 1 to n. \
                      For multiples of 3 use 'Fizz', for multiples of 5 use 'Buzz', for both use \
                      'FizzBuzz'. Otherwise return the number as a string."
            .into(),
        expected_time_minutes: 15,
        test_cases: [1, 3, 5, 15, 16].into_iter().map(fizzbuzz_case).collect(),
    }
}

fn insert_row(conn: &Connection, task: &Task) -> Result<i64> {
    let test_cases_json =
        serde_json::to_string(&task.test_cases).context("failed to serialize test cases")?;
    conn.execute(
        "INSERT INTO tasks (title, description, expected_time_minutes, test_cases_json)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            task.title,
            task.description,
            i64::from(task.expected_time_minutes),
            test_cases_json,
        ],
    )
    .with_context(|| format!("failed to insert task '{}'", task.title))?;
    Ok(conn.last_insert_rowid())
}

impl Database {
    /// Inserts a task and returns its assigned id. `task.id` is ignored.
    pub async fn insert_task(&self, task: &Task) -> Result<i64> {
        let record = task.clone();
        self.execute(move |conn| insert_row(conn, &record)).await
    }

    pub async fn get_task(&self, task_id: i64) -> Result<Option<Task>> {
        self.execute(move |conn| {
            let task = conn
                .query_row(
                    "SELECT id, title, description, expected_time_minutes, test_cases_json
                     FROM tasks WHERE id = ?1",
                    params![task_id],
                    row_to_task,
                )
                .optional()?;
            Ok(task)
        })
        .await
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, description, expected_time_minutes, test_cases_json
                 FROM tasks ORDER BY id ASC",
            )?;
            let tasks = stmt
                .query_map([], row_to_task)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
        .await
    }

    /// Inserts [`default_task`] when the catalogue is empty. Returns true when seeded.
    pub async fn seed_default_task(&self) -> Result<bool> {
        let task = default_task();
        self.transact(move |tx| {
            let count: i64 = tx.query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))?;
            if count > 0 {
                return Ok(false);
            }
            insert_row(tx, &task)?;
            Ok(true)
        })
        .await
    }
}
