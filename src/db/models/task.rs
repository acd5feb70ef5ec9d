use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One hidden test case: positional arguments and the expected return value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub args: Value,
    pub expected: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    #[serde(rename = "expected_time")]
    pub expected_time_minutes: u32,
    /// Never serialized: candidates must not see the hidden cases.
    #[serde(default, skip_serializing)]
    pub test_cases: Vec<TestCase>,
}
