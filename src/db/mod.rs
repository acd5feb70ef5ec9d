mod connection;
pub mod helpers;
mod migrations;
pub mod models;
mod repositories;

pub use connection::Database;
pub use models::{
    CaseResult, Event, EventMetadata, EventType, NewEvent, SessionKey, Submission, Task, TestCase,
};
pub use repositories::events::AppendOutcome;
pub use repositories::tasks::default_task;
