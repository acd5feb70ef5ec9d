pub mod event;
pub mod submission;
pub mod task;

pub use event::{Event, EventMetadata, EventType, NewEvent, SessionKey};
pub use submission::{CaseResult, Submission};
pub use task::{Task, TestCase};
