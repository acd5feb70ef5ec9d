pub mod events;
pub mod submissions;
pub mod tasks;
