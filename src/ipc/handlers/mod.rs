pub mod content;
pub mod core;
pub mod courses;
pub mod grading;
pub mod queries;
pub mod setup;
pub mod users;
