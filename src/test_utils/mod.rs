//! the test_utils folder here will share fixtures and recording handlers
//! between unit tests
mod fixtures;
mod handlers;

pub use fixtures::*;
pub use handlers::*;
