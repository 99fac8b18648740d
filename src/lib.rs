mod config;
mod constants;
mod errors;
mod keys;
mod monitor;
mod store;
mod types;
pub mod metrics;

pub use config::*;
pub use errors::*;
pub use keys::*;
pub use monitor::*;
pub use store::*;
pub use types::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
