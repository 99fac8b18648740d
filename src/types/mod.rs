//! Entity and event snapshots handed to failure handlers.
//!
//! The monitor service treats these as opaque: they are cloned when a lease is
//! created and delivered unchanged if that lease later expires.

mod entity;
mod event;
pub use entity::*;
pub use event::*;
