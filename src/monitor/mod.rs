//! Lease-based liveness monitors.
//!
//! A monitor binds a renewable, ttl-bounded lease to the key of a monitored
//! entity. Callers refresh it periodically; if refreshes stop, the store
//! deletes the key when the lease expires and the watcher started alongside
//! the lease hands the entity/event snapshot to the [`FailureHandler`].
//!
//! # Guarantees
//!
//! - At most one watcher reports on a key: a watcher that sees its key
//!   rewritten shuts down without reporting
//! - A failure is reported at most once per lease
//! - Failure handler errors go to the [`ErrorHandler`] only, never back to
//!   `refresh_monitor` callers
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(MemLeaseStore::default());
//! store.start();
//! let service = LeaseMonitorService::new(
//!     store,
//!     Arc::new(LoggingFailureHandler),
//!     Arc::new(LoggingErrorHandler),
//! );
//! service.refresh_monitor("entity1", &entity, &event, 30).await?;
//! ```

mod factory;
mod handler;
mod record;
mod service;
mod watcher;
pub use factory::*;
pub use handler::*;
pub use record::*;
pub use service::*;
pub use watcher::*;
