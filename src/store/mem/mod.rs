mod mem_lease_store;
mod watch_registry;
pub use mem_lease_store::*;
pub use watch_registry::MemWatchStream;
