pub mod couch;
pub mod error;
pub mod memory;
pub mod traits;

pub use couch::CouchTriggerStore;
pub use error::StorageError;
pub use memory::MemoryTriggerStore;
pub use traits::*;
