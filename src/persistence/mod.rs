//! Draft persistence: the stored record format and the debounced persister.
//!
//! Saves are rate-limited three ways:
//!
//! - a debounce window restarted by every mutation,
//! - a max-interval timer armed by the first mutation after a save,
//! - a minimum gap between consecutive writes.
//!
//! Timer firings that land inside the minimum gap are dropped. A dropped
//! max-interval firing is re-armed for the moment the gap elapses.

mod clock;
mod persister;
mod record;

pub use clock::{Clock, ManualClock, SystemClock};
pub use persister::{DebouncedPersister, PersisterStats, SaveOutcome, SaveTrigger};
pub use record::{load_document, store_document, PersistenceRecord, SCHEMA_VERSION};
