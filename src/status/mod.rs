//! Save status reporting.
//!
//! Persistence failures never propagate into the rendering layer. They are
//! turned into `SaveStatus` values and broadcast as `StatusEvent`s to any
//! subscribed UI component.
//!
//! # Example
//!
//! ```ignore
//! let events = session.subscribe_status();
//! for event in events.drain() {
//!     if let StatusEvent::Status { status, .. } = event {
//!         indicator.set_text(status.label());
//!     }
//! }
//! ```

mod broadcaster;
mod types;

pub use broadcaster::{StatusBroadcaster, DEFAULT_BUFFER_SIZE};
pub use types::{SaveStatus, StatusEvent, StatusSubscription, SubscriptionId};
