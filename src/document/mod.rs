//! The funnel document model.
//!
//! A document is an ordered list of pages, each an ordered list of blocks.
//! Position is authoritative for ordering; the `order` fields are rewritten
//! after every structural change so serialized drafts stay consistent.

mod kinds;
mod model;
mod template;

pub use kinds::BlockKind;
pub use model::{Block, Document, Page, RESERVED_BLOCK_KEYS};
pub use template::default_funnel;

/// Opaque property bag. Only the rendering layer interprets its fields.
pub type Properties = serde_json::Map<String, serde_json::Value>;
