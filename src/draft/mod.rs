//! The draft store: the editor's in-memory document and its mutations.

mod store;

pub use store::DraftStore;
