//! Editor sessions and the optional autosave thread.

mod driver;
mod editor;

pub use driver::{AutosaveDriver, DEFAULT_TICK_INTERVAL};
pub use editor::{EditorSession, Recovery};
