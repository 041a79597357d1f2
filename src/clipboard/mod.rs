//! clipkeep - Clipboard module
//!
//! Selection data model, OS clipboard access and change monitoring

pub mod models;
pub mod monitor;
pub mod source;

pub use models::{Selection, Target};
pub use monitor::ClipboardMonitor;
pub use source::{ClipSelection, ClipboardSource, SourceError, XClipSource};
