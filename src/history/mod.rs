//! clipkeep - History module
//!
//! The tiered selection history container

pub mod store;

pub use store::{HistorySnapshot, SelectionStore, StoreOptions, Tier};
