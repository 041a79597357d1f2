//! clipkeep - Storage module
//!
//! SQLite persistence for the selection history

pub mod database;

pub use database::{DatabaseError, HistoryDb};
