//! clipkeep - Configuration module
//!
//! Daemon settings and default target sets

pub mod settings;

pub use settings::Settings;
