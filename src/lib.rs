//! clipkeep - Clipboard selection history for X11 desktops
//!
//! A daemon that watches the X11 selections through xclip, keeps a tiered
//! deduplicated history, and serves it to shell pipelines such as
//! `clipkeep list | fzf | clipkeep copy` over a unix socket.

pub mod clipboard;
pub mod config;
pub mod history;
pub mod service;
pub mod storage;
