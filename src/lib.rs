//! Telegram bot that turns links into delivered files.
//!
//! A user sends a URL; the bot classifies it, enforces per-user rate
//! limits and a global concurrency cap, downloads the content directly
//! or through an external media extractor, zips it when large, and
//! sends the result back to the chat.

/// Telegram transport and access control
pub mod bot;
/// Settings and tunables
pub mod config;
/// Download pipeline
pub mod download;
/// Failure taxonomy
pub mod error;
