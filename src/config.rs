//! Configuration and settings management
//!
//! Loads settings from environment variables and defines the default
//! policy limits.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Optional shared secret; unset or empty means the bot is public
    pub access_key: Option<String>,

    /// Comma-separated hosts approved for the direct route
    #[serde(rename = "allowed_hosts", default = "default_allowed_hosts")]
    pub allowed_hosts_str: String,

    /// Comma-separated host substrings routed to the media extractor
    #[serde(rename = "media_hosts", default = "default_media_hosts")]
    pub media_hosts_str: String,

    /// Extractor binary invoked for media hosts
    #[serde(default = "default_extractor_bin")]
    pub extractor_bin: String,

    /// Parent directory for transient workspaces (system temp when unset)
    pub work_dir: Option<PathBuf>,
}

fn default_allowed_hosts() -> String {
    "drive.google.com,docs.google.com,dl.dropboxusercontent.com,dropbox.com,mediafire.com,\
     mega.nz,transfer.sh,file.io,anonfiles.com,pixeldrain.com,send.cm,example.com,\
     instagram.com,googlevideo.com"
        .to_string()
}

fn default_media_hosts() -> String {
    "youtube.com,youtu.be,vimeo.com,facebook.com,x.com,twitter.com,dailymotion.com,instagram.com"
        .to_string()
}

fn default_extractor_bin() -> String {
    "yt-dlp".to_string()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(File::with_name("config/default").required(false))
            // Add in the current environment file
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked into git
            .add_source(File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of APP)
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Also add settings from environment variables directly (without prefix)
            // Note: Environment::default() auto-converts UPPER_SNAKE_CASE to snake_case
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }

    /// Returns the lowercased host allow-list for the direct route
    #[must_use]
    pub fn allowed_hosts(&self) -> HashSet<String> {
        split_host_list(&self.allowed_hosts_str).collect()
    }

    /// Returns the host substrings that select the extractor route
    #[must_use]
    pub fn media_hosts(&self) -> Vec<String> {
        split_host_list(&self.media_hosts_str).collect()
    }

    /// True when a shared secret is configured
    #[must_use]
    pub fn access_control_enabled(&self) -> bool {
        self.access_key.as_deref().is_some_and(|key| !key.is_empty())
    }
}

fn split_host_list(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(str::to_ascii_lowercase)
}

/// Hard cap on downloaded bytes per request.
/// Default: 500 MB.
pub const MAX_DOWNLOAD_BYTES: u64 = 500 * 1024 * 1024;
/// Artifacts above this size are zipped before delivery.
/// Default: 25 MB.
pub const COMPRESS_THRESHOLD_BYTES: u64 = 25 * 1024 * 1024;
/// HTTP connect/read-stall timeout (seconds).
pub const REQUEST_TIMEOUT_SECS: u64 = 60;
/// Requests allowed per identity within the rate window.
pub const RATE_LIMIT_QUOTA: usize = 1;
/// Rate window length (seconds).
pub const RATE_LIMIT_WINDOW_SECS: u64 = 30;
/// Global cap on simultaneous fetches.
pub const MAX_CONCURRENT_DOWNLOADS: usize = 2;
/// How long an unlocked identity stays unlocked (seconds).
/// Default: 12 hours.
pub const ACCESS_SESSION_TTL_SECS: u64 = 12 * 60 * 60;
/// Cooldown between "key required" replies to the same identity (seconds).
pub const DENIAL_COOLDOWN_SECS: u64 = 300;

/// Get the per-request byte budget from env or default.
///
/// Environment variable: `MAX_DOWNLOAD_BYTES`.
#[must_use]
pub fn get_max_download_bytes() -> u64 {
    env_or("MAX_DOWNLOAD_BYTES", MAX_DOWNLOAD_BYTES)
}

/// Get the compress threshold from env or default.
///
/// Environment variable: `COMPRESS_THRESHOLD_BYTES`.
#[must_use]
pub fn get_compress_threshold_bytes() -> u64 {
    env_or("COMPRESS_THRESHOLD_BYTES", COMPRESS_THRESHOLD_BYTES)
}

/// Get the HTTP timeout from env or default.
///
/// Environment variable: `REQUEST_TIMEOUT_SECS`.
#[must_use]
pub fn get_request_timeout_secs() -> u64 {
    env_or("REQUEST_TIMEOUT_SECS", REQUEST_TIMEOUT_SECS)
}

/// Get the rate quota from env or default.
///
/// Environment variable: `RATE_LIMIT_QUOTA`.
#[must_use]
pub fn get_rate_limit_quota() -> usize {
    env_or("RATE_LIMIT_QUOTA", RATE_LIMIT_QUOTA)
}

/// Get the rate window from env or default.
///
/// Environment variable: `RATE_LIMIT_WINDOW_SECS`.
#[must_use]
pub fn get_rate_limit_window_secs() -> u64 {
    env_or("RATE_LIMIT_WINDOW_SECS", RATE_LIMIT_WINDOW_SECS)
}

/// Get the fetch concurrency cap from env or default.
///
/// Environment variable: `MAX_CONCURRENT_DOWNLOADS`.
#[must_use]
pub fn get_max_concurrent_downloads() -> usize {
    env_or("MAX_CONCURRENT_DOWNLOADS", MAX_CONCURRENT_DOWNLOADS)
}

/// Get the access session TTL from env or default.
///
/// Environment variable: `ACCESS_SESSION_TTL_SECS`.
#[must_use]
pub fn get_access_session_ttl_secs() -> u64 {
    env_or("ACCESS_SESSION_TTL_SECS", ACCESS_SESSION_TTL_SECS)
}

/// Get the denial-reply cooldown from env or default.
///
/// Environment variable: `DENIAL_COOLDOWN_SECS`.
#[must_use]
pub fn get_denial_cooldown_secs() -> u64 {
    env_or("DENIAL_COOLDOWN_SECS", DENIAL_COOLDOWN_SECS)
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
