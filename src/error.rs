//! Failure taxonomy for the download pipeline.
//!
//! Every way a request can fail is one of these variants. The coordinator
//! logs the full variant and replies to the user with [`DownloadError::user_message`]
//! only, so transport detail and extractor stderr never reach chat.

use reqwest::StatusCode;

/// Errors produced anywhere between URL classification and delivery.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Malformed or policy-rejected URL.
    #[error("rejected input: {0}")]
    InvalidInput(&'static str),

    /// The identity's sliding window is already full.
    #[error("rate limited: {quota} per {window_secs}s")]
    RateLimited { quota: usize, window_secs: u64 },

    /// Declared or observed size is over the byte budget.
    #[error("{observed} bytes exceeds the {budget} byte budget")]
    SizeExceeded { observed: u64, budget: u64 },

    /// Transport-level failure while talking to the upstream server.
    #[error("network error")]
    Network(#[from] reqwest::Error),

    /// Upstream answered with a non-2xx status.
    #[error("upstream returned {status}")]
    UpstreamHttp { status: StatusCode },

    /// The extraction tool could not be run or exited non-zero.
    #[error("extractor exited with code {code:?}")]
    ExtractionFailed { code: Option<i32> },

    /// The extraction tool exited cleanly but left no files behind.
    #[error("extractor produced no output")]
    NoOutputProduced,

    /// Archive creation failed.
    #[error("packaging failed")]
    Packaging(#[source] anyhow::Error),

    /// Local filesystem failure in the transient workspace.
    #[error("workspace I/O error")]
    Workspace(#[from] std::io::Error),

    /// The chat collaborator refused the payload.
    #[error("delivery failed")]
    Delivery(#[source] anyhow::Error),
}

impl DownloadError {
    /// Short reply for chat. Internal diagnostics stay in the logs.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidInput(reason) => (*reason).to_string(),
            Self::RateLimited { quota, window_secs } => {
                format!("Rate limit: max {quota} requests per {window_secs}s. Try again later.")
            }
            Self::SizeExceeded { .. } => {
                "File exceeds the maximum allowed size. Aborting.".to_string()
            }
            Self::Network(_) => "Download failed: network error. Try again later.".to_string(),
            Self::UpstreamHttp { status } => {
                format!("Download failed: the server answered with HTTP {status}.")
            }
            Self::ExtractionFailed { .. } => {
                "Extraction failed. The content may be private, paid, or blocked.".to_string()
            }
            Self::NoOutputProduced => "The extractor finished but produced no file.".to_string(),
            Self::Packaging(_) => "Failed to compress the file for delivery.".to_string(),
            Self::Workspace(_) => "Download failed: local storage error.".to_string(),
            Self::Delivery(_) => "The file was downloaded but could not be delivered.".to_string(),
        }
    }
}
