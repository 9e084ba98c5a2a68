//! Link download pipeline.
//!
//! One request flows classify -> rate limit -> workspace -> fetch ->
//! package -> deliver. The coordinator owns the shared pieces (rate
//! limiter, fetch gate, HTTP client) and guarantees every request ends
//! in exactly one payload or one failure notice.

pub mod classify;
pub mod delivery;
pub mod direct;
pub mod extractor;
pub mod gate;
pub mod package;
pub mod ratelimit;
pub mod workspace;

pub use classify::{classify, FetchPlan, HostPolicy, Route};
pub use delivery::Delivery;
pub use workspace::Workspace;

use crate::config::{self, Settings};
use crate::error::DownloadError;
use chrono::{DateTime, Utc};
use direct::DirectFetcher;
use extractor::ExtractorFetcher;
use gate::FetchGate;
use ratelimit::RateLimiter;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Name used when neither headers nor the URL offer one.
pub(crate) const FALLBACK_FILE_NAME: &str = "file";

/// One inbound link request, tagged for log correlation.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub user_id: i64,
    pub raw_url: String,
    pub received_at: DateTime<Utc>,
}

impl RequestContext {
    #[must_use]
    pub fn new(user_id: i64, raw_url: String) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            user_id,
            raw_url,
            received_at: Utc::now(),
        }
    }
}

/// A file some fetcher left in the workspace.
#[derive(Debug)]
pub struct FetchedArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// What actually goes out: the artifact itself or its archive.
#[derive(Debug)]
pub struct DeliverablePayload {
    pub path: PathBuf,
    pub file_name: String,
    pub compressed: bool,
}

/// Pipeline tunables, resolved once at startup.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub policy: HostPolicy,
    pub max_download_bytes: u64,
    pub compress_threshold_bytes: u64,
    pub request_timeout: Duration,
    pub rate_limit_quota: usize,
    pub rate_limit_window: Duration,
    pub max_concurrent_downloads: usize,
    pub extractor_bin: String,
    pub work_dir: Option<PathBuf>,
}

impl DownloadConfig {
    /// Resolve from loaded settings plus per-knob environment overrides.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            policy: HostPolicy::new(settings.allowed_hosts(), settings.media_hosts()),
            max_download_bytes: config::get_max_download_bytes(),
            compress_threshold_bytes: config::get_compress_threshold_bytes(),
            request_timeout: Duration::from_secs(config::get_request_timeout_secs()),
            rate_limit_quota: config::get_rate_limit_quota(),
            rate_limit_window: Duration::from_secs(config::get_rate_limit_window_secs()),
            max_concurrent_downloads: config::get_max_concurrent_downloads(),
            extractor_bin: settings.extractor_bin.clone(),
            work_dir: settings.work_dir.clone(),
        }
    }
}

/// Owns the pipeline and serves requests concurrently.
pub struct DownloadCoordinator {
    config: DownloadConfig,
    limiter: RateLimiter,
    gate: FetchGate,
    direct: DirectFetcher,
    extractor: ExtractorFetcher,
}

impl DownloadCoordinator {
    /// Wire up the pipeline from resolved configuration.
    pub fn new(config: DownloadConfig) -> Result<Self, reqwest::Error> {
        let direct = DirectFetcher::new(config.request_timeout)?;
        let extractor = ExtractorFetcher::new(config.extractor_bin.clone());
        let limiter = RateLimiter::new(config.rate_limit_quota, config.rate_limit_window);
        let gate = FetchGate::new(config.max_concurrent_downloads);
        Ok(Self {
            config,
            limiter,
            gate,
            direct,
            extractor,
        })
    }

    /// Serve one request end to end. Never returns an error: failures
    /// are logged in full and reported to the requester as a short
    /// notice instead.
    pub async fn handle(&self, ctx: RequestContext, delivery: &dyn Delivery) {
        info!(
            request_id = %ctx.request_id,
            user_id = ctx.user_id,
            url = %ctx.raw_url,
            received_at = %ctx.received_at,
            "handling link request"
        );
        if let Err(err) = self.run(&ctx, delivery).await {
            error!(
                request_id = %ctx.request_id,
                user_id = ctx.user_id,
                error = ?err,
                "request failed"
            );
            if let Err(send_err) = delivery.send_text(&err.user_message()).await {
                error!(request_id = %ctx.request_id, %send_err, "failed to send the failure notice");
            }
        }
    }

    async fn run(&self, ctx: &RequestContext, delivery: &dyn Delivery) -> Result<(), DownloadError> {
        let plan = classify(&ctx.raw_url, &self.config.policy);
        if !plan.allowed {
            return Err(DownloadError::InvalidInput(
                "Domain not allowed or not public. Check the allow-list or use a public video link.",
            ));
        }

        if !self.limiter.admit(ctx.user_id).await {
            return Err(DownloadError::RateLimited {
                quota: self.config.rate_limit_quota,
                window_secs: self.config.rate_limit_window.as_secs(),
            });
        }

        self.notify_accepted(ctx, plan.route, delivery).await;

        // Dropped on every exit from here on, taking its files with it.
        let workspace = Workspace::create(self.config.work_dir.as_deref())?;

        let artifact = {
            let _slot = self.gate.acquire().await;
            debug!(request_id = %ctx.request_id, "fetch slot acquired");
            match plan.route {
                Route::Direct => {
                    self.direct
                        .fetch(&plan.target_url, &workspace, self.config.max_download_bytes)
                        .await?
                }
                Route::Extractor => {
                    self.extractor
                        .fetch(&plan.target_url, &workspace, self.config.max_download_bytes)
                        .await?
                }
            }
        };

        let payload = package::package(artifact, self.config.compress_threshold_bytes).await?;
        delivery
            .send_file(&payload.path, &payload.file_name)
            .await
            .map_err(DownloadError::Delivery)?;

        info!(
            request_id = %ctx.request_id,
            file = %payload.file_name,
            compressed = payload.compressed,
            "payload delivered"
        );
        Ok(())
    }

    /// Progress note sent right after admission. Best effort only; a
    /// send failure must not abort a download that would succeed.
    async fn notify_accepted(&self, ctx: &RequestContext, route: Route, delivery: &dyn Delivery) {
        let note = match route {
            Route::Direct => "Accepted link. Downloading...",
            Route::Extractor => "Detected video/media site. Running the extractor, please wait...",
        };
        if let Err(err) = delivery.send_text(note).await {
            warn!(request_id = %ctx.request_id, %err, "failed to send the progress note");
        }
    }
}
