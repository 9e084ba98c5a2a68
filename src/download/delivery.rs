//! Outbound delivery seam.

use async_trait::async_trait;
use std::path::Path;

/// Where finished payloads and status lines go. The bot layer provides
/// the Telegram implementation; tests record the calls instead.
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Send a short status or failure notice.
    async fn send_text(&self, text: &str) -> anyhow::Result<()>;

    /// Send a file under the given display name.
    async fn send_file(&self, path: &Path, file_name: &str) -> anyhow::Result<()>;
}
