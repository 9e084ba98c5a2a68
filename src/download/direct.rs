//! Streaming HTTP download under a byte budget.

use crate::download::{FetchedArtifact, Workspace, FALLBACK_FILE_NAME};
use crate::error::DownloadError;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use lazy_regex::regex_captures;
use reqwest::{header, Client, Response, Url};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Fetches a URL with our own HTTP client, streaming the body to the
/// workspace and aborting as soon as the budget is crossed.
pub struct DirectFetcher {
    client: Client,
}

impl DirectFetcher {
    /// Build the fetcher and its HTTP client.
    ///
    /// `timeout` bounds both connection establishment and read stalls;
    /// there is deliberately no total-duration limit, since a large
    /// file on a slow link is not an error.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(concat!("linkfetch-bot/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Stream `url` into the workspace, staying within `budget_bytes`.
    pub async fn fetch(
        &self,
        url: &str,
        workspace: &Workspace,
        budget_bytes: u64,
    ) -> Result<FetchedArtifact, DownloadError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::UpstreamHttp { status });
        }

        // Declared size lets us refuse before reading a single byte.
        if let Some(declared) = response.content_length() {
            if declared > budget_bytes {
                debug!(declared, budget_bytes, "content-length over budget");
                return Err(DownloadError::SizeExceeded {
                    observed: declared,
                    budget: budget_bytes,
                });
            }
        }

        let file_name = resolve_file_name(&response, url);
        let path = workspace.path().join(&file_name);
        let mut file = fs::File::create(&path).await?;
        let size_bytes = write_stream(response.bytes_stream(), &mut file, budget_bytes).await?;
        file.flush().await?;

        info!(bytes = size_bytes, file = %file_name, "direct download complete");
        Ok(FetchedArtifact { path, size_bytes })
    }
}

/// Write `stream` to `file`, failing once the running total passes
/// `budget_bytes`. The offending chunk is never written, so the partial
/// file on disk stays within budget.
async fn write_stream<S, E>(
    mut stream: S,
    file: &mut fs::File,
    budget_bytes: u64,
) -> Result<u64, DownloadError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<DownloadError>,
{
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(Into::into)?;
        written += chunk.len() as u64;
        if written > budget_bytes {
            return Err(DownloadError::SizeExceeded {
                observed: written,
                budget: budget_bytes,
            });
        }
        file.write_all(&chunk).await?;
    }
    Ok(written)
}

/// Filename precedence: content-disposition hint, then the URL's last
/// path segment, then a generic fallback.
fn resolve_file_name(response: &Response, url: &str) -> String {
    response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .and_then(disposition_file_name)
        .or_else(|| file_name_from_url(url))
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}

/// Pull `filename=` out of a content-disposition header, dropping the
/// quoting and any path components a hostile server sneaks in.
fn disposition_file_name(value: &str) -> Option<String> {
    let (_, raw) = regex_captures!(r#"(?i)filename\s*=\s*"?([^";]+)"?"#, value)?;
    clean_component(raw)
}

fn file_name_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    if segment.is_empty() {
        return None;
    }
    clean_component(segment)
}

/// Keep only the final path component of a name hint.
fn clean_component(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches('"').trim();
    let name = Path::new(trimmed).file_name()?.to_str()?;
    (!name.is_empty()).then(|| name.to_string())
}
