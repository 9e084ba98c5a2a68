//! Media-site downloads through an external extractor tool.

use crate::download::{FetchedArtifact, Workspace};
use crate::error::DownloadError;
use std::path::Path;
use std::process::Stdio;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Output template handed to the extractor: title capped at 100
/// characters plus whatever container extension it picks.
const OUTPUT_TEMPLATE: &str = "%(title).100s.%(ext)s";

/// Runs a yt-dlp compatible binary against media-site URLs and adopts
/// whatever it leaves in the workspace.
pub struct ExtractorFetcher {
    bin: String,
}

impl ExtractorFetcher {
    pub fn new(bin: String) -> Self {
        Self { bin }
    }

    /// Invoke the extractor for `url` and pick up its output file.
    ///
    /// The tool writes directly into the workspace, so the byte budget
    /// can only be enforced after the fact.
    pub async fn fetch(
        &self,
        url: &str,
        workspace: &Workspace,
        budget_bytes: u64,
    ) -> Result<FetchedArtifact, DownloadError> {
        let template = workspace.path().join(OUTPUT_TEMPLATE);
        let output = Command::new(&self.bin)
            .arg("-f")
            .arg("best")
            .arg("-o")
            .arg(&template)
            .arg("--no-playlist")
            .arg("--geo-bypass")
            .arg(url)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| {
                warn!(bin = %self.bin, %err, "failed to spawn extractor");
                DownloadError::ExtractionFailed { code: None }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                code = ?output.status.code(),
                stderr = %stderr.trim(),
                "extractor exited with an error"
            );
            return Err(DownloadError::ExtractionFailed {
                code: output.status.code(),
            });
        }
        debug!(
            stdout = %String::from_utf8_lossy(&output.stdout).trim(),
            "extractor finished"
        );

        let Some(artifact) = largest_file(workspace.path()).await? else {
            return Err(DownloadError::NoOutputProduced);
        };
        if artifact.size_bytes > budget_bytes {
            return Err(DownloadError::SizeExceeded {
                observed: artifact.size_bytes,
                budget: budget_bytes,
            });
        }

        info!(
            bytes = artifact.size_bytes,
            path = %artifact.path.display(),
            "extraction complete"
        );
        Ok(artifact)
    }
}

/// Find the biggest regular file in `dir`. Extractors may drop
/// thumbnails or subtitle sidecars next to the media, and the media is
/// reliably the largest. Ties keep the first entry seen.
async fn largest_file(dir: &Path) -> Result<Option<FetchedArtifact>, DownloadError> {
    let mut entries = fs::read_dir(dir).await?;
    let mut best: Option<FetchedArtifact> = None;
    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let size = metadata.len();
        if best.as_ref().is_none_or(|current| size > current.size_bytes) {
            best = Some(FetchedArtifact {
                path: entry.path(),
                size_bytes: size,
            });
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_nonzero_exit_reports_the_code() {
        let workspace = Workspace::create(None).expect("workspace");
        let fetcher = ExtractorFetcher::new("false".to_string());

        let err = fetcher
            .fetch("https://youtube.com/watch?v=x", &workspace, 1024)
            .await
            .expect_err("false always fails");
        match err {
            DownloadError::ExtractionFailed { code } => assert_eq!(code, Some(1)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_binary_reports_no_code() {
        let workspace = Workspace::create(None).expect("workspace");
        let fetcher = ExtractorFetcher::new("definitely-not-an-installed-tool".to_string());

        let err = fetcher
            .fetch("https://youtube.com/watch?v=x", &workspace, 1024)
            .await
            .expect_err("binary does not exist");
        assert!(matches!(
            err,
            DownloadError::ExtractionFailed { code: None }
        ));
    }

    #[tokio::test]
    async fn test_clean_exit_without_output_is_an_error() {
        let workspace = Workspace::create(None).expect("workspace");
        let fetcher = ExtractorFetcher::new("true".to_string());

        let err = fetcher
            .fetch("https://youtube.com/watch?v=x", &workspace, 1024)
            .await
            .expect_err("nothing was produced");
        assert!(matches!(err, DownloadError::NoOutputProduced));
    }

    #[tokio::test]
    async fn test_output_over_budget_is_rejected() {
        let workspace = Workspace::create(None).expect("workspace");
        std::fs::write(workspace.path().join("video.mp4"), [0u8; 100]).expect("seed file");
        let fetcher = ExtractorFetcher::new("true".to_string());

        let err = fetcher
            .fetch("https://youtube.com/watch?v=x", &workspace, 10)
            .await
            .expect_err("file is larger than the budget");
        match err {
            DownloadError::SizeExceeded { observed, budget } => {
                assert_eq!(observed, 100);
                assert_eq!(budget, 10);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_output_within_budget_is_adopted() {
        let workspace = Workspace::create(None).expect("workspace");
        std::fs::write(workspace.path().join("video.mp4"), [0u8; 100]).expect("seed file");
        let fetcher = ExtractorFetcher::new("true".to_string());

        let artifact = fetcher
            .fetch("https://youtube.com/watch?v=x", &workspace, 1000)
            .await
            .expect("within budget");
        assert_eq!(artifact.size_bytes, 100);
        assert_eq!(artifact.path, workspace.path().join("video.mp4"));
    }

    #[tokio::test]
    async fn test_largest_file_prefers_the_biggest_and_skips_dirs() {
        let workspace = Workspace::create(None).expect("workspace");
        std::fs::write(workspace.path().join("small.srt"), [0u8; 10]).expect("seed");
        std::fs::write(workspace.path().join("big.mp4"), [0u8; 20]).expect("seed");
        std::fs::create_dir(workspace.path().join("fragments")).expect("subdir");

        let best = largest_file(workspace.path())
            .await
            .expect("scan")
            .expect("has files");
        assert_eq!(best.path, workspace.path().join("big.mp4"));
        assert_eq!(best.size_bytes, 20);
    }

    #[tokio::test]
    async fn test_largest_file_empty_dir_is_none() {
        let workspace = Workspace::create(None).expect("workspace");
        assert!(largest_file(workspace.path())
            .await
            .expect("scan")
            .is_none());
    }
}
