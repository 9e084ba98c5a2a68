//! Zip packaging for artifacts over the compression threshold.

use crate::download::{DeliverablePayload, FetchedArtifact, FALLBACK_FILE_NAME};
use crate::error::DownloadError;
use anyhow::Context;
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Decide whether the artifact ships as-is or wrapped in a zip archive
/// named after the original file.
pub async fn package(
    artifact: FetchedArtifact,
    threshold_bytes: u64,
) -> Result<DeliverablePayload, DownloadError> {
    let file_name = artifact_file_name(&artifact.path);
    if artifact.size_bytes <= threshold_bytes {
        debug!(bytes = artifact.size_bytes, "artifact under threshold, shipping as-is");
        return Ok(DeliverablePayload {
            path: artifact.path,
            file_name,
            compressed: false,
        });
    }

    let archive_name = format!("{file_name}.zip");
    let archive_path = artifact.path.with_file_name(&archive_name);
    let source = artifact.path.clone();
    let target = archive_path.clone();
    let entry = file_name;
    let archived_bytes =
        tokio::task::spawn_blocking(move || write_archive(&source, &target, &entry))
            .await
            .map_err(|err| DownloadError::Packaging(anyhow::Error::new(err)))?
            .map_err(DownloadError::Packaging)?;

    info!(
        original = artifact.size_bytes,
        archived = archived_bytes,
        archive = %archive_name,
        "artifact compressed"
    );
    Ok(DeliverablePayload {
        path: archive_path,
        file_name: archive_name,
        compressed: true,
    })
}

/// Deflate a single file into `archive` under `entry_name`; returns the
/// archive size on disk.
fn write_archive(source: &Path, archive: &Path, entry_name: &str) -> anyhow::Result<u64> {
    let mut input = File::open(source).with_context(|| format!("open {}", source.display()))?;
    let output = File::create(archive).with_context(|| format!("create {}", archive.display()))?;

    let mut writer = ZipWriter::new(output);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    writer
        .start_file(entry_name, options)
        .context("start zip entry")?;
    io::copy(&mut input, &mut writer).context("write zip entry")?;
    writer.finish().context("finalize zip archive")?;

    Ok(std::fs::metadata(archive)?.len())
}

fn artifact_file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map_or_else(|| FALLBACK_FILE_NAME.to_string(), ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::Workspace;
    use std::io::Read;

    fn seeded_artifact(workspace: &Workspace, name: &str, bytes: &[u8]) -> FetchedArtifact {
        let path = workspace.path().join(name);
        std::fs::write(&path, bytes).expect("seed artifact");
        FetchedArtifact {
            path,
            size_bytes: bytes.len() as u64,
        }
    }

    #[tokio::test]
    async fn test_under_threshold_ships_unchanged() {
        let workspace = Workspace::create(None).expect("workspace");
        let artifact = seeded_artifact(&workspace, "data.bin", &[7u8; 10]);
        let original_path = artifact.path.clone();

        let payload = package(artifact, 100).await.expect("package");
        assert!(!payload.compressed);
        assert_eq!(payload.path, original_path);
        assert_eq!(payload.file_name, "data.bin");
    }

    #[tokio::test]
    async fn test_exactly_at_threshold_ships_unchanged() {
        let workspace = Workspace::create(None).expect("workspace");
        let artifact = seeded_artifact(&workspace, "data.bin", &[7u8; 100]);

        let payload = package(artifact, 100).await.expect("package");
        assert!(!payload.compressed);
    }

    #[tokio::test]
    async fn test_over_threshold_becomes_a_single_entry_archive() {
        let workspace = Workspace::create(None).expect("workspace");
        let body: Vec<u8> = (0..65536u32).map(|i| (i % 251) as u8).collect();
        let artifact = seeded_artifact(&workspace, "data.bin", &body);

        let payload = package(artifact, 1024).await.expect("package");
        assert!(payload.compressed);
        assert_eq!(payload.file_name, "data.bin.zip");
        assert_eq!(payload.path, workspace.path().join("data.bin.zip"));

        let mut archive =
            zip::ZipArchive::new(File::open(&payload.path).expect("open archive"))
                .expect("parse archive");
        assert_eq!(archive.len(), 1);
        let mut entry = archive.by_index(0).expect("entry");
        assert_eq!(entry.name(), "data.bin");
        let mut restored = Vec::new();
        entry.read_to_end(&mut restored).expect("read entry");
        assert_eq!(restored, body);
    }

    #[tokio::test]
    async fn test_missing_source_is_a_packaging_error() {
        let workspace = Workspace::create(None).expect("workspace");
        let artifact = FetchedArtifact {
            path: workspace.path().join("ghost.bin"),
            size_bytes: 10_000,
        };

        let err = package(artifact, 100).await.expect_err("no source file");
        assert!(matches!(err, DownloadError::Packaging(_)));
    }
}
