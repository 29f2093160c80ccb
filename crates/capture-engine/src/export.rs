//! Turning in-memory artifacts into downloaded files.

use std::path::PathBuf;

use capturescreen_capture_model::{Artifact, ArtifactHandle};
use capturescreen_common::clock::{SystemClock, WallClock};
use capturescreen_common::error::{CaptureError, CaptureResult};

/// Destination for exported files.
pub trait DownloadSink: Send {
    /// Store one file and return where it went.
    fn deliver(&mut self, filename: &str, mime_type: &str, bytes: &[u8]) -> CaptureResult<PathBuf>;
}

/// Writes downloads into a directory, replacing files with the same name.
#[derive(Debug, Clone)]
pub struct DirectoryDownloads {
    dir: PathBuf,
}

impl DirectoryDownloads {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

impl DownloadSink for DirectoryDownloads {
    fn deliver(&mut self, filename: &str, mime_type: &str, bytes: &[u8]) -> CaptureResult<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(filename);
        std::fs::write(&path, bytes)?;
        tracing::debug!(path = %path.display(), mime_type, "Wrote download");
        Ok(path)
    }
}

/// Exports artifacts under `<kind>_<YYYY-MM-DD_HH-mm>.<ext>`, stamped with
/// the time of export.
pub struct ArtifactExporter<C = SystemClock, D = DirectoryDownloads> {
    clock: C,
    downloads: D,
}

impl<D: DownloadSink> ArtifactExporter<SystemClock, D> {
    pub fn with_system_clock(downloads: D) -> Self {
        Self::new(SystemClock, downloads)
    }
}

impl<C: WallClock, D: DownloadSink> ArtifactExporter<C, D> {
    pub fn new(clock: C, downloads: D) -> Self {
        Self { clock, downloads }
    }

    pub fn downloads(&self) -> &D {
        &self.downloads
    }

    /// Export the artifact behind `handle`.
    ///
    /// `None` means there is nothing to export and returns `Ok(None)`.
    /// A handle whose artifact was superseded fails with
    /// [`CaptureError::ArtifactRevoked`].
    pub fn export(&mut self, handle: Option<&ArtifactHandle>) -> CaptureResult<Option<PathBuf>> {
        let Some(handle) = handle else {
            tracing::debug!("Nothing to export");
            return Ok(None);
        };
        let artifact = handle.resolve().ok_or(CaptureError::ArtifactRevoked)?;
        self.export_artifact(&artifact).map(Some)
    }

    /// Export an artifact directly. The artifact is only read.
    pub fn export_artifact(&mut self, artifact: &Artifact) -> CaptureResult<PathBuf> {
        let filename = artifact.suggested_filename(self.clock.now());
        let path = self
            .downloads
            .deliver(&filename, artifact.mime_type(), artifact.bytes())?;
        tracing::info!(
            kind = ?artifact.kind(),
            bytes = artifact.len(),
            path = %path.display(),
            "Exported artifact"
        );
        Ok(path)
    }
}
