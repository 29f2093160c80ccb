//! Finished captures held in memory until exported or superseded.

use std::fmt;
use std::sync::{Arc, Weak};

use capturescreen_common::clock::filename_timestamp;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// What produced an artifact. Determines MIME type and file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// A VP9/WebM screen recording.
    Recording,
    /// A PNG still image.
    Screenshot,
}

impl ArtifactKind {
    /// Filename prefix used for downloads.
    pub fn label(self) -> &'static str {
        match self {
            ArtifactKind::Recording => "screen-recording",
            ArtifactKind::Screenshot => "screenshot",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ArtifactKind::Recording => "video/webm",
            ArtifactKind::Screenshot => "image/png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Recording => "webm",
            ArtifactKind::Screenshot => "png",
        }
    }
}

/// An immutable, finished recording or screenshot.
#[derive(Clone, PartialEq, Eq)]
pub struct Artifact {
    kind: ArtifactKind,
    bytes: Vec<u8>,
}

impl Artifact {
    pub fn recording(bytes: Vec<u8>) -> Self {
        Self {
            kind: ArtifactKind::Recording,
            bytes,
        }
    }

    pub fn screenshot(bytes: Vec<u8>) -> Self {
        Self {
            kind: ArtifactKind::Screenshot,
            bytes,
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &'static str {
        self.kind.mime_type()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Download name for this artifact if it were exported at `at`:
    /// `<kind>_<YYYY-MM-DD_HH-mm>.<ext>`.
    pub fn suggested_filename(&self, at: NaiveDateTime) -> String {
        format!(
            "{}_{}.{}",
            self.kind.label(),
            filename_timestamp(at),
            self.kind.extension()
        )
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("kind", &self.kind)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A non-owning reference to an artifact, handed out to callers.
///
/// The capture that produced the artifact keeps the only strong reference.
/// Once that capture supersedes it, every handle stops resolving.
#[derive(Clone)]
pub struct ArtifactHandle {
    kind: ArtifactKind,
    inner: Weak<Artifact>,
}

impl ArtifactHandle {
    pub fn new(artifact: &Arc<Artifact>) -> Self {
        Self {
            kind: artifact.kind(),
            inner: Arc::downgrade(artifact),
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// The artifact, unless it has been revoked.
    pub fn resolve(&self) -> Option<Arc<Artifact>> {
        self.inner.upgrade()
    }

    pub fn is_revoked(&self) -> bool {
        self.inner.strong_count() == 0
    }
}

impl PartialEq for ArtifactHandle {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ArtifactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactHandle")
            .field("kind", &self.kind)
            .field("revoked", &self.is_revoked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 31)
            .unwrap()
            .and_hms_opt(hour, minute, 12)
            .unwrap()
    }

    #[test]
    fn recording_filename_pattern() {
        let artifact = Artifact::recording(vec![1, 2, 3]);
        assert_eq!(
            artifact.suggested_filename(at(14, 3)),
            "screen-recording_2025-01-31_14-03.webm"
        );
        assert_eq!(artifact.mime_type(), "video/webm");
    }

    #[test]
    fn screenshot_filename_pattern() {
        let artifact = Artifact::screenshot(vec![0x89]);
        assert_eq!(
            artifact.suggested_filename(at(0, 0)),
            "screenshot_2025-01-31_00-00.png"
        );
        assert_eq!(artifact.mime_type(), "image/png");
    }

    #[test]
    fn handle_stops_resolving_once_owner_drops() {
        let owner = Arc::new(Artifact::recording(b"abc".to_vec()));
        let handle = ArtifactHandle::new(&owner);
        assert_eq!(handle.resolve().unwrap().bytes(), b"abc");

        drop(owner);
        assert!(handle.is_revoked());
        assert!(handle.resolve().is_none());
    }

    #[test]
    fn handles_compare_by_artifact_identity() {
        let a = Arc::new(Artifact::screenshot(vec![1]));
        let b = Arc::new(Artifact::screenshot(vec![1]));
        assert_eq!(ArtifactHandle::new(&a), ArtifactHandle::new(&a));
        assert_ne!(ArtifactHandle::new(&a), ArtifactHandle::new(&b));
    }
}
