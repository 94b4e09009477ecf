//! Local video storage backed by sidecar metadata files.
//!
//! A video lives in the store as a media file plus a `<file>.json` sidecar
//! (or as a bare sidecar when the media itself already sits with the
//! indexing service). The sidecar carries duration and, when known, the
//! wall-clock recording start used to anchor claim times.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use super::{StoreError, VideoAsset, VideoStore};

/// Store rooted at a directory of media files and sidecars
pub struct LocalVideoStore {
    root: PathBuf,
}

/// Sidecar metadata shape
#[derive(Debug, Deserialize)]
struct Sidecar {
    /// Explicit asset id; defaults to the file stem
    #[serde(default)]
    id: Option<String>,

    #[serde(default)]
    title: Option<String>,

    duration_secs: f64,

    #[serde(default)]
    recorded_at: Option<DateTime<Utc>>,
}

impl LocalVideoStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Locate the sidecar for a reference.
    ///
    /// Accepts a path to the media file, a path to the sidecar itself, or
    /// a bare asset name resolved under the store root.
    fn sidecar_path(&self, reference: &str) -> Result<PathBuf, StoreError> {
        let direct = Path::new(reference);
        let base = if direct.exists() {
            direct.to_path_buf()
        } else {
            let under_root = self.root.join(reference);
            if under_root.exists() {
                under_root
            } else {
                let named = self.root.join(format!("{}.json", reference));
                if named.exists() {
                    return Ok(named);
                }
                return Err(StoreError::NotFound(reference.to_string()));
            }
        };

        if base.extension().and_then(|e| e.to_str()) == Some("json") {
            return Ok(base);
        }

        // Media file: sidecar sits next to it as <file>.json
        let mut sidecar = base.as_os_str().to_owned();
        sidecar.push(".json");
        let sidecar = PathBuf::from(sidecar);
        if sidecar.exists() {
            Ok(sidecar)
        } else {
            Err(StoreError::Invalid {
                reference: reference.to_string(),
                reason: format!("no sidecar metadata at {}", sidecar.display()),
            })
        }
    }
}

#[async_trait]
impl VideoStore for LocalVideoStore {
    async fn resolve(&self, reference: &str) -> Result<VideoAsset, StoreError> {
        let sidecar_path = self.sidecar_path(reference)?;

        let raw = std::fs::read_to_string(&sidecar_path)?;
        let sidecar: Sidecar = serde_json::from_str(&raw).map_err(|e| StoreError::Invalid {
            reference: reference.to_string(),
            reason: format!("malformed sidecar: {}", e),
        })?;

        if !sidecar.duration_secs.is_finite() || sidecar.duration_secs <= 0.0 {
            return Err(StoreError::Invalid {
                reference: reference.to_string(),
                reason: format!("duration_secs must be positive, got {}", sidecar.duration_secs),
            });
        }

        let id = sidecar.id.unwrap_or_else(|| {
            sidecar_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(reference)
                .to_string()
        });

        let uploaded_at = std::fs::metadata(&sidecar_path)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        debug!(video_id = %id, sidecar = %sidecar_path.display(), "resolved video asset");

        Ok(VideoAsset {
            id,
            title: sidecar.title,
            duration_secs: sidecar.duration_secs,
            recorded_at: sidecar.recorded_at,
            uploaded_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_sidecar(dir: &TempDir, name: &str, body: &str) {
        std::fs::write(dir.path().join(name), body).unwrap();
    }

    #[tokio::test]
    async fn test_resolve_by_bare_name() {
        let dir = TempDir::new().unwrap();
        write_sidecar(&dir, "warehouse.json", r#"{"duration_secs": 900.0, "title": "Dock 4"}"#);

        let store = LocalVideoStore::new(dir.path());
        let asset = store.resolve("warehouse").await.unwrap();

        assert_eq!(asset.id, "warehouse");
        assert_eq!(asset.title.as_deref(), Some("Dock 4"));
        assert_eq!(asset.duration_secs, 900.0);
        assert!(asset.recorded_at.is_none());
    }

    #[tokio::test]
    async fn test_resolve_media_path_with_sidecar() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("cam1.mp4"), b"").unwrap();
        write_sidecar(
            &dir,
            "cam1.mp4.json",
            r#"{"id": "cam1-night", "duration_secs": 600.0, "recorded_at": "2024-03-01T20:45:00Z"}"#,
        );

        let store = LocalVideoStore::new(dir.path());
        let asset = store.resolve("cam1.mp4").await.unwrap();

        assert_eq!(asset.id, "cam1-night");
        assert!(asset.recorded_at.is_some());
    }

    #[tokio::test]
    async fn test_unknown_reference() {
        let dir = TempDir::new().unwrap();
        let store = LocalVideoStore::new(dir.path());

        let err = store.resolve("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_media_without_sidecar_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("orphan.mp4"), b"").unwrap();

        let store = LocalVideoStore::new(dir.path());
        let err = store.resolve("orphan.mp4").await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid { .. }));
    }

    #[tokio::test]
    async fn test_nonpositive_duration_rejected() {
        let dir = TempDir::new().unwrap();
        write_sidecar(&dir, "bad.json", r#"{"duration_secs": 0.0}"#);

        let store = LocalVideoStore::new(dir.path());
        let err = store.resolve("bad").await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid { .. }));
    }
}
