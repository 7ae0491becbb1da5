//! Uploaded video store and the collision event sink boundary.
//!
//! The store keeps client uploads under one server-local directory, keyed by
//! a sanitized filename; a later streaming request resolves that name back to
//! a path. Accident persistence, email, and SMS alerting live behind the
//! `CollisionSink` trait in external collaborators - the pipeline only hands
//! events over and never waits on the outcome.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};

use crate::CollisionEvent;

/// Store for uploaded video files.
pub struct VideoStore {
    dir: PathBuf,
}

impl VideoStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create upload directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store an upload under its sanitized name and return the stored name.
    pub fn store(&self, filename: &str, bytes: &[u8]) -> Result<String> {
        let name = sanitize_filename(filename)?;
        let path = self.dir.join(&name);
        std::fs::write(&path, bytes)
            .with_context(|| format!("write upload {}", path.display()))?;
        log::info!("stored upload {} ({} bytes)", path.display(), bytes.len());
        Ok(name)
    }

    /// Resolve a previously stored name to its path, or `None` when no such
    /// upload exists. The name is re-sanitized so a crafted identifier can
    /// never escape the upload directory.
    pub fn resolve(&self, filename: &str) -> Option<PathBuf> {
        let name = sanitize_filename(filename).ok()?;
        let path = self.dir.join(name);
        path.is_file().then_some(path)
    }
}

/// Reduce a client-supplied filename to a safe basename: path components are
/// stripped, characters outside `[A-Za-z0-9._-]` become `_`, and names that
/// end up empty or dots-only are rejected.
pub fn sanitize_filename(filename: &str) -> Result<String> {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        return Err(anyhow!("unusable filename '{}'", filename));
    }
    Ok(cleaned)
}

/// Boundary for forwarding collision events to storage/alerting.
///
/// Fire-and-forget from the pipeline's perspective: a failing sink is logged
/// and must never abort the stream.
pub trait CollisionSink: Send + Sync {
    fn record(&self, event: &CollisionEvent) -> Result<()>;
}

/// Sink that records events to the log only.
pub struct LogSink;

impl CollisionSink for LogSink {
    fn record(&self, event: &CollisionEvent) -> Result<()> {
        log::warn!(
            "collision: frame={} {} {:?} vs {} {:?}",
            event.frame_seq,
            event.first.label,
            event.first.bbox,
            event.second.label,
            event.second.bbox
        );
        Ok(())
    }
}

/// In-memory sink for tests and demos.
pub struct MemorySink {
    events: Mutex<Vec<CollisionEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<CollisionEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl CollisionSink for MemorySink {
    fn record(&self, event: &CollisionEvent) -> Result<()> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sanitize_strips_paths_and_odd_characters() {
        assert_eq!(sanitize_filename("crash.mp4").unwrap(), "crash.mp4");
        assert_eq!(sanitize_filename("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(
            sanitize_filename("c:\\videos\\cam 1.mp4").unwrap(),
            "cam_1.mp4"
        );
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("..").is_err());
        assert!(sanitize_filename("///").is_err());
    }

    #[test]
    fn store_and_resolve_round_trip() {
        let dir = tempdir().unwrap();
        let store = VideoStore::new(dir.path().join("videos")).unwrap();

        let name = store.store("dash cam.mp4", b"not really a video").unwrap();
        assert_eq!(name, "dash_cam.mp4");

        let path = store.resolve(&name).expect("stored file resolves");
        assert_eq!(std::fs::read(path).unwrap(), b"not really a video");

        assert!(store.resolve("missing.mp4").is_none());
    }

    #[test]
    fn resolve_never_escapes_the_upload_dir() {
        let dir = tempdir().unwrap();
        let store = VideoStore::new(dir.path().join("videos")).unwrap();
        // Even if a file exists above the store dir, traversal cannot reach it.
        std::fs::write(dir.path().join("secret.txt"), b"x").unwrap();
        assert!(store.resolve("../secret.txt").is_none());
    }
}
