//! Access to on-disk index artifacts
//!
//! Caches revalidate through [`ArtifactSource`] so tests can swap in an
//! in-memory filesystem with controlled modification times.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;

/// Read-only view of the artifacts backing an index
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Modification time, `None` when the artifact is missing
    async fn modified(&self, path: &Path) -> Option<SystemTime>;

    /// Read a whole artifact as UTF-8
    async fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// List the files directly inside a directory
    async fn list_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Artifacts on the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskSource;

#[async_trait]
impl ArtifactSource for DiskSource {
    async fn modified(&self, path: &Path) -> Option<SystemTime> {
        let metadata = tokio::fs::metadata(path).await.ok()?;
        metadata.modified().ok()
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }

    async fn list_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(path).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await.is_ok_and(|t| t.is_file()) {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Modification times of a set of artifacts
///
/// Two fingerprints compare equal when the same files exist with the same
/// modification times.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fingerprint(BTreeMap<PathBuf, Option<SystemTime>>);

impl Fingerprint {
    /// Capture the modification times of the given paths
    pub async fn capture(source: &dyn ArtifactSource, paths: &[PathBuf]) -> Self {
        let mut map = BTreeMap::new();
        for path in paths {
            map.insert(path.clone(), source.modified(path).await);
        }
        Self(map)
    }

    /// Whether every captured artifact exists
    #[must_use]
    pub fn all_present(&self) -> bool {
        !self.0.is_empty() && self.0.values().all(Option::is_some)
    }

    /// Whether no artifact was captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disk_source_lists_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.jsonl"), "{}").unwrap();
        std::fs::write(dir.path().join("a.md"), "- x").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let files = DiskSource.list_dir(dir.path()).await.unwrap();
        let names: Vec<_> = files
            .iter()
            .filter_map(|p| p.file_name()?.to_str())
            .collect();
        assert_eq!(names, vec!["a.md", "b.jsonl"]);
    }

    #[tokio::test]
    async fn test_fingerprint_detects_missing() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("meta.json");
        std::fs::write(&present, "{}").unwrap();

        let fp = Fingerprint::capture(&DiskSource, &[present.clone()]).await;
        assert!(fp.all_present());

        let fp = Fingerprint::capture(&DiskSource, &[present, dir.path().join("gone.json")]).await;
        assert!(!fp.all_present());
    }
}
