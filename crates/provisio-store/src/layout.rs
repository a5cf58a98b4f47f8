use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Current registry format version. Incremented on incompatible layout changes.
pub const REGISTRY_FORMAT_VERSION: u32 = 1;
const VERSION_FILE: &str = "version";
const SNAPSHOT_EXTENSION: &str = "profile";
const CHECKSUM_EXTENSION: &str = "b3";

/// Directory layout for the profile registry.
///
/// ```text
/// <root>/version
/// <root>/profiles/<id>/<timestamp>.profile
/// <root>/profiles/<id>/<timestamp>.profile.b3
/// <root>/profiles/<id>/.lock
/// ```
///
/// Directories are created lazily on [`initialize`](Self::initialize).
#[derive(Debug, Clone)]
pub struct RegistryLayout {
    root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct RegistryVersion {
    format_version: u32,
}

impl RegistryLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn profiles_dir(&self) -> PathBuf {
        self.root.join("profiles")
    }

    #[inline]
    pub fn profile_dir(&self, profile_id: &str) -> PathBuf {
        self.profiles_dir().join(profile_id)
    }

    #[inline]
    pub fn snapshot_path(&self, profile_id: &str, timestamp: i64) -> PathBuf {
        self.profile_dir(profile_id)
            .join(format!("{timestamp}.{SNAPSHOT_EXTENSION}"))
    }

    #[inline]
    pub fn checksum_path(&self, profile_id: &str, timestamp: i64) -> PathBuf {
        self.profile_dir(profile_id)
            .join(format!("{timestamp}.{SNAPSHOT_EXTENSION}.{CHECKSUM_EXTENSION}"))
    }

    #[inline]
    pub fn lock_file(&self, profile_id: &str) -> PathBuf {
        self.profile_dir(profile_id).join(".lock")
    }

    /// Parse `<timestamp>.profile` back into its timestamp.
    pub fn snapshot_timestamp(file_name: &str) -> Option<i64> {
        file_name
            .strip_suffix(SNAPSHOT_EXTENSION)?
            .strip_suffix('.')?
            .parse()
            .ok()
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(self.profiles_dir())?;

        let version_path = self.root.join(VERSION_FILE);
        if version_path.exists() {
            self.verify_version()?;
        } else {
            let ver = RegistryVersion {
                format_version: REGISTRY_FORMAT_VERSION,
            };
            let content = serde_json::to_string_pretty(&ver)?;
            let mut tmp = NamedTempFile::new_in(&self.root)?;
            tmp.write_all(content.as_bytes())?;
            tmp.as_file().sync_all()?;
            tmp.persist(&version_path)
                .map_err(|e| StoreError::Io(e.error))?;
            crate::fsync_dir(&self.root)?;
        }

        Ok(())
    }

    pub fn verify_version(&self) -> Result<(), StoreError> {
        let version_path = self.root.join(VERSION_FILE);
        let content = fs::read_to_string(&version_path)?;
        let ver: RegistryVersion = serde_json::from_str(&content)?;

        if ver.format_version != REGISTRY_FORMAT_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: REGISTRY_FORMAT_VERSION,
                found: ver.format_version,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths_are_correct() {
        let layout = RegistryLayout::new("/tmp/provisio-test");
        assert_eq!(
            layout.profiles_dir(),
            PathBuf::from("/tmp/provisio-test/profiles")
        );
        assert_eq!(
            layout.snapshot_path("SDK", 1700),
            PathBuf::from("/tmp/provisio-test/profiles/SDK/1700.profile")
        );
        assert_eq!(
            layout.checksum_path("SDK", 1700),
            PathBuf::from("/tmp/provisio-test/profiles/SDK/1700.profile.b3")
        );
        assert_eq!(
            layout.lock_file("SDK"),
            PathBuf::from("/tmp/provisio-test/profiles/SDK/.lock")
        );
    }

    #[test]
    fn snapshot_timestamp_parsing() {
        assert_eq!(RegistryLayout::snapshot_timestamp("1700.profile"), Some(1700));
        assert_eq!(RegistryLayout::snapshot_timestamp("1700.profile.b3"), None);
        assert_eq!(RegistryLayout::snapshot_timestamp("x.profile"), None);
        assert_eq!(RegistryLayout::snapshot_timestamp(".lock"), None);
    }

    #[test]
    fn initialize_writes_version() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RegistryLayout::new(dir.path());
        layout.initialize().unwrap();
        assert!(layout.profiles_dir().is_dir());
        layout.verify_version().unwrap();
    }

    #[test]
    fn initialize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RegistryLayout::new(dir.path());
        layout.initialize().unwrap();
        layout.initialize().unwrap();
        layout.verify_version().unwrap();
    }

    #[test]
    fn version_mismatch_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RegistryLayout::new(dir.path());
        fs::write(dir.path().join("version"), r#"{"format_version": 99}"#).unwrap();
        assert!(matches!(
            layout.initialize(),
            Err(StoreError::VersionMismatch { found: 99, .. })
        ));
    }
}
