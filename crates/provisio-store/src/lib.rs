//! Profiles, their XML snapshot format, and the durable profile registry for Provisio.
//!
//! This crate provides the storage layer: the mutable `Profile` working model,
//! the `format` module that writes and reads profile snapshots as XML,
//! `RegistryLayout` for directory structure management, the append-only
//! `ProfileRegistry` keyed by `(profile id, timestamp)` with blake3 checksum
//! sidecars and atomic writes, per-profile `ProfileLock`s, and
//! `verify_registry_integrity` for offline checking.

pub mod format;
pub mod integrity;
pub mod layout;
pub mod lock;
pub mod profile;
pub mod registry;

pub use format::{profile_from_xml, profile_to_xml};
pub use integrity::{verify_registry_integrity, IntegrityFailure, IntegrityReport};
pub use layout::{RegistryLayout, REGISTRY_FORMAT_VERSION};
pub use lock::{LockOwner, ProfileLock};
pub use profile::Profile;
pub use registry::{validate_profile_id, ProfileRegistry};

use provisio_metadata::MetadataError;
use std::path::Path;
use thiserror::Error;

/// Fsync a directory to ensure that a preceding `rename()` is durable.
///
/// On Linux with ext4 `data=ordered` (the default), renames are usually
/// durable without an explicit dir fsync, but POSIX does not guarantee this.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("registry I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("profile XML error: {0}")]
    Xml(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid unit metadata in snapshot: {0}")]
    Metadata(#[from] MetadataError),
    #[error("profile not found: {0}")]
    ProfileNotFound(String),
    #[error("profile already exists: {0}")]
    ProfileExists(String),
    #[error("snapshot {timestamp} of profile '{id}' not found")]
    SnapshotNotFound { id: String, timestamp: i64 },
    #[error("snapshot {timestamp} of profile '{id}' already exists")]
    SnapshotExists { id: String, timestamp: i64 },
    #[error("integrity check failed for snapshot '{snapshot}': expected {expected}, got {actual}")]
    IntegrityFailure {
        snapshot: String,
        expected: String,
        actual: String,
    },
    #[error("lock acquisition failed: {0}")]
    LockFailed(String),
    #[error("registry format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("invalid profile id: {0}")]
    InvalidProfileId(String),
    #[error("snapshot timestamps of profile '{0}' are exhausted")]
    TimestampOverflow(String),
    #[error("unit {unit} is not a member of profile '{profile}'")]
    UnitNotInProfile { profile: String, unit: String },
}
