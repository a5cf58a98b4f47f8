use crate::format::{profile_from_xml, profile_to_xml};
use crate::layout::RegistryLayout;
use crate::lock::ProfileLock;
use crate::{fsync_dir, Profile, StoreError};
use provisio_metadata::{ProfileId, Properties, TouchpointTypeInterner};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

pub fn validate_profile_id(id: &str) -> Result<(), StoreError> {
    if id.is_empty() || id.len() > 128 {
        return Err(StoreError::InvalidProfileId(
            "profile id must be 1-128 characters".to_owned(),
        ));
    }
    if id.starts_with('.') {
        return Err(StoreError::InvalidProfileId(format!(
            "profile id must not start with '.': {id}"
        )));
    }
    if !id
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.')
    {
        return Err(StoreError::InvalidProfileId(format!(
            "profile id must match [a-zA-Z0-9._-]: {id}"
        )));
    }
    Ok(())
}

/// Durable, append-only store of profile snapshots keyed by `(id, timestamp)`.
///
/// Every snapshot is written atomically next to a blake3 checksum sidecar and
/// is never rewritten. The current state of a profile is its snapshot with the
/// greatest timestamp.
pub struct ProfileRegistry {
    layout: RegistryLayout,
    interner: Arc<TouchpointTypeInterner>,
}

impl ProfileRegistry {
    /// Open (and initialise if needed) the registry rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let layout = RegistryLayout::new(root.as_ref());
        layout.initialize()?;
        Ok(Self::new(layout))
    }

    pub fn new(layout: RegistryLayout) -> Self {
        Self {
            layout,
            interner: Arc::new(TouchpointTypeInterner::new()),
        }
    }

    /// Intern touchpoint types of loaded units through `interner`.
    #[must_use]
    pub fn with_interner(mut self, interner: Arc<TouchpointTypeInterner>) -> Self {
        self.interner = interner;
        self
    }

    pub fn layout(&self) -> &RegistryLayout {
        &self.layout
    }

    pub fn interner(&self) -> &Arc<TouchpointTypeInterner> {
        &self.interner
    }

    /// Create a new, empty profile and write its first snapshot.
    pub fn add_profile(
        &self,
        id: &ProfileId,
        parent_id: Option<ProfileId>,
        properties: Properties,
    ) -> Result<Profile, StoreError> {
        validate_profile_id(id)?;
        if self.contains(id)? {
            return Err(StoreError::ProfileExists(id.to_string()));
        }
        let mut profile = Profile::new(id.clone());
        profile.set_parent_id(parent_id);
        for (key, value) in properties.iter() {
            profile.set_property(key, value);
        }
        profile.set_timestamp(self.next_timestamp(id)?);
        self.save(&profile)?;
        info!("added profile {id}");
        Ok(profile)
    }

    pub fn contains(&self, id: &str) -> Result<bool, StoreError> {
        Ok(!self.timestamps(id)?.is_empty())
    }

    /// All snapshot timestamps of a profile, oldest first.
    pub fn timestamps(&self, id: &str) -> Result<Vec<i64>, StoreError> {
        validate_profile_id(id)?;
        let dir = self.layout.profile_dir(id);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut timestamps = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(ts) = entry
                .file_name()
                .to_str()
                .and_then(RegistryLayout::snapshot_timestamp)
            {
                timestamps.push(ts);
            }
        }
        timestamps.sort_unstable();
        Ok(timestamps)
    }

    /// Ids of every profile with at least one snapshot, sorted.
    pub fn profile_ids(&self) -> Result<Vec<ProfileId>, StoreError> {
        let dir = self.layout.profiles_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if validate_profile_id(name).is_ok() && self.contains(name)? {
                ids.push(ProfileId::new(name));
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// The current (latest) snapshot of a profile.
    pub fn profile(&self, id: &str) -> Result<Profile, StoreError> {
        let latest = self
            .timestamps(id)?
            .last()
            .copied()
            .ok_or_else(|| StoreError::ProfileNotFound(id.to_owned()))?;
        self.profile_at(id, latest)
    }

    /// A specific snapshot, verified against its checksum sidecar.
    pub fn profile_at(&self, id: &str, timestamp: i64) -> Result<Profile, StoreError> {
        validate_profile_id(id)?;
        let path = self.layout.snapshot_path(id, timestamp);
        if !path.exists() {
            return Err(StoreError::SnapshotNotFound {
                id: id.to_owned(),
                timestamp,
            });
        }
        let content = fs::read_to_string(&path)?;
        self.verify_checksum(id, timestamp, &content)?;
        let profile = profile_from_xml(&content, Some(&self.interner))?;
        debug!("loaded profile {id} at {timestamp}");
        Ok(profile)
    }

    fn verify_checksum(&self, id: &str, timestamp: i64, content: &str) -> Result<(), StoreError> {
        let checksum_path = self.layout.checksum_path(id, timestamp);
        if !checksum_path.exists() {
            warn!("snapshot {id}@{timestamp} has no checksum sidecar");
            return Ok(());
        }
        let expected = fs::read_to_string(&checksum_path)?.trim().to_owned();
        let actual = blake3::hash(content.as_bytes()).to_hex().to_string();
        if actual != expected {
            return Err(StoreError::IntegrityFailure {
                snapshot: format!("{id}@{timestamp}"),
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// The timestamp the next snapshot of `id` should carry: the current time
    /// in epoch milliseconds, bumped past the latest existing snapshot.
    pub fn next_timestamp(&self, id: &str) -> Result<i64, StoreError> {
        let now = chrono::Utc::now().timestamp_millis();
        match self.timestamps(id)?.last() {
            Some(&latest) => latest
                .checked_add(1)
                .map(|next| now.max(next))
                .ok_or_else(|| StoreError::TimestampOverflow(id.to_owned())),
            None => Ok(now),
        }
    }

    /// Write `profile` as a new snapshot. Existing snapshots are never
    /// overwritten.
    pub fn save(&self, profile: &Profile) -> Result<(), StoreError> {
        let id = profile.id().as_str();
        validate_profile_id(id)?;
        let timestamp = profile.timestamp();
        let dest = self.layout.snapshot_path(id, timestamp);
        if dest.exists() {
            return Err(StoreError::SnapshotExists {
                id: id.to_owned(),
                timestamp,
            });
        }

        let dir = self.layout.profile_dir(id);
        fs::create_dir_all(&dir)?;
        let content = profile_to_xml(profile)?;
        let checksum = blake3::hash(content.as_bytes()).to_hex().to_string();

        // The sidecar lands first so a visible snapshot always has one.
        write_atomic(&dir, &self.layout.checksum_path(id, timestamp), &checksum)?;
        write_atomic(&dir, &dest, &content)?;
        fsync_dir(&dir)?;

        info!(
            "saved profile {id} at {timestamp} ({} units)",
            profile.len()
        );
        Ok(())
    }

    /// Delete a profile and all of its snapshots.
    pub fn remove_profile(&self, id: &str) -> Result<(), StoreError> {
        validate_profile_id(id)?;
        let dir = self.layout.profile_dir(id);
        if !dir.exists() {
            return Err(StoreError::ProfileNotFound(id.to_owned()));
        }
        fs::remove_dir_all(&dir)?;
        fsync_dir(&self.layout.profiles_dir())?;
        info!("removed profile {id}");
        Ok(())
    }

    /// Remove all but the newest `keep` snapshots of a profile. The current
    /// snapshot is always kept. Returns the number of snapshots removed.
    pub fn prune(&self, id: &str, keep: usize) -> Result<usize, StoreError> {
        let timestamps = self.timestamps(id)?;
        let keep = keep.max(1);
        if timestamps.len() <= keep {
            return Ok(0);
        }
        let doomed = &timestamps[..timestamps.len() - keep];
        for &ts in doomed {
            fs::remove_file(self.layout.snapshot_path(id, ts))?;
            let checksum = self.layout.checksum_path(id, ts);
            if checksum.exists() {
                fs::remove_file(checksum)?;
            }
        }
        fsync_dir(&self.layout.profile_dir(id))?;
        debug!("pruned {} snapshots of profile {id}", doomed.len());
        Ok(doomed.len())
    }

    /// Block until the exclusive lock for `id` is held.
    pub fn lock(&self, id: &str) -> Result<ProfileLock, StoreError> {
        validate_profile_id(id)?;
        ProfileLock::acquire(&self.layout.lock_file(id))
    }

    /// Take the lock for `id` if it is free.
    pub fn try_lock(&self, id: &str) -> Result<Option<ProfileLock>, StoreError> {
        validate_profile_id(id)?;
        ProfileLock::try_acquire(&self.layout.lock_file(id))
    }
}

fn write_atomic(dir: &Path, dest: &Path, content: &str) -> Result<(), StoreError> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use provisio_metadata::{InstallableUnit, UnitDescription, Version};

    fn unit(id: &str) -> Arc<InstallableUnit> {
        let mut d = UnitDescription::new();
        d.set_id(id).set_version(Version::new(1, 0, 0));
        Arc::new(d.build().unwrap())
    }

    fn test_registry() -> (tempfile::TempDir, ProfileRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let registry = ProfileRegistry::open(dir.path()).unwrap();
        (dir, registry)
    }

    #[test]
    fn profile_id_validation() {
        assert!(validate_profile_id("SDKProfile").is_ok());
        assert!(validate_profile_id("my.profile-1_x").is_ok());
        assert!(validate_profile_id("").is_err());
        assert!(validate_profile_id("..").is_err());
        assert!(validate_profile_id("a/b").is_err());
        assert!(validate_profile_id(&"x".repeat(129)).is_err());
    }

    #[test]
    fn add_profile_writes_first_snapshot() {
        let (_dir, registry) = test_registry();
        let id = ProfileId::from("SDK");
        let props: Properties = [("installFolder", "/opt/sdk")].into_iter().collect();
        let created = registry.add_profile(&id, None, props).unwrap();
        let loaded = registry.profile("SDK").unwrap();
        assert_eq!(loaded, created);
        assert_eq!(loaded.property("installFolder"), Some("/opt/sdk"));
        assert!(matches!(
            registry.add_profile(&id, None, Properties::new()),
            Err(StoreError::ProfileExists(_))
        ));
    }

    #[test]
    fn missing_profile_is_not_found() {
        let (_dir, registry) = test_registry();
        assert!(matches!(
            registry.profile("nope"),
            Err(StoreError::ProfileNotFound(_))
        ));
        assert!(matches!(
            registry.profile_at("nope", 1),
            Err(StoreError::SnapshotNotFound { .. })
        ));
    }

    #[test]
    fn snapshots_are_immutable() {
        let (_dir, registry) = test_registry();
        let mut profile = Profile::new("p");
        profile.set_timestamp(10);
        registry.save(&profile).unwrap();
        profile.add_unit(unit("a"));
        assert!(matches!(
            registry.save(&profile),
            Err(StoreError::SnapshotExists { timestamp: 10, .. })
        ));
        assert!(registry.profile("p").unwrap().is_empty());
    }

    #[test]
    fn current_is_latest_and_history_is_kept() {
        let (_dir, registry) = test_registry();
        let mut profile = Profile::new("p");
        profile.set_timestamp(registry.next_timestamp("p").unwrap());
        registry.save(&profile).unwrap();
        let first = profile.timestamp();

        profile.add_unit(unit("a"));
        let next = registry.next_timestamp("p").unwrap();
        assert!(next > first);
        profile.set_timestamp(next);
        registry.save(&profile).unwrap();

        assert_eq!(registry.timestamps("p").unwrap(), [first, next]);
        assert_eq!(registry.profile("p").unwrap().len(), 1);
        assert!(registry.profile_at("p", first).unwrap().is_empty());
    }

    #[test]
    fn next_timestamp_is_monotonic_even_for_future_snapshots() {
        let (_dir, registry) = test_registry();
        let future = chrono::Utc::now().timestamp_millis() + 60_000;
        let mut profile = Profile::new("p");
        profile.set_timestamp(future);
        registry.save(&profile).unwrap();
        assert_eq!(registry.next_timestamp("p").unwrap(), future + 1);
    }

    #[test]
    fn next_timestamp_after_max_is_an_error() {
        let (_dir, registry) = test_registry();
        let mut profile = Profile::new("p");
        profile.set_timestamp(i64::MAX);
        registry.save(&profile).unwrap();
        assert!(matches!(
            registry.next_timestamp("p"),
            Err(StoreError::TimestampOverflow(id)) if id == "p"
        ));
    }

    #[test]
    fn tampered_snapshot_fails_checksum() {
        let (_dir, registry) = test_registry();
        let mut profile = Profile::new("p");
        profile.set_timestamp(5);
        registry.save(&profile).unwrap();

        let path = registry.layout().snapshot_path("p", 5);
        let content = fs::read_to_string(&path).unwrap();
        fs::write(&path, content.replace("id=\"p\"", "id=\"p\" ")).unwrap();
        assert!(matches!(
            registry.profile("p"),
            Err(StoreError::IntegrityFailure { .. })
        ));
    }

    #[test]
    fn prune_keeps_newest() {
        let (_dir, registry) = test_registry();
        for ts in 1..=5 {
            let mut profile = Profile::new("p");
            profile.set_timestamp(ts);
            registry.save(&profile).unwrap();
        }
        assert_eq!(registry.prune("p", 2).unwrap(), 3);
        assert_eq!(registry.timestamps("p").unwrap(), [4, 5]);
        assert!(!registry.layout().checksum_path("p", 1).exists());
        assert_eq!(registry.prune("p", 0).unwrap(), 1);
        assert_eq!(registry.timestamps("p").unwrap(), [5]);
    }

    #[test]
    fn profile_ids_and_remove() {
        let (_dir, registry) = test_registry();
        registry
            .add_profile(&ProfileId::from("b"), None, Properties::new())
            .unwrap();
        registry
            .add_profile(&ProfileId::from("a"), None, Properties::new())
            .unwrap();
        assert_eq!(registry.profile_ids().unwrap(), ["a", "b"]);
        registry.remove_profile("a").unwrap();
        assert_eq!(registry.profile_ids().unwrap(), ["b"]);
        assert!(registry.remove_profile("a").is_err());
    }

    #[test]
    fn lock_is_exclusive() {
        let (_dir, registry) = test_registry();
        let held = registry.lock("p").unwrap();
        assert!(registry.try_lock("p").unwrap().is_none());
        drop(held);
        assert!(registry.try_lock("p").unwrap().is_some());
    }

    #[test]
    fn lock_file_does_not_create_a_profile() {
        let (_dir, registry) = test_registry();
        let _lock = registry.lock("p").unwrap();
        assert!(registry.profile_ids().unwrap().is_empty());
    }
}
