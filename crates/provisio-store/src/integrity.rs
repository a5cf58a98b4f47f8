use crate::layout::RegistryLayout;
use crate::registry::ProfileRegistry;
use crate::StoreError;

#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub profiles_checked: usize,
    pub snapshots_checked: usize,
    pub snapshots_passed: usize,
    pub failed: Vec<IntegrityFailure>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug)]
pub struct IntegrityFailure {
    pub snapshot: String,
    pub reason: String,
}

/// Check every snapshot in the registry: the checksum sidecar must exist and
/// match, and the document must parse back into a profile.
pub fn verify_registry_integrity(layout: &RegistryLayout) -> Result<IntegrityReport, StoreError> {
    layout.verify_version()?;
    let registry = ProfileRegistry::new(layout.clone());
    let mut report = IntegrityReport::default();

    for id in registry.profile_ids()? {
        report.profiles_checked += 1;
        for ts in registry.timestamps(&id)? {
            report.snapshots_checked += 1;
            let snapshot = format!("{id}@{ts}");

            if !layout.checksum_path(&id, ts).exists() {
                report.failed.push(IntegrityFailure {
                    snapshot,
                    reason: "checksum sidecar missing".to_owned(),
                });
                continue;
            }
            match registry.profile_at(&id, ts) {
                Ok(_) => report.snapshots_passed += 1,
                Err(StoreError::IntegrityFailure { actual, .. }) => {
                    report.failed.push(IntegrityFailure {
                        snapshot,
                        reason: format!("snapshot checksum mismatch: got {actual}"),
                    });
                }
                Err(e) => {
                    report.failed.push(IntegrityFailure {
                        snapshot,
                        reason: format!("snapshot read error: {e}"),
                    });
                }
            }
        }
    }

    Ok(report)
}
