use crate::config::EngineConfig;
use crate::events::{EventBus, NullEventBus, ProvisioningEvent};
use crate::operand::Operand;
use crate::phase::{Parameters, PhaseRun, PARAM_PROFILE_ID, WORK_PER_WEIGHT};
use crate::phase_set::PhaseSet;
use crate::progress::{NullProgressMonitor, ProgressMonitor};
use crate::session::Session;
use crate::status::Status;
use crate::touchpoint::TouchpointManager;
use crate::CoreError;
use provisio_store::{Profile, ProfileRegistry, StoreError};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Caller-supplied properties available to every phase as parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisioningContext {
    properties: BTreeMap<String, String>,
}

impl ProvisioningContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}

impl From<BTreeMap<String, String>> for ProvisioningContext {
    fn from(properties: BTreeMap<String, String>) -> Self {
        Self { properties }
    }
}

/// Runs phase sets over operands and commits the results to a registry.
pub struct Engine {
    registry: ProfileRegistry,
    touchpoints: TouchpointManager,
    events: Arc<dyn EventBus>,
    keep_snapshots: Option<usize>,
}

impl Engine {
    pub fn new(registry: ProfileRegistry, touchpoints: TouchpointManager) -> Self {
        Self {
            registry,
            touchpoints,
            events: Arc::new(NullEventBus),
            keep_snapshots: None,
        }
    }

    /// Open the configured registry, creating it if needed.
    pub fn from_config(
        config: &EngineConfig,
        touchpoints: TouchpointManager,
    ) -> Result<Self, CoreError> {
        let registry = ProfileRegistry::open(config.registry_root()?)?;
        Ok(Self::new(registry, touchpoints).with_keep_snapshots(config.registry.keep_snapshots))
    }

    #[must_use]
    pub fn with_event_bus(mut self, events: Arc<dyn EventBus>) -> Self {
        self.events = events;
        self
    }

    #[must_use]
    pub fn with_keep_snapshots(mut self, keep: Option<usize>) -> Self {
        self.keep_snapshots = keep;
        self
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    pub fn touchpoints(&self) -> &TouchpointManager {
        &self.touchpoints
    }

    pub fn touchpoints_mut(&mut self) -> &mut TouchpointManager {
        &mut self.touchpoints
    }

    /// Run `phase_set` over `operands` against `profile`.
    ///
    /// No-op operands are dropped first. On a fatal or cancelled run every
    /// successfully executed action is undone, newest first, and nothing is
    /// written. On success the staged profile is saved as a new snapshot
    /// whose timestamp is later than both the current snapshot and `profile`.
    pub fn perform(
        &self,
        profile: &Profile,
        phase_set: &PhaseSet,
        operands: &[Operand],
        context: &ProvisioningContext,
        monitor: Option<&dyn ProgressMonitor>,
    ) -> Status {
        let monitor = monitor.unwrap_or(&NullProgressMonitor);
        let profile_id = profile.id().clone();
        let operands: Vec<Operand> = operands.iter().filter(|op| !op.is_noop()).cloned().collect();
        info!(
            "provisioning {profile_id}: {} operands, {} phases",
            operands.len(),
            phase_set.len()
        );
        self.events.publish(&ProvisioningEvent::Begin {
            profile_id: profile_id.clone(),
            operands: operands.len(),
        });
        monitor.begin(
            &format!("provisioning {profile_id}"),
            phase_set.total_weight() * WORK_PER_WEIGHT,
        );

        let mut params: Parameters = context.properties().clone();
        params.insert(PARAM_PROFILE_ID.to_owned(), profile_id.to_string());

        let mut session = Session::new(profile.clone());
        let mut status = Status::multi(format!("provisioning {profile_id}"));
        {
            let mut run = PhaseRun {
                session: &mut session,
                touchpoints: &self.touchpoints,
                events: self.events.as_ref(),
                monitor,
                operands: &operands,
                params: &params,
            };
            for phase in phase_set.phases() {
                if monitor.is_cancelled() {
                    warn!("provisioning {profile_id}: cancelled before phase {}", phase.id());
                    status.add(Status::cancel(format!(
                        "cancelled before phase {}",
                        phase.id()
                    )));
                    break;
                }
                let result = run.run(phase.as_ref());
                let fatal = result.is_fatal();
                status.add(result);
                if fatal {
                    break;
                }
            }
        }

        if status.is_fatal() {
            return self.roll_back(&mut session, status, monitor);
        }

        match self.commit(session.profile(), profile.timestamp()) {
            Ok(timestamp) => {
                info!("provisioning {profile_id}: committed at {timestamp}");
                self.events.publish(&ProvisioningEvent::Committed {
                    profile_id,
                    timestamp,
                });
                monitor.done();
                status
            }
            Err(e) => {
                status.add(Status::error(format!("commit of {profile_id} failed: {e}")));
                self.roll_back(&mut session, status, monitor)
            }
        }
    }

    /// [`Engine::perform`] on the current snapshot of `profile_id`, holding
    /// the profile lock throughout, then prune old snapshots if configured.
    pub fn provision(
        &self,
        profile_id: &str,
        phase_set: &PhaseSet,
        operands: &[Operand],
        context: &ProvisioningContext,
        monitor: Option<&dyn ProgressMonitor>,
    ) -> Result<Status, CoreError> {
        let _lock = self.registry.lock(profile_id)?;
        let profile = self.registry.profile(profile_id)?;
        let mut status = self.perform(&profile, phase_set, operands, context, monitor);

        if let Some(keep) = self.keep_snapshots.filter(|_| !status.is_fatal()) {
            if let Err(e) = self.registry.prune(profile_id, keep) {
                warn!("pruning {profile_id} failed: {e}");
                status.add(Status::warning(format!("pruning {profile_id} failed: {e}")));
            }
        }
        Ok(status)
    }

    fn commit(&self, staged: &Profile, base_timestamp: i64) -> Result<i64, StoreError> {
        let mut snapshot = staged.clone();
        let after_base = base_timestamp
            .checked_add(1)
            .ok_or_else(|| StoreError::TimestampOverflow(staged.id().to_string()))?;
        let timestamp = self.registry.next_timestamp(staged.id())?.max(after_base);
        snapshot.set_timestamp(timestamp);
        self.registry.save(&snapshot)?;
        Ok(timestamp)
    }

    fn roll_back(
        &self,
        session: &mut Session,
        mut status: Status,
        monitor: &dyn ProgressMonitor,
    ) -> Status {
        let profile_id = session.profile().id().clone();
        warn!(
            "provisioning {profile_id} failed ({status}), rolling back {} actions",
            session.recorded()
        );
        status.merge(session.rollback());
        self.events.publish(&ProvisioningEvent::RolledBack {
            profile_id,
            severity: status.severity(),
        });
        monitor.done();
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operand::UnitOperand;
    use crate::status::Severity;
    use provisio_metadata::{UnitDescription, Version};

    fn unit(id: &str) -> Arc<provisio_metadata::InstallableUnit> {
        let mut desc = UnitDescription::new();
        desc.set_id(id).set_version(Version::new(1, 0, 0));
        Arc::new(desc.build().unwrap())
    }

    fn engine(dir: &std::path::Path) -> Engine {
        Engine::new(ProfileRegistry::open(dir).unwrap(), TouchpointManager::new())
    }

    #[test]
    fn context_builder() {
        let context = ProvisioningContext::new().with_property("installFolder", "/opt");
        assert_eq!(context.property("installFolder"), Some("/opt"));
        assert_eq!(context.property("missing"), None);
    }

    #[test]
    fn empty_run_commits_a_new_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let profile = Profile::new("p");

        let status = engine.perform(
            &profile,
            &PhaseSet::standard().unwrap(),
            &[],
            &ProvisioningContext::new(),
            None,
        );
        assert!(status.is_ok());
        assert_eq!(engine.registry().timestamps("p").unwrap().len(), 1);
    }

    #[test]
    fn install_without_touchpoint_adds_member() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let operands = [Operand::from(UnitOperand::install(unit("a")))];

        let status = engine.perform(
            &Profile::new("p"),
            &PhaseSet::standard().unwrap(),
            &operands,
            &ProvisioningContext::new(),
            None,
        );
        assert_eq!(status.severity(), Severity::Ok);
        let committed = engine.registry().profile("p").unwrap();
        assert!(committed.contains(&unit("a")));
        assert!(committed.timestamp() > 0);
    }

    #[test]
    fn commit_failure_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let status = engine.perform(
            &Profile::new("not a valid id"),
            &PhaseSet::standard().unwrap(),
            &[Operand::from(UnitOperand::install(unit("a")))],
            &ProvisioningContext::new(),
            None,
        );
        assert_eq!(status.severity(), Severity::Error);
        assert!(status.problems()[0].message.contains("commit"));
    }

    #[test]
    fn exhausted_timestamp_fails_commit() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let mut profile = Profile::new("p");
        profile.set_timestamp(i64::MAX);

        let status = engine.perform(
            &profile,
            &PhaseSet::standard().unwrap(),
            &[Operand::from(UnitOperand::install(unit("a")))],
            &ProvisioningContext::new(),
            None,
        );
        assert_eq!(status.severity(), Severity::Error);
        assert!(engine.registry().timestamps("p").unwrap().is_empty());
    }
}
