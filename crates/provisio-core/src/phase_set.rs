use crate::config::PhaseWeights;
use crate::phase::Phase;
use crate::phases::{PropertyPhase, UnitPhase, UnitPhaseKind};
use crate::CoreError;
use std::collections::HashSet;

/// An ordered, immutable list of phases with unique ids.
pub struct PhaseSet {
    phases: Vec<Box<dyn Phase>>,
}

impl PhaseSet {
    pub fn new(phases: Vec<Box<dyn Phase>>) -> Result<Self, CoreError> {
        let mut seen = HashSet::new();
        for phase in &phases {
            if !seen.insert(phase.id().to_owned()) {
                return Err(CoreError::InvalidArgument(format!(
                    "duplicate phase id {}",
                    phase.id()
                )));
            }
        }
        Ok(Self { phases })
    }

    /// `collect, unconfigure, uninstall, property, checkTrust, install,
    /// configure` with the given weights.
    pub fn with_weights(weights: &PhaseWeights) -> Result<Self, CoreError> {
        Self::new(vec![
            Box::new(UnitPhase::new(UnitPhaseKind::Collect, weights.collect)?),
            Box::new(UnitPhase::new(UnitPhaseKind::Unconfigure, weights.unconfigure)?),
            Box::new(UnitPhase::new(UnitPhaseKind::Uninstall, weights.uninstall)?),
            Box::new(PropertyPhase::new(weights.property)?),
            Box::new(UnitPhase::new(UnitPhaseKind::CheckTrust, weights.check_trust)?),
            Box::new(UnitPhase::new(UnitPhaseKind::Install, weights.install)?),
            Box::new(UnitPhase::new(UnitPhaseKind::Configure, weights.configure)?),
        ])
    }

    /// The standard phases with their default weights.
    pub fn standard() -> Result<Self, CoreError> {
        Self::with_weights(&PhaseWeights::default())
    }

    pub fn phases(&self) -> &[Box<dyn Phase>] {
        &self.phases
    }

    pub fn phase(&self, id: &str) -> Option<&dyn Phase> {
        self.phases.iter().find(|p| p.id() == id).map(|p| p.as_ref())
    }

    pub fn ids(&self) -> Vec<&str> {
        self.phases.iter().map(|p| p.id()).collect()
    }

    pub fn total_weight(&self) -> u64 {
        self.phases
            .iter()
            .map(|p| u64::from(p.weight().unsigned_abs()))
            .sum()
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}

impl std::fmt::Debug for PhaseSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}
