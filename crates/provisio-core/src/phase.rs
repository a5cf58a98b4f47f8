//! Phases and the per-run phase state machine.

use crate::action::Action;
use crate::events::{EventBus, EventStage, OperandEvent, ProvisioningEvent};
use crate::operand::{Operand, UnitOperand};
use crate::progress::ProgressMonitor;
use crate::session::Session;
use crate::status::Status;
use crate::touchpoint::{Touchpoint, TouchpointManager};
use crate::CoreError;
use provisio_metadata::{InstallableUnit, TouchpointType};
use provisio_store::Profile;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// String parameters handed to phase and touchpoint hooks.
pub type Parameters = BTreeMap<String, String>;

pub const PARAM_PHASE_ID: &str = "phaseId";
pub const PARAM_PROFILE_ID: &str = "profileId";
pub const PARAM_UNIT_ID: &str = "unitId";
pub const PARAM_UNIT_VERSION: &str = "unitVersion";

/// Progress units allotted per unit of phase weight.
pub(crate) const WORK_PER_WEIGHT: u64 = 1000;

/// Identity and weight of a phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseDescriptor {
    id: String,
    weight: i32,
}

impl PhaseDescriptor {
    /// Fails with [`CoreError::InvalidArgument`] for an empty id or a
    /// weight that is not positive.
    pub fn new(id: impl Into<String>, weight: i32) -> Result<Self, CoreError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CoreError::InvalidArgument(
                "phase id must not be empty".to_owned(),
            ));
        }
        if weight <= 0 {
            return Err(CoreError::InvalidArgument(format!(
                "phase {id} weight must be positive, got {weight}"
            )));
        }
        Ok(Self { id, weight })
    }

    /// Like [`PhaseDescriptor::new`], for ids that may be absent.
    pub fn from_optional(id: Option<&str>, weight: i32) -> Result<Self, CoreError> {
        let id =
            id.ok_or_else(|| CoreError::InvalidArgument("phase id is required".to_owned()))?;
        Self::new(id, weight)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn weight(&self) -> i32 {
        self.weight
    }

    pub(crate) fn work(&self) -> u64 {
        u64::from(self.weight.unsigned_abs()) * WORK_PER_WEIGHT
    }
}

/// Which unit of a unit operand a phase acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitSide {
    /// The installed unit, `first`.
    Before,
    /// The unit to be installed, `second`.
    After,
}

impl UnitSide {
    pub fn unit(self, operand: &UnitOperand) -> Option<&Arc<InstallableUnit>> {
        match self {
            UnitSide::Before => operand.first(),
            UnitSide::After => operand.second(),
        }
    }
}

/// One step of a provisioning run.
///
/// A phase decides which operands it applies to and which unit's touchpoint
/// serves them, may contribute its own bookkeeping actions, and gets
/// lifecycle hooks around the whole phase and around each operand. Every
/// hook defaults to OK.
pub trait Phase: Send + Sync {
    fn descriptor(&self) -> &PhaseDescriptor;

    fn id(&self) -> &str {
        self.descriptor().id()
    }

    fn weight(&self) -> i32 {
        self.descriptor().weight()
    }

    /// The side of unit operands this phase serves; `None` for phases that
    /// do not act on units.
    fn unit_side(&self) -> Option<UnitSide> {
        None
    }

    fn is_applicable(&self, operand: &Operand) -> bool {
        match (self.unit_side(), operand) {
            (Some(side), Operand::Unit(op)) => side.unit(op).is_some(),
            _ => false,
        }
    }

    /// The unit whose touchpoint provides this phase's actions for `operand`.
    fn touchpoint_unit(&self, operand: &Operand) -> Option<Arc<InstallableUnit>> {
        match (self.unit_side(), operand) {
            (Some(side), Operand::Unit(op)) => side.unit(op).cloned(),
            _ => None,
        }
    }

    fn initialize_phase(&self, _profile: &Profile, _params: &mut Parameters) -> Status {
        Status::ok()
    }

    fn complete_phase(
        &self,
        _profile: &Profile,
        _params: &mut Parameters,
        _monitor: &dyn ProgressMonitor,
    ) -> Status {
        Status::ok()
    }

    fn initialize_operand(
        &self,
        _profile: &Profile,
        _operand: &Operand,
        _params: &mut Parameters,
        _monitor: &dyn ProgressMonitor,
    ) -> Status {
        Status::ok()
    }

    fn complete_operand(
        &self,
        _profile: &Profile,
        _operand: &Operand,
        _params: &mut Parameters,
    ) -> Status {
        Status::ok()
    }

    /// Actions the phase itself runs for `operand`, after the touchpoint's.
    fn bookkeeping_actions(&self, _operand: &Operand) -> Vec<Box<dyn Action>> {
        Vec::new()
    }
}

/// Shared state for running the phases of one engine run.
pub(crate) struct PhaseRun<'a> {
    pub session: &'a mut Session,
    pub touchpoints: &'a TouchpointManager,
    pub events: &'a dyn EventBus,
    pub monitor: &'a dyn ProgressMonitor,
    pub operands: &'a [Operand],
    pub params: &'a Parameters,
}

impl PhaseRun<'_> {
    /// Run `phase` over every applicable operand.
    ///
    /// `complete_phase` runs whenever `initialize_phase` did, and
    /// `complete_operand` whenever `initialize_operand` did. The first fatal
    /// operand stops the phase.
    pub(crate) fn run(&mut self, phase: &dyn Phase) -> Status {
        let phase_id = phase.id().to_owned();
        let work = phase.descriptor().work();
        let operands = self.operands;
        self.monitor.subtask(&phase_id);
        debug!("phase {phase_id}: starting");

        let mut params = self.params.clone();
        params.insert(PARAM_PHASE_ID.to_owned(), phase_id.clone());

        let mut status = Status::multi(format!("phase {phase_id}"));
        let init = phase.initialize_phase(self.session.profile(), &mut params);
        let init_fatal = init.is_fatal();
        status.add(init);

        let mut initialised: Vec<Arc<dyn Touchpoint>> = Vec::new();
        let mut reported = 0;
        if !init_fatal {
            let applicable: Vec<&Operand> =
                operands.iter().filter(|op| phase.is_applicable(op)).collect();
            let share = work.checked_div(applicable.len() as u64).unwrap_or(0);
            for operand in applicable {
                if self.monitor.is_cancelled() {
                    warn!("phase {phase_id}: cancelled");
                    status.add(Status::cancel(format!("cancelled during phase {phase_id}")));
                    break;
                }
                let result = self.run_operand(phase, operand, &mut params, &mut initialised);
                let fatal = result.is_fatal();
                status.add(result);
                self.monitor.worked(share);
                reported += share;
                if fatal {
                    warn!("phase {phase_id}: {operand} failed");
                    break;
                }
            }
        }

        for touchpoint in &initialised {
            status.add(touchpoint.complete_phase(self.session.profile(), &phase_id, &mut params));
        }
        status.add(phase.complete_phase(self.session.profile(), &mut params, self.monitor));
        self.monitor.worked(work.saturating_sub(reported));
        debug!("phase {phase_id}: {}", status.severity());
        status
    }

    fn run_operand(
        &mut self,
        phase: &dyn Phase,
        operand: &Operand,
        phase_params: &mut Parameters,
        initialised: &mut Vec<Arc<dyn Touchpoint>>,
    ) -> Status {
        let mut status = Status::multi(format!("{} {operand}", phase.id()));
        let unit = phase.touchpoint_unit(operand);
        let mut params = phase_params.clone();
        if let Some(unit) = &unit {
            params.insert(PARAM_UNIT_ID.to_owned(), unit.id().to_string());
            params.insert(PARAM_UNIT_VERSION.to_owned(), unit.version().to_string());
        }

        let init =
            phase.initialize_operand(self.session.profile(), operand, &mut params, self.monitor);
        let init_fatal = init.is_fatal();
        status.add(init);
        if !init_fatal {
            let block = self.run_touchpoint(
                phase,
                operand,
                unit.as_ref(),
                phase_params,
                &mut params,
                initialised,
            );
            status.add(block);
        }
        status.add(phase.complete_operand(self.session.profile(), operand, &mut params));
        status
    }

    /// Resolve the operand's touchpoint, then run the action block wrapped in
    /// the touchpoint's operand hooks and the before/after events.
    fn run_touchpoint(
        &mut self,
        phase: &dyn Phase,
        operand: &Operand,
        unit: Option<&Arc<InstallableUnit>>,
        phase_params: &mut Parameters,
        params: &mut Parameters,
        initialised: &mut Vec<Arc<dyn Touchpoint>>,
    ) -> Status {
        let phase_id = phase.id();
        let touchpoint = match unit {
            Some(unit) => match self.touchpoints.resolve(unit.touchpoint_type()) {
                Ok(tp) => tp.filter(|tp| tp.supports(phase_id)),
                Err(status) => return status,
            },
            None => None,
        };

        let mut status = Status::multi(format!("{phase_id} actions"));
        if let Some(tp) = &touchpoint {
            let seen = initialised
                .iter()
                .any(|t| t.touchpoint_type() == tp.touchpoint_type());
            if !seen {
                initialised.push(Arc::clone(tp));
                let init = tp.initialize_phase(self.session.profile(), phase_id, phase_params);
                for (k, v) in phase_params.iter() {
                    params.insert(k.clone(), v.clone());
                }
                if init.is_fatal() {
                    return init;
                }
                status.add(init);
            }
            let init = tp.initialize_operand(self.session.profile(), operand, params);
            let init_fatal = init.is_fatal();
            status.add(init);
            if !init_fatal {
                status.add(self.run_block(phase, operand, unit, Some(tp), params));
            }
            status.add(tp.complete_operand(self.session.profile(), operand, params));
        } else {
            status.add(self.run_block(phase, operand, unit, None, params));
        }
        status
    }

    fn run_block(
        &mut self,
        phase: &dyn Phase,
        operand: &Operand,
        unit: Option<&Arc<InstallableUnit>>,
        touchpoint: Option<&Arc<dyn Touchpoint>>,
        params: &Parameters,
    ) -> Status {
        let phase_id = phase.id();
        let touchpoint_type = touchpoint.map(|tp| tp.touchpoint_type().clone());
        self.publish(phase_id, EventStage::Before, operand, touchpoint_type.clone(), None);

        let mut status = Status::multi(format!("{phase_id} {operand}"));
        let mut actions = match (touchpoint, unit) {
            (Some(tp), Some(unit)) => {
                match tp.actions(phase_id, self.session.profile(), operand, unit, params) {
                    Ok(actions) => actions,
                    Err(failure) => {
                        status.add(failure);
                        Vec::new()
                    }
                }
            }
            _ => Vec::new(),
        };
        if !status.is_fatal() {
            actions.extend(phase.bookkeeping_actions(operand));
            for action in actions {
                let result = self.session.execute(phase_id, action);
                let fatal = result.is_fatal();
                status.add(result);
                if fatal {
                    break;
                }
            }
        }

        self.publish(
            phase_id,
            EventStage::After,
            operand,
            touchpoint_type,
            Some(status.clone()),
        );
        status
    }

    fn publish(
        &self,
        phase_id: &str,
        stage: EventStage,
        operand: &Operand,
        touchpoint: Option<TouchpointType>,
        result: Option<Status>,
    ) {
        self.events.publish(&ProvisioningEvent::Operand(OperandEvent {
            phase_id: phase_id.to_owned(),
            stage,
            profile_id: self.session.profile().id().clone(),
            operand: operand.clone(),
            transition: operand.transition(),
            touchpoint,
            result,
        }));
    }
}
