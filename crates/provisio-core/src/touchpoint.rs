//! Touchpoints: executors that turn a unit's instructions into actions.

use crate::action::Action;
use crate::instruction::parse_instruction;
use crate::operand::Operand;
use crate::phase::Parameters;
use crate::status::Status;
use provisio_metadata::{InstallableUnit, TouchpointType};
use provisio_store::Profile;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// An executor for one [`TouchpointType`].
///
/// Implementations usually only provide [`Touchpoint::touchpoint_type`],
/// [`Touchpoint::supports`] and [`Touchpoint::action`]; the default
/// [`Touchpoint::actions`] builds the action list from the unit's
/// instructions for the phase. Hooks default to OK.
pub trait Touchpoint: Send + Sync {
    fn touchpoint_type(&self) -> &TouchpointType;

    fn supports(&self, phase_id: &str) -> bool;

    /// Create the action registered under the fully qualified `action_id`,
    /// configured with `args`. `None` when the id is unknown.
    fn action(&self, action_id: &str, args: &Parameters) -> Option<Box<dyn Action>>;

    /// The actions `unit` needs in `phase_id`.
    ///
    /// Every touchpoint data block with an instruction for the phase
    /// contributes its calls, in block order. Arguments are substituted from
    /// `params` and short names are resolved through the instruction's
    /// import list.
    fn actions(
        &self,
        phase_id: &str,
        _profile: &Profile,
        _operand: &Operand,
        unit: &InstallableUnit,
        params: &Parameters,
    ) -> Result<Vec<Box<dyn Action>>, Status> {
        let mut actions = Vec::new();
        for data in unit.effective_touchpoint_data() {
            let Some(instruction) = data.instruction(phase_id) else {
                continue;
            };
            let calls = parse_instruction(instruction.body())
                .map_err(|e| Status::error(format!("{}: {e}", unit.key())))?;
            for call in calls {
                let action_id = call.resolve(instruction.import());
                let args = call.substituted_args(params);
                let action = self.action(&action_id, &args).ok_or_else(|| {
                    Status::error(format!(
                        "{}: no action {action_id} in touchpoint {}",
                        unit.key(),
                        self.touchpoint_type()
                    ))
                })?;
                actions.push(action);
            }
        }
        debug!(
            "{} actions for {} in phase {phase_id}",
            actions.len(),
            unit.key()
        );
        Ok(actions)
    }

    fn initialize_phase(
        &self,
        _profile: &Profile,
        _phase_id: &str,
        _params: &mut Parameters,
    ) -> Status {
        Status::ok()
    }

    fn complete_phase(
        &self,
        _profile: &Profile,
        _phase_id: &str,
        _params: &mut Parameters,
    ) -> Status {
        Status::ok()
    }

    fn initialize_operand(
        &self,
        _profile: &Profile,
        _operand: &Operand,
        _params: &mut Parameters,
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
}

/// Registry of touchpoint implementations keyed by type.
#[derive(Default, Clone)]
pub struct TouchpointManager {
    touchpoints: HashMap<TouchpointType, Arc<dyn Touchpoint>>,
}

impl TouchpointManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `touchpoint` under its own type, returning any
    /// implementation it replaces.
    pub fn register(&mut self, touchpoint: Arc<dyn Touchpoint>) -> Option<Arc<dyn Touchpoint>> {
        let ty = touchpoint.touchpoint_type().clone();
        debug!("registering touchpoint {ty}");
        self.touchpoints.insert(ty, touchpoint)
    }

    pub fn touchpoint(&self, ty: &TouchpointType) -> Option<Arc<dyn Touchpoint>> {
        self.touchpoints.get(ty).cloned()
    }

    /// The touchpoint responsible for `ty`: `Ok(None)` for the NONE type,
    /// an ERROR status for any other unregistered type.
    pub fn resolve(&self, ty: &TouchpointType) -> Result<Option<Arc<dyn Touchpoint>>, Status> {
        if ty.is_none() {
            return Ok(None);
        }
        self.touchpoint(ty)
            .map(Some)
            .ok_or_else(|| Status::error(format!("no touchpoint registered for type {ty}")))
    }

    pub fn len(&self) -> usize {
        self.touchpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.touchpoints.is_empty()
    }
}

impl std::fmt::Debug for TouchpointManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<String> = self.touchpoints.keys().map(ToString::to_string).collect();
        types.sort();
        f.debug_struct("TouchpointManager")
            .field("types", &types)
            .finish()
    }
}
