//! The standard phases.

use crate::action::{
    Action, AddUnitAction, RemoveUnitAction, SetPropertyAction, SetUnitPropertyAction,
};
use crate::operand::Operand;
use crate::phase::{Phase, PhaseDescriptor, UnitSide};
use crate::CoreError;

pub const PHASE_COLLECT: &str = "collect";
pub const PHASE_CHECK_TRUST: &str = "checkTrust";
pub const PHASE_UNCONFIGURE: &str = "unconfigure";
pub const PHASE_UNINSTALL: &str = "uninstall";
pub const PHASE_PROPERTY: &str = "property";
pub const PHASE_INSTALL: &str = "install";
pub const PHASE_CONFIGURE: &str = "configure";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitPhaseKind {
    Collect,
    CheckTrust,
    Unconfigure,
    Uninstall,
    Install,
    Configure,
}

impl UnitPhaseKind {
    pub fn id(self) -> &'static str {
        match self {
            UnitPhaseKind::Collect => PHASE_COLLECT,
            UnitPhaseKind::CheckTrust => PHASE_CHECK_TRUST,
            UnitPhaseKind::Unconfigure => PHASE_UNCONFIGURE,
            UnitPhaseKind::Uninstall => PHASE_UNINSTALL,
            UnitPhaseKind::Install => PHASE_INSTALL,
            UnitPhaseKind::Configure => PHASE_CONFIGURE,
        }
    }

    /// Teardown phases act on the installed unit, the rest on its successor.
    pub fn side(self) -> UnitSide {
        match self {
            UnitPhaseKind::Unconfigure | UnitPhaseKind::Uninstall => UnitSide::Before,
            UnitPhaseKind::Collect
            | UnitPhaseKind::CheckTrust
            | UnitPhaseKind::Install
            | UnitPhaseKind::Configure => UnitSide::After,
        }
    }
}

/// A phase over unit operands. `uninstall` removes the before-unit from the
/// staged profile and `install` adds the after-unit; the others only run
/// touchpoint actions.
#[derive(Debug, Clone)]
pub struct UnitPhase {
    descriptor: PhaseDescriptor,
    kind: UnitPhaseKind,
}

impl UnitPhase {
    pub fn new(kind: UnitPhaseKind, weight: i32) -> Result<Self, CoreError> {
        Ok(Self {
            descriptor: PhaseDescriptor::new(kind.id(), weight)?,
            kind,
        })
    }

    pub fn kind(&self) -> UnitPhaseKind {
        self.kind
    }
}

impl Phase for UnitPhase {
    fn descriptor(&self) -> &PhaseDescriptor {
        &self.descriptor
    }

    fn unit_side(&self) -> Option<UnitSide> {
        Some(self.kind.side())
    }

    fn bookkeeping_actions(&self, operand: &Operand) -> Vec<Box<dyn Action>> {
        let Operand::Unit(op) = operand else {
            return Vec::new();
        };
        match self.kind {
            UnitPhaseKind::Uninstall => op
                .first()
                .map(|unit| Box::new(RemoveUnitAction::new(unit.key())) as Box<dyn Action>)
                .into_iter()
                .collect(),
            UnitPhaseKind::Install => op
                .second()
                .map(|unit| Box::new(AddUnitAction::new(unit.clone())) as Box<dyn Action>)
                .into_iter()
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Applies profile and unit property operands.
#[derive(Debug, Clone)]
pub struct PropertyPhase {
    descriptor: PhaseDescriptor,
}

impl PropertyPhase {
    pub fn new(weight: i32) -> Result<Self, CoreError> {
        Ok(Self {
            descriptor: PhaseDescriptor::new(PHASE_PROPERTY, weight)?,
        })
    }
}

impl Phase for PropertyPhase {
    fn descriptor(&self) -> &PhaseDescriptor {
        &self.descriptor
    }

    fn is_applicable(&self, operand: &Operand) -> bool {
        matches!(operand, Operand::Property(_) | Operand::UnitProperty(_))
    }

    fn bookkeeping_actions(&self, operand: &Operand) -> Vec<Box<dyn Action>> {
        let action: Box<dyn Action> = match operand {
            Operand::Property(op) => Box::new(SetPropertyAction::new(
                op.key(),
                op.after().map(str::to_owned),
            )),
            Operand::UnitProperty(op) => Box::new(SetUnitPropertyAction::new(
                op.unit().key(),
                op.key(),
                op.after().map(str::to_owned),
            )),
            Operand::Unit(_) => return Vec::new(),
        };
        vec![action]
    }
}
