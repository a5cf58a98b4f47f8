//! Core provisioning engine for Provisio.
//!
//! This crate turns an ordered list of requested unit transitions into
//! ordered, reversible side effects: `Operand`s are run through a `PhaseSet`,
//! each `Phase` asks the unit's `Touchpoint` for `Action`s, the `Session`
//! records every executed action and rolls all of them back when a run ends
//! fatally, and the `Engine` commits the staged profile to the registry on
//! success. It also provides event publishing, progress and cancellation,
//! signal handling, and TOML configuration.

pub mod action;
pub mod concurrency;
pub mod config;
pub mod engine;
pub mod events;
pub mod instruction;
pub mod operand;
pub mod phase;
pub mod phase_set;
pub mod phases;
pub mod progress;
pub mod session;
pub mod status;
pub mod touchpoint;

pub use action::{
    Action, ActionContext, AddUnitAction, RemoveUnitAction, SetPropertyAction,
    SetUnitPropertyAction,
};
pub use concurrency::install_signal_handler;
pub use config::{EngineConfig, PhaseWeights, RegistrySection};
pub use engine::{Engine, ProvisioningContext};
pub use events::{
    ChannelEventBus, EventBus, EventStage, NullEventBus, OperandEvent, ProvisioningEvent,
    RecordingEventBus,
};
pub use instruction::{parse_instruction, ActionCall};
pub use operand::{Operand, PropertyOperand, Transition, UnitOperand, UnitPropertyOperand};
pub use phase::{
    Parameters, Phase, PhaseDescriptor, UnitSide, PARAM_PHASE_ID, PARAM_PROFILE_ID, PARAM_UNIT_ID,
    PARAM_UNIT_VERSION,
};
pub use phase_set::PhaseSet;
pub use phases::{PropertyPhase, UnitPhase, UnitPhaseKind};
pub use progress::{CancellationFlag, NullProgressMonitor, ProgressMonitor};
pub use session::Session;
pub use status::{MultiStatus, Outcome, Severity, Status};
pub use touchpoint::{Touchpoint, TouchpointManager};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("malformed instruction: {0}")]
    Instruction(String),
    #[error("store error: {0}")]
    Store(#[from] provisio_store::StoreError),
    #[error("metadata error: {0}")]
    Metadata(#[from] provisio_metadata::MetadataError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),
    #[error("config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
    #[error("signal handler error: {0}")]
    Signal(#[from] ctrlc::Error),
}
