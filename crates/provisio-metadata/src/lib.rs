//! Installable unit metadata and advice ingestion for Provisio.
//!
//! This crate defines the metadata layer: structured versions and ranges
//! (`Version`, `VersionRange`), capabilities, touchpoint types and their
//! per-phase instructions, the immutable `InstallableUnit` built through a
//! consumed-once `UnitDescription`, and the key-path advice parser that turns
//! `units.N.*` property files into unit descriptions.

pub mod advice;
pub mod capability;
pub mod description;
pub mod properties;
pub mod touchpoint;
pub mod types;
pub mod unit;
pub mod version;

pub use advice::{parse_advice_str, Advice, AdviceParser};
pub use capability::{ProvidedCapability, RequiredCapability, RequirementChange};
pub use description::UnitDescription;
pub use properties::Properties;
pub use touchpoint::{TouchpointData, TouchpointInstruction, TouchpointType, TouchpointTypeInterner};
pub use types::{ProfileId, UnitId};
pub use unit::{
    ArtifactKey, Copyright, InstallableUnit, License, UnitKey, UnitKind, UpdateDescriptor,
};
pub use version::{Version, VersionRange};

use thiserror::Error;

/// Property marking a unit built from a fragment description.
pub const PROP_TYPE_FRAGMENT: &str = "provisio.type.fragment";
/// Property marking a unit built from a patch description.
pub const PROP_TYPE_PATCH: &str = "provisio.type.patch";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("invalid version: '{0}'")]
    InvalidVersion(String),
    #[error("invalid version range: '{0}'")]
    InvalidRange(String),
    #[error("invalid {field} location '{uri}': {reason}")]
    InvalidUri {
        field: &'static str,
        uri: String,
        reason: String,
    },
    #[error("installable unit description has no id")]
    MissingId,
    #[error("bad token '{token}' in advice key '{key}'")]
    BadToken { key: String, token: String },
    #[error("advice key '{key}' is missing required field '{field}'")]
    MissingField { key: String, field: &'static str },
    #[error("invalid update severity: '{0}'")]
    InvalidSeverity(String),
    #[error("{operation} is only valid on {expected} descriptions")]
    KindMismatch {
        operation: &'static str,
        expected: &'static str,
    },
    #[error("requirement change needs a source or a replacement")]
    EmptyRequirementChange,
}
