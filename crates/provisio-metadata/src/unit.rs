//! The immutable installable unit and its supporting value types.

use crate::capability::{ProvidedCapability, RequiredCapability, RequirementChange};
use crate::properties::Properties;
use crate::touchpoint::{TouchpointData, TouchpointType};
use crate::types::UnitId;
use crate::version::{Version, VersionRange};
use crate::MetadataError;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use url::Url;

const URI_FORBIDDEN: &[char] = &['<', '>', '"', '{', '}', '|', '\\', '^', '`'];

/// Check that `uri` is an absolute URI or a reference resolvable against a
/// file base.
fn validate_location(field: &'static str, uri: &str) -> Result<String, MetadataError> {
    let invalid = |reason: String| MetadataError::InvalidUri {
        field,
        uri: uri.to_owned(),
        reason,
    };

    if let Some(c) = uri
        .chars()
        .find(|c| c.is_whitespace() || URI_FORBIDDEN.contains(c))
    {
        return Err(invalid(format!("illegal character {c:?}")));
    }
    match Url::parse(uri) {
        Ok(_) => Ok(uri.to_owned()),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse("file:///").map_err(|e| invalid(e.to_string()))?;
            base.join(uri).map_err(|e| invalid(e.to_string()))?;
            Ok(uri.to_owned())
        }
        Err(e) => Err(invalid(e.to_string())),
    }
}

/// Copyright text with an optional location URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Copyright {
    location: Option<String>,
    body: String,
}

impl Copyright {
    pub fn new(body: impl Into<String>, location: Option<&str>) -> Result<Self, MetadataError> {
        let location = location
            .map(|l| validate_location("copyright", l))
            .transpose()?;
        Ok(Self {
            location,
            body: body.into(),
        })
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

/// License text with an optional location URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct License {
    location: Option<String>,
    body: String,
}

impl License {
    pub fn new(body: impl Into<String>, location: Option<&str>) -> Result<Self, MetadataError> {
        let location = location
            .map(|l| validate_location("license", l))
            .transpose()?;
        Ok(Self {
            location,
            body: body.into(),
        })
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

/// Declares which earlier units (by id and version range) this unit updates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpdateDescriptor {
    id: UnitId,
    range: VersionRange,
    severity: i32,
    description: Option<String>,
}

impl UpdateDescriptor {
    pub fn new(
        id: impl Into<UnitId>,
        range: VersionRange,
        severity: i32,
        description: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            range,
            severity,
            description,
        }
    }

    pub fn id(&self) -> &UnitId {
        &self.id
    }

    pub fn range(&self) -> &VersionRange {
        &self.range
    }

    pub fn severity(&self) -> i32 {
        self.severity
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Whether `unit` is one of the units this descriptor updates.
    pub fn is_update_of(&self, unit: &InstallableUnit) -> bool {
        self.id == *unit.id() && self.range.includes(unit.version())
    }
}

/// Names one artifact a unit needs: `(classifier, id, version)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactKey {
    classifier: String,
    id: String,
    version: Version,
}

impl ArtifactKey {
    pub fn new(classifier: impl Into<String>, id: impl Into<String>, version: Version) -> Self {
        Self {
            classifier: classifier.into(),
            id: id.into(),
            version,
        }
    }

    pub fn classifier(&self) -> &str {
        &self.classifier
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> &Version {
        &self.version
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.classifier, self.id, self.version)
    }
}

/// The `(id, version)` pair identifying a unit. Orders by id, then version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitKey {
    pub id: UnitId,
    pub version: Version,
}

impl UnitKey {
    pub fn new(id: impl Into<UnitId>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.id, self.version)
    }
}

/// Variant-specific data of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UnitKind {
    #[default]
    Plain,
    Fragment {
        host: Vec<RequiredCapability>,
    },
    Patch {
        /// Requirement lists, any one of which must match for the patch to apply.
        applicability_scope: Vec<Vec<RequiredCapability>>,
        lifecycle: Option<RequiredCapability>,
        requirement_changes: Vec<RequirementChange>,
    },
}

/// An immutable, versioned unit of installable software.
///
/// Equality, ordering and hashing consider only `(id, version)`.
#[derive(Debug, Clone)]
pub struct InstallableUnit {
    pub(crate) id: UnitId,
    pub(crate) version: Version,
    pub(crate) provides: Vec<ProvidedCapability>,
    pub(crate) requires: Vec<RequiredCapability>,
    pub(crate) meta_requires: Vec<RequiredCapability>,
    pub(crate) filter: Option<String>,
    pub(crate) touchpoint_type: TouchpointType,
    pub(crate) touchpoint_data: Vec<TouchpointData>,
    pub(crate) copyright: Option<Copyright>,
    pub(crate) licenses: Vec<License>,
    pub(crate) update: Option<UpdateDescriptor>,
    pub(crate) singleton: bool,
    pub(crate) properties: Properties,
    pub(crate) artifacts: Vec<ArtifactKey>,
    pub(crate) kind: UnitKind,
    pub(crate) fragments: Vec<Arc<InstallableUnit>>,
    pub(crate) resolved: bool,
}

impl InstallableUnit {
    pub fn id(&self) -> &UnitId {
        &self.id
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn key(&self) -> UnitKey {
        UnitKey::new(self.id.clone(), self.version.clone())
    }

    pub fn provided_capabilities(&self) -> &[ProvidedCapability] {
        &self.provides
    }

    pub fn requirements(&self) -> &[RequiredCapability] {
        &self.requires
    }

    pub fn meta_requirements(&self) -> &[RequiredCapability] {
        &self.meta_requires
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn touchpoint_type(&self) -> &TouchpointType {
        &self.touchpoint_type
    }

    /// Touchpoint data declared by this unit alone.
    pub fn touchpoint_data(&self) -> &[TouchpointData] {
        &self.touchpoint_data
    }

    pub fn copyright(&self) -> Option<&Copyright> {
        self.copyright.as_ref()
    }

    pub fn licenses(&self) -> &[License] {
        &self.licenses
    }

    pub fn update_descriptor(&self) -> Option<&UpdateDescriptor> {
        self.update.as_ref()
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key)
    }

    pub fn artifacts(&self) -> &[ArtifactKey] {
        &self.artifacts
    }

    pub fn kind(&self) -> &UnitKind {
        &self.kind
    }

    pub fn is_fragment(&self) -> bool {
        matches!(self.kind, UnitKind::Fragment { .. })
    }

    pub fn is_patch(&self) -> bool {
        matches!(self.kind, UnitKind::Patch { .. })
    }

    /// Host requirements of a fragment; empty for other kinds.
    pub fn host(&self) -> &[RequiredCapability] {
        match &self.kind {
            UnitKind::Fragment { host } => host,
            _ => &[],
        }
    }

    pub fn fragments(&self) -> &[Arc<InstallableUnit>] {
        &self.fragments
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Bind this unit to a concrete set of fragments.
    ///
    /// Resolving an already resolved unit returns it unchanged.
    pub fn resolved(self: Arc<Self>, fragments: Vec<Arc<InstallableUnit>>) -> Arc<Self> {
        if self.resolved {
            return self;
        }
        let mut unit = (*self).clone();
        unit.fragments = fragments;
        unit.resolved = true;
        Arc::new(unit)
    }

    /// Own touchpoint data followed by that of every attached fragment.
    pub fn effective_touchpoint_data(&self) -> Vec<&TouchpointData> {
        self.touchpoint_data
            .iter()
            .chain(self.fragments.iter().flat_map(|f| f.touchpoint_data.iter()))
            .collect()
    }

    /// Own provided capabilities followed by those of every attached fragment.
    pub fn effective_provided_capabilities(&self) -> Vec<&ProvidedCapability> {
        self.provides
            .iter()
            .chain(self.fragments.iter().flat_map(|f| f.provides.iter()))
            .collect()
    }

    pub fn satisfies(&self, requirement: &RequiredCapability) -> bool {
        self.effective_provided_capabilities()
            .into_iter()
            .any(|cap| requirement.is_satisfied_by(cap))
    }
}

impl PartialEq for InstallableUnit {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.version == other.version
    }
}

impl Eq for InstallableUnit {}

impl Hash for InstallableUnit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.version.hash(state);
    }
}

impl Ord for InstallableUnit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id
            .cmp(&other.id)
            .then_with(|| self.version.cmp(&other.version))
    }
}

impl PartialOrd for InstallableUnit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for InstallableUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}
