//! Mutable description of an installable unit, consumed once to build it.

use crate::capability::{ProvidedCapability, RequiredCapability, RequirementChange};
use crate::properties::Properties;
use crate::touchpoint::{TouchpointData, TouchpointType};
use crate::types::UnitId;
use crate::unit::{ArtifactKey, Copyright, InstallableUnit, License, UnitKind, UpdateDescriptor};
use crate::version::Version;
use crate::{MetadataError, PROP_TYPE_FRAGMENT, PROP_TYPE_PATCH};

/// Accumulates the fields of an [`InstallableUnit`].
///
/// Setters return `&mut Self` for chaining. [`UnitDescription::build`] takes
/// the description by value, so a spent description cannot be reused.
#[derive(Debug, Clone, Default)]
pub struct UnitDescription {
    id: Option<UnitId>,
    version: Version,
    provides: Vec<ProvidedCapability>,
    requires: Vec<RequiredCapability>,
    meta_requires: Vec<RequiredCapability>,
    filter: Option<String>,
    touchpoint_type: TouchpointType,
    touchpoint_data: Vec<TouchpointData>,
    copyright: Option<Copyright>,
    licenses: Vec<License>,
    update: Option<UpdateDescriptor>,
    singleton: bool,
    properties: Properties,
    artifacts: Vec<ArtifactKey>,
    kind: UnitKind,
}

impl UnitDescription {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fragment description, tagged with [`PROP_TYPE_FRAGMENT`].
    pub fn fragment() -> Self {
        let mut d = Self {
            kind: UnitKind::Fragment { host: Vec::new() },
            ..Self::default()
        };
        d.properties.set(PROP_TYPE_FRAGMENT, "true");
        d
    }

    /// A patch description, tagged with [`PROP_TYPE_PATCH`].
    pub fn patch() -> Self {
        let mut d = Self {
            kind: UnitKind::Patch {
                applicability_scope: Vec::new(),
                lifecycle: None,
                requirement_changes: Vec::new(),
            },
            ..Self::default()
        };
        d.properties.set(PROP_TYPE_PATCH, "true");
        d
    }

    pub fn id(&self) -> Option<&UnitId> {
        self.id.as_ref()
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn kind(&self) -> &UnitKind {
        &self.kind
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn provided_capabilities(&self) -> &[ProvidedCapability] {
        &self.provides
    }

    pub fn requirements(&self) -> &[RequiredCapability] {
        &self.requires
    }

    pub fn set_id(&mut self, id: impl Into<UnitId>) -> &mut Self {
        self.id = Some(id.into());
        self
    }

    pub fn set_version(&mut self, version: Version) -> &mut Self {
        self.version = version;
        self
    }

    pub fn set_provided(&mut self, provides: Vec<ProvidedCapability>) -> &mut Self {
        self.provides = provides;
        self
    }

    pub fn add_provided(&mut self, capability: ProvidedCapability) -> &mut Self {
        self.provides.push(capability);
        self
    }

    pub fn set_requirements(&mut self, requires: Vec<RequiredCapability>) -> &mut Self {
        self.requires = requires;
        self
    }

    pub fn add_requirement(&mut self, requirement: RequiredCapability) -> &mut Self {
        self.requires.push(requirement);
        self
    }

    pub fn set_meta_requirements(&mut self, requires: Vec<RequiredCapability>) -> &mut Self {
        self.meta_requires = requires;
        self
    }

    pub fn set_filter(&mut self, filter: Option<String>) -> &mut Self {
        self.filter = filter;
        self
    }

    pub fn set_touchpoint_type(&mut self, touchpoint_type: TouchpointType) -> &mut Self {
        self.touchpoint_type = touchpoint_type;
        self
    }

    pub fn add_touchpoint_data(&mut self, data: TouchpointData) -> &mut Self {
        self.touchpoint_data.push(data);
        self
    }

    pub fn set_copyright(&mut self, copyright: Option<Copyright>) -> &mut Self {
        self.copyright = copyright;
        self
    }

    pub fn set_licenses(&mut self, licenses: Vec<License>) -> &mut Self {
        self.licenses = licenses;
        self
    }

    pub fn set_update_descriptor(&mut self, update: Option<UpdateDescriptor>) -> &mut Self {
        self.update = update;
        self
    }

    pub fn set_singleton(&mut self, singleton: bool) -> &mut Self {
        self.singleton = singleton;
        self
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.properties.set(key, value);
        self
    }

    pub fn set_artifacts(&mut self, artifacts: Vec<ArtifactKey>) -> &mut Self {
        self.artifacts = artifacts;
        self
    }

    pub fn set_host(&mut self, requirements: Vec<RequiredCapability>) -> Result<&mut Self, MetadataError> {
        match &mut self.kind {
            UnitKind::Fragment { host } => {
                *host = requirements;
                Ok(self)
            }
            _ => Err(MetadataError::KindMismatch {
                operation: "host requirements",
                expected: "fragment",
            }),
        }
    }

    pub fn set_applicability_scope(
        &mut self,
        scope: Vec<Vec<RequiredCapability>>,
    ) -> Result<&mut Self, MetadataError> {
        match &mut self.kind {
            UnitKind::Patch {
                applicability_scope,
                ..
            } => {
                *applicability_scope = scope;
                Ok(self)
            }
            _ => Err(patch_only("applicability scope")),
        }
    }

    pub fn set_lifecycle(
        &mut self,
        requirement: Option<RequiredCapability>,
    ) -> Result<&mut Self, MetadataError> {
        match &mut self.kind {
            UnitKind::Patch { lifecycle, .. } => {
                *lifecycle = requirement;
                Ok(self)
            }
            _ => Err(patch_only("lifecycle")),
        }
    }

    pub fn set_requirement_changes(
        &mut self,
        changes: Vec<RequirementChange>,
    ) -> Result<&mut Self, MetadataError> {
        match &mut self.kind {
            UnitKind::Patch {
                requirement_changes,
                ..
            } => {
                *requirement_changes = changes;
                Ok(self)
            }
            _ => Err(patch_only("requirement changes")),
        }
    }

    /// Freeze the description into an immutable unit.
    pub fn build(self) -> Result<InstallableUnit, MetadataError> {
        let id = match self.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => return Err(MetadataError::MissingId),
        };
        Ok(InstallableUnit {
            id,
            version: self.version,
            provides: self.provides,
            requires: self.requires,
            meta_requires: self.meta_requires,
            filter: self.filter,
            touchpoint_type: self.touchpoint_type,
            touchpoint_data: self.touchpoint_data,
            copyright: self.copyright,
            licenses: self.licenses,
            update: self.update,
            singleton: self.singleton,
            properties: self.properties,
            artifacts: self.artifacts,
            kind: self.kind,
            fragments: Vec::new(),
            resolved: false,
        })
    }
}

fn patch_only(operation: &'static str) -> MetadataError {
    MetadataError::KindMismatch {
        operation,
        expected: "patch",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::VersionRange;

    #[test]
    fn build_requires_an_id() {
        assert!(matches!(
            UnitDescription::new().build(),
            Err(MetadataError::MissingId)
        ));
        let mut d = UnitDescription::new();
        d.set_id("  ");
        assert!(matches!(d.build(), Err(MetadataError::MissingId)));
    }

    #[test]
    fn defaults_to_empty_version_and_no_touchpoint() {
        let mut d = UnitDescription::new();
        d.set_id("a");
        let u = d.build().unwrap();
        assert!(u.version().is_empty());
        assert!(u.touchpoint_type().is_none());
        assert!(!u.is_singleton());
        assert!(!u.is_resolved());
    }

    #[test]
    fn fragment_carries_type_property_and_host() {
        let host = RequiredCapability::new("osgi.bundle", "host", VersionRange::any());
        let mut d = UnitDescription::fragment();
        d.set_id("frag").set_host(vec![host.clone()]).unwrap();
        let u = d.build().unwrap();
        assert!(u.is_fragment());
        assert_eq!(u.property(PROP_TYPE_FRAGMENT), Some("true"));
        assert_eq!(u.host(), [host]);
    }

    #[test]
    fn patch_setters_reject_other_kinds() {
        let mut plain = UnitDescription::new();
        assert!(plain.set_lifecycle(None).is_err());
        assert!(plain.set_host(Vec::new()).is_err());

        let mut patch = UnitDescription::patch();
        patch
            .set_id("p")
            .set_applicability_scope(vec![vec![RequiredCapability::new(
                "ns",
                "target",
                VersionRange::any(),
            )]])
            .unwrap();
        assert!(patch.set_host(Vec::new()).is_err());
        let u = patch.build().unwrap();
        assert!(u.is_patch());
        assert_eq!(u.property(PROP_TYPE_PATCH), Some("true"));
        match u.kind() {
            UnitKind::Patch {
                applicability_scope,
                ..
            } => assert_eq!(applicability_scope.len(), 1),
            other => panic!("unexpected kind {other:?}"),
        }
    }
}
