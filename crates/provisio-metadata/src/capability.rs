//! Provided and required capabilities, the contracts between units.

use crate::version::{Version, VersionRange};
use crate::MetadataError;
use std::fmt;

/// A named, versioned capability a unit offers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProvidedCapability {
    namespace: String,
    name: String,
    version: Version,
}

impl ProvidedCapability {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, version: Version) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            version,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }
}

impl fmt::Display for ProvidedCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.name, self.version)
    }
}

/// A capability a unit needs, matched against provided capabilities by
/// namespace, name and version range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequiredCapability {
    namespace: String,
    name: String,
    range: VersionRange,
    filter: Option<String>,
    optional: bool,
    multiple: bool,
    greedy: bool,
}

impl RequiredCapability {
    /// A mandatory, single-match, greedy requirement with no filter.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, range: VersionRange) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            range,
            filter: None,
            optional: false,
            multiple: false,
            greedy: true,
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter.filter(|f| !f.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    #[must_use]
    pub fn with_multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }

    #[must_use]
    pub fn with_greedy(mut self, greedy: bool) -> Self {
        self.greedy = greedy;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn range(&self) -> &VersionRange {
        &self.range
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_multiple(&self) -> bool {
        self.multiple
    }

    pub fn is_greedy(&self) -> bool {
        self.greedy
    }

    pub fn is_satisfied_by(&self, provided: &ProvidedCapability) -> bool {
        self.namespace == provided.namespace
            && self.name == provided.name
            && self.range.includes(&provided.version)
    }
}

impl fmt::Display for RequiredCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.name, self.range)
    }
}

/// A patch rule replacing requirements matching `apply_on` with `new_value`.
///
/// A missing `apply_on` adds `new_value`; a missing `new_value` drops the
/// matched requirement. At least one side is always present.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequirementChange {
    apply_on: Option<RequiredCapability>,
    new_value: Option<RequiredCapability>,
}

impl RequirementChange {
    pub fn new(
        apply_on: Option<RequiredCapability>,
        new_value: Option<RequiredCapability>,
    ) -> Result<Self, MetadataError> {
        if apply_on.is_none() && new_value.is_none() {
            return Err(MetadataError::EmptyRequirementChange);
        }
        Ok(Self {
            apply_on,
            new_value,
        })
    }

    pub fn apply_on(&self) -> Option<&RequiredCapability> {
        self.apply_on.as_ref()
    }

    pub fn new_value(&self) -> Option<&RequiredCapability> {
        self.new_value.as_ref()
    }

    /// Whether this change targets `requirement`: same namespace and name, and
    /// the change's source range covers the requirement's lower bound.
    pub fn matches(&self, requirement: &RequiredCapability) -> bool {
        self.apply_on.as_ref().is_some_and(|source| {
            source.namespace == requirement.namespace
                && source.name == requirement.name
                && source.range.includes(requirement.range.min())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(name: &str, version: &str) -> ProvidedCapability {
        ProvidedCapability::new("osgi.bundle", name, Version::parse(version).unwrap())
    }

    #[test]
    fn requirement_matches_namespace_name_and_range() {
        let req = RequiredCapability::new(
            "osgi.bundle",
            "org.example.core",
            VersionRange::parse("[1.0.0,2.0.0)").unwrap(),
        );
        assert!(req.is_satisfied_by(&bundle("org.example.core", "1.5.0")));
        assert!(!req.is_satisfied_by(&bundle("org.example.core", "2.0.0")));
        assert!(!req.is_satisfied_by(&bundle("org.example.ui", "1.5.0")));
        assert!(!req.is_satisfied_by(&ProvidedCapability::new(
            "osgi.package",
            "org.example.core",
            Version::new(1, 5, 0)
        )));
    }

    #[test]
    fn requirement_defaults() {
        let req = RequiredCapability::new("ns", "n", VersionRange::any());
        assert!(!req.is_optional());
        assert!(!req.is_multiple());
        assert!(req.is_greedy());
        assert!(req.filter().is_none());
    }

    #[test]
    fn blank_filter_is_dropped() {
        let req = RequiredCapability::new("ns", "n", VersionRange::any())
            .with_filter(Some("  ".to_owned()));
        assert!(req.filter().is_none());
    }

    #[test]
    fn structural_equality() {
        let a = RequiredCapability::new("ns", "n", VersionRange::any()).with_optional(true);
        let b = RequiredCapability::new("ns", "n", VersionRange::any()).with_optional(true);
        let c = RequiredCapability::new("ns", "n", VersionRange::any());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn requirement_change_needs_one_side() {
        assert!(RequirementChange::new(None, None).is_err());
        let req = RequiredCapability::new("ns", "n", VersionRange::parse("1.0.0").unwrap());
        let change = RequirementChange::new(
            Some(RequiredCapability::new("ns", "n", VersionRange::any())),
            Some(req.clone()),
        )
        .unwrap();
        assert!(change.matches(&req));
    }
}
