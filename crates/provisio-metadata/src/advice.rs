//! Key-path advice parsing.
//!
//! Advice is a flat `key=value` map whose dotted keys describe extra
//! properties, capabilities, touchpoint instructions and whole additional
//! units for a host unit:
//!
//! ```text
//! properties.0.name=org.example.flavor
//! properties.0.value=tooling
//! requires.0.namespace=osgi.bundle
//! requires.0.name=org.example.core
//! requires.0.range=[$version$,$version$]
//! instructions.configure=setStartLevel(startLevel:4);
//! units.0.id=tooling.org.example.core
//! units.0.version=$version$
//! units.0.hostRequirements.0.namespace=osgi.bundle
//! units.0.hostRequirements.0.name=org.example.core
//! ```
//!
//! Keys are processed in sorted order. `$version$` and `$qualifier$` in
//! version-valued fields are replaced by the host version and its qualifier.

use crate::capability::{ProvidedCapability, RequiredCapability};
use crate::description::UnitDescription;
use crate::properties::Properties;
use crate::touchpoint::{TouchpointData, TouchpointInstruction, TouchpointType, TouchpointTypeInterner};
use crate::unit::{ArtifactKey, Copyright, License, UpdateDescriptor};
use crate::version::{Version, VersionRange};
use crate::MetadataError;
use std::collections::BTreeMap;
use tracing::debug;

const VERSION_SUBSTITUTION: &str = "$version$";
const QUALIFIER_SUBSTITUTION: &str = "$qualifier$";

const PROPERTIES_PREFIX: &str = "properties.";
const PROVIDES_PREFIX: &str = "provides.";
const REQUIRES_PREFIX: &str = "requires.";
const INSTRUCTIONS_PREFIX: &str = "instructions.";
const UNITS_PREFIX: &str = "units.";
const LICENSES_PREFIX: &str = "licenses.";
const ARTIFACTS_PREFIX: &str = "artifacts.";
const HOST_REQUIREMENTS_PREFIX: &str = "hostRequirements.";

/// Everything extracted from one advice map.
#[derive(Debug, Clone, Default)]
pub struct Advice {
    pub properties: Properties,
    pub provides: Vec<ProvidedCapability>,
    pub requires: Vec<RequiredCapability>,
    pub instructions: TouchpointData,
    pub units: Vec<UnitDescription>,
}

/// Read `key=value` lines. Blank lines and lines starting with `#` or `!`
/// are skipped; a line without `=` yields a key with an empty value.
pub fn parse_advice_str(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .map(|line| match line.split_once('=') {
            Some((key, value)) => (key.trim().to_owned(), value.trim().to_owned()),
            None => (line.to_owned(), String::new()),
        })
        .collect()
}

/// Cursor-based parser over a sorted advice map.
pub struct AdviceParser<'a> {
    host_version: &'a Version,
    entries: Vec<(&'a str, &'a str)>,
    pos: usize,
    interner: Option<&'a TouchpointTypeInterner>,
}

impl<'a> AdviceParser<'a> {
    pub fn new(host_version: &'a Version, advice: &'a BTreeMap<String, String>) -> Self {
        Self {
            host_version,
            entries: advice
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect(),
            pos: 0,
            interner: None,
        }
    }

    /// Intern the touchpoint types of parsed units through `interner`.
    #[must_use]
    pub fn with_interner(mut self, interner: &'a TouchpointTypeInterner) -> Self {
        self.interner = Some(interner);
        self
    }

    pub fn parse(mut self) -> Result<Advice, MetadataError> {
        let mut advice = Advice::default();
        let mut instructions = Vec::new();

        while let Some(key) = self.current() {
            if key.starts_with(PROPERTIES_PREFIX) {
                self.parse_properties(PROPERTIES_PREFIX, &mut advice.properties)?;
            } else if key.starts_with(PROVIDES_PREFIX) {
                self.parse_provides(PROVIDES_PREFIX, &mut advice.provides)?;
            } else if key.starts_with(REQUIRES_PREFIX) {
                self.parse_requires(REQUIRES_PREFIX, &mut advice.requires)?;
            } else if key.starts_with(INSTRUCTIONS_PREFIX) {
                self.parse_instructions(INSTRUCTIONS_PREFIX, &mut instructions)?;
            } else if key.starts_with(UNITS_PREFIX) {
                self.parse_units(UNITS_PREFIX, &mut advice.units)?;
            } else {
                self.advance();
            }
        }

        advice.instructions = TouchpointData::new(instructions);
        debug!(
            "parsed advice: {} properties, {} provides, {} requires, {} units",
            advice.properties.len(),
            advice.provides.len(),
            advice.requires.len(),
            advice.units.len()
        );
        Ok(advice)
    }

    fn current(&self) -> Option<&'a str> {
        self.entries.get(self.pos).map(|(k, _)| *k)
    }

    fn value(&self) -> &'a str {
        self.entries.get(self.pos).map_or("", |&(_, v)| v.trim())
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn at_prefix(&self, prefix: &str) -> Option<&'a str> {
        self.current()
            .filter(|key| key.starts_with(prefix))
            .map(|key| &key[prefix.len()..])
    }

    fn bad_token(&self, prefix: &str) -> MetadataError {
        let key = self.current().unwrap_or_default();
        MetadataError::BadToken {
            key: key.to_owned(),
            token: key.get(prefix.len()..).unwrap_or_default().to_owned(),
        }
    }

    /// The `prefix.N.` sub-prefix of the current key.
    fn indexed_prefix(&self, prefix: &str) -> Result<String, MetadataError> {
        let key = self.current().unwrap_or_default();
        match key[prefix.len()..].find('.') {
            Some(dot) => Ok(key[..prefix.len() + dot + 1].to_owned()),
            None => Err(self.bad_token(prefix)),
        }
    }

    fn substitute(&self, raw: &str) -> String {
        let mut out = raw.replace(VERSION_SUBSTITUTION, &self.host_version.to_string());
        if out.contains(QUALIFIER_SUBSTITUTION) {
            let qualifier = self.host_version.qualifier();
            if qualifier.is_empty() {
                out = out.replace(&format!(".{QUALIFIER_SUBSTITUTION}"), "");
            }
            out = out.replace(QUALIFIER_SUBSTITUTION, qualifier);
        }
        out
    }

    fn version_value(&self) -> Result<Version, MetadataError> {
        Version::parse(&self.substitute(self.value()))
    }

    fn range_value(&self) -> Result<VersionRange, MetadataError> {
        VersionRange::parse(&self.substitute(self.value()))
    }

    fn bool_value(&self) -> bool {
        self.value().eq_ignore_ascii_case("true")
    }

    fn parse_properties(&mut self, prefix: &str, out: &mut Properties) -> Result<(), MetadataError> {
        while self.at_prefix(prefix).is_some() {
            let item = self.indexed_prefix(prefix)?;
            let mut name = None;
            let mut value = None;
            while let Some(token) = self.at_prefix(&item) {
                match token {
                    "name" => name = Some(self.value()),
                    "value" => value = Some(self.value()),
                    _ => {}
                }
                self.advance();
            }
            let name = name.ok_or_else(|| missing(&item, "name"))?;
            let value = value.ok_or_else(|| missing(&item, "value"))?;
            out.set(name, value);
        }
        Ok(())
    }

    fn parse_provides(
        &mut self,
        prefix: &str,
        out: &mut Vec<ProvidedCapability>,
    ) -> Result<(), MetadataError> {
        while self.at_prefix(prefix).is_some() {
            let item = self.indexed_prefix(prefix)?;
            let mut namespace = None;
            let mut name = None;
            let mut version = Version::empty();
            while let Some(token) = self.at_prefix(&item) {
                match token {
                    "namespace" => namespace = Some(self.value()),
                    "name" => name = Some(self.value()),
                    "version" => version = self.version_value()?,
                    _ => {}
                }
                self.advance();
            }
            out.push(ProvidedCapability::new(
                namespace.ok_or_else(|| missing(&item, "namespace"))?,
                name.ok_or_else(|| missing(&item, "name"))?,
                version,
            ));
        }
        Ok(())
    }

    fn parse_requires(
        &mut self,
        prefix: &str,
        out: &mut Vec<RequiredCapability>,
    ) -> Result<(), MetadataError> {
        while self.at_prefix(prefix).is_some() {
            let item = self.indexed_prefix(prefix)?;
            let mut namespace = None;
            let mut name = None;
            let mut range = VersionRange::any();
            let mut filter = None;
            let mut optional = false;
            let mut multiple = false;
            let mut greedy = false;
            while let Some(token) = self.at_prefix(&item) {
                match token {
                    "namespace" => namespace = Some(self.value()),
                    "name" => name = Some(self.value()),
                    "range" => range = self.range_value()?,
                    "filter" => filter = Some(self.value().to_owned()),
                    "optional" => optional = self.bool_value(),
                    "multiple" => multiple = self.bool_value(),
                    "greedy" => greedy = self.bool_value(),
                    _ => {}
                }
                self.advance();
            }
            out.push(
                RequiredCapability::new(
                    namespace.ok_or_else(|| missing(&item, "namespace"))?,
                    name.ok_or_else(|| missing(&item, "name"))?,
                    range,
                )
                .with_filter(filter)
                .with_optional(optional)
                .with_multiple(multiple)
                .with_greedy(greedy),
            );
        }
        Ok(())
    }

    fn parse_instructions(
        &mut self,
        prefix: &str,
        out: &mut Vec<(String, TouchpointInstruction)>,
    ) -> Result<(), MetadataError> {
        while let Some(phase) = self.at_prefix(prefix) {
            if phase.contains('.') {
                return Err(self.bad_token(prefix));
            }
            let body = self.value();
            let import_key = format!("{prefix}{phase}.");
            self.advance();

            let mut import = None;
            if let Some(token) = self.at_prefix(&import_key) {
                if token == "import" {
                    import = Some(self.value().to_owned());
                }
                self.advance();
            }
            out.push((phase.to_owned(), TouchpointInstruction::new(body, import)));
        }
        Ok(())
    }

    fn parse_licenses(&mut self, prefix: &str, out: &mut Vec<License>) -> Result<(), MetadataError> {
        while let Some(index) = self.at_prefix(prefix) {
            if index.contains('.') {
                return Err(self.bad_token(prefix));
            }
            let body = self.value();
            let location_key = format!("{prefix}{index}.");
            self.advance();

            let mut location = None;
            if let Some(token) = self.at_prefix(&location_key) {
                if token == "location" {
                    location = Some(self.value());
                }
                self.advance();
            }
            out.push(License::new(body, location)?);
        }
        Ok(())
    }

    fn parse_artifacts(
        &mut self,
        prefix: &str,
        out: &mut Vec<ArtifactKey>,
    ) -> Result<(), MetadataError> {
        while self.at_prefix(prefix).is_some() {
            let item = self.indexed_prefix(prefix)?;
            let mut classifier = None;
            let mut id = None;
            let mut version = Version::empty();
            while let Some(token) = self.at_prefix(&item) {
                match token {
                    "classifier" => classifier = Some(self.value()),
                    "id" => id = Some(self.value()),
                    "version" => version = self.version_value()?,
                    _ => {}
                }
                self.advance();
            }
            out.push(ArtifactKey::new(
                classifier.ok_or_else(|| missing(&item, "classifier"))?,
                id.ok_or_else(|| missing(&item, "id"))?,
                version,
            ));
        }
        Ok(())
    }

    fn parse_units(
        &mut self,
        prefix: &str,
        out: &mut Vec<UnitDescription>,
    ) -> Result<(), MetadataError> {
        while self.at_prefix(prefix).is_some() {
            let item = self.indexed_prefix(prefix)?;
            out.push(self.parse_unit(&item)?);
        }
        Ok(())
    }

    fn parse_unit(&mut self, prefix: &str) -> Result<UnitDescription, MetadataError> {
        let mut id = None;
        let mut version = Version::empty();
        let mut singleton = false;
        let mut filter = None;
        let mut copyright = None;
        let mut copyright_location = None;
        let mut touchpoint_id = None;
        let mut touchpoint_version = Version::empty();
        let mut update_id = None;
        let mut update_range = VersionRange::any();
        let mut update_severity = 0;
        let mut update_description = None;
        let mut artifacts = Vec::new();
        let mut properties = Properties::new();
        let mut host = Vec::new();
        let mut provides = Vec::new();
        let mut requires = Vec::new();
        let mut licenses = Vec::new();
        let mut instructions = Vec::new();

        while let Some(token) = self.at_prefix(prefix) {
            let nested = |sub: &str| format!("{prefix}{sub}");
            match token {
                "id" => id = Some(self.value()),
                "version" => version = self.version_value()?,
                "singleton" => singleton = self.bool_value(),
                "filter" => filter = Some(self.value().to_owned()),
                "copyright" => copyright = Some(self.value()),
                "copyright.location" => copyright_location = Some(self.value()),
                "touchpoint.id" => touchpoint_id = Some(self.value()),
                "touchpoint.version" => touchpoint_version = self.version_value()?,
                "update.id" => update_id = Some(self.value()),
                "update.range" => update_range = self.range_value()?,
                "update.severity" => {
                    update_severity = self
                        .value()
                        .parse()
                        .map_err(|_| MetadataError::InvalidSeverity(self.value().to_owned()))?;
                }
                "update.description" => update_description = Some(self.value().to_owned()),
                t if t.starts_with(HOST_REQUIREMENTS_PREFIX) => {
                    self.parse_requires(&nested(HOST_REQUIREMENTS_PREFIX), &mut host)?;
                    continue;
                }
                t if t.starts_with(ARTIFACTS_PREFIX) => {
                    self.parse_artifacts(&nested(ARTIFACTS_PREFIX), &mut artifacts)?;
                    continue;
                }
                t if t.starts_with(LICENSES_PREFIX) => {
                    self.parse_licenses(&nested(LICENSES_PREFIX), &mut licenses)?;
                    continue;
                }
                t if t.starts_with(PROPERTIES_PREFIX) => {
                    self.parse_properties(&nested(PROPERTIES_PREFIX), &mut properties)?;
                    continue;
                }
                t if t.starts_with(PROVIDES_PREFIX) => {
                    self.parse_provides(&nested(PROVIDES_PREFIX), &mut provides)?;
                    continue;
                }
                t if t.starts_with(REQUIRES_PREFIX) => {
                    self.parse_requires(&nested(REQUIRES_PREFIX), &mut requires)?;
                    continue;
                }
                t if t.starts_with(INSTRUCTIONS_PREFIX) => {
                    self.parse_instructions(&nested(INSTRUCTIONS_PREFIX), &mut instructions)?;
                    continue;
                }
                _ => {}
            }
            self.advance();
        }

        let mut description = if host.is_empty() {
            UnitDescription::new()
        } else {
            let mut fragment = UnitDescription::fragment();
            fragment.set_host(host)?;
            fragment
        };
        if let Some(id) = id {
            description.set_id(id);
        }
        description
            .set_version(version)
            .set_singleton(singleton)
            .set_filter(filter)
            .set_licenses(licenses)
            .set_artifacts(artifacts)
            .set_provided(provides)
            .set_requirements(requires);
        if copyright.is_some() || copyright_location.is_some() {
            description.set_copyright(Some(Copyright::new(
                copyright.unwrap_or_default(),
                copyright_location,
            )?));
        }
        if let Some(touchpoint_id) = touchpoint_id {
            let touchpoint = match self.interner {
                Some(interner) => interner.intern(touchpoint_id, touchpoint_version),
                None => TouchpointType::new(touchpoint_id, touchpoint_version),
            };
            description.set_touchpoint_type(touchpoint);
        }
        if let Some(update_id) = update_id {
            description.set_update_descriptor(Some(UpdateDescriptor::new(
                update_id,
                update_range,
                update_severity,
                update_description,
            )));
        }
        for (key, value) in properties.iter() {
            description.set_property(key, value);
        }
        if !instructions.is_empty() {
            description.add_touchpoint_data(TouchpointData::new(instructions));
        }
        Ok(description)
    }
}

fn missing(item: &str, field: &'static str) -> MetadataError {
    MetadataError::MissingField {
        key: item.trim_end_matches('.').to_owned(),
        field,
    }
}
