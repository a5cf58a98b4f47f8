//! XML serialization of profile snapshots.
//!
//! ```xml
//! <?xml version='1.0' encoding='UTF-8'?>
//! <profile id="SDK" timestamp="1700000000000" parentId="base">
//!   <properties size="1">
//!     <property name="installFolder" value="/opt/sdk"/>
//!   </properties>
//!   <installableUnits size="1">
//!     <unit id="org.example.core" version="1.0.0" singleton="false">...</unit>
//!   </installableUnits>
//!   <installableUnitsProperties size="1">
//!     <unit id="org.example.core" version="1.0.0">
//!       <properties size="1">...</properties>
//!     </unit>
//!   </installableUnitsProperties>
//! </profile>
//! ```
//!
//! Units are written sorted by `(id, version)`. Only members with a non-empty
//! installation property bag appear under `installableUnitsProperties`.
//! Instruction, license and copyright bodies are stored as `body` attributes
//! so their whitespace survives a round trip.

use crate::{Profile, StoreError};
use provisio_metadata::{
    ArtifactKey, Copyright, InstallableUnit, License, ProfileId, Properties, ProvidedCapability,
    RequiredCapability, RequirementChange, TouchpointData, TouchpointInstruction, TouchpointType,
    TouchpointTypeInterner, UnitDescription, UnitKey, UnitKind, UpdateDescriptor, Version,
    VersionRange,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

const XML_DECLARATION: &str = "<?xml version='1.0' encoding='UTF-8'?>\n";
const ROOT_ELEMENT: &str = "profile";
const KIND_FRAGMENT: &str = "fragment";
const KIND_PATCH: &str = "patch";

#[derive(Debug, Serialize, Deserialize)]
struct ProfileXml {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@timestamp")]
    timestamp: i64,
    #[serde(rename = "@parentId", default, skip_serializing_if = "Option::is_none")]
    parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    properties: Option<PropertiesXml>,
    #[serde(rename = "installableUnits", default, skip_serializing_if = "Option::is_none")]
    units: Option<UnitsXml>,
    #[serde(
        rename = "installableUnitsProperties",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    unit_properties: Option<UnitPropertiesListXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PropertiesXml {
    #[serde(rename = "@size")]
    size: usize,
    #[serde(rename = "property", default)]
    entries: Vec<PropertyXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PropertyXml {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@value")]
    value: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct UnitsXml {
    #[serde(rename = "@size")]
    size: usize,
    #[serde(rename = "unit", default)]
    units: Vec<UnitXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct UnitXml {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@version")]
    version: String,
    #[serde(rename = "@singleton", default)]
    singleton: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kind: Option<KindXml>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    update: Option<UpdateXml>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    properties: Option<PropertiesXml>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    provides: Option<ProvidesXml>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    requires: Option<RequiresXml>,
    #[serde(rename = "metaRequirements", default, skip_serializing_if = "Option::is_none")]
    meta_requires: Option<RequiresXml>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    artifacts: Option<ArtifactsXml>,
    touchpoint: TouchpointXml,
    #[serde(rename = "touchpointData", default, skip_serializing_if = "Option::is_none")]
    touchpoint_data: Option<TouchpointDataListXml>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    licenses: Option<LicensesXml>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    copyright: Option<TextXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct KindXml {
    #[serde(rename = "@type")]
    kind: String,
    #[serde(rename = "hostRequirements", default, skip_serializing_if = "Option::is_none")]
    host: Option<RequiresXml>,
    #[serde(rename = "scope", default)]
    scope: Vec<RequiresXml>,
    #[serde(rename = "lifeCycle", default, skip_serializing_if = "Option::is_none")]
    lifecycle: Option<RequiredXml>,
    #[serde(rename = "change", default)]
    changes: Vec<ChangeXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChangeXml {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    from: Option<RequiredXml>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    to: Option<RequiredXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct UpdateXml {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@range")]
    range: String,
    #[serde(rename = "@severity")]
    severity: i32,
    #[serde(rename = "@description", default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ProvidesXml {
    #[serde(rename = "@size")]
    size: usize,
    #[serde(rename = "provided", default)]
    entries: Vec<ProvidedXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ProvidedXml {
    #[serde(rename = "@namespace")]
    namespace: String,
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@version")]
    version: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct RequiresXml {
    #[serde(rename = "@size")]
    size: usize,
    #[serde(rename = "required", default)]
    entries: Vec<RequiredXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RequiredXml {
    #[serde(rename = "@namespace")]
    namespace: String,
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@range")]
    range: String,
    #[serde(rename = "@optional", default)]
    optional: bool,
    #[serde(rename = "@multiple", default)]
    multiple: bool,
    #[serde(rename = "@greedy", default = "default_greedy")]
    greedy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filter: Option<String>,
}

fn default_greedy() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactsXml {
    #[serde(rename = "@size")]
    size: usize,
    #[serde(rename = "artifact", default)]
    entries: Vec<ArtifactXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactXml {
    #[serde(rename = "@classifier")]
    classifier: String,
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@version")]
    version: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct TouchpointXml {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@version")]
    version: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct TouchpointDataListXml {
    #[serde(rename = "@size")]
    size: usize,
    #[serde(rename = "instructions", default)]
    blocks: Vec<InstructionsXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct InstructionsXml {
    #[serde(rename = "@size")]
    size: usize,
    #[serde(rename = "instruction", default)]
    entries: Vec<InstructionXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct InstructionXml {
    #[serde(rename = "@key")]
    key: String,
    #[serde(rename = "@import", default, skip_serializing_if = "Option::is_none")]
    import: Option<String>,
    #[serde(rename = "@body", default)]
    body: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct LicensesXml {
    #[serde(rename = "@size")]
    size: usize,
    #[serde(rename = "license", default)]
    entries: Vec<TextXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TextXml {
    #[serde(rename = "@uri", default, skip_serializing_if = "Option::is_none")]
    uri: Option<String>,
    #[serde(rename = "@body", default)]
    body: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct UnitPropertiesListXml {
    #[serde(rename = "@size")]
    size: usize,
    #[serde(rename = "unit", default)]
    units: Vec<UnitPropertiesXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct UnitPropertiesXml {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@version")]
    version: String,
    properties: PropertiesXml,
}

/// Render a profile snapshot as an XML document.
pub fn profile_to_xml(profile: &Profile) -> Result<String, StoreError> {
    let doc = ProfileXml {
        id: profile.id().to_string(),
        timestamp: profile.timestamp(),
        parent_id: profile.parent_id().map(ToString::to_string),
        properties: properties_xml(profile.properties()),
        units: (!profile.is_empty()).then(|| UnitsXml {
            size: profile.len(),
            units: profile.units().map(|u| unit_xml(u)).collect(),
        }),
        unit_properties: (!profile.is_empty()).then(|| {
            let units: Vec<_> = profile
                .units_with_properties()
                .map(|(key, props)| UnitPropertiesXml {
                    id: key.id.to_string(),
                    version: key.version.to_string(),
                    properties: properties_block(props),
                })
                .collect();
            UnitPropertiesListXml {
                size: units.len(),
                units,
            }
        }),
    };

    let mut out = String::from(XML_DECLARATION);
    let mut ser = quick_xml::se::Serializer::with_root(&mut out, Some(ROOT_ELEMENT))
        .map_err(|e| StoreError::Xml(e.to_string()))?;
    ser.indent(' ', 2);
    doc.serialize(ser)
        .map_err(|e| StoreError::Xml(e.to_string()))?;
    out.push('\n');
    Ok(out)
}

/// Parse an XML snapshot. Touchpoint types are interned through `interner`
/// when one is given.
pub fn profile_from_xml(
    xml: &str,
    interner: Option<&TouchpointTypeInterner>,
) -> Result<Profile, StoreError> {
    let doc: ProfileXml =
        quick_xml::de::from_str(xml).map_err(|e| StoreError::Xml(e.to_string()))?;

    let mut profile = Profile::new(doc.id);
    profile.set_timestamp(doc.timestamp);
    profile.set_parent_id(doc.parent_id.map(ProfileId::from));
    if let Some(props) = doc.properties {
        for entry in props.entries {
            profile.set_property(entry.name, entry.value);
        }
    }
    if let Some(units) = doc.units {
        for unit in units.units {
            profile.add_unit(Arc::new(unit_from_xml(unit, interner)?));
        }
    }
    if let Some(list) = doc.unit_properties {
        for entry in list.units {
            let key = UnitKey::new(entry.id, Version::parse(&entry.version)?);
            for prop in entry.properties.entries {
                if let Err(e) = profile.set_unit_property(&key, prop.name, prop.value) {
                    warn!("dropping installation property in snapshot: {e}");
                }
            }
        }
    }
    Ok(profile)
}

fn properties_block(props: &Properties) -> PropertiesXml {
    PropertiesXml {
        size: props.len(),
        entries: props
            .iter()
            .map(|(name, value)| PropertyXml {
                name: name.to_owned(),
                value: value.to_owned(),
            })
            .collect(),
    }
}

fn properties_xml(props: &Properties) -> Option<PropertiesXml> {
    (!props.is_empty()).then(|| properties_block(props))
}

fn required_xml(req: &RequiredCapability) -> RequiredXml {
    RequiredXml {
        namespace: req.namespace().to_owned(),
        name: req.name().to_owned(),
        range: req.range().to_string(),
        optional: req.is_optional(),
        multiple: req.is_multiple(),
        greedy: req.is_greedy(),
        filter: req.filter().map(str::to_owned),
    }
}

fn requires_xml(reqs: &[RequiredCapability]) -> Option<RequiresXml> {
    (!reqs.is_empty()).then(|| RequiresXml {
        size: reqs.len(),
        entries: reqs.iter().map(required_xml).collect(),
    })
}

fn kind_xml(kind: &UnitKind) -> Option<KindXml> {
    match kind {
        UnitKind::Plain => None,
        UnitKind::Fragment { host } => Some(KindXml {
            kind: KIND_FRAGMENT.to_owned(),
            host: requires_xml(host),
            scope: Vec::new(),
            lifecycle: None,
            changes: Vec::new(),
        }),
        UnitKind::Patch {
            applicability_scope,
            lifecycle,
            requirement_changes,
        } => Some(KindXml {
            kind: KIND_PATCH.to_owned(),
            host: None,
            scope: applicability_scope
                .iter()
                .map(|reqs| RequiresXml {
                    size: reqs.len(),
                    entries: reqs.iter().map(required_xml).collect(),
                })
                .collect(),
            lifecycle: lifecycle.as_ref().map(required_xml),
            changes: requirement_changes
                .iter()
                .map(|change| ChangeXml {
                    from: change.apply_on().map(required_xml),
                    to: change.new_value().map(required_xml),
                })
                .collect(),
        }),
    }
}

fn unit_xml(unit: &InstallableUnit) -> UnitXml {
    UnitXml {
        id: unit.id().to_string(),
        version: unit.version().to_string(),
        singleton: unit.is_singleton(),
        kind: kind_xml(unit.kind()),
        update: unit.update_descriptor().map(|u| UpdateXml {
            id: u.id().to_string(),
            range: u.range().to_string(),
            severity: u.severity(),
            description: u.description().map(str::to_owned),
        }),
        properties: properties_xml(unit.properties()),
        provides: (!unit.provided_capabilities().is_empty()).then(|| ProvidesXml {
            size: unit.provided_capabilities().len(),
            entries: unit
                .provided_capabilities()
                .iter()
                .map(|cap| ProvidedXml {
                    namespace: cap.namespace().to_owned(),
                    name: cap.name().to_owned(),
                    version: cap.version().to_string(),
                })
                .collect(),
        }),
        requires: requires_xml(unit.requirements()),
        meta_requires: requires_xml(unit.meta_requirements()),
        filter: unit.filter().map(str::to_owned),
        artifacts: (!unit.artifacts().is_empty()).then(|| ArtifactsXml {
            size: unit.artifacts().len(),
            entries: unit
                .artifacts()
                .iter()
                .map(|a| ArtifactXml {
                    classifier: a.classifier().to_owned(),
                    id: a.id().to_owned(),
                    version: a.version().to_string(),
                })
                .collect(),
        }),
        touchpoint: TouchpointXml {
            id: unit.touchpoint_type().id().to_owned(),
            version: unit.touchpoint_type().version().to_string(),
        },
        touchpoint_data: (!unit.touchpoint_data().is_empty()).then(|| TouchpointDataListXml {
            size: unit.touchpoint_data().len(),
            blocks: unit
                .touchpoint_data()
                .iter()
                .map(|data| InstructionsXml {
                    size: data.len(),
                    entries: data
                        .iter()
                        .map(|(key, instruction)| InstructionXml {
                            key: key.to_owned(),
                            import: instruction.import().map(str::to_owned),
                            body: instruction.body().to_owned(),
                        })
                        .collect(),
                })
                .collect(),
        }),
        licenses: (!unit.licenses().is_empty()).then(|| LicensesXml {
            size: unit.licenses().len(),
            entries: unit
                .licenses()
                .iter()
                .map(|l| TextXml {
                    uri: l.location().map(str::to_owned),
                    body: l.body().to_owned(),
                })
                .collect(),
        }),
        copyright: unit.copyright().map(|c| TextXml {
            uri: c.location().map(str::to_owned),
            body: c.body().to_owned(),
        }),
    }
}

fn required_from_xml(xml: RequiredXml) -> Result<RequiredCapability, StoreError> {
    Ok(
        RequiredCapability::new(xml.namespace, xml.name, VersionRange::parse(&xml.range)?)
            .with_filter(xml.filter)
            .with_optional(xml.optional)
            .with_multiple(xml.multiple)
            .with_greedy(xml.greedy),
    )
}

fn requires_from_xml(xml: Option<RequiresXml>) -> Result<Vec<RequiredCapability>, StoreError> {
    xml.map_or_else(Vec::new, |r| r.entries)
        .into_iter()
        .map(required_from_xml)
        .collect()
}

fn description_for_kind(kind: Option<KindXml>) -> Result<UnitDescription, StoreError> {
    let Some(kind) = kind else {
        return Ok(UnitDescription::new());
    };
    match kind.kind.as_str() {
        KIND_FRAGMENT => {
            let mut d = UnitDescription::fragment();
            d.set_host(requires_from_xml(kind.host)?)?;
            Ok(d)
        }
        KIND_PATCH => {
            let mut d = UnitDescription::patch();
            let scope = kind
                .scope
                .into_iter()
                .map(|reqs| requires_from_xml(Some(reqs)))
                .collect::<Result<Vec<_>, _>>()?;
            let lifecycle = kind.lifecycle.map(required_from_xml).transpose()?;
            let changes = kind
                .changes
                .into_iter()
                .map(|c| -> Result<RequirementChange, StoreError> {
                    let from = c.from.map(required_from_xml).transpose()?;
                    let to = c.to.map(required_from_xml).transpose()?;
                    Ok(RequirementChange::new(from, to)?)
                })
                .collect::<Result<Vec<_>, StoreError>>()?;
            d.set_applicability_scope(scope)?;
            d.set_lifecycle(lifecycle)?;
            d.set_requirement_changes(changes)?;
            Ok(d)
        }
        other => Err(StoreError::Xml(format!("unknown unit kind '{other}'"))),
    }
}

fn unit_from_xml(
    xml: UnitXml,
    interner: Option<&TouchpointTypeInterner>,
) -> Result<InstallableUnit, StoreError> {
    let mut d = description_for_kind(xml.kind)?;
    d.set_id(xml.id)
        .set_version(Version::parse(&xml.version)?)
        .set_singleton(xml.singleton)
        .set_filter(xml.filter)
        .set_requirements(requires_from_xml(xml.requires)?)
        .set_meta_requirements(requires_from_xml(xml.meta_requires)?);

    if let Some(props) = xml.properties {
        for entry in props.entries {
            d.set_property(entry.name, entry.value);
        }
    }
    if let Some(provides) = xml.provides {
        let caps = provides
            .entries
            .into_iter()
            .map(|p| -> Result<ProvidedCapability, StoreError> {
                Ok(ProvidedCapability::new(
                    p.namespace,
                    p.name,
                    Version::parse(&p.version)?,
                ))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        d.set_provided(caps);
    }
    if let Some(artifacts) = xml.artifacts {
        let keys = artifacts
            .entries
            .into_iter()
            .map(|a| -> Result<ArtifactKey, StoreError> {
                Ok(ArtifactKey::new(a.classifier, a.id, Version::parse(&a.version)?))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        d.set_artifacts(keys);
    }

    let touchpoint_version = Version::parse(&xml.touchpoint.version)?;
    d.set_touchpoint_type(match interner {
        Some(interner) => interner.intern(&xml.touchpoint.id, touchpoint_version),
        None => TouchpointType::new(&xml.touchpoint.id, touchpoint_version),
    });
    if let Some(list) = xml.touchpoint_data {
        for block in list.blocks {
            d.add_touchpoint_data(TouchpointData::new(block.entries.into_iter().map(|i| {
                (i.key, TouchpointInstruction::new(i.body, i.import))
            })));
        }
    }

    if let Some(update) = xml.update {
        d.set_update_descriptor(Some(UpdateDescriptor::new(
            update.id,
            VersionRange::parse(&update.range)?,
            update.severity,
            update.description,
        )));
    }
    if let Some(licenses) = xml.licenses {
        let licenses = licenses
            .entries
            .into_iter()
            .map(|l| License::new(l.body, l.uri.as_deref()))
            .collect::<Result<Vec<_>, _>>()?;
        d.set_licenses(licenses);
    }
    if let Some(c) = xml.copyright {
        d.set_copyright(Some(Copyright::new(c.body, c.uri.as_deref())?));
    }

    Ok(d.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use provisio_metadata::PROP_TYPE_FRAGMENT;

    fn simple(id: &str, version: &str) -> Arc<InstallableUnit> {
        let mut d = UnitDescription::new();
        d.set_id(id).set_version(Version::parse(version).unwrap());
        Arc::new(d.build().unwrap())
    }

    fn rich_unit() -> Arc<InstallableUnit> {
        let mut d = UnitDescription::new();
        d.set_id("org.example.core")
            .set_version(Version::parse("1.2.3.v2024").unwrap())
            .set_singleton(true)
            .set_filter(Some("(os=linux)".to_owned()))
            .set_property("org.example.name", "Core & <Tools>")
            .add_provided(ProvidedCapability::new(
                "osgi.bundle",
                "org.example.core",
                Version::parse("1.2.3.v2024").unwrap(),
            ))
            .add_requirement(
                RequiredCapability::new(
                    "osgi.bundle",
                    "org.example.base",
                    VersionRange::parse("[1.0.0,2.0.0)").unwrap(),
                )
                .with_optional(true)
                .with_greedy(false)
                .with_filter(Some("(arch=x86_64)".to_owned())),
            )
            .set_artifacts(vec![ArtifactKey::new(
                "osgi.bundle",
                "org.example.core",
                Version::parse("1.2.3.v2024").unwrap(),
            )])
            .set_touchpoint_type(TouchpointType::new("native", Version::new(1, 0, 0)))
            .add_touchpoint_data(TouchpointData::new([
                (
                    "install",
                    TouchpointInstruction::new(
                        "mkdir(path:${installFolder}/core);",
                        Some("org.example.mkdir".to_owned()),
                    ),
                ),
                ("uninstall", TouchpointInstruction::new("rmdir(path:x);", None)),
            ]))
            .set_update_descriptor(Some(UpdateDescriptor::new(
                "org.example.core",
                VersionRange::parse("[0.0.0,1.2.3.v2024)").unwrap(),
                0,
                Some("update".to_owned()),
            )))
            .set_licenses(vec![License::new("EPL", Some("http://example.org/epl")).unwrap()])
            .set_copyright(Some(Copyright::new("(c) Example", None).unwrap()));
        Arc::new(d.build().unwrap())
    }

    fn fragment_unit() -> Arc<InstallableUnit> {
        let mut d = UnitDescription::fragment();
        d.set_id("org.example.core.config")
            .set_version(Version::new(1, 0, 0))
            .set_host(vec![RequiredCapability::new(
                "osgi.bundle",
                "org.example.core",
                VersionRange::any(),
            )])
            .unwrap();
        Arc::new(d.build().unwrap())
    }

    fn sample_profile() -> Profile {
        let mut profile = Profile::new("SDK");
        profile.set_timestamp(1_700_000_000_000);
        profile.set_parent_id(Some(ProfileId::from("base")));
        profile.set_property("installFolder", "/opt/sdk");
        profile.set_property("cacheFolder", "/var/cache/sdk");
        let core = rich_unit();
        let key = core.key();
        profile.add_unit(core);
        profile.add_unit(fragment_unit());
        profile.add_unit(simple("org.example.bare", "2.0.0"));
        profile.set_unit_property(&key, "startLevel", "4").unwrap();
        profile
    }

    #[test]
    fn roundtrip_preserves_profile() {
        let profile = sample_profile();
        let xml = profile_to_xml(&profile).unwrap();
        assert!(xml.starts_with("<?xml"));
        let back = profile_from_xml(&xml, None).unwrap();
        assert_eq!(back, profile);
        assert_eq!(back.parent_id().map(|p| p.as_str()), Some("base"));
        let keys: Vec<_> = back.properties().keys().collect();
        assert_eq!(keys, ["installFolder", "cacheFolder"]);
    }

    #[test]
    fn roundtrip_preserves_unit_metadata() {
        let profile = sample_profile();
        let back = profile_from_xml(&profile_to_xml(&profile).unwrap(), None).unwrap();
        let original = rich_unit();
        let u = back.unit(&original.key()).unwrap();

        assert!(u.is_singleton());
        assert_eq!(u.filter(), Some("(os=linux)"));
        assert_eq!(u.property("org.example.name"), Some("Core & <Tools>"));
        assert_eq!(u.provided_capabilities(), original.provided_capabilities());
        assert_eq!(u.requirements(), original.requirements());
        assert_eq!(u.artifacts(), original.artifacts());
        assert_eq!(u.touchpoint_type(), original.touchpoint_type());
        assert_eq!(u.touchpoint_data(), original.touchpoint_data());
        assert_eq!(u.update_descriptor(), original.update_descriptor());
        assert_eq!(u.licenses(), original.licenses());
        assert_eq!(u.copyright(), original.copyright());

        let frag = back.unit(&fragment_unit().key()).unwrap();
        assert!(frag.is_fragment());
        assert_eq!(frag.host().len(), 1);
        assert_eq!(frag.property(PROP_TYPE_FRAGMENT), Some("true"));
    }

    #[test]
    fn unit_properties_block_lists_only_non_empty_bags() {
        let profile = sample_profile();
        let xml = profile_to_xml(&profile).unwrap();
        let doc: ProfileXml = quick_xml::de::from_str(&xml).unwrap();
        let list = doc.unit_properties.unwrap();
        assert_eq!(list.size, 1);
        assert_eq!(list.units[0].id, "org.example.core");

        let back = profile_from_xml(&xml, None).unwrap();
        assert_eq!(back.units_with_properties().count(), 1);
    }

    #[test]
    fn units_are_written_sorted() {
        let profile = sample_profile();
        let xml = profile_to_xml(&profile).unwrap();
        let doc: ProfileXml = quick_xml::de::from_str(&xml).unwrap();
        let ids: Vec<_> = doc.units.unwrap().units.into_iter().map(|u| u.id).collect();
        assert_eq!(
            ids,
            ["org.example.bare", "org.example.core", "org.example.core.config"]
        );
    }

    #[test]
    fn patch_roundtrip() {
        let target = RequiredCapability::new("osgi.bundle", "target", VersionRange::any());
        let mut d = UnitDescription::patch();
        d.set_id("org.example.patch")
            .set_version(Version::new(1, 0, 0))
            .set_applicability_scope(vec![vec![target.clone()]])
            .unwrap()
            .set_lifecycle(Some(target.clone()))
            .unwrap()
            .set_requirement_changes(vec![RequirementChange::new(
                Some(target.clone()),
                Some(RequiredCapability::new(
                    "osgi.bundle",
                    "target",
                    VersionRange::parse("2.0.0").unwrap(),
                )),
            )
            .unwrap()])
            .unwrap();
        let patch = Arc::new(d.build().unwrap());

        let mut profile = Profile::new("p");
        profile.add_unit(Arc::clone(&patch));
        let back = profile_from_xml(&profile_to_xml(&profile).unwrap(), None).unwrap();
        let u = back.unit(&patch.key()).unwrap();
        assert_eq!(u.kind(), patch.kind());
    }

    #[test]
    fn empty_profile_roundtrip() {
        let profile = Profile::new("empty");
        let xml = profile_to_xml(&profile).unwrap();
        assert!(!xml.contains("installableUnits"));
        let back = profile_from_xml(&xml, None).unwrap();
        assert_eq!(back, profile);
    }

    #[test]
    fn interner_is_used_on_load() {
        let interner = TouchpointTypeInterner::new();
        let xml = profile_to_xml(&sample_profile()).unwrap();
        let back = profile_from_xml(&xml, Some(&interner)).unwrap();
        let native = interner.intern("native", Version::new(1, 0, 0));
        let core = back
            .units()
            .find(|u| u.id().as_str() == "org.example.core")
            .unwrap();
        assert!(core.touchpoint_type().shares_representation(&native));
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(matches!(
            profile_from_xml("<profile id=", None),
            Err(StoreError::Xml(_))
        ));
    }
}
