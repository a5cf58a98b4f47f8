use crate::StoreError;
use provisio_metadata::{InstallableUnit, ProfileId, Properties, UnitKey};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A named, timestamped set of installed units.
///
/// Members are unique by `(id, version)` and iterate in that order. Besides
/// the profile-wide property bag, every member carries its own installation
/// properties, which are dropped together with the member.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    id: ProfileId,
    timestamp: i64,
    parent_id: Option<ProfileId>,
    units: BTreeMap<UnitKey, Arc<InstallableUnit>>,
    properties: Properties,
    unit_properties: BTreeMap<UnitKey, Properties>,
}

impl Profile {
    pub fn new(id: impl Into<ProfileId>) -> Self {
        Self {
            id: id.into(),
            timestamp: 0,
            parent_id: None,
            units: BTreeMap::new(),
            properties: Properties::new(),
            unit_properties: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &ProfileId {
        &self.id
    }

    /// Commit time in epoch milliseconds; `0` for a profile never committed.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: i64) {
        self.timestamp = timestamp;
    }

    pub fn parent_id(&self) -> Option<&ProfileId> {
        self.parent_id.as_ref()
    }

    pub fn set_parent_id(&mut self, parent_id: Option<ProfileId>) {
        self.parent_id = parent_id;
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.properties.set(key, value)
    }

    pub fn remove_property(&mut self, key: &str) -> Option<String> {
        self.properties.remove(key)
    }

    pub fn units(&self) -> impl Iterator<Item = &Arc<InstallableUnit>> {
        self.units.values()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn unit(&self, key: &UnitKey) -> Option<&Arc<InstallableUnit>> {
        self.units.get(key)
    }

    pub fn contains(&self, unit: &InstallableUnit) -> bool {
        self.units.contains_key(&unit.key())
    }

    /// Add `unit` as a member. Returns `false` if a unit with the same id and
    /// version was already present, in which case nothing changes.
    pub fn add_unit(&mut self, unit: Arc<InstallableUnit>) -> bool {
        let key = unit.key();
        if self.units.contains_key(&key) {
            return false;
        }
        self.units.insert(key, unit);
        true
    }

    /// Remove a member together with its installation properties.
    pub fn remove_unit(&mut self, key: &UnitKey) -> Option<(Arc<InstallableUnit>, Properties)> {
        let unit = self.units.remove(key)?;
        let properties = self.unit_properties.remove(key).unwrap_or_default();
        Some((unit, properties))
    }

    /// Installation properties of a member; `None` when it has none.
    pub fn unit_properties(&self, key: &UnitKey) -> Option<&Properties> {
        self.unit_properties.get(key).filter(|p| !p.is_empty())
    }

    pub fn unit_property(&self, key: &UnitKey, name: &str) -> Option<&str> {
        self.unit_properties.get(key)?.get(name)
    }

    pub fn set_unit_property(
        &mut self,
        key: &UnitKey,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Option<String>, StoreError> {
        if !self.units.contains_key(key) {
            return Err(StoreError::UnitNotInProfile {
                profile: self.id.to_string(),
                unit: key.to_string(),
            });
        }
        Ok(self
            .unit_properties
            .entry(key.clone())
            .or_default()
            .set(name, value))
    }

    pub fn remove_unit_property(&mut self, key: &UnitKey, name: &str) -> Option<String> {
        let bag = self.unit_properties.get_mut(key)?;
        let previous = bag.remove(name);
        if bag.is_empty() {
            self.unit_properties.remove(key);
        }
        previous
    }

    /// Members with a non-empty installation property bag, in member order.
    pub fn units_with_properties(&self) -> impl Iterator<Item = (&UnitKey, &Properties)> {
        self.unit_properties.iter().filter(|(_, p)| !p.is_empty())
    }
}
