//! Reversible units of work and the bookkeeping actions phases contribute.

use crate::status::Status;
use provisio_metadata::{InstallableUnit, Properties, UnitKey};
use provisio_store::Profile;
use std::sync::Arc;

/// What an action sees while it runs or is undone.
pub struct ActionContext<'a> {
    pub phase_id: &'a str,
    /// The session's staged copy of the profile.
    pub profile: &'a mut Profile,
}

/// An atomic, reversible unit of work.
///
/// `undo` is only called after `execute` has been called, including when
/// `execute` failed part way, so implementations must tolerate undoing a
/// partial effect.
pub trait Action: Send {
    fn id(&self) -> &str;
    fn execute(&mut self, ctx: &mut ActionContext<'_>) -> Status;
    fn undo(&mut self, ctx: &mut ActionContext<'_>) -> Status;
}

/// Adds a unit to the staged profile.
pub struct AddUnitAction {
    unit: Arc<InstallableUnit>,
    added: bool,
}

impl AddUnitAction {
    pub fn new(unit: Arc<InstallableUnit>) -> Self {
        Self { unit, added: false }
    }
}

impl Action for AddUnitAction {
    fn id(&self) -> &str {
        "addUnit"
    }

    fn execute(&mut self, ctx: &mut ActionContext<'_>) -> Status {
        self.added = ctx.profile.add_unit(Arc::clone(&self.unit));
        if self.added {
            Status::ok()
        } else {
            Status::warning(format!("{} is already installed", self.unit.key()))
        }
    }

    fn undo(&mut self, ctx: &mut ActionContext<'_>) -> Status {
        if self.added {
            ctx.profile.remove_unit(&self.unit.key());
            self.added = false;
        }
        Status::ok()
    }
}

/// Removes a unit and its installation properties from the staged profile.
pub struct RemoveUnitAction {
    key: UnitKey,
    removed: Option<(Arc<InstallableUnit>, Properties)>,
}

impl RemoveUnitAction {
    pub fn new(key: UnitKey) -> Self {
        Self { key, removed: None }
    }
}

impl Action for RemoveUnitAction {
    fn id(&self) -> &str {
        "removeUnit"
    }

    fn execute(&mut self, ctx: &mut ActionContext<'_>) -> Status {
        self.removed = ctx.profile.remove_unit(&self.key);
        match self.removed {
            Some(_) => Status::ok(),
            None => Status::warning(format!("{} is not installed", self.key)),
        }
    }

    fn undo(&mut self, ctx: &mut ActionContext<'_>) -> Status {
        let Some((unit, properties)) = self.removed.take() else {
            return Status::ok();
        };
        ctx.profile.add_unit(unit);
        let mut status = Status::ok();
        for (name, value) in properties.iter() {
            if let Err(e) = ctx.profile.set_unit_property(&self.key, name, value) {
                status.add(Status::warning(format!(
                    "could not restore {name} on {}: {e}",
                    self.key
                )));
            }
        }
        status
    }
}

/// Sets (`Some`) or removes (`None`) a profile property.
pub struct SetPropertyAction {
    key: String,
    value: Option<String>,
    previous: Option<Option<String>>,
}

impl SetPropertyAction {
    pub fn new(key: impl Into<String>, value: Option<String>) -> Self {
        Self {
            key: key.into(),
            value,
            previous: None,
        }
    }
}

impl Action for SetPropertyAction {
    fn id(&self) -> &str {
        "setProperty"
    }

    fn execute(&mut self, ctx: &mut ActionContext<'_>) -> Status {
        let previous = match &self.value {
            Some(v) => ctx.profile.set_property(self.key.clone(), v.clone()),
            None => ctx.profile.remove_property(&self.key),
        };
        self.previous = Some(previous);
        Status::ok()
    }

    fn undo(&mut self, ctx: &mut ActionContext<'_>) -> Status {
        match self.previous.take() {
            Some(Some(old)) => {
                ctx.profile.set_property(self.key.clone(), old);
            }
            Some(None) => {
                ctx.profile.remove_property(&self.key);
            }
            None => {}
        }
        Status::ok()
    }
}

/// Sets (`Some`) or removes (`None`) an installation property of a member.
pub struct SetUnitPropertyAction {
    unit: UnitKey,
    key: String,
    value: Option<String>,
    previous: Option<Option<String>>,
}

impl SetUnitPropertyAction {
    pub fn new(unit: UnitKey, key: impl Into<String>, value: Option<String>) -> Self {
        Self {
            unit,
            key: key.into(),
            value,
            previous: None,
        }
    }
}

impl Action for SetUnitPropertyAction {
    fn id(&self) -> &str {
        "setUnitProperty"
    }

    fn execute(&mut self, ctx: &mut ActionContext<'_>) -> Status {
        let previous = match &self.value {
            Some(v) => match ctx.profile.set_unit_property(&self.unit, self.key.clone(), v.clone())
            {
                Ok(previous) => previous,
                Err(e) => return Status::error(e.to_string()),
            },
            None => ctx.profile.remove_unit_property(&self.unit, &self.key),
        };
        self.previous = Some(previous);
        Status::ok()
    }

    fn undo(&mut self, ctx: &mut ActionContext<'_>) -> Status {
        match self.previous.take() {
            Some(Some(old)) => {
                if let Err(e) = ctx.profile.set_unit_property(&self.unit, self.key.clone(), old) {
                    return Status::warning(e.to_string());
                }
            }
            Some(None) => {
                ctx.profile.remove_unit_property(&self.unit, &self.key);
            }
            None => {}
        }
        Status::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provisio_metadata::{UnitDescription, Version};

    fn unit(id: &str) -> Arc<InstallableUnit> {
        let mut desc = UnitDescription::new();
        desc.set_id(id).set_version(Version::new(1, 0, 0));
        Arc::new(desc.build().unwrap())
    }

    fn ctx(profile: &mut Profile) -> ActionContext<'_> {
        ActionContext {
            phase_id: "test",
            profile,
        }
    }

    #[test]
    fn add_unit_and_undo() {
        let mut profile = Profile::new("p");
        let mut action = AddUnitAction::new(unit("a"));
        assert!(action.execute(&mut ctx(&mut profile)).is_ok());
        assert_eq!(profile.len(), 1);
        assert!(action.undo(&mut ctx(&mut profile)).is_ok());
        assert!(profile.is_empty());
    }

    #[test]
    fn add_existing_unit_is_warning_and_undo_keeps_it() {
        let mut profile = Profile::new("p");
        profile.add_unit(unit("a"));
        let mut action = AddUnitAction::new(unit("a"));
        assert_eq!(
            action.execute(&mut ctx(&mut profile)).severity(),
            crate::Severity::Warning
        );
        action.undo(&mut ctx(&mut profile));
        assert_eq!(profile.len(), 1);
    }

    #[test]
    fn remove_unit_restores_installation_properties() {
        let mut profile = Profile::new("p");
        let a = unit("a");
        profile.add_unit(a.clone());
        profile.set_unit_property(&a.key(), "startLevel", "4").unwrap();

        let mut action = RemoveUnitAction::new(a.key());
        assert!(action.execute(&mut ctx(&mut profile)).is_ok());
        assert!(profile.is_empty());
        assert!(profile.unit_properties(&a.key()).is_none());

        assert!(action.undo(&mut ctx(&mut profile)).is_ok());
        assert!(profile.contains(&a));
        assert_eq!(profile.unit_property(&a.key(), "startLevel"), Some("4"));
    }

    #[test]
    fn set_property_undo_restores_previous() {
        let mut profile = Profile::new("p");
        profile.set_property("k", "old");

        let mut set = SetPropertyAction::new("k", Some("new".into()));
        set.execute(&mut ctx(&mut profile));
        assert_eq!(profile.property("k"), Some("new"));
        set.undo(&mut ctx(&mut profile));
        assert_eq!(profile.property("k"), Some("old"));

        let mut remove = SetPropertyAction::new("k", None);
        remove.execute(&mut ctx(&mut profile));
        assert_eq!(profile.property("k"), None);
        remove.undo(&mut ctx(&mut profile));
        assert_eq!(profile.property("k"), Some("old"));
    }

    #[test]
    fn unit_property_on_non_member_fails() {
        let mut profile = Profile::new("p");
        let mut action =
            SetUnitPropertyAction::new(unit("ghost").key(), "k", Some("v".to_owned()));
        assert!(action.execute(&mut ctx(&mut profile)).is_fatal());
    }

    #[test]
    fn unit_property_set_and_undo() {
        let mut profile = Profile::new("p");
        let a = unit("a");
        profile.add_unit(a.clone());
        let mut action = SetUnitPropertyAction::new(a.key(), "k", Some("v".to_owned()));
        assert!(action.execute(&mut ctx(&mut profile)).is_ok());
        assert_eq!(profile.unit_property(&a.key(), "k"), Some("v"));
        action.undo(&mut ctx(&mut profile));
        assert!(profile.unit_properties(&a.key()).is_none());
    }
}
