//! Requested transitions over a profile.

use crate::CoreError;
use provisio_metadata::InstallableUnit;
use std::fmt;
use std::sync::Arc;

/// The kind of change an operand describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Install,
    Uninstall,
    Update,
    /// Before and after are equal; every phase skips the operand.
    None,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Transition::Install => "install",
            Transition::Uninstall => "uninstall",
            Transition::Update => "update",
            Transition::None => "none",
        };
        f.write_str(s)
    }
}

fn transition_of<T: PartialEq>(before: Option<&T>, after: Option<&T>) -> Transition {
    match (before, after) {
        (None, Some(_)) => Transition::Install,
        (Some(_), None) => Transition::Uninstall,
        (Some(a), Some(b)) if a == b => Transition::None,
        (Some(_), Some(_)) => Transition::Update,
        (None, None) => Transition::None,
    }
}

/// `(first, second)` over one logical unit: `first` is what is installed
/// now, `second` what should be installed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitOperand {
    first: Option<Arc<InstallableUnit>>,
    second: Option<Arc<InstallableUnit>>,
}

impl UnitOperand {
    pub fn new(
        first: Option<Arc<InstallableUnit>>,
        second: Option<Arc<InstallableUnit>>,
    ) -> Result<Self, CoreError> {
        if first.is_none() && second.is_none() {
            return Err(CoreError::InvalidArgument(
                "unit operand needs a before or an after unit".to_owned(),
            ));
        }
        Ok(Self { first, second })
    }

    pub fn install(unit: Arc<InstallableUnit>) -> Self {
        Self {
            first: None,
            second: Some(unit),
        }
    }

    pub fn uninstall(unit: Arc<InstallableUnit>) -> Self {
        Self {
            first: Some(unit),
            second: None,
        }
    }

    pub fn update(from: Arc<InstallableUnit>, to: Arc<InstallableUnit>) -> Self {
        Self {
            first: Some(from),
            second: Some(to),
        }
    }

    pub fn first(&self) -> Option<&Arc<InstallableUnit>> {
        self.first.as_ref()
    }

    pub fn second(&self) -> Option<&Arc<InstallableUnit>> {
        self.second.as_ref()
    }

    pub fn transition(&self) -> Transition {
        transition_of(self.first.as_deref(), self.second.as_deref())
    }
}

/// A change to one entry of the profile-wide property bag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyOperand {
    key: String,
    before: Option<String>,
    after: Option<String>,
}

impl PropertyOperand {
    pub fn new(
        key: impl Into<String>,
        before: Option<String>,
        after: Option<String>,
    ) -> Result<Self, CoreError> {
        let key = key.into();
        if key.is_empty() {
            return Err(CoreError::InvalidArgument(
                "property operand needs a key".to_owned(),
            ));
        }
        if before.is_none() && after.is_none() {
            return Err(CoreError::InvalidArgument(format!(
                "property operand {key} needs a before or an after value"
            )));
        }
        Ok(Self { key, before, after })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn before(&self) -> Option<&str> {
        self.before.as_deref()
    }

    pub fn after(&self) -> Option<&str> {
        self.after.as_deref()
    }

    pub fn transition(&self) -> Transition {
        transition_of(self.before.as_ref(), self.after.as_ref())
    }
}

/// A change to one entry of a member unit's installation properties.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitPropertyOperand {
    unit: Arc<InstallableUnit>,
    property: PropertyOperand,
}

impl UnitPropertyOperand {
    pub fn new(
        unit: Arc<InstallableUnit>,
        key: impl Into<String>,
        before: Option<String>,
        after: Option<String>,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            unit,
            property: PropertyOperand::new(key, before, after)?,
        })
    }

    pub fn unit(&self) -> &Arc<InstallableUnit> {
        &self.unit
    }

    pub fn key(&self) -> &str {
        self.property.key()
    }

    pub fn before(&self) -> Option<&str> {
        self.property.before()
    }

    pub fn after(&self) -> Option<&str> {
        self.property.after()
    }

    pub fn transition(&self) -> Transition {
        self.property.transition()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Unit(UnitOperand),
    Property(PropertyOperand),
    UnitProperty(UnitPropertyOperand),
}

impl Operand {
    pub fn transition(&self) -> Transition {
        match self {
            Operand::Unit(op) => op.transition(),
            Operand::Property(op) => op.transition(),
            Operand::UnitProperty(op) => op.transition(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.transition() == Transition::None
    }

    pub fn as_unit(&self) -> Option<&UnitOperand> {
        match self {
            Operand::Unit(op) => Some(op),
            _ => None,
        }
    }
}

impl From<UnitOperand> for Operand {
    fn from(op: UnitOperand) -> Self {
        Operand::Unit(op)
    }
}

impl From<PropertyOperand> for Operand {
    fn from(op: PropertyOperand) -> Self {
        Operand::Property(op)
    }
}

impl From<UnitPropertyOperand> for Operand {
    fn from(op: UnitPropertyOperand) -> Self {
        Operand::UnitProperty(op)
    }
}

fn side(unit: Option<&Arc<InstallableUnit>>) -> String {
    unit.map_or_else(|| "none".to_owned(), |u| u.key().to_string())
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Unit(op) => write!(f, "{} --> {}", side(op.first()), side(op.second())),
            Operand::Property(op) => write!(
                f,
                "property {}: {} --> {}",
                op.key(),
                op.before().unwrap_or("none"),
                op.after().unwrap_or("none")
            ),
            Operand::UnitProperty(op) => write!(
                f,
                "{} property {}: {} --> {}",
                op.unit().key(),
                op.key(),
                op.before().unwrap_or("none"),
                op.after().unwrap_or("none")
            ),
        }
    }
}
