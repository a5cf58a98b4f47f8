//! Touchpoint types and the per-phase instructions units carry for them.

use crate::version::Version;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

const NONE_ID: &str = "null";

/// Identifies the kind of executor that knows how to act on a unit.
///
/// Equality is structural. Types created through a [`TouchpointTypeInterner`]
/// additionally share their id allocation, which callers may observe with
/// [`TouchpointType::shares_representation`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TouchpointType {
    id: Arc<str>,
    version: Version,
}

impl TouchpointType {
    pub fn new(id: impl AsRef<str>, version: Version) -> Self {
        Self {
            id: Arc::from(id.as_ref()),
            version,
        }
    }

    /// The distinguished "no touchpoint" type.
    pub fn none() -> Self {
        Self::new(NONE_ID, Version::empty())
    }

    pub fn is_none(&self) -> bool {
        &*self.id == NONE_ID && self.version.is_empty()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn shares_representation(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.id, &other.id) && self.version == other.version
    }
}

impl Default for TouchpointType {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Display for TouchpointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

/// Process-scoped interning map for touchpoint types.
///
/// Passed explicitly to whoever builds many units (for example the advice
/// parser) so that equal types share one allocation.
#[derive(Debug)]
pub struct TouchpointTypeInterner {
    none: TouchpointType,
    cache: Mutex<HashMap<(String, Version), TouchpointType>>,
}

impl Default for TouchpointTypeInterner {
    fn default() -> Self {
        Self {
            none: TouchpointType::none(),
            cache: Mutex::new(HashMap::new()),
        }
    }
}

impl TouchpointTypeInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, id: &str, version: Version) -> TouchpointType {
        if id == NONE_ID && version.is_empty() {
            return self.none.clone();
        }
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache
            .entry((id.to_owned(), version.clone()))
            .or_insert_with(|| TouchpointType::new(id, version))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An instruction body for one phase, plus an optional import list naming
/// the fully qualified actions the body may refer to by short name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TouchpointInstruction {
    body: String,
    import: Option<String>,
}

impl TouchpointInstruction {
    pub fn new(body: impl Into<String>, import: Option<String>) -> Self {
        Self {
            body: body.into(),
            import,
        }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn import(&self) -> Option<&str> {
        self.import.as_deref()
    }
}

/// Ordered mapping from phase id to instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TouchpointData {
    instructions: Vec<(String, TouchpointInstruction)>,
}

impl TouchpointData {
    /// Build touchpoint data from `(phase id, instruction)` pairs. A repeated
    /// phase id replaces the earlier instruction in place.
    pub fn new<K: Into<String>>(
        instructions: impl IntoIterator<Item = (K, TouchpointInstruction)>,
    ) -> Self {
        let mut data = Self::default();
        for (key, instruction) in instructions {
            let key = key.into();
            match data.instructions.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = instruction,
                None => data.instructions.push((key, instruction)),
            }
        }
        data
    }

    pub fn instruction(&self, phase_id: &str) -> Option<&TouchpointInstruction> {
        self.instructions
            .iter()
            .find(|(k, _)| k == phase_id)
            .map(|(_, i)| i)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TouchpointInstruction)> {
        self.instructions.iter().map(|(k, i)| (k.as_str(), i))
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_type_is_recognised() {
        assert!(TouchpointType::none().is_none());
        assert!(!TouchpointType::new("native", Version::new(1, 0, 0)).is_none());
        assert!(!TouchpointType::new("null", Version::new(1, 0, 0)).is_none());
    }

    #[test]
    fn interner_shares_representation() {
        let interner = TouchpointTypeInterner::new();
        let a = interner.intern("native", Version::new(1, 0, 0));
        let b = interner.intern("native", Version::new(1, 0, 0));
        assert_eq!(a, b);
        assert!(a.shares_representation(&b));
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn equality_does_not_depend_on_interning() {
        let interned = TouchpointTypeInterner::new().intern("native", Version::new(1, 0, 0));
        let plain = TouchpointType::new("native", Version::new(1, 0, 0));
        assert_eq!(interned, plain);
        assert!(!interned.shares_representation(&plain));
    }

    #[test]
    fn interner_returns_none_type_without_caching() {
        let interner = TouchpointTypeInterner::new();
        assert!(interner.intern("null", Version::empty()).is_none());
        assert!(interner.is_empty());
    }

    #[test]
    fn touchpoint_data_keeps_order_and_replaces_duplicates() {
        let data = TouchpointData::new([
            ("install", TouchpointInstruction::new("a();", None)),
            ("configure", TouchpointInstruction::new("b();", None)),
            ("install", TouchpointInstruction::new("c();", None)),
        ]);
        let keys: Vec<_> = data.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["install", "configure"]);
        assert_eq!(data.instruction("install").unwrap().body(), "c();");
        assert!(data.instruction("uninstall").is_none());
    }
}
