//! Insertion-ordered string property bags.

/// A string map that remembers the order in which keys were first added.
///
/// Replacing the value of an existing key keeps its position. Profile
/// snapshots write properties in this order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Properties {
    entries: Vec<(String, String)>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`, returning the previous value if there was one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(&mut slot.1, value));
        }
        self.entries.push((key, value));
        None
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut properties = Self::new();
        properties.extend(iter);
        properties
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Properties {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.set(k, v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_insertion_order() {
        let props: Properties = [("b", "1"), ("a", "2"), ("c", "3")].into_iter().collect();
        let keys: Vec<_> = props.keys().collect();
        assert_eq!(keys, ["b", "a", "c"]);
    }

    #[test]
    fn replacing_keeps_position() {
        let mut props = Properties::new();
        props.set("x", "1");
        props.set("y", "2");
        assert_eq!(props.set("x", "3"), Some("1".to_owned()));
        let pairs: Vec<_> = props.iter().collect();
        assert_eq!(pairs, [("x", "3"), ("y", "2")]);
    }

    #[test]
    fn remove_returns_value() {
        let mut props = Properties::new();
        props.set("k", "v");
        assert_eq!(props.remove("k").as_deref(), Some("v"));
        assert!(props.remove("k").is_none());
        assert!(props.is_empty());
    }
}
