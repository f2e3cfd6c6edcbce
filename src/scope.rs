//! Render scope - ambient values passed down the render tree.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::types::AttrValue;

/// Immutable key/value context. Extending produces a new scope; the parent is
/// never modified, so siblings rendered with the parent see none of a
/// child's additions.
#[derive(Clone, Default)]
pub struct Scope(Rc<IndexMap<String, AttrValue>>);

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<AttrValue> {
        self.0.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// New scope with `entries` layered over this one.
    pub fn extend<K, V>(&self, entries: impl IntoIterator<Item = (K, V)>) -> Scope
    where
        K: Into<String>,
        V: Into<AttrValue>,
    {
        let mut map = (*self.0).clone();
        for (k, v) in entries {
            map.insert(k.into(), v.into());
        }
        Scope(Rc::new(map))
    }

    pub fn with(&self, key: impl Into<String>, value: impl Into<AttrValue>) -> Scope {
        self.extend([(key.into(), value.into())])
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extend_leaves_parent_untouched() {
        let root = Scope::new().with("theme", "dark");
        let child = root.with("user", "ada").with("theme", "light");

        assert_eq!(root.get("theme"), Some("dark".into()));
        assert!(!root.contains("user"));
        assert_eq!(child.get("theme"), Some("light".into()));
        assert_eq!(child.len(), 2);
    }
}
