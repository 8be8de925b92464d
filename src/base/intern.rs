//! Name interning for identifiers (variables, helpers, properties, types).
//!
//! `Name` wraps a [`smol_str::SmolStr`], which inlines short strings on the
//! stack, so most identifiers never allocate at all. [`Interner`] exists
//! alongside it for callers that want `Name`s to be pointer-comparable
//! (e.g. a helper dispatch index keyed by name) without repeatedly hashing
//! the same text.

use smol_str::SmolStr;
use std::collections::HashSet;

/// An interned identifier. Cheap to clone and compare.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(SmolStr);

impl Name {
    pub fn new(s: impl AsRef<str>) -> Self {
        Self(SmolStr::new(s.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Self(SmolStr::new(s))
    }
}

impl std::borrow::Borrow<str> for Name {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

/// Deduplicates [`Name`]s so repeated interning of the same text returns
/// values that compare equal without re-scanning the source text.
///
/// `SmolStr` clones are already cheap for short identifiers; the interner's
/// value is mostly bookkeeping (`len`/`is_empty`) and a single place to
/// later swap in a true `Rc`-backed representation if profiling calls for it.
#[derive(Debug, Default, Clone)]
pub struct Interner {
    names: HashSet<Name>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, s: &str) -> Name {
        if let Some(existing) = self.names.get(s) {
            return existing.clone();
        }
        let name = Name::new(s);
        self.names.insert(name.clone());
        name
    }

    pub fn get(&self, s: &str) -> Option<Name> {
        self.names.get(s).cloned()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_dedups() {
        let mut interner = Interner::new();
        let a = interner.intern("firstName");
        let b = interner.intern("firstName");
        assert_eq!(a, b);
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn intern_distinct() {
        let mut interner = Interner::new();
        let a = interner.intern("a");
        let b = interner.intern("b");
        assert_ne!(a, b);
        assert_eq!(interner.len(), 2);
    }

    #[test]
    fn get_missing() {
        let interner = Interner::new();
        assert!(interner.get("nope").is_none());
    }
}
