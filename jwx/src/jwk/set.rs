//! Collections of JSON Web Keys

use super::Jwk;

/// An ordered collection of keys, addressable by key identifier
///
/// Verification against a set resolves the header's `kid` first; when
/// the token carries none, the first algorithm-compatible key is used.
#[derive(Clone, Debug, Default)]
pub struct JwkSet {
    keys: Vec<Jwk>,
}

impl JwkSet {
    /// Constructs a new, empty key set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of keys in the set
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set holds no keys
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Adds a key to the set
    ///
    /// A key whose `kid` matches an existing entry replaces it.
    pub fn add(&mut self, key: Jwk) {
        if let Some(kid) = key.kid() {
            if let Some(existing) = self.keys.iter_mut().find(|k| k.kid() == Some(kid)) {
                *existing = key;
                return;
            }
        }
        self.keys.push(key);
    }

    /// Whether a key with the given identifier is present
    #[must_use]
    pub fn contains(&self, kid: &str) -> bool {
        self.get_key(kid).is_some()
    }

    /// The key with the given identifier, if present
    #[must_use]
    pub fn get_key(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid() == Some(kid))
    }

    /// Iterates over the keys in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Jwk> {
        self.keys.iter()
    }

    /// The identifiers of all keys carrying one
    pub fn kids(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().filter_map(Jwk::kid)
    }
}

impl Extend<Jwk> for JwkSet {
    fn extend<T: IntoIterator<Item = Jwk>>(&mut self, iter: T) {
        for key in iter {
            self.add(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(kid: &str) -> Jwk {
        Jwk::from_json(&format!(
            r#"{{"kty":"oct","k":"c2VjcmV0","kid":"{kid}"}}"#
        ))
        .unwrap()
    }

    #[test]
    fn lookup_by_kid() {
        let mut set = JwkSet::new();
        set.add(key("a"));
        set.add(key("b"));

        assert_eq!(set.len(), 2);
        assert!(set.contains("a"));
        assert!(!set.contains("c"));
        assert_eq!(set.get_key("b").and_then(Jwk::kid), Some("b"));
    }

    #[test]
    fn adding_a_duplicate_kid_replaces() {
        let mut set = JwkSet::new();
        set.add(key("a"));
        set.add(key("a"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn kids_lists_identifiers() {
        let mut set = JwkSet::new();
        set.add(key("a"));
        set.add(key("b"));
        let kids: Vec<&str> = set.kids().collect();
        assert_eq!(kids, ["a", "b"]);
    }
}
