use std::collections::HashMap;

/// Deduplicated track uris in first-seen order.
///
/// Backed by an explicit uri -> first-seen index map so the order is the
/// order of insertion calls, independent of hashing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackIdentitySet {
    order: Vec<String>,
    index: HashMap<String, usize>,
}

impl TrackIdentitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `uri` unless already present. Returns whether it was new.
    pub fn insert(&mut self, uri: &str) -> bool {
        if self.index.contains_key(uri) {
            return false;
        }
        self.index.insert(uri.to_string(), self.order.len());
        self.order.push(uri.to_string());
        true
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.index.contains_key(uri)
    }

    /// Position at which `uri` was first seen.
    #[cfg(test)]
    pub fn position(&self, uri: &str) -> Option<usize> {
        self.index.get(uri).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Elements of `self` absent from `other`, in `self`'s order.
    pub fn difference(&self, other: &TrackIdentitySet) -> Vec<String> {
        self.iter()
            .filter(|uri| !other.contains(uri))
            .map(str::to_string)
            .collect()
    }
}

impl<S: AsRef<str>> FromIterator<S> for TrackIdentitySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = TrackIdentitySet::new();
        for uri in iter {
            set.insert(uri.as_ref());
        }
        set
    }
}
