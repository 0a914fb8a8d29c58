//! Ordered, name-unique set of claims.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::claim::Claim;

/// The in-memory content of a token.
///
/// Names are unique; inserting a claim whose name already exists replaces it
/// in place. Iteration follows insertion order, lookups go by name.
#[derive(Debug, Clone, Default)]
pub struct ClaimCollection {
    claims: IndexMap<String, Claim>,
}

impl ClaimCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a claim, replacing any claim with the same name.
    pub fn insert(&mut self, claim: Claim) {
        self.claims.insert(claim.name().to_string(), claim);
    }

    /// Removes a claim by name.
    pub fn remove(&mut self, name: &str) -> Option<Claim> {
        self.claims.shift_remove(name)
    }

    /// Looks a claim up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Claim> {
        self.claims.get(name)
    }

    /// Returns `true` if a claim with `name` exists.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.claims.contains_key(name)
    }

    /// Returns `true` if every name in `names` is present.
    #[must_use]
    pub fn has_all<S: AsRef<str>>(&self, names: &[S]) -> bool {
        names.iter().all(|name| self.has(name.as_ref()))
    }

    /// Iterates over the claims in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Claim> {
        self.claims.values()
    }

    /// Iterates over the claim names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.claims.keys().map(String::as_str)
    }

    /// Returns the number of claims.
    #[must_use]
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// Returns `true` if there are no claims.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Flattens the collection into a plain name → value map.
    #[must_use]
    pub fn to_plain_map(&self) -> Map<String, Value> {
        self.claims
            .iter()
            .map(|(name, claim)| (name.clone(), claim.value().clone()))
            .collect()
    }
}

impl FromIterator<Claim> for ClaimCollection {
    fn from_iter<I: IntoIterator<Item = Claim>>(iter: I) -> Self {
        let mut collection = Self::new();
        for claim in iter {
            collection.insert(claim);
        }
        collection
    }
}

impl From<Vec<Claim>> for ClaimCollection {
    fn from(claims: Vec<Claim>) -> Self {
        claims.into_iter().collect()
    }
}

impl IntoIterator for ClaimCollection {
    type Item = Claim;
    type IntoIter = indexmap::map::IntoValues<String, Claim>;

    fn into_iter(self) -> Self::IntoIter {
        self.claims.into_values()
    }
}

impl<'a> IntoIterator for &'a ClaimCollection {
    type Item = &'a Claim;
    type IntoIter = indexmap::map::Values<'a, String, Claim>;

    fn into_iter(self) -> Self::IntoIter {
        self.claims.values()
    }
}

/// Two collections are equal when they hold the same name → value pairs,
/// regardless of order.
impl PartialEq for ClaimCollection {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .claims
                .iter()
                .all(|(name, claim)| other.get(name).is_some_and(|o| o.value() == claim.value()))
    }
}
