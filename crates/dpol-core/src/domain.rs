//! # Permitted Domain Sets
//!
//! The set of domains allowed to hold access to an item, accumulated by
//! inheriting folder policy rules along every path from the crawl root.
//!
//! ## Invariant
//!
//! Accumulation is monotonic: the only mutating operations are [`insert`]
//! and [`union_with`]. An item reached through several ancestor paths ends up
//! with the union of the sets inherited along each of them.
//!
//! [`insert`]: PermittedDomains::insert
//! [`union_with`]: PermittedDomains::union_with

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Sentinel domain marking an item as intentionally open per policy.
pub const PUBLIC_DOMAIN: &str = "public";

/// Ordered set of permitted domain strings.
///
/// `BTreeSet` keeps report output stable regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermittedDomains(BTreeSet<String>);

impl PermittedDomains {
    /// An empty set.
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Add one domain. Returns `true` if it was not already present.
    pub fn insert(&mut self, domain: impl Into<String>) -> bool {
        self.0.insert(domain.into())
    }

    /// Union `other` into `self`.
    pub fn union_with(&mut self, other: &PermittedDomains) {
        for domain in &other.0 {
            if !self.0.contains(domain) {
                self.0.insert(domain.clone());
            }
        }
    }

    /// Return a copy of `self` extended with `extra`, if any.
    ///
    /// Used to compute a child's effective set from its parent's set
    /// without touching the parent.
    pub fn with(&self, extra: Option<&str>) -> Self {
        let mut next = self.clone();
        if let Some(domain) = extra {
            next.insert(domain);
        }
        next
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.0.contains(domain)
    }

    /// Whether the item is open per policy (contains [`PUBLIC_DOMAIN`]).
    pub fn is_public(&self) -> bool {
        self.contains(PUBLIC_DOMAIN)
    }

    pub fn is_superset(&self, other: &PermittedDomains) -> bool {
        self.0.is_superset(&other.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for PermittedDomains {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
