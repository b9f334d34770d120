//! # Folder Policy Rules
//!
//! A [`PolicyRule`] declares that one domain is permitted below one folder.
//! The [`PolicyStore`] keeps the rules in source order (for reporting) and
//! indexes them by folder id (for the crawler).
//!
//! ## Duplicate folder ids
//!
//! When a folder id appears more than once, the later rule's domain wins the
//! lookup. This mirrors the behaviour of the spreadsheet-driven tool this
//! replaces and is not known to be intentional, so duplicates are recorded
//! and surfaced as warnings instead of being merged.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::identity::ItemId;

/// One folder-scoped permitted domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub folder_id: ItemId,
    pub domain: String,
    /// Folder title, filled in once the folder has been looked up. Holds a
    /// diagnostic placeholder when the lookup failed.
    #[serde(default)]
    pub name: String,
}

impl PolicyRule {
    pub fn new(folder_id: impl Into<ItemId>, domain: impl Into<String>) -> Self {
        Self {
            folder_id: folder_id.into(),
            domain: domain.into(),
            name: String::new(),
        }
    }
}

/// Ordered, indexed set of policy rules.
#[derive(Debug, Clone)]
pub struct PolicyStore {
    rules: Vec<PolicyRule>,
    by_folder: HashMap<ItemId, usize>,
    duplicates: Vec<ItemId>,
}

impl PolicyStore {
    /// Build a store from rules in source order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyPolicy`] if `rules` is empty.
    pub fn new(rules: Vec<PolicyRule>) -> Result<Self, ConfigError> {
        if rules.is_empty() {
            return Err(ConfigError::EmptyPolicy);
        }

        let mut by_folder = HashMap::with_capacity(rules.len());
        let mut duplicates = Vec::new();
        for (index, rule) in rules.iter().enumerate() {
            if by_folder.insert(rule.folder_id.clone(), index).is_some() {
                tracing::warn!(
                    folder_id = %rule.folder_id,
                    domain = %rule.domain,
                    "duplicate policy rule for folder; the later rule wins"
                );
                duplicates.push(rule.folder_id.clone());
            }
        }

        Ok(Self {
            rules,
            by_folder,
            duplicates,
        })
    }

    /// The permitted domain declared for `folder_id`, if any.
    pub fn domain_for(&self, folder_id: &ItemId) -> Option<&str> {
        self.by_folder
            .get(folder_id)
            .map(|&index| self.rules[index].domain.as_str())
    }

    /// All rules in source order.
    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    /// Mutable access to the rules, used to fill in resolved folder names.
    pub fn rules_mut(&mut self) -> &mut [PolicyRule] {
        &mut self.rules
    }

    /// Folder ids that were declared more than once, in source order of the
    /// overriding declaration.
    pub fn duplicate_folder_ids(&self) -> &[ItemId] {
        &self.duplicates
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
