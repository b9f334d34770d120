//! # Item Registry
//!
//! Concurrency-safe map from item id to the item snapshot and its merged
//! permitted-domain set, filled by the crawler and read by the validator.
//!
//! ## Locking
//!
//! One coarse `parking_lot::Mutex` guards every mutation. Network latency,
//! not lock contention, dominates a crawl, and the lock is never held across
//! an `.await` point. `parking_lot` locks do not poison, so a panicking
//! crawl task cannot wedge the registry for the rest of the run.
//!
//! ## Invariants
//!
//! - The first registration of an id stores the item snapshot; later
//!   registrations never replace it.
//! - Later registrations union their domain set into the stored set.
//! - Discovery order (first registration) is preserved for reporting.
//! - Validation reads a [`FrozenRegistry`], which can only be obtained once
//!   every other handle to the registry has been dropped.

use std::collections::HashMap;
use std::sync::Arc;

use dpol_core::{Item, ItemId, PermittedDomains};
use parking_lot::Mutex;

/// One discovered item and the domains it inherits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRecord {
    pub item: Item,
    pub permitted: PermittedDomains,
}

/// What [`Registry::ensure`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// First sighting; a new record was created.
    Inserted,
    /// The id was already known; `added` domains were new to its set.
    Merged { added: usize },
}

#[derive(Debug, Default)]
struct RegistryInner {
    index: HashMap<ItemId, usize>,
    records: Vec<ItemRecord>,
}

/// Shared, cloneable handle to the registry used during the crawl.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `item` with `permitted`, or union `permitted` into the
    /// existing record if the id is already known.
    ///
    /// The stored snapshot is left untouched on rediscovery; `item` is
    /// dropped in that case.
    pub fn ensure(&self, item: Item, permitted: &PermittedDomains) -> MergeOutcome {
        let mut guard = self.inner.lock();
        if let Some(&slot) = guard.index.get(&item.id) {
            let record = &mut guard.records[slot];
            let before = record.permitted.len();
            record.permitted.union_with(permitted);
            return MergeOutcome::Merged {
                added: record.permitted.len() - before,
            };
        }

        let slot = guard.records.len();
        guard.index.insert(item.id.clone(), slot);
        guard.records.push(ItemRecord {
            item,
            permitted: permitted.clone(),
        });
        MergeOutcome::Inserted
    }

    /// Copy of the current record for `id`.
    pub fn get(&self, id: &ItemId) -> Option<ItemRecord> {
        let guard = self.inner.lock();
        guard.index.get(id).map(|&slot| guard.records[slot].clone())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every record. Only called at the start of a top-level crawl.
    pub fn clear(&self) {
        let mut guard = self.inner.lock();
        guard.index.clear();
        guard.records.clear();
    }

    /// Convert into a read-only registry.
    ///
    /// Fails, handing the registry back, while any other handle (i.e. a
    /// potential writer) is still alive.
    pub fn freeze(self) -> Result<FrozenRegistry, Registry> {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => {
                let inner = mutex.into_inner();
                Ok(FrozenRegistry {
                    index: inner.index,
                    records: inner.records,
                })
            }
            Err(inner) => Err(Registry { inner }),
        }
    }

    /// Number of live handles, including this one.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

/// Read-only registry produced once the crawl has fully joined.
#[derive(Debug, Clone, Default)]
pub struct FrozenRegistry {
    index: HashMap<ItemId, usize>,
    records: Vec<ItemRecord>,
}

impl FrozenRegistry {
    /// Records in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &ItemRecord> {
        self.records.iter()
    }

    pub fn get(&self, id: &ItemId) -> Option<&ItemRecord> {
        self.index.get(id).map(|&slot| &self.records[slot])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpol_core::ItemKind;
    use proptest::prelude::*;

    fn item(id: &str, name: &str) -> Item {
        Item {
            id: ItemId::new(id),
            name: name.into(),
            kind: ItemKind::File,
            trashed: false,
            link: None,
            owners: vec![],
            permissions: vec![],
        }
    }

    fn domains(list: &[&str]) -> PermittedDomains {
        list.iter().copied().collect()
    }

    #[test]
    fn first_registration_inserts() {
        let reg = Registry::new();
        assert_eq!(
            reg.ensure(item("a", "A"), &domains(&["acme.com"])),
            MergeOutcome::Inserted
        );
        assert_eq!(reg.len(), 1);
        let rec = reg.get(&ItemId::new("a")).unwrap();
        assert!(rec.permitted.contains("acme.com"));
    }

    #[test]
    fn rediscovery_unions_and_keeps_snapshot() {
        let reg = Registry::new();
        reg.ensure(item("a", "original"), &domains(&["acme.com"]));
        let outcome = reg.ensure(item("a", "renamed"), &domains(&["acme.com", "example.com"]));
        assert_eq!(outcome, MergeOutcome::Merged { added: 1 });

        let rec = reg.get(&ItemId::new("a")).unwrap();
        assert_eq!(rec.item.name, "original");
        assert_eq!(rec.permitted, domains(&["acme.com", "example.com"]));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn rediscovery_with_subset_adds_nothing() {
        let reg = Registry::new();
        reg.ensure(item("a", "A"), &domains(&["acme.com", "example.com"]));
        assert_eq!(
            reg.ensure(item("a", "A"), &domains(&["acme.com"])),
            MergeOutcome::Merged { added: 0 }
        );
    }

    #[test]
    fn freeze_preserves_discovery_order() {
        let reg = Registry::new();
        for id in ["c", "a", "b", "a"] {
            reg.ensure(item(id, id), &PermittedDomains::new());
        }
        let frozen = reg.freeze().unwrap();
        let order: Vec<&str> = frozen.iter().map(|r| r.item.id.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
        assert!(frozen.get(&ItemId::new("b")).is_some());
    }

    #[test]
    fn freeze_refused_while_writer_alive() {
        let reg = Registry::new();
        let writer = reg.clone();
        let reg = reg.freeze().unwrap_err();
        assert_eq!(reg.handle_count(), 2);
        drop(writer);
        assert!(reg.freeze().is_ok());
    }

    #[test]
    fn clear_resets() {
        let reg = Registry::new();
        reg.ensure(item("a", "A"), &PermittedDomains::new());
        reg.clear();
        assert!(reg.is_empty());
        assert!(reg.get(&ItemId::new("a")).is_none());
    }

    #[test]
    fn concurrent_merges_union_everything() {
        let reg = Registry::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let reg = reg.clone();
                std::thread::spawn(move || {
                    reg.ensure(item("shared", "S"), &domains(&[&format!("d{i}.com")]));
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let rec = reg.get(&ItemId::new("shared")).unwrap();
        assert_eq!(rec.permitted.len(), 8);
    }

    proptest! {
        /// The final set equals the union of every registered set.
        #[test]
        fn final_set_is_union_of_registrations(
            sets in proptest::collection::vec(
                proptest::collection::btree_set("[a-d]\\.com", 0..4), 1..10)
        ) {
            let reg = Registry::new();
            let mut expected = PermittedDomains::new();
            for set in &sets {
                let set: PermittedDomains = set.iter().cloned().collect();
                expected.union_with(&set);
                reg.ensure(item("x", "X"), &set);
            }
            prop_assert_eq!(reg.get(&ItemId::new("x")).unwrap().permitted, expected);
        }
    }
}
