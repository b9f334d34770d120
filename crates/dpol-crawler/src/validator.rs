//! # Policy Validator
//!
//! Checks every active permission on every registered item against the
//! item's permitted-domain set.
//!
//! A permission is a violation when all of the following hold:
//!
//! - its resolved domain is not in the item's permitted set,
//! - the item is not public (its set does not contain `"public"`),
//! - the item's kind is in the configured [`ItemScope`].
//!
//! Domain resolution takes the grant's `domain` for domain grants and the
//! part after `@` of the grantee email for everything else. A grant without
//! a parsable email resolves to the empty domain, so it is reported unless
//! the item is public; a warning names the malformed grant either way.

use dpol_core::{GranteeKind, ItemId, ItemKind, ItemScope, Owner, PermissionId, PermittedDomains};
use serde::Serialize;

use crate::registry::{FrozenRegistry, ItemRecord};
use crate::remediator::FixOutcome;
use crate::session::RunLog;

/// One permission that grants access outside the item's permitted domains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub item_id: ItemId,
    pub item_name: String,
    pub item_kind: ItemKind,
    pub item_link: Option<String>,
    pub owners: Vec<Owner>,
    pub permitted: PermittedDomains,
    pub permission_id: PermissionId,
    pub grantee: GranteeKind,
    /// Email, domain, or permission id identifying the grantee.
    pub grantee_label: String,
    pub role: String,
    /// Domain the grant resolved to; empty when it could not be resolved.
    pub resolved_domain: String,
    /// Remediation result; `None` when remediation did not run.
    pub fix: Option<FixOutcome>,
}

/// Stateless checker; the scope is the only knob.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    scope: ItemScope,
}

impl Validator {
    pub fn new(scope: ItemScope) -> Self {
        Self { scope }
    }

    /// Violations across the whole registry, in discovery order and, within
    /// an item, in permission order.
    pub fn validate(&self, registry: &FrozenRegistry, log: &RunLog) -> Vec<Violation> {
        let violations: Vec<Violation> = registry
            .iter()
            .flat_map(|record| self.validate_item(record, log))
            .collect();
        tracing::info!(
            items = registry.len(),
            violations = violations.len(),
            scope = %self.scope,
            "validation complete"
        );
        violations
    }

    /// Violations on a single item.
    pub fn validate_item(&self, record: &ItemRecord, log: &RunLog) -> Vec<Violation> {
        let item = &record.item;
        let public = record.permitted.is_public();
        let in_scope = self.scope.includes(item.kind);
        let mut found = Vec::new();

        for permission in item.active_permissions() {
            let resolved = match permission.resolve_domain() {
                Some(domain) => domain,
                None => {
                    log.warn(format!(
                        "Unable to get domain from permission email for itemId: {}; type: {}; emailAddress: {}",
                        item.id,
                        permission.grantee.as_str(),
                        permission.email.as_deref().unwrap_or(""),
                    ));
                    ""
                }
            };

            if public || !in_scope || record.permitted.contains(resolved) {
                continue;
            }

            tracing::debug!(
                item_id = %item.id,
                permission_id = %permission.id,
                domain = resolved,
                "permission outside permitted domains"
            );
            found.push(Violation {
                item_id: item.id.clone(),
                item_name: item.name.clone(),
                item_kind: item.kind,
                item_link: item.link.clone(),
                owners: item.owners.clone(),
                permitted: record.permitted.clone(),
                permission_id: permission.id.clone(),
                grantee: permission.grantee,
                grantee_label: permission.grantee_label(),
                role: permission.role.clone(),
                resolved_domain: resolved.to_string(),
                fix: None,
            });
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{anyone, domain, file, folder, group, user};
    use dpol_core::Item;

    fn record(item: Item, permitted: &[&str]) -> ItemRecord {
        ItemRecord {
            item,
            permitted: permitted.iter().copied().collect(),
        }
    }

    #[test]
    fn permitted_domain_is_not_a_violation() {
        let rec = record(
            file("d1", "Doc", vec![user("p1", "ann@acme.com", "writer"), domain("p2", "acme.com", "reader")]),
            &["acme.com"],
        );
        assert!(Validator::default().validate_item(&rec, &RunLog::new()).is_empty());
    }

    #[test]
    fn foreign_user_and_group_are_violations() {
        let rec = record(
            file(
                "d1",
                "Doc",
                vec![
                    user("p1", "bob@other.com", "reader"),
                    group("p2", "team@partner.org", "writer"),
                ],
            ),
            &["acme.com"],
        );
        let found = Validator::default().validate_item(&rec, &RunLog::new());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].resolved_domain, "other.com");
        assert_eq!(found[0].grantee_label, "bob@other.com");
        assert_eq!(found[1].grantee, GranteeKind::Group);
        assert!(found.iter().all(|v| v.fix.is_none()));
    }

    #[test]
    fn public_item_exempts_everything() {
        let rec = record(
            file("d1", "Doc", vec![user("p1", "bob@other.com", "reader"), anyone("anyoneWithLink", "reader")]),
            &["acme.com", "public"],
        );
        assert!(Validator::default().validate_item(&rec, &RunLog::new()).is_empty());
    }

    #[test]
    fn malformed_email_warns_and_violates() {
        let log = RunLog::new();
        let rec = record(file("d1", "Doc", vec![user("p1", "not-an-email", "reader")]), &["acme.com"]);
        let found = Validator::default().validate_item(&rec, &log);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].resolved_domain, "");
        assert_eq!(log.warning_count(), 1);
        assert!(log.entries()[0].message.contains("itemId: d1"));
    }

    #[test]
    fn anyone_grant_without_email_violates() {
        let rec = record(file("d1", "Doc", vec![anyone("anyoneWithLink", "reader")]), &["acme.com"]);
        let found = Validator::default().validate_item(&rec, &RunLog::new());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].grantee_label, "anyoneWithLink");
    }

    #[test]
    fn scope_filters_kinds_but_still_warns() {
        let log = RunLog::new();
        let mut shared_folder = folder("f1", "Folder");
        shared_folder.permissions = vec![user("p1", "broken", "reader")];
        let rec = record(shared_folder, &["acme.com"]);

        assert!(Validator::new(ItemScope::File).validate_item(&rec, &log).is_empty());
        assert_eq!(log.warning_count(), 1);
        assert_eq!(Validator::new(ItemScope::Folder).validate_item(&rec, &log).len(), 1);
    }

    #[test]
    fn deleted_permissions_are_ignored() {
        let mut gone = user("p1", "bob@other.com", "reader");
        gone.deleted = true;
        let rec = record(file("d1", "Doc", vec![gone]), &["acme.com"]);
        assert!(Validator::default().validate_item(&rec, &RunLog::new()).is_empty());
    }
}
