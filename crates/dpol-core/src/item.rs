//! # Item Snapshots
//!
//! An [`Item`] is a file or folder as listed by the external hierarchy,
//! together with its owners and access-control entries. Items are fetched
//! exactly once per run; the snapshot is never re-fetched or merged.

use serde::{Deserialize, Serialize};

use crate::identity::{ItemId, PermissionId};

/// Whether an item is a leaf file or a container folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Folder,
}

impl ItemKind {
    /// Return the label used in reports ("File" / "Folder").
    pub fn label(&self) -> &'static str {
        match self {
            Self::File => "File",
            Self::Folder => "Folder",
        }
    }

    /// Whether this kind is a folder.
    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder)
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Who a permission grants access to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GranteeKind {
    User,
    Group,
    Domain,
    Anyone,
    /// Forward-compatible catch-all for grantee types introduced after
    /// this version was built.
    #[serde(other)]
    Unknown,
}

impl GranteeKind {
    /// Return the wire string for this grantee kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
            Self::Domain => "domain",
            Self::Anyone => "anyone",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for GranteeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An owner of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub email: String,
    pub display_name: String,
}

/// One access-control entry on an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub grantee: GranteeKind,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    /// owner / writer / reader / commenter, kept as the service reports it.
    pub role: String,
    #[serde(default)]
    pub deleted: bool,
}

impl Permission {
    /// Resolve the domain this permission grants access to.
    ///
    /// Domain grants use the explicit domain field (an absent field resolves
    /// to the empty string). Every other grantee kind derives the domain from
    /// the part of the email address after the first `@`. Returns `None` when
    /// the email has no `@`, i.e. the identity is malformed.
    pub fn resolve_domain(&self) -> Option<&str> {
        match self.grantee {
            GranteeKind::Domain => Some(self.domain.as_deref().unwrap_or("")),
            _ => self.email.as_deref().unwrap_or("").split('@').nth(1),
        }
    }

    /// Human-readable grantee label for reports.
    ///
    /// Users and groups are labelled by email, domain grants by domain, and
    /// "anyone" grants by the permission id.
    pub fn grantee_label(&self) -> String {
        match self.grantee {
            GranteeKind::User | GranteeKind::Group => self.email.clone().unwrap_or_default(),
            GranteeKind::Domain => self.domain.clone().unwrap_or_default(),
            GranteeKind::Anyone => self.id.to_string(),
            GranteeKind::Unknown => self.grantee.as_str().to_string(),
        }
    }
}

/// Immutable snapshot of a file or folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub kind: ItemKind,
    #[serde(default)]
    pub trashed: bool,
    /// Link to the item in the storage system's web UI, if reported.
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub owners: Vec<Owner>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Item {
    /// Whether this item is a folder.
    pub fn is_folder(&self) -> bool {
        self.kind.is_folder()
    }

    /// Permissions that have not been deleted.
    pub fn active_permissions(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.iter().filter(|p| !p.deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perm(grantee: GranteeKind, email: Option<&str>, domain: Option<&str>) -> Permission {
        Permission {
            id: PermissionId::new("p1"),
            grantee,
            email: email.map(String::from),
            domain: domain.map(String::from),
            role: "reader".into(),
            deleted: false,
        }
    }

    #[test]
    fn user_domain_comes_from_email() {
        let p = perm(GranteeKind::User, Some("bob@acme.com"), None);
        assert_eq!(p.resolve_domain(), Some("acme.com"));
    }

    #[test]
    fn group_domain_comes_from_email() {
        let p = perm(GranteeKind::Group, Some("eng@lists.acme.com"), Some("ignored.com"));
        assert_eq!(p.resolve_domain(), Some("lists.acme.com"));
    }

    #[test]
    fn domain_grant_uses_explicit_field() {
        let p = perm(GranteeKind::Domain, None, Some("acme.com"));
        assert_eq!(p.resolve_domain(), Some("acme.com"));
    }

    #[test]
    fn domain_grant_without_field_resolves_empty() {
        let p = perm(GranteeKind::Domain, None, None);
        assert_eq!(p.resolve_domain(), Some(""));
    }

    #[test]
    fn email_without_at_is_malformed() {
        let p = perm(GranteeKind::User, Some("not-an-address"), None);
        assert_eq!(p.resolve_domain(), None);
    }

    #[test]
    fn anyone_grant_has_no_resolvable_domain() {
        let p = perm(GranteeKind::Anyone, None, None);
        assert_eq!(p.resolve_domain(), None);
    }

    #[test]
    fn grantee_labels() {
        assert_eq!(
            perm(GranteeKind::User, Some("bob@acme.com"), None).grantee_label(),
            "bob@acme.com"
        );
        assert_eq!(
            perm(GranteeKind::Domain, None, Some("acme.com")).grantee_label(),
            "acme.com"
        );
        assert_eq!(perm(GranteeKind::Anyone, None, None).grantee_label(), "p1");
        assert_eq!(perm(GranteeKind::Unknown, None, None).grantee_label(), "unknown");
    }

    #[test]
    fn unknown_grantee_kind_deserializes() {
        let kind: GranteeKind = serde_json::from_str("\"audience\"").unwrap();
        assert_eq!(kind, GranteeKind::Unknown);
    }

    #[test]
    fn active_permissions_skip_deleted() {
        let mut deleted = perm(GranteeKind::User, Some("old@acme.com"), None);
        deleted.deleted = true;
        let item = Item {
            id: ItemId::new("f1"),
            name: "doc".into(),
            kind: ItemKind::File,
            trashed: false,
            link: None,
            owners: vec![],
            permissions: vec![deleted, perm(GranteeKind::User, Some("bob@acme.com"), None)],
        };
        assert_eq!(item.active_permissions().count(), 1);
    }
}
