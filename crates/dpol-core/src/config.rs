//! Run configuration consumed by the crawler, validator, and remediator.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::identity::ItemId;
use crate::item::ItemKind;
use crate::retry::RetryPolicy;

/// Which item kinds the validator reports on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemScope {
    File,
    Folder,
    #[default]
    Both,
}

impl ItemScope {
    /// Whether items of `kind` fall inside this scope.
    pub fn includes(&self, kind: ItemKind) -> bool {
        match self {
            Self::Both => true,
            Self::File => kind == ItemKind::File,
            Self::Folder => kind == ItemKind::Folder,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Folder => "folder",
            Self::Both => "both",
        }
    }
}

impl std::fmt::Display for ItemScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "folder" => Ok(Self::Folder),
            "both" => Ok(Self::Both),
            other => Err(format!("unknown item type {other:?}; expected file, folder, or both")),
        }
    }
}

/// Everything a single validation run needs besides the policy rules and
/// the external collaborators.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Folder the crawl starts from.
    pub root_id: ItemId,
    /// Item kinds to report on.
    pub scope: ItemScope,
    /// Delete violating permissions.
    pub remediate: bool,
    /// Pause between successive children of the same folder (quota shaping).
    pub child_delay: Duration,
    /// Upper bound on folders listing concurrently. `None` is unbounded.
    pub max_concurrent_listings: Option<usize>,
    /// Retry schedule applied to every external call.
    pub retry: RetryPolicy,
}

impl RunConfig {
    /// Configuration with defaults: both kinds, no remediation, no delay,
    /// unbounded fan-out, one retry after one second.
    pub fn new(root_id: impl Into<ItemId>) -> Self {
        Self {
            root_id: root_id.into(),
            scope: ItemScope::Both,
            remediate: false,
            child_delay: Duration::ZERO,
            max_concurrent_listings: None,
            retry: RetryPolicy::default(),
        }
    }
}
