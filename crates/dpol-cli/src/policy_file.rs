//! # Policy File Loading
//!
//! Reads the folder policy table from a YAML or JSON file. Two shapes are
//! accepted:
//!
//! ```yaml
//! # bare list
//! - folder_id: 0B1xyz
//!   domain: acme.com
//! ```
//!
//! ```yaml
//! # wrapped
//! rules:
//!   - folder_id: 0B1xyz
//!     domain: acme.com
//! ```
//!
//! `.json` files are parsed as JSON, everything else as YAML. Rule order is
//! preserved; when a folder id repeats, the later rule applies.

use std::path::Path;

use dpol_core::{ConfigError, PolicyRule, PolicyStore};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PolicyFile {
    List(Vec<PolicyRule>),
    Table { rules: Vec<PolicyRule> },
}

impl PolicyFile {
    fn into_rules(self) -> Vec<PolicyRule> {
        match self {
            Self::List(rules) | Self::Table { rules } => rules,
        }
    }
}

/// Load and validate the policy table at `path`.
pub fn load_policy(path: &Path) -> Result<PolicyStore, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::InvalidPolicy(format!("{}: {e}", path.display())))?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let rules = parse_policy(&content, is_json)
        .map_err(|reason| ConfigError::InvalidPolicy(format!("{}: {reason}", path.display())))?;

    tracing::info!(path = %path.display(), rules = rules.len(), "loaded policy file");
    PolicyStore::new(rules)
}

/// Parse policy rules from text, trimming whitespace around ids and domains.
pub fn parse_policy(content: &str, is_json: bool) -> Result<Vec<PolicyRule>, String> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let file: PolicyFile = if is_json {
        serde_json::from_str(content).map_err(|e| e.to_string())?
    } else {
        serde_yaml::from_str(content).map_err(|e| e.to_string())?
    };

    file.into_rules()
        .into_iter()
        .enumerate()
        .map(|(index, rule)| {
            let folder_id = rule.folder_id.as_str().trim();
            let domain = rule.domain.trim();
            if folder_id.is_empty() || domain.is_empty() {
                return Err(format!(
                    "rule {} needs both a folder_id and a domain",
                    index + 1
                ));
            }
            Ok(PolicyRule::new(folder_id, domain))
        })
        .collect()
}
