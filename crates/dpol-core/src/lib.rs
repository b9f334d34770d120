//! # dpol-core — Foundational Types for drivepolicy
//!
//! Defines the vocabulary shared by the Drive client, the crawler, and the
//! CLI. Every other crate in the workspace depends on `dpol-core`; it
//! depends on nothing internal and performs no I/O of its own.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype identifiers.** `ItemId` and `PermissionId` cannot be swapped
//!    for one another or for a bare domain string.
//!
//! 2. **One domain-set type.** [`PermittedDomains`] is the only place the
//!    `"public"` sentinel is interpreted. Accumulation is union-only; there is
//!    no removal operation.
//!
//! 3. **Classified API failures.** [`ApiError`] carries enough detail for the
//!    crawler to decide between retry, subtree skip, empty result, and abort.
//!
//! 4. **Collaborator seams as traits.** [`ItemLister`] and
//!    [`PermissionMutator`] are the only way the crawler reaches the external
//!    hierarchy, so tests substitute an in-memory drive.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `dpol-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod identity;
pub mod item;
pub mod policy;
pub mod retry;

// Re-export primary types for ergonomic imports.
pub use api::{ChildPage, ItemLister, PermissionMutator};
pub use config::{ItemScope, RunConfig};
pub use domain::{PermittedDomains, PUBLIC_DOMAIN};
pub use error::{ApiError, ConfigError, RunError};
pub use identity::{ItemId, PermissionId};
pub use item::{GranteeKind, Item, ItemKind, Owner, Permission};
pub use policy::{PolicyRule, PolicyStore};
pub use retry::RetryPolicy;
