//! # dpol-cli — drivepolicy command-line tool
//!
//! Crawls a Drive folder hierarchy, reports every permission that grants
//! access to a domain outside the folder policy, and optionally removes it.
//!
//! ```bash
//! export DRIVEPOLICY_ACCESS_TOKEN=...
//! drivepolicy --root-id 0B1xyz --policy policy.yaml --item-type both --report report.json
//! drivepolicy -r 0B1xyz -p policy.yaml --fix --wait 0.5 --max-concurrency 8
//! ```
//!
//! ## Exit codes
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | No violations                                             |
//! | 1    | Violations found                                          |
//! | 2    | Configuration, authorization, or I/O failure              |

pub mod audit;
pub mod policy_file;
