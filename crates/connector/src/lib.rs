//! Reconciliation engine between the hypervisor, the inventory service and Salt.
//!
//! The engine owns no network code. Collaborators are injected through the
//! async traits in [`traits`]; the services crate provides the HTTP-backed
//! implementations and tests provide fakes.

pub mod error;
pub mod grains;
pub mod matcher;
pub mod normalize;
pub mod os_pattern;
pub mod query;
pub mod resolve;
pub mod sync;
pub mod traits;
pub mod version;

pub use error::ReconcileError;
pub use grains::{version_report, VersionEntry, VersionReport, VersionStatus};
pub use matcher::{MatchDecision, Resolution};
pub use normalize::flatten_to_target;
pub use os_pattern::extract_os_pattern;
pub use query::GraphQlRequest;
pub use resolve::{extract_ids, NormalizedQueryResult};
pub use sync::{Reconciler, SyncKind, SyncReport};
pub use traits::*;
pub use version::parse_version;
