//! Claims Auditor Library
//!
//! Re-verifies the `org.chainagnostic.verification` records published by an
//! atproto account and reports which still hold against current chain state.

pub mod audit;
pub mod config;
pub mod repo_client;
pub mod server;
pub mod watcher;

pub use audit::{AuditEntry, AuditReport, ClaimAuditor, ClaimStatus};
pub use config::Config;
pub use repo_client::{RecordEntry, RepoClient};
pub use watcher::AuditWatcher;
