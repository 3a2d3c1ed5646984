//! Claim auditing
//!
//! Re-verifies every verification record in a subject's repository against
//! current chain state. Each record lands in exactly one bucket: valid,
//! invalid (with the verifier's reason) or malformed (could not be parsed
//! into a claim at all).

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use eyre::Result;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use claims_rs::{VerificationEngine, VerificationRecord, VerifyError, VERIFICATION_COLLECTION};

use crate::repo_client::{RecordEntry, RepoClient};

/// Result of auditing one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimStatus {
    Valid,
    Invalid(VerifyError),
    /// The record value is not a usable verification record
    Malformed(String),
}

impl ClaimStatus {
    /// Label used in logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            ClaimStatus::Valid => "valid",
            ClaimStatus::Invalid(reason) => reason.kind(),
            ClaimStatus::Malformed(_) => "malformed_record",
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ClaimStatus::Valid)
    }
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub uri: String,
    pub rkey: Option<String>,
    /// `eip155:<chain>:<address>` when the address decodes
    pub address: Option<String>,
    pub chain_id: Option<u64>,
    pub status: ClaimStatus,
}

/// Outcome of one audit run
#[derive(Debug, Clone)]
pub struct AuditReport {
    pub subject: String,
    /// Sorted by record URI
    pub entries: Vec<AuditEntry>,
    pub elapsed: Duration,
}

impl AuditReport {
    pub fn total(&self) -> usize {
        self.entries.len()
    }

    pub fn valid_count(&self) -> usize {
        self.entries.iter().filter(|e| e.status.is_valid()).count()
    }

    pub fn invalid_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.status, ClaimStatus::Invalid(_)))
            .count()
    }

    pub fn malformed_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.status, ClaimStatus::Malformed(_)))
            .count()
    }

    /// Invalid claims grouped by failure kind
    pub fn invalid_by_reason(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            if let ClaimStatus::Invalid(reason) = &entry.status {
                *counts.entry(reason.kind()).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn log_summary(&self) {
        for entry in &self.entries {
            match &entry.status {
                ClaimStatus::Valid => debug!(
                    uri = %entry.uri,
                    address = entry.address.as_deref().unwrap_or("-"),
                    "Claim valid"
                ),
                ClaimStatus::Invalid(reason) => warn!(
                    uri = %entry.uri,
                    address = entry.address.as_deref().unwrap_or("-"),
                    reason = reason.kind(),
                    error = %reason,
                    "Claim invalid"
                ),
                ClaimStatus::Malformed(reason) => warn!(
                    uri = %entry.uri,
                    error = %reason,
                    "Record malformed"
                ),
            }
        }

        info!(
            subject = %self.subject,
            total = self.total(),
            valid = self.valid_count(),
            invalid = self.invalid_count(),
            malformed = self.malformed_count(),
            reasons = ?self.invalid_by_reason(),
            elapsed_ms = self.elapsed.as_millis() as u64,
            "Audit complete"
        );
    }
}

/// Verifies stored claims with bounded concurrency
#[derive(Debug, Clone)]
pub struct ClaimAuditor {
    engine: VerificationEngine,
    concurrency: usize,
    verify_timeout: Duration,
}

impl ClaimAuditor {
    pub fn new(engine: VerificationEngine, concurrency: usize, verify_timeout: Duration) -> Self {
        Self {
            engine,
            concurrency: concurrency.max(1),
            verify_timeout,
        }
    }

    pub fn engine(&self) -> &VerificationEngine {
        &self.engine
    }

    /// Fetch the subject's records and audit them
    pub async fn audit(&self, subject: &str, repo: &RepoClient) -> Result<AuditReport> {
        let entries = repo.list_records(subject, VERIFICATION_COLLECTION).await?;
        info!(
            subject = subject,
            records = entries.len(),
            "Fetched verification records"
        );
        Ok(self.audit_entries(subject, entries).await)
    }

    /// Audit already-fetched records
    pub async fn audit_entries(&self, subject: &str, records: Vec<RecordEntry>) -> AuditReport {
        let started = Instant::now();

        let mut entries: Vec<AuditEntry> = stream::iter(records)
            .map(|record| self.audit_entry(subject, record))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        entries.sort_by(|a, b| a.uri.cmp(&b.uri));

        AuditReport {
            subject: subject.to_string(),
            entries,
            elapsed: started.elapsed(),
        }
    }

    async fn audit_entry(&self, subject: &str, entry: RecordEntry) -> AuditEntry {
        let rkey = entry.rkey().map(str::to_string);

        let record = match VerificationRecord::from_json(&entry.value) {
            Ok(record) => record,
            Err(e) => {
                return AuditEntry {
                    uri: entry.uri,
                    rkey,
                    address: None,
                    chain_id: None,
                    status: ClaimStatus::Malformed(e.to_string()),
                }
            }
        };

        let decoded = record.interoperable_address().ok();
        let address = decoded.as_ref().map(|a| a.to_string());
        let chain_id = decoded.as_ref().and_then(|a| a.chain_id().ok());

        if decoded.is_some() && rkey.as_deref() != Some(record.record_key().as_str()) {
            warn!(
                uri = %entry.uri,
                expected = %record.record_key(),
                "Record key does not match encoded address"
            );
        }

        let status = match tokio::time::timeout(
            self.verify_timeout,
            self.engine.verify_detailed(
                subject,
                &record.address,
                &record.block_hash,
                &record.signature,
            ),
        )
        .await
        {
            Ok(outcome) => match outcome.reason() {
                None => ClaimStatus::Valid,
                Some(reason) => ClaimStatus::Invalid(reason.clone()),
            },
            Err(_) => ClaimStatus::Invalid(VerifyError::Transport(format!(
                "verification timed out after {}ms",
                self.verify_timeout.as_millis()
            ))),
        };

        AuditEntry {
            uri: entry.uri,
            rkey,
            address,
            chain_id,
            status,
        }
    }
}
