//! Auditor configuration

use claims_rs::multi_chain::{self, validate_rpc_url, MultiChainConfig};
use eyre::{eyre, Result};
use std::env;

/// Default PDS used when `PDS_URL` is unset
pub const DEFAULT_PDS_URL: &str = "https://bsky.social";

/// Auditor configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Instance ID reported on /health
    pub auditor_id: String,

    /// DID whose verification records are audited
    pub subject: String,
    /// PDS hosting the subject's repository
    pub pds_url: String,

    /// Chains claims can be verified on
    pub chains: MultiChainConfig,

    /// Seconds between audit runs; 0 runs once and exits
    pub audit_interval_secs: u64,
    /// Maximum verifications in flight
    pub concurrency: usize,
    /// Per-claim verification timeout in milliseconds
    pub verify_timeout_ms: u64,
    /// PDS request timeout in milliseconds
    pub request_timeout_ms: u64,

    /// Health server bind address (default 127.0.0.1)
    pub health_bind_address: String,
    /// Health server port (default 9099)
    pub health_port: u16,
}

impl Config {
    /// Load configuration from environment
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded .env from {:?}", path);
        }

        let default_id = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| format!("auditor-{}", std::process::id()));

        let subject = env::var("AUDIT_SUBJECT").map_err(|_| eyre!("AUDIT_SUBJECT required"))?;
        if !subject.starts_with("did:") {
            return Err(eyre!(
                "AUDIT_SUBJECT must be a DID (did:plc:... or did:web:...), got {}",
                subject
            ));
        }

        let pds_url = env::var("PDS_URL").unwrap_or_else(|_| DEFAULT_PDS_URL.to_string());
        validate_rpc_url(&pds_url, "PDS_URL")?;

        let chains = multi_chain::load_from_env()?
            .ok_or_else(|| eyre!("CLAIM_CHAINS_COUNT required (at least one chain)"))?;

        let concurrency: usize = env::var("AUDIT_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8);
        if concurrency == 0 {
            return Err(eyre!("AUDIT_CONCURRENCY must be at least 1"));
        }

        Ok(Self {
            auditor_id: env::var("AUDITOR_ID").unwrap_or(default_id),

            subject,
            pds_url,
            chains,

            audit_interval_secs: env::var("AUDIT_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            concurrency,
            verify_timeout_ms: env::var("VERIFY_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),
            request_timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15_000),

            health_bind_address: env::var("HEALTH_BIND_ADDRESS")
                .unwrap_or_else(|_| "127.0.0.1".to_string()),
            health_port: env::var("HEALTH_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(9099),
        })
    }

    /// Whether the auditor keeps running between audits
    pub fn is_continuous(&self) -> bool {
        self.audit_interval_secs > 0
    }
}
