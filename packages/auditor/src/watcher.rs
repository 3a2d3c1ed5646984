//! Audit loop
//!
//! Runs [`ClaimAuditor`] against the configured subject once, or on a fixed
//! interval until shutdown.

use std::sync::Arc;
use std::time::Duration;

use eyre::{eyre, Result};
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info};

use claims_rs::{ChainRegistry, VerificationEngine};

use crate::audit::{AuditReport, ClaimAuditor};
use crate::config::Config;
use crate::repo_client::RepoClient;
use crate::server::{AuditorStats, Metrics, SharedMetrics, SharedStats};

pub struct AuditWatcher {
    subject: String,
    audit_interval: Duration,
    auditor: ClaimAuditor,
    repo: RepoClient,
    stats: SharedStats,
    metrics: SharedMetrics,
}

impl AuditWatcher {
    pub fn new(config: &Config) -> Result<Self> {
        let registry = ChainRegistry::from_config(&config.chains)?;
        if registry.is_empty() {
            return Err(eyre!("No enabled chains configured"));
        }

        let auditor = ClaimAuditor::new(
            VerificationEngine::new(registry),
            config.concurrency,
            Duration::from_millis(config.verify_timeout_ms),
        );
        let repo = RepoClient::new(
            &config.pds_url,
            Duration::from_millis(config.request_timeout_ms),
        )?;

        Ok(Self::with_parts(
            &config.auditor_id,
            &config.subject,
            Duration::from_secs(config.audit_interval_secs),
            auditor,
            repo,
        ))
    }

    pub fn with_parts(
        auditor_id: &str,
        subject: &str,
        audit_interval: Duration,
        auditor: ClaimAuditor,
        repo: RepoClient,
    ) -> Self {
        Self {
            subject: subject.to_string(),
            audit_interval,
            auditor,
            repo,
            stats: Arc::new(RwLock::new(AuditorStats::new(auditor_id, subject))),
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn stats(&self) -> SharedStats {
        self.stats.clone()
    }

    pub fn metrics(&self) -> SharedMetrics {
        self.metrics.clone()
    }

    /// Run a single audit and publish it to stats and metrics
    pub async fn run_once(&self) -> Result<AuditReport> {
        match self.auditor.audit(&self.subject, &self.repo).await {
            Ok(report) => {
                report.log_summary();
                let now = chrono::Utc::now().timestamp();
                self.metrics.observe_report(&report, now);
                self.stats.write().await.record_report(&report, now);
                Ok(report)
            }
            Err(e) => {
                self.metrics.audit_failures_total.inc();
                self.stats.write().await.audits_failed += 1;
                Err(e)
            }
        }
    }

    /// Audit immediately, then every interval until shutdown.
    pub async fn run(&self, mut shutdown: mpsc::Receiver<()>) -> Result<()> {
        info!(
            subject = %self.subject,
            interval_secs = self.audit_interval.as_secs(),
            "Audit watcher starting..."
        );

        loop {
            if let Err(e) = self.run_once().await {
                error!(error = %e, "Audit failed");
            }

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = tokio::time::sleep(self.audit_interval) => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims_rs::{ChainConfig, MultiChainConfig};

    fn config_with(enabled: bool) -> Config {
        Config {
            auditor_id: "auditor-test".to_string(),
            subject: "did:plc:ewvi7nxzyoun6zhxrhs64oiz".to_string(),
            pds_url: "https://pds.example.com".to_string(),
            chains: MultiChainConfig::new(vec![ChainConfig {
                name: "mainnet".to_string(),
                chain_id: 1,
                rpc_url: "https://eth.example.com".to_string(),
                enabled,
            }])
            .unwrap(),
            audit_interval_secs: 0,
            concurrency: 4,
            verify_timeout_ms: 1_000,
            request_timeout_ms: 1_000,
            health_bind_address: "127.0.0.1".to_string(),
            health_port: 9099,
        }
    }

    #[test]
    fn test_new_builds_registry_from_config() {
        let watcher = AuditWatcher::new(&config_with(true)).unwrap();
        assert_eq!(watcher.auditor.engine().registry().chain_ids(), vec![1]);
    }

    #[test]
    fn test_new_rejects_all_chains_disabled() {
        let err = AuditWatcher::new(&config_with(false)).err().unwrap();
        assert!(err.to_string().contains("No enabled chains"));
    }
}
