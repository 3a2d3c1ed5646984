//! HTTP server for health and metrics endpoints

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use eyre::eyre;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;

use crate::audit::{AuditReport, ClaimStatus};

/// Auditor statistics shared between the audit loop and HTTP server
#[derive(Debug, Default, Clone)]
pub struct AuditorStats {
    /// Auditor instance ID
    pub auditor_id: String,
    /// DID being audited
    pub subject: String,
    /// Completed audit runs
    pub audits_completed: u64,
    /// Audit runs that failed before verifying (e.g. PDS unreachable)
    pub audits_failed: u64,
    /// Counts from the most recent completed audit
    pub last_valid: u64,
    pub last_invalid: u64,
    pub last_malformed: u64,
    /// Unix timestamp of the most recent completed audit (0 = none yet)
    pub last_audit_unix: i64,
}

impl AuditorStats {
    pub fn new(auditor_id: &str, subject: &str) -> Self {
        Self {
            auditor_id: auditor_id.to_string(),
            subject: subject.to_string(),
            ..Default::default()
        }
    }

    pub fn record_report(&mut self, report: &AuditReport, finished_unix: i64) {
        self.audits_completed += 1;
        self.last_valid = report.valid_count() as u64;
        self.last_invalid = report.invalid_count() as u64;
        self.last_malformed = report.malformed_count() as u64;
        self.last_audit_unix = finished_unix;
    }
}

/// Prometheus metrics
pub struct Metrics {
    pub audits_total: IntCounter,
    pub audit_failures_total: IntCounter,
    pub claims_valid_total: IntCounter,
    /// Labelled by failure kind
    pub claims_invalid_total: IntCounterVec,
    pub records_malformed_total: IntCounter,
    pub last_audit_claims: IntGauge,
    pub last_audit_timestamp: IntGauge,
    pub last_audit_duration_ms: IntGauge,
    pub registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let audits_total =
            IntCounter::new("claims_auditor_audits_total", "Total completed audit runs")
                .expect("constant metric name is valid");

        let audit_failures_total = IntCounter::new(
            "claims_auditor_audit_failures_total",
            "Audit runs that failed before verification",
        )
        .expect("constant metric name is valid");

        let claims_valid_total = IntCounter::new(
            "claims_auditor_claims_valid_total",
            "Total claims verified as valid",
        )
        .expect("constant metric name is valid");

        let claims_invalid_total = IntCounterVec::new(
            Opts::new(
                "claims_auditor_claims_invalid_total",
                "Total claims that failed verification, by reason",
            ),
            &["reason"],
        )
        .expect("constant metric name is valid");

        let records_malformed_total = IntCounter::new(
            "claims_auditor_records_malformed_total",
            "Total records that could not be parsed as verification claims",
        )
        .expect("constant metric name is valid");

        let last_audit_claims = IntGauge::new(
            "claims_auditor_last_audit_claims",
            "Records seen in the most recent audit",
        )
        .expect("constant metric name is valid");

        let last_audit_timestamp = IntGauge::new(
            "claims_auditor_last_audit_timestamp_seconds",
            "Unix time of the most recent completed audit",
        )
        .expect("constant metric name is valid");

        let last_audit_duration_ms = IntGauge::new(
            "claims_auditor_last_audit_duration_ms",
            "Duration of the most recent audit in milliseconds",
        )
        .expect("constant metric name is valid");

        registry
            .register(Box::new(audits_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(audit_failures_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(claims_valid_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(claims_invalid_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(records_malformed_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(last_audit_claims.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(last_audit_timestamp.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(last_audit_duration_ms.clone()))
            .expect("metric registration must not be called twice");

        Self {
            audits_total,
            audit_failures_total,
            claims_valid_total,
            claims_invalid_total,
            records_malformed_total,
            last_audit_claims,
            last_audit_timestamp,
            last_audit_duration_ms,
            registry,
        }
    }

    pub fn observe_report(&self, report: &AuditReport, finished_unix: i64) {
        self.audits_total.inc();
        for entry in &report.entries {
            match &entry.status {
                ClaimStatus::Valid => self.claims_valid_total.inc(),
                ClaimStatus::Invalid(reason) => self
                    .claims_invalid_total
                    .with_label_values(&[reason.kind()])
                    .inc(),
                ClaimStatus::Malformed(_) => self.records_malformed_total.inc(),
            }
        }
        self.last_audit_claims.set(report.total() as i64);
        self.last_audit_timestamp.set(finished_unix);
        self.last_audit_duration_ms
            .set(report.elapsed.as_millis() as i64);
    }
}

/// Shared state for the HTTP server
pub type SharedStats = Arc<RwLock<AuditorStats>>;
pub type SharedMetrics = Arc<Metrics>;

/// Combined app state
#[derive(Clone)]
pub struct AppState {
    pub stats: SharedStats,
    pub metrics: SharedMetrics,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub auditor_id: String,
    pub subject: String,
    pub audits_completed: u64,
    pub audits_failed: u64,
    pub last_valid: u64,
    pub last_invalid: u64,
    pub last_malformed: u64,
    pub last_audit_unix: i64,
}

/// Health check endpoint handler
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.stats.read().await;
    Json(HealthResponse {
        status: "healthy".to_string(),
        auditor_id: stats.auditor_id.clone(),
        subject: stats.subject.clone(),
        audits_completed: stats.audits_completed,
        audits_failed: stats.audits_failed,
        last_valid: stats.last_valid,
        last_invalid: stats.last_invalid,
        last_malformed: stats.last_malformed,
        last_audit_unix: stats.last_audit_unix,
    })
}

/// Liveness check (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Readiness check (ready once one audit has completed)
async fn readiness(State(state): State<AppState>) -> &'static str {
    let stats = state.stats.read().await;
    if stats.audits_completed > 0 {
        "OK"
    } else {
        "NOT_READY"
    }
}

/// Prometheus metrics endpoint
async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry.gather();
    let mut buffer = Vec::new();

    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response();
    }

    match Response::builder()
        .header(header::CONTENT_TYPE, encoder.format_type())
        .body(axum::body::Body::from(buffer))
    {
        Ok(resp) => resp,
        Err(_) => (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to build metrics response",
        )
            .into_response(),
    }
}

pub fn router(stats: SharedStats, metrics: SharedMetrics) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(liveness))
        .route("/readyz", get(readiness))
        .route("/metrics", get(prometheus_metrics))
        .with_state(AppState { stats, metrics })
}

/// Start the HTTP server for health and metrics
pub async fn start_server(
    bind_address: &str,
    port: u16,
    stats: SharedStats,
    prom_metrics: SharedMetrics,
) -> eyre::Result<()> {
    let app = router(stats, prom_metrics);

    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .map_err(|e| eyre!("Invalid bind address {}:{}: {}", bind_address, port, e))?;
    info!("Health server listening on {}", addr);
    info!("  /health  - Full health status (JSON)");
    info!("  /metrics - Prometheus metrics");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
