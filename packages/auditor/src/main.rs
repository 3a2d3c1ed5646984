//! Claims Auditor
//!
//! Fetches an atproto account's chain verification records from its PDS and
//! re-verifies each one against the configured EVM chains.
//!
//! With `AUDIT_INTERVAL_SECS=0` (the default) it audits once and exits
//! non-zero if the audit could not be performed. Otherwise it re-audits on
//! the interval and serves `/health`, `/readyz` and `/metrics` until
//! Ctrl+C or SIGTERM.

use auditor::{AuditWatcher, Config};
use tracing::{error, info};

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    init_logging();

    info!("Starting Claims Auditor");

    let config = Config::load()?;
    info!(
        auditor_id = %config.auditor_id,
        subject = %config.subject,
        pds = %config.pds_url,
        chains = ?config.chains.chain_ids(),
        "Configuration loaded"
    );

    let watcher = AuditWatcher::new(&config)?;

    if !config.is_continuous() {
        let report = watcher.run_once().await?;
        info!(
            valid = report.valid_count(),
            invalid = report.invalid_count(),
            malformed = report.malformed_count(),
            "Single audit finished"
        );
        return Ok(());
    }

    let bind_address = config.health_bind_address.clone();
    let port = config.health_port;
    let stats = watcher.stats();
    let metrics = watcher.metrics();
    tokio::spawn(async move {
        if let Err(e) = auditor::server::start_server(&bind_address, port, stats, metrics).await {
            error!(error = %e, "Health server failed");
        }
    });

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);

    // Handle signals
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let _ = shutdown_tx.send(()).await;
    });

    watcher.run(shutdown_rx).await?;

    info!("Claims Auditor stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,claims_auditor=debug,auditor=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
