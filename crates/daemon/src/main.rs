//! Provisio daemon - entry point and composition root

mod config;
mod telemetry;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{BackendConfig, EngineConfig, NotifierConfig};
use provisio_api_rpc::RpcServer;
use provisio_core::application::{JobController, RecoveryService, RegionCatalog};
use provisio_core::port::{CompositeNotifier, LogNotifier, Notifier, ProvisioningBackend};
use provisio_infra_notify::{TelegramNotifier, WebhookNotifier};
use provisio_infra_sqlite::{create_pool, file_url, run_migrations, SqliteJobStore};
use provisio_infra_system::{SimulatedBackend, SubprocessBackend, SubprocessConfig};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging
    let _telemetry = telemetry::init()?;
    info!("Provisio daemon v{} starting...", VERSION);

    // 2. Configuration
    let config = EngineConfig::load()?;
    let db_path = config.db_path();

    // 3. Database
    if let Some(parent) = Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    info!(db_path = %db_path, "Initializing database...");
    let pool = create_pool(&file_url(Path::new(&db_path)))
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;
    let store = Arc::new(SqliteJobStore::new(pool));

    // 4. Wiring
    let backend = build_backend(&config.backend);
    let notifier = build_notifier(&config.notifiers);
    let catalog = RegionCatalog::seeded().with_overrides(config.regions.clone());

    let controller = JobController::builder(store.clone(), backend)
        .catalog(catalog)
        .notifier(notifier)
        .config(config.controller_config())
        .build();

    // 5. Resume jobs left unfinished by the previous run
    info!("Running restart recovery...");
    match RecoveryService::new(store, controller.clone())
        .recover_unfinished()
        .await
    {
        Ok(report) => info!(resumed = report.resumed, "Restart recovery completed"),
        Err(e) => tracing::error!(error = %e, "Restart recovery failed"),
    }

    // 6. JSON-RPC server
    let (addr, rpc_handle) = RpcServer::new(config.rpc.clone(), controller.clone())
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!(addr = %addr, "System ready. Press Ctrl+C to shutdown");

    // 7. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 8. Graceful shutdown: stop accepting requests, then park the loops
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    controller.shutdown(config.shutdown_grace()).await;

    info!("Shutdown complete.");
    Ok(())
}

fn build_backend(config: &BackendConfig) -> Arc<dyn ProvisioningBackend> {
    match config {
        BackendConfig::Simulated {
            seed,
            success_scale,
            latency_ms,
        } => {
            info!(seed = ?seed, success_scale, "Using simulated backend");
            Arc::new(
                SimulatedBackend::new(*seed, *success_scale)
                    .with_latency(Duration::from_millis(*latency_ms)),
            )
        }
        BackendConfig::Subprocess {
            program,
            args,
            timeout_secs,
        } => {
            info!(program = %program, "Using subprocess backend");
            Arc::new(SubprocessBackend::new(
                SubprocessConfig::new(program.clone())
                    .with_args(args.clone())
                    .with_timeout(Duration::from_secs(*timeout_secs)),
            ))
        }
    }
}

fn build_notifier(config: &NotifierConfig) -> Arc<dyn Notifier> {
    let mut sinks: Vec<Arc<dyn Notifier>> = vec![Arc::new(LogNotifier)];

    if let Some(url) = &config.webhook_url {
        match WebhookNotifier::new(url.clone()) {
            Ok(webhook) => sinks.push(Arc::new(webhook)),
            Err(e) => warn!(error = %e, "Webhook notifier disabled"),
        }
    }

    if let Some(telegram) = &config.telegram {
        match TelegramNotifier::new(telegram.bot_token.clone(), telegram.chat_id.clone()) {
            Ok(bot) => sinks.push(Arc::new(bot)),
            Err(e) => warn!(error = %e, "Telegram notifier disabled"),
        }
    }

    info!(sinks = sinks.len(), "Notifiers configured");
    Arc::new(CompositeNotifier::new(sinks))
}
