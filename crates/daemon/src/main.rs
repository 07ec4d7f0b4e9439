//! Balance daemon
//!
//! Main entry point: loads the wallet list, runs the refresh coordinator and
//! logs each published snapshot until interrupted.

use std::env;
use std::sync::Arc;

use tokio::signal;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use balance_daemon::{DaemonConfig, StaticBalanceProvider, StaticCdpProvider};
use balance_refresh::{MemoryWalletStore, RefreshCoordinator, RefreshEvent, Trigger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting balance daemon v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = env::var("BALANCE_CONFIG").unwrap_or_else(|_| "balance.toml".to_string());
    let config = DaemonConfig::load(&config_path)?;
    info!("Tracking {} wallets from {}", config.wallets.len(), config_path);

    let store = Arc::new(MemoryWalletStore::with_wallets(
        config.stored_wallets(),
        config.primary(),
    ));
    let balances = Arc::new(StaticBalanceProvider::from_entries(&config.wallets));
    let cdps = Arc::new(StaticCdpProvider::from_entries(&config.wallets));

    let mut coordinator = RefreshCoordinator::spawn(config.refresh.clone(), store, balances, cdps)?;
    let handle = coordinator.handle();

    // Log everything the coordinator publishes
    let mut events = handle.subscribe_events();
    let logger = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Event logger fell behind, skipped {} events", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    handle.request_refresh(Trigger::Manual)?;

    // Periodic reload
    let poller = config.poll_interval().map(|period| {
        let handle = handle.clone();
        info!("Refreshing every {:?}", period);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // First tick completes immediately; the startup refresh covers it
            interval.tick().await;

            loop {
                interval.tick().await;
                if handle.request_refresh(Trigger::Timer).is_err() {
                    break;
                }
            }
        })
    });

    info!("Press Ctrl+C to shutdown");
    shutdown_signal().await;

    if let Some(poller) = poller {
        poller.abort();
    }
    coordinator.stop().await;
    logger.abort();

    info!("Shutdown complete");
    Ok(())
}

fn log_event(event: &RefreshEvent) {
    match event {
        RefreshEvent::Started { cycle, trigger } => {
            debug!("Cycle {} started ({:?})", cycle, trigger);
        }
        RefreshEvent::Published { snapshot, count_changed } => {
            for wallet in snapshot.tabs() {
                match &wallet.balance {
                    Some(balance) => info!(
                        "{}: {} ETH, ${}, {} tokens, {} CDPs owing {}",
                        wallet.tab_title(),
                        balance.eth,
                        balance.usd_value,
                        balance.tokens.len(),
                        wallet.cdps.len(),
                        wallet.total_debt()
                    ),
                    None => info!(
                        "{}: balance unavailable, {} CDPs owing {}",
                        wallet.tab_title(),
                        wallet.cdps.len(),
                        wallet.total_debt()
                    ),
                }
                for cdp in &wallet.cdps {
                    match cdp.collateral_ratio() {
                        Some(ratio) => debug!("  CDP {} ({}): ratio {:.2}", cdp.id, cdp.collateral_type, ratio),
                        None => debug!("  CDP {} ({}): no debt", cdp.id, cdp.collateral_type),
                    }
                }
            }
            if *count_changed {
                info!("Wallet count is now {}", snapshot.wallet_count());
            }
            match serde_json::to_string(snapshot.as_ref()) {
                Ok(json) => debug!("Snapshot {}: {}", snapshot.cycle, json),
                Err(e) => warn!("Could not serialize snapshot {}: {}", snapshot.cycle, e),
            }
        }
        RefreshEvent::Aborted { cycle, error } => {
            error!("Cycle {} aborted: {}", cycle, error);
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        }
        _ = terminate => {
            info!("Received termination signal");
        }
    }
}
