//! FlightSurety relay server
//!
//! Registers the oracle accounts, answers oracle requests with simulated
//! flight statuses and relays refund, withdraw and status events to the dapp
//! over HTTP.

use std::sync::Arc;

use anyhow::Context;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use flightsurety_server::app_state::AppState;
use flightsurety_server::chain::{ChainClient, RpcChainClient};
use flightsurety_server::config::{NetworkConfig, RelayConfig};
use flightsurety_server::event_listener::EventListener;
use flightsurety_server::routes;
use flightsurety_server::services::{
    EventLedger, OracleRegistry, OracleResponder, RandomStatusPolicy,
};

const LISTENER_SUPERVISOR_MAX_BACKOFF_SECONDS: u64 = 30;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = RelayConfig::from_env().context("invalid relay configuration")?;
    let network = NetworkConfig::load(&config.network_file, &config.network)
        .context("failed to load network config")?;

    let chain: Arc<dyn ChainClient> = Arc::new(
        RpcChainClient::new(network.url.clone(), network.app_address, network.data_address)
            .with_gas_limit(config.gas_limit)
            .with_receipt_timeout(config.receipt_timeout),
    );

    let registry = Arc::new(OracleRegistry::new(chain.clone(), config.oracle_stake));
    let ledger = Arc::new(EventLedger::new());
    let responder = Arc::new(OracleResponder::new(
        chain.clone(),
        registry.clone(),
        Arc::new(RandomStatusPolicy),
    ));
    let listener = Arc::new(EventListener::new(
        chain.clone(),
        responder,
        ledger.clone(),
        config.poll_interval,
        config.replay_from,
    ));

    // Registration and event handling start together; requests that arrive
    // before an oracle is registered simply get fewer responses.
    tokio::spawn(register_oracles(chain, registry, config.oracle_accounts));
    tokio::spawn(supervise_listener(listener));

    let app = routes::app(AppState::new(ledger));

    let addr = config.socket_addr();
    info!("Server starting on {}", addr);

    let tcp = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(tcp, app).await.context("relay server failed")?;

    Ok(())
}

async fn register_oracles(
    chain: Arc<dyn ChainClient>,
    registry: Arc<OracleRegistry>,
    (start, end): (usize, usize),
) {
    let accounts = match chain.accounts().await {
        Ok(accounts) => accounts,
        Err(err) => {
            error!(error = %err, "failed to list node accounts; no oracles registered");
            return;
        }
    };

    let end = end.min(accounts.len());
    let start = start.min(end);
    let registered = registry.register_all(&accounts[start..end]).await;
    info!(registered, requested = end - start, "oracle registration finished");
}

/// Restarts the event listener with backoff if it panics.
async fn supervise_listener(listener: Arc<EventListener>) {
    let mut restart_count: u32 = 0;
    loop {
        let handle = tokio::spawn(listener.clone().start());

        match handle.await {
            Ok(()) => {
                info!("event listener exited cleanly; stopping supervisor");
                break;
            }
            Err(join_error) => {
                if join_error.is_panic() {
                    error!("event listener panicked; restarting");
                } else {
                    error!(error = %join_error, "event listener task failed; restarting");
                }
            }
        }

        restart_count = restart_count.saturating_add(1);
        let backoff_seconds = (2u64.saturating_pow(restart_count.min(5)))
            .min(LISTENER_SUPERVISOR_MAX_BACKOFF_SECONDS);
        warn!(restart_count, backoff_seconds, "event listener restart backoff");
        sleep(Duration::from_secs(backoff_seconds)).await;
    }
}
