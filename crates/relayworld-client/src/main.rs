//! Relayworld headless client.
//!
//! Binary entry point that wires the reconciliation engine to its
//! collaborators and runs the client loop until Ctrl-C:
//!
//! 1. Load configuration from `relayworld.yaml` (or the given path)
//! 2. Initialize structured logging
//! 3. Build the engine and seed the world
//! 4. Connect to the configured NATS relays, or run offline
//! 5. Read local actions as JSON lines from stdin
//! 6. Run the loop and log a summary on exit

mod error;
mod input;
mod nats_relay;
mod presenter;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use relayworld_core::{
    ClientConfig, Collaborators, Engine, LocalRelay, Relay, StaticPayment, SystemClock, run_client,
};

use crate::error::ClientError;
use crate::nats_relay::NatsRelay;
use crate::presenter::LogPresenter;

const DEFAULT_CONFIG_PATH: &str = "relayworld.yaml";
const ACTION_BUFFER: usize = 64;

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    // 1. Configuration comes first so it can pick the log level.
    let (config, config_path, found) = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config);
    if found {
        info!(path = %config_path.display(), "Configuration loaded");
    } else {
        info!(path = %config_path.display(), "Config file not found, using defaults");
    }
    info!(
        actor = %config.identity.actor,
        seed = config.world.seed,
        relays = config.transport.relays.len(),
        conflict_policy = ?config.reconcile.conflict_policy,
        "relayworld-client starting"
    );

    // 3. Build the engine.
    let mut engine = Engine::new(config.clone(), Box::new(LogPresenter), Utc::now());
    let stats = engine.stats();
    info!(
        nodes = stats.world.nodes_available,
        width = config.world.width,
        height = config.world.height,
        "World seeded"
    );

    // 4. Relay transport.
    let relay: Arc<dyn Relay> = if config.transport.relays.is_empty() {
        warn!("No relays configured, running offline");
        Arc::new(LocalRelay::new())
    } else {
        let nats = NatsRelay::connect(&config.transport.relays, &config.transport.subject_prefix).await?;
        info!(connected = nats.relay_count(), "Relay transport ready");
        Arc::new(nats)
    };
    let collaborators = Collaborators {
        relay,
        clock: Arc::new(SystemClock),
        payments: Some(Arc::new(StaticPayment::new(config.claims.payment_prefix.clone()))),
    };

    // 5. Local actions and shutdown.
    let (action_tx, action_rx) = mpsc::channel(ACTION_BUFFER);
    let _stdin = input::spawn_stdin_reader(action_tx);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            return;
        }
        info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    // 6. Run.
    let summary = run_client(&mut engine, collaborators, action_rx, shutdown_rx).await?;
    let stats = engine.stats();
    info!(
        reason = ?summary.end_reason,
        accepted = summary.accepted,
        rejected = summary.rejected,
        published = summary.published,
        applied = stats.applied,
        structures = stats.world.structures,
        claims = stats.world.claims,
        guilds = stats.world.guilds,
        "relayworld-client shutdown complete"
    );
    Ok(())
}

/// Resolve the config path from the first argument, then
/// `RELAYWORLD_CONFIG`, then `relayworld.yaml`.
///
/// A missing file yields defaults with environment overrides applied.
fn load_config() -> Result<(ClientConfig, PathBuf, bool), ClientError> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("RELAYWORLD_CONFIG").ok())
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if path.exists() {
        let config = ClientConfig::from_file(&path)?;
        Ok((config, path, true))
    } else {
        let mut config = ClientConfig::default();
        config.apply_env_overrides();
        Ok((config, path, false))
    }
}

fn init_tracing(config: &ClientConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
