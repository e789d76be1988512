use std::path::PathBuf;
use std::sync::Arc;

use botfleet::{EngineConfig, HttpGateway, SessionConfig, SessionManager};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "botfleet", about = "Rule-driven trading bot fleet simulator")]
struct Cli {
    /// Market data gateway base URL (overrides BOTFLEET_GATEWAY_URL)
    #[arg(long)]
    gateway_url: Option<String>,

    /// Tick interval in milliseconds (overrides BOTFLEET_TICK_INTERVAL_MS)
    #[arg(long)]
    tick_interval_ms: Option<u64>,

    /// Floor on the inter-tick sleep in milliseconds
    #[arg(long)]
    min_rest_delay_ms: Option<u64>,

    /// Cap on orders inserted per tick
    #[arg(long)]
    max_orders_per_batch: Option<usize>,

    /// Session name
    #[arg(long, default_value = "default")]
    name: String,

    /// Owner id for the session (omit for the default ownerless session)
    #[arg(long)]
    owner: Option<String>,

    /// Path to a JSON rule set binding a fixed strategy to the session;
    /// without it bots run their store-assigned strategies
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Fixed RNG seed for reproducible runs
    #[arg(long)]
    rng_seed: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();

    let mut engine = EngineConfig::from_env()?;
    if let Some(url) = cli.gateway_url {
        engine.gateway_url = url;
    }
    if let Some(ms) = cli.tick_interval_ms {
        engine.tick_interval_ms = ms;
    }
    if let Some(ms) = cli.min_rest_delay_ms {
        engine.min_rest_delay_ms = ms;
    }
    if let Some(cap) = cli.max_orders_per_batch {
        engine.max_orders_per_batch = cap;
    }

    tracing::info!(
        gateway = %engine.gateway_url,
        tick_interval_ms = engine.tick_interval_ms,
        max_orders_per_batch = engine.max_orders_per_batch,
        "botfleet starting"
    );

    let rules = match &cli.rules {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Some(serde_json::from_str(&text)?)
        }
        None => None,
    };

    let gateway = Arc::new(HttpGateway::new(engine.gateway_url.clone()));
    let manager = SessionManager::new(gateway, engine);

    let summary = manager.create_or_reuse_session_for_owner(
        cli.owner.clone(),
        SessionConfig {
            name: cli.name,
            owner_id: cli.owner,
            rules,
            rng_seed: cli.rng_seed,
        },
    )?;
    tracing::info!(session = %summary.id, name = %summary.name, "session running");
    tracing::info!("Press Ctrl+C to stop...");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down sessions...");

    for session in manager.list_sessions() {
        manager.stop_session(&session.id);
    }
    for session in manager.list_sessions() {
        if let Some(handle) = manager.session_handle(&session.id) {
            handle.wait_until_stopped().await;
        }
    }

    tracing::info!("botfleet stopped");
    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "botfleet=info".into()),
        )
        .init();
}
