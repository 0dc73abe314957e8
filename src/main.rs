//! pancakesbot binary: load config, open the identity store, load the
//! configured plugins and run the event loop.

use pancakesbot::events::HostEvent;
use pancakesbot::network::Client;
use pancakesbot::outbound::Outbox;
use pancakesbot::plugins::builtin;
use pancakesbot::{Bot, Config, Database, Host};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Capacity of the inbound event and outbound request queues.
const QUEUE_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        nick = %config.nick,
        network = %config.network,
        port = config.port,
        "Starting pancakesbot"
    );

    // Open the identity store
    let db_path = config.database_path();
    let db = Database::new(&db_path.to_string_lossy()).await.map_err(|e| {
        error!(path = %db_path.display(), error = %e, "Failed to open identity database");
        e
    })?;

    let (outbox, outbound_rx) = Outbox::channel(QUEUE_CAPACITY);
    let (events_tx, events_rx) = mpsc::channel(QUEUE_CAPACITY);
    let keepalive = Duration::from_secs(config.keepalive_secs.max(1));
    let initial_plugins = config.plugins.clone();

    let bot = Bot::new(config, db, builtin::catalog(), outbox);

    for name in &initial_plugins {
        match bot.load_plugin(name) {
            Ok(()) => info!(plugin = %name, "Startup plugin loaded"),
            Err(e) => warn!(plugin = %name, error = %e, "Startup plugin failed to load"),
        }
    }

    // Transport
    let client = tokio::spawn(Client::new(events_tx.clone(), outbound_rx).run());

    // Keep-alive ticks share the event queue
    {
        let events_tx = events_tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(keepalive);
            interval.tick().await;
            loop {
                interval.tick().await;
                if events_tx.send(HostEvent::Keepalive).await.is_err() {
                    break;
                }
            }
        });
    }

    // Ctrl-C asks the loop to quit cleanly
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = events_tx.send(HostEvent::Shutdown).await;
        }
    });

    let result = Host::new(bot.clone(), events_rx).run().await;

    // Let the transport flush the QUIT before the runtime goes away.
    tokio::time::sleep(Duration::from_secs(1)).await;
    drop(bot);
    client.abort();

    result?;
    info!("pancakesbot stopped");
    Ok(())
}
