//! Overseer console entry point: a headless driver that mirrors the backend
//! into the store and logs what it sees.

use overseer_console::api_client::{RestClient, WsClient};
use overseer_console::callbacks::LogSink;
use overseer_console::config::ConsoleConfig;
use overseer_console::connection::{ConnectionManager, ConnectionState};
use overseer_console::effects::Effects;
use overseer_console::error::ConsoleError;
use overseer_console::persistence::FileConnectionMemory;
use overseer_console::reconcile::ReconcileEngine;
use overseer_console::router::Router;
use overseer_console::store::Store;
use overseer_wire::ClientMessage;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const PING_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), ConsoleError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ConsoleConfig::load()?;
    let rest = RestClient::new(&config)?;
    let ws = WsClient::new(&config);
    let memory = FileConnectionMemory::open(config.state_path.clone())?;

    let (event_tx, mut event_rx) = mpsc::channel(256);
    let (outbound_tx, outbound_rx) = mpsc::channel(64);

    let effects = Effects::new(
        rest,
        event_tx.clone(),
        outbound_tx,
        config.history.tool_history_limit,
    );
    let engine = ReconcileEngine::new(
        config.history.page_limit as u64,
        Duration::from_millis(config.history.resync_settle_ms),
    );
    let mut router = Router::new(engine);
    let mut store = Store::new();
    let mut ui = LogSink;

    let manager = ConnectionManager::new(
        ws,
        config.reconnect.clone(),
        event_tx.clone(),
        outbound_rx,
        Box::new(memory),
    );
    manager.connect();

    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ping.tick() => {
                if manager.state() == ConnectionState::Open {
                    effects.send(ClientMessage::Ping);
                }
            }
            event = event_rx.recv() => match event {
                Some(event) => router.handle(&mut store, &effects, &mut ui, event),
                None => return Err(ConsoleError::ChannelClosed),
            },
        }
    }
}
