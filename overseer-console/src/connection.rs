//! WebSocket connection lifecycle: connect, read, reconnect with capped
//! exponential backoff, and give up after the configured retry budget.
//!
//! The manager owns no store state. Everything it learns is posted as a
//! [`ConsoleEvent`] to the driver channel, and outbound [`ClientMessage`]s
//! reach the socket through an mpsc the rest of the crate writes into.

use crate::api_client::WsClient;
use crate::config::ReconnectConfig;
use crate::events::ConsoleEvent;
use crate::persistence::ConnectionMemory;
use futures_util::{SinkExt, StreamExt};
use overseer_wire::{decode_server_message, ClientMessage, Decoded};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Open = 2,
    /// Retry budget exhausted; only a manual [`ConnectionManager::connect`]
    /// leaves this state.
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Open,
            3 => ConnectionState::Closed,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Delay before retry number `attempts` (1-based): the initial delay doubled
/// per failed cycle, capped at the configured maximum.
pub fn backoff_delay(config: &ReconnectConfig, attempts: u32) -> Duration {
    let exponent = attempts.saturating_sub(1).min(31);
    let delay_ms = config
        .initial_ms
        .saturating_mul(1u64 << exponent)
        .min(config.max_ms);
    Duration::from_millis(delay_ms)
}

enum SessionEnd {
    /// The outbound channel closed; the process is going down.
    Shutdown,
    Dropped(String),
}

struct Inner {
    ws: WsClient,
    reconnect: ReconnectConfig,
    events: mpsc::Sender<ConsoleEvent>,
    outbound: tokio::sync::Mutex<mpsc::Receiver<ClientMessage>>,
    memory: Mutex<Box<dyn ConnectionMemory>>,
    state: AtomicU8,
    reconnect_count: AtomicU64,
}

/// Handle for starting and observing the connection loop. Cheap to clone.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(
        ws: WsClient,
        reconnect: ReconnectConfig,
        events: mpsc::Sender<ConsoleEvent>,
        outbound: mpsc::Receiver<ClientMessage>,
        memory: Box<dyn ConnectionMemory>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                ws,
                reconnect,
                events,
                outbound: tokio::sync::Mutex::new(outbound),
                memory: Mutex::new(memory),
                state: AtomicU8::new(ConnectionState::Disconnected as u8),
                reconnect_count: AtomicU64::new(0),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.state.load(Ordering::SeqCst))
    }

    /// Start the connection loop. Idempotent: a second call while a loop is
    /// already connecting or connected does nothing. After a terminal
    /// failure this restarts the loop with a fresh retry budget.
    pub fn connect(&self) -> bool {
        let started = self.try_enter_connecting();
        if started {
            let inner = self.inner.clone();
            tokio::spawn(run(inner));
        }
        started
    }

    fn try_enter_connecting(&self) -> bool {
        for from in [ConnectionState::Disconnected, ConnectionState::Closed] {
            if self
                .inner
                .state
                .compare_exchange(
                    from as u8,
                    ConnectionState::Connecting as u8,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
            {
                return true;
            }
        }
        false
    }
}

async fn run(inner: Arc<Inner>) {
    // Held for the lifetime of this loop; a restart after terminal failure
    // picks the receiver back up here.
    let mut outbound = inner.outbound.lock().await;
    let mut attempts: u32 = 0;

    loop {
        match inner.ws.connect().await {
            Ok(stream) => {
                attempts = 0;
                inner
                    .state
                    .store(ConnectionState::Open as u8, Ordering::SeqCst);
                let reconnect_count = inner.reconnect_count.fetch_add(1, Ordering::SeqCst) + 1;
                let resync = {
                    let mut memory = inner.memory.lock().unwrap_or_else(|e| e.into_inner());
                    let resync = memory.has_connected_before();
                    memory.mark_connected();
                    resync
                };
                if inner
                    .events
                    .send(ConsoleEvent::ConnectionOpened {
                        resync,
                        reconnect_count,
                    })
                    .await
                    .is_err()
                {
                    return;
                }

                let end = drive_session(&inner, stream, &mut outbound).await;
                inner
                    .state
                    .store(ConnectionState::Connecting as u8, Ordering::SeqCst);
                match end {
                    SessionEnd::Shutdown => {
                        inner
                            .state
                            .store(ConnectionState::Disconnected as u8, Ordering::SeqCst);
                        return;
                    }
                    SessionEnd::Dropped(reason) => {
                        tracing::info!(%reason, "connection dropped");
                        if inner
                            .events
                            .send(ConsoleEvent::ConnectionClosed { reason })
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "connection attempt failed");
            }
        }

        attempts += 1;
        if attempts >= inner.reconnect.max_attempts {
            inner
                .state
                .store(ConnectionState::Closed as u8, Ordering::SeqCst);
            let _ = inner
                .events
                .send(ConsoleEvent::TerminalFailure { attempts })
                .await;
            return;
        }
        let delay = backoff_delay(&inner.reconnect, attempts);
        tracing::debug!(attempts, ?delay, "reconnecting after backoff");
        tokio::time::sleep(delay).await;
    }
}

async fn drive_session(
    inner: &Inner,
    stream: crate::api_client::WsStream,
    outbound: &mut mpsc::Receiver<ClientMessage>,
) -> SessionEnd {
    let (mut sink, mut read) = stream.split();

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match decode_server_message(&text) {
                        Ok(Decoded::Known(message)) => {
                            if inner
                                .events
                                .send(ConsoleEvent::Message(message))
                                .await
                                .is_err()
                            {
                                return SessionEnd::Shutdown;
                            }
                        }
                        Ok(Decoded::Unknown { msg_type }) => {
                            tracing::warn!(%msg_type, "unhandled message type dropped");
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "malformed frame dropped");
                        }
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    if sink.send(Message::Pong(payload)).await.is_err() {
                        return SessionEnd::Dropped("pong send failed".to_string());
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "server closed".to_string());
                    return SessionEnd::Dropped(reason);
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => return SessionEnd::Dropped(err.to_string()),
                None => return SessionEnd::Dropped("stream ended".to_string()),
            },
            message = outbound.recv() => match message {
                Some(message) => match message.encode() {
                    Ok(text) => {
                        if sink.send(Message::Text(text)).await.is_err() {
                            return SessionEnd::Dropped("send failed".to_string());
                        }
                    }
                    Err(err) => tracing::error!(error = %err, "outbound message not encodable"),
                },
                None => return SessionEnd::Shutdown,
            },
        }
    }
}
