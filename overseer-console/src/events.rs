//! Event types for the console driver loop.
//!
//! Every state mutation flows through one of these on a single mpsc channel,
//! so all store writes happen on one task and each read-modify-write is a
//! single synchronous closure.

use crate::api_client::ApiClientError;
use overseer_core::AgentId;
use overseer_wire::{HistoryPage, ServerMessage, ToolHistoryResponse};

/// Which history fetch produced a [`ConsoleEvent::HistoryFetched`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryFetchKind {
    /// First page after a view open or reconnect; triggers reconciliation.
    Initial,
    /// An older page requested through `load_more_history`; prepended as-is.
    OlderPage,
}

#[derive(Debug)]
pub enum ConsoleEvent {
    /// A decoded inbound server message.
    Message(Box<ServerMessage>),
    /// Socket opened. `resync` is false only on the very first connection
    /// this client has ever made.
    ConnectionOpened { resync: bool, reconnect_count: u64 },
    ConnectionClosed { reason: String },
    /// The reconnect budget is exhausted; no further retries will happen.
    TerminalFailure { attempts: u32 },
    /// Completion of a spawned history fetch. `seq` is the per-agent request
    /// counter value this fetch was issued with.
    HistoryFetched {
        agent_id: AgentId,
        seq: u64,
        kind: HistoryFetchKind,
        result: Result<HistoryPage, ApiClientError>,
    },
    ToolHistoryFetched(Result<ToolHistoryResponse, ApiClientError>),
    ApiError(String),
}
