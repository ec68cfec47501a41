//! Overseer wire protocol.
//!
//! WebSocket envelopes are JSON objects `{ "type": ..., "payload": ... }`;
//! both directions use the same shape. Payload decoding happens exactly once,
//! at this boundary; everything past it works with typed values.

pub mod envelope;
pub mod http;

pub use envelope::{
    decode_server_message, ClientMessage, DatabaseStats, Decoded, DecodeError, OutputPayload,
    ServerMessage, SubagentInfo,
};
pub use http::{HistoryPage, ToolHistoryResponse};
