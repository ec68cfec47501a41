//! Overseer console engine: connection lifecycle, message routing, the
//! reactive store, and transcript reconciliation.

pub mod api_client;
pub mod callbacks;
pub mod config;
pub mod connection;
pub mod effects;
pub mod error;
pub mod events;
pub mod persistence;
pub mod reconcile;
pub mod router;
pub mod selectors;
pub mod store;
