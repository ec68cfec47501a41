//! Fixed capacities and windows shared across the client.

use crate::identity::TimestampMs;

/// Per-agent live transcript buffer capacity (oldest entries evicted first).
pub const OUTPUT_BUFFER_CAP: usize = 200;

/// Per-boss delegation decision ledger capacity, most-recent-first.
pub const DECISION_LEDGER_CAP: usize = 100;

/// Supervisor activity feed capacity.
pub const ACTIVITY_FEED_CAP: usize = 200;

/// Tool execution feed capacity.
pub const TOOL_EXECUTION_CAP: usize = 100;

/// Reconciliation window: a live line whose `(role, text)` matches a history
/// entry within this many milliseconds is treated as the same message.
pub const DEDUP_WINDOW_MS: TimestampMs = 120_000;
