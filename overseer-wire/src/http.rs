//! HTTP collaborator response DTOs.

use overseer_core::{OutputEntry, ToolExecution};
use serde::{Deserialize, Serialize};

/// One page of persisted transcript history for an agent.
///
/// `GET /api/agents/:id/history?limit&offset`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub messages: Vec<OutputEntry>,
    pub has_more: bool,
    pub total_count: u64,
}

/// Recent tool executions across all agents.
///
/// `GET /api/agents/tool-history?limit`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolHistoryResponse {
    pub executions: Vec<ToolExecution>,
}
