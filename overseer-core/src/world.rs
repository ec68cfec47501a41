//! Supplemental world/feed types mirrored from the server: areas, buildings,
//! supervisor activity, tool executions, skills, and exec tasks.

use crate::agent::Position;
use crate::identity::{AgentId, TimestampMs};
use serde::{Deserialize, Serialize};

/// A named region of the world that agents can be assigned to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Area {
    pub id: String,
    pub name: String,
    pub position: Position,
    #[serde(default)]
    pub agent_ids: Vec<AgentId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Building {
    pub id: String,
    pub kind: String,
    pub position: Position,
    #[serde(default)]
    pub area_id: Option<String>,
}

/// One line in the supervisor activity feed (reports and narratives).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub text: String,
    pub timestamp: TimestampMs,
    #[serde(default)]
    pub agent_id: Option<AgentId>,
}

/// One tool invocation surfaced by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolExecution {
    pub agent_id: AgentId,
    pub tool_name: String,
    #[serde(default)]
    pub summary: Option<String>,
    pub timestamp: TimestampMs,
}

/// A capability an agent has learned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub agent_ids: Vec<AgentId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecTaskStatus {
    Running,
    Completed,
    Failed,
}

/// A background exec task (long-running shell work) tracked by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecTask {
    pub id: String,
    pub agent_id: AgentId,
    pub command: String,
    pub status: ExecTaskStatus,
    pub started_at: TimestampMs,
    #[serde(default)]
    pub completed_at: Option<TimestampMs>,
    /// Tail of the task's captured output lines.
    #[serde(default)]
    pub output: Vec<String>,
}
