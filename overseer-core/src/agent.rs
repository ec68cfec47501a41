//! Agent session types.

use crate::identity::AgentId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of an agent session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Working,
    Waiting,
    WaitingPermission,
    Error,
    Offline,
    /// Session exists on disk but its process is gone.
    Orphaned,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Working => "working",
            AgentStatus::Waiting => "waiting",
            AgentStatus::WaitingPermission => "waiting_permission",
            AgentStatus::Error => "error",
            AgentStatus::Offline => "offline",
            AgentStatus::Orphaned => "orphaned",
        }
    }

    /// Whether the agent can accept a new command right now.
    pub fn accepts_commands(&self) -> bool {
        matches!(
            self,
            AgentStatus::Idle | AgentStatus::Waiting | AgentStatus::WaitingPermission
        )
    }

    pub fn is_live(&self) -> bool {
        !matches!(self, AgentStatus::Offline | AgentStatus::Orphaned)
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown agent status: {0}")]
pub struct AgentStatusParseError(String);

impl FromStr for AgentStatus {
    type Err = AgentStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(AgentStatus::Idle),
            "working" => Ok(AgentStatus::Working),
            "waiting" => Ok(AgentStatus::Waiting),
            "waiting_permission" => Ok(AgentStatus::WaitingPermission),
            "error" => Ok(AgentStatus::Error),
            "offline" => Ok(AgentStatus::Offline),
            "orphaned" => Ok(AgentStatus::Orphaned),
            other => Err(AgentStatusParseError(other.to_string())),
        }
    }
}

/// World position of an agent, server-authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Context-window usage counters reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextUsage {
    pub used_tokens: u64,
    pub max_tokens: u64,
}

impl ContextUsage {
    /// Fraction of the context window consumed, in `[0.0, 1.0]`.
    pub fn fraction(&self) -> f64 {
        if self.max_tokens == 0 {
            return 0.0;
        }
        (self.used_tokens as f64 / self.max_tokens as f64).clamp(0.0, 1.0)
    }
}

/// One agent session, mirrored from the server.
///
/// The hierarchy is at most two levels: a boss has subordinates, and a
/// subordinate never has subordinates of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub status: AgentStatus,
    /// Absent until the first provider session exists for this agent.
    pub session_id: Option<String>,
    pub position: Position,
    #[serde(default)]
    pub context: ContextUsage,
    #[serde(default)]
    pub boss_id: Option<AgentId>,
    #[serde(default)]
    pub subordinate_ids: Vec<AgentId>,
}

impl Agent {
    pub fn is_boss(&self) -> bool {
        !self.subordinate_ids.is_empty()
    }

    pub fn is_subordinate(&self) -> bool {
        self.boss_id.is_some()
    }
}
