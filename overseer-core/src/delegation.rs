//! Delegation decision and subordinate task-progress types.

use crate::identity::{AgentId, DecisionId, TimestampMs};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of one delegation decision in a boss ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    /// The boss is still reasoning about where to route the command.
    Pending,
    /// The command was routed to the selected subordinate.
    Sent,
    Completed,
    Failed,
}

impl DecisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionStatus::Pending => "pending",
            DecisionStatus::Sent => "sent",
            DecisionStatus::Completed => "completed",
            DecisionStatus::Failed => "failed",
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DecisionStatus::Completed | DecisionStatus::Failed)
    }
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown decision status: {0}")]
pub struct DecisionStatusParseError(String);

impl FromStr for DecisionStatus {
    type Err = DecisionStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DecisionStatus::Pending),
            "sent" => Ok(DecisionStatus::Sent),
            "completed" => Ok(DecisionStatus::Completed),
            "failed" => Ok(DecisionStatus::Failed),
            other => Err(DecisionStatusParseError(other.to_string())),
        }
    }
}

/// One entry in a boss agent's delegation ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationDecision {
    pub id: DecisionId,
    pub boss_id: AgentId,
    #[serde(default)]
    pub selected_agent_id: Option<AgentId>,
    pub status: DecisionStatus,
    pub reasoning: String,
    pub user_command: String,
    pub timestamp: TimestampMs,
}

/// Marker left on a subordinate when a delegation reaches it, cleared when
/// its task completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastDelegation {
    pub boss_name: String,
    pub command: String,
    pub timestamp: TimestampMs,
}

/// Key of one subordinate task run.
pub type TaskKey = (AgentId, AgentId); // (boss_id, subordinate_id)

/// Status of a delegated task run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Working,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Live progress of one delegated task, orthogonal to the transcript buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentTaskProgress {
    pub status: TaskStatus,
    pub output: Vec<String>,
    pub started_at: TimestampMs,
    #[serde(default)]
    pub completed_at: Option<TimestampMs>,
}

impl AgentTaskProgress {
    pub fn started(at: TimestampMs) -> Self {
        Self {
            status: TaskStatus::Working,
            output: Vec::new(),
            started_at: at,
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_status_round_trips() {
        for status in [
            DecisionStatus::Pending,
            DecisionStatus::Sent,
            DecisionStatus::Completed,
            DecisionStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<DecisionStatus>().unwrap(), status);
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(!DecisionStatus::Pending.is_terminal());
        assert!(!DecisionStatus::Sent.is_terminal());
        assert!(DecisionStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Working.is_terminal());
    }

    #[test]
    fn new_task_progress_is_working_with_no_output() {
        let progress = AgentTaskProgress::started(1_000);
        assert_eq!(progress.status, TaskStatus::Working);
        assert!(progress.output.is_empty());
        assert_eq!(progress.started_at, 1_000);
        assert!(progress.completed_at.is_none());
    }
}
