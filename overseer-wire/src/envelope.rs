//! WebSocket envelope types.
//!
//! Inbound messages are decoded through [`decode_server_message`], which
//! distinguishes malformed frames (a decode error) from frames whose type the
//! client simply does not know (dropped upstream with a warning, never fatal).

use overseer_core::{
    Agent, AgentId, Area, Building, DelegationDecision, ExecTask, ExecTaskStatus, OutputEntry,
    Position, Skill, TaskStatus, TimestampMs,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// All message types the server broadcasts.
///
/// Delivery is at-least-once and may interleave across types; every handler
/// downstream must tolerate duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    // ========================================================================
    // AGENT LIFECYCLE
    // ========================================================================
    /// Full roster snapshot; authoritative replacement for all agents.
    AgentsUpdate { agents: Vec<Agent> },
    AgentCreated { agent: Agent },
    AgentUpdated { agent: Agent },
    AgentDeleted {
        #[serde(rename = "agentId")]
        agent_id: AgentId,
    },
    /// First provider session attached to an agent.
    SessionStarted {
        #[serde(rename = "agentId")]
        agent_id: AgentId,
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    ContextUsage {
        #[serde(rename = "agentId")]
        agent_id: AgentId,
        #[serde(rename = "usedTokens")]
        used_tokens: u64,
        #[serde(rename = "maxTokens")]
        max_tokens: u64,
    },

    // ========================================================================
    // STREAMING OUTPUT
    // ========================================================================
    Output(OutputPayload),
    CommandStarted {
        #[serde(rename = "agentId")]
        agent_id: AgentId,
        command: String,
        timestamp: TimestampMs,
    },
    OutputsCleared {
        #[serde(rename = "agentId")]
        agent_id: AgentId,
    },

    // ========================================================================
    // AREAS / BUILDINGS
    // ========================================================================
    AreasUpdate { areas: Vec<Area> },
    AreaUpdated { area: Area },
    BuildingsUpdate { buildings: Vec<Building> },
    BuildingPlaced { building: Building },

    // ========================================================================
    // SUPERVISOR
    // ========================================================================
    SupervisorReport {
        text: String,
        timestamp: TimestampMs,
        #[serde(rename = "agentId", default)]
        agent_id: Option<AgentId>,
    },
    SupervisorNarrative {
        text: String,
        timestamp: TimestampMs,
    },

    // ========================================================================
    // DELEGATION / TASK PROGRESS
    // ========================================================================
    DelegationDecision { decision: DelegationDecision },
    BossSubordinatesUpdated {
        #[serde(rename = "bossId")]
        boss_id: AgentId,
        #[serde(rename = "subordinateIds")]
        subordinate_ids: Vec<AgentId>,
    },
    AgentTaskStarted {
        #[serde(rename = "bossId")]
        boss_id: AgentId,
        #[serde(rename = "agentId")]
        agent_id: AgentId,
        command: String,
        timestamp: TimestampMs,
    },
    AgentTaskOutput {
        #[serde(rename = "bossId")]
        boss_id: AgentId,
        #[serde(rename = "agentId")]
        agent_id: AgentId,
        line: String,
        timestamp: TimestampMs,
    },
    AgentTaskCompleted {
        #[serde(rename = "bossId")]
        boss_id: AgentId,
        #[serde(rename = "agentId")]
        agent_id: AgentId,
        status: TaskStatus,
        timestamp: TimestampMs,
    },

    // ========================================================================
    // SKILLS
    // ========================================================================
    SkillsUpdate { skills: Vec<Skill> },
    SkillLearned {
        skill: Skill,
        #[serde(rename = "agentId")]
        agent_id: AgentId,
    },

    // ========================================================================
    // EXEC TASKS
    // ========================================================================
    ExecTasksUpdate { tasks: Vec<ExecTask> },
    ExecTaskStarted { task: ExecTask },
    ExecTaskOutput {
        #[serde(rename = "taskId")]
        task_id: String,
        line: String,
    },
    ExecTaskCompleted {
        #[serde(rename = "taskId")]
        task_id: String,
        status: ExecTaskStatus,
        timestamp: TimestampMs,
    },

    // ========================================================================
    // DATABASE / SUBAGENTS / SECRETS
    // ========================================================================
    DatabaseStats(DatabaseStats),
    SubagentsUpdate {
        #[serde(rename = "agentId")]
        agent_id: AgentId,
        subagents: Vec<SubagentInfo>,
    },
    SubagentCompleted {
        #[serde(rename = "agentId")]
        agent_id: AgentId,
        #[serde(rename = "subagentId")]
        subagent_id: String,
    },
    SecretRequest {
        #[serde(rename = "agentId")]
        agent_id: AgentId,
        name: String,
        #[serde(default)]
        prompt: Option<String>,
    },
    SecretResolved {
        #[serde(rename = "agentId")]
        agent_id: AgentId,
        name: String,
    },

    // ========================================================================
    // MISC
    // ========================================================================
    Error { message: String },
    Pong,
}

/// One streamed transcript line. Fields are flat in the payload, matching the
/// shape the backend emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputPayload {
    pub agent_id: AgentId,
    pub text: String,
    pub timestamp: TimestampMs,
    #[serde(default)]
    pub is_streaming: bool,
    #[serde(default)]
    pub is_user_prompt: bool,
    #[serde(default)]
    pub is_delegation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
}

impl OutputPayload {
    /// The transcript entry, minus the addressing.
    pub fn to_entry(&self) -> OutputEntry {
        OutputEntry {
            text: self.text.clone(),
            timestamp: self.timestamp,
            is_streaming: self.is_streaming,
            is_user_prompt: self.is_user_prompt,
            is_delegation: self.is_delegation,
            uuid: self.uuid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStats {
    pub tables: u32,
    pub rows: u64,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubagentInfo {
    pub id: String,
    pub description: String,
    pub status: TaskStatus,
}

/// Messages the console sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    SendCommand {
        #[serde(rename = "agentId")]
        agent_id: AgentId,
        command: String,
    },
    DelegateCommand {
        #[serde(rename = "bossId")]
        boss_id: AgentId,
        command: String,
    },
    MoveAgent {
        #[serde(rename = "agentId")]
        agent_id: AgentId,
        position: Position,
    },
    InterruptAgent {
        #[serde(rename = "agentId")]
        agent_id: AgentId,
    },
    ClearOutputs {
        #[serde(rename = "agentId")]
        agent_id: AgentId,
    },
    SecretResponse {
        #[serde(rename = "agentId")]
        agent_id: AgentId,
        name: String,
        value: String,
    },
    /// Ask the server for a full roster resync.
    RequestAgents,
    Ping,
}

impl ClientMessage {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Wire type names the decoder recognizes, kept in sync with the
/// [`ServerMessage`] variants by `known_types_cover_every_variant` below.
const KNOWN_TYPES: &[&str] = &[
    "agents_update",
    "agent_created",
    "agent_updated",
    "agent_deleted",
    "session_started",
    "context_usage",
    "output",
    "command_started",
    "outputs_cleared",
    "areas_update",
    "area_updated",
    "buildings_update",
    "building_placed",
    "supervisor_report",
    "supervisor_narrative",
    "delegation_decision",
    "boss_subordinates_updated",
    "agent_task_started",
    "agent_task_output",
    "agent_task_completed",
    "skills_update",
    "skill_learned",
    "exec_tasks_update",
    "exec_task_started",
    "exec_task_output",
    "exec_task_completed",
    "database_stats",
    "subagents_update",
    "subagent_completed",
    "secret_request",
    "secret_resolved",
    "error",
    "pong",
];

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("envelope has no string 'type' field")]
    MissingType,
}

/// Result of decoding one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Known(Box<ServerMessage>),
    /// A structurally valid envelope of a type this client does not handle.
    Unknown { msg_type: String },
}

/// Decode one inbound text frame.
///
/// A recognized type with a malformed payload is an error (the frame is bad),
/// while an unrecognized type is [`Decoded::Unknown`] (the frame is fine, the
/// client just has no handler), so newer servers do not break older clients.
pub fn decode_server_message(text: &str) -> Result<Decoded, DecodeError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let msg_type = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or(DecodeError::MissingType)?;
    if !KNOWN_TYPES.contains(&msg_type) {
        return Ok(Decoded::Unknown {
            msg_type: msg_type.to_string(),
        });
    }
    let message: ServerMessage = serde_json::from_value(value)?;
    Ok(Decoded::Known(Box::new(message)))
}
