//! Overseer Core - Entity Types
//!
//! Pure data structures with no I/O. All other crates depend on this.

pub mod agent;
pub mod bounded;
pub mod delegation;
pub mod identity;
pub mod limits;
pub mod transcript;
pub mod world;

pub use agent::{Agent, AgentStatus, AgentStatusParseError, ContextUsage, Position};
pub use bounded::BoundedDeque;
pub use delegation::{
    AgentTaskProgress, DecisionStatus, DecisionStatusParseError, DelegationDecision,
    LastDelegation, TaskKey, TaskStatus,
};
pub use identity::{AgentId, DecisionId, TimestampMs};
pub use limits::{
    ACTIVITY_FEED_CAP, DECISION_LEDGER_CAP, DEDUP_WINDOW_MS, OUTPUT_BUFFER_CAP,
    TOOL_EXECUTION_CAP,
};
pub use transcript::{OutputEntry, OutputRole};
pub use world::{ActivityEntry, Area, Building, ExecTask, ExecTaskStatus, Skill, ToolExecution};
