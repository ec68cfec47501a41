//! The boundary to the external UI collaborator.
//!
//! Rendering, modals, and toasts live outside this crate; the engine only
//! pushes typed notifications through this trait.

use overseer_core::AgentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
    Success,
}

/// Callbacks the router invokes alongside store mutations.
pub trait UiSink {
    fn notify(&mut self, level: NotificationLevel, message: &str);

    /// A non-streaming assistant line arrived for an agent.
    fn agent_spoke(&mut self, agent_id: &AgentId, text: &str) {
        let _ = (agent_id, text);
    }

    /// The backend wants a secret value from the operator.
    fn secret_requested(&mut self, agent_id: &AgentId, name: &str, prompt: Option<&str>) {
        let _ = (agent_id, name, prompt);
    }

    /// Reconnection gave up; manual intervention is required.
    fn terminal_failure(&mut self, attempts: u32);
}

/// Sink that reports through `tracing` only; used by the headless binary and
/// as a default for tests.
#[derive(Debug, Default)]
pub struct LogSink;

impl UiSink for LogSink {
    fn notify(&mut self, level: NotificationLevel, message: &str) {
        match level {
            NotificationLevel::Error => tracing::error!(message),
            NotificationLevel::Warning => tracing::warn!(message),
            NotificationLevel::Info | NotificationLevel::Success => tracing::info!(message),
        }
    }

    fn terminal_failure(&mut self, attempts: u32) {
        tracing::error!(attempts, "connection abandoned after retry budget");
    }
}
