//! Side-effect execution for the driver loop.
//!
//! The router and reconcile engine stay synchronous; anything that talks to
//! the network is spawned here, and every completion comes back as a
//! [`ConsoleEvent`] on the driver channel.

use crate::api_client::RestClient;
use crate::events::ConsoleEvent;
use crate::reconcile::FetchPlan;
use overseer_wire::ClientMessage;
use tokio::sync::mpsc;

#[derive(Clone)]
pub struct Effects {
    rest: RestClient,
    events: mpsc::Sender<ConsoleEvent>,
    outbound: mpsc::Sender<ClientMessage>,
    tool_history_limit: usize,
}

impl Effects {
    pub fn new(
        rest: RestClient,
        events: mpsc::Sender<ConsoleEvent>,
        outbound: mpsc::Sender<ClientMessage>,
        tool_history_limit: usize,
    ) -> Self {
        Self {
            rest,
            events,
            outbound,
            tool_history_limit,
        }
    }

    /// Queue an outbound socket message. Dropped with a warning if the
    /// connection task has fallen behind.
    pub fn send(&self, message: ClientMessage) {
        if let Err(err) = self.outbound.try_send(message) {
            tracing::warn!(error = %err, "outbound queue full; message dropped");
        }
    }

    pub fn run_fetch(&self, plan: FetchPlan) {
        let rest = self.rest.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            if let Some(settle) = plan.settle {
                tokio::time::sleep(settle).await;
            }
            let result = rest
                .fetch_history(&plan.agent_id, plan.limit as usize, plan.offset as usize)
                .await;
            let _ = events
                .send(ConsoleEvent::HistoryFetched {
                    agent_id: plan.agent_id,
                    seq: plan.seq,
                    kind: plan.kind,
                    result,
                })
                .await;
        });
    }

    pub fn fetch_tool_history(&self) {
        let rest = self.rest.clone();
        let events = self.events.clone();
        let limit = self.tool_history_limit;
        tokio::spawn(async move {
            let result = rest.fetch_tool_history(limit).await;
            let _ = events.send(ConsoleEvent::ToolHistoryFetched(result)).await;
        });
    }

    pub fn delete_exec_task(&self, task_id: String) {
        let rest = self.rest.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            if let Err(err) = rest.delete_exec_task(&task_id).await {
                let _ = events
                    .send(ConsoleEvent::ApiError(format!(
                        "failed to delete exec task {task_id}: {err}"
                    )))
                    .await;
            }
        });
    }
}
