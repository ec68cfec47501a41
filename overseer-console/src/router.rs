//! Event routing: every driver-loop event lands here and becomes store
//! mutations, UI callbacks, and follow-up effects.
//!
//! The match over [`ServerMessage`] is exhaustive on purpose; adding a wire
//! variant without deciding how the console reacts should not compile.

use crate::callbacks::{NotificationLevel, UiSink};
use crate::effects::Effects;
use crate::events::ConsoleEvent;
use crate::reconcile::ReconcileEngine;
use crate::store::{agents, delegation, outputs, tasks, world, SecretRequest, Store};
use overseer_core::{ActivityEntry, AgentId, ContextUsage, OutputEntry, Position, TaskStatus};
use overseer_wire::{ClientMessage, ServerMessage};

pub struct Router {
    engine: ReconcileEngine,
}

impl Router {
    pub fn new(engine: ReconcileEngine) -> Self {
        Self { engine }
    }

    pub fn handle(
        &mut self,
        store: &mut Store,
        effects: &Effects,
        ui: &mut dyn UiSink,
        event: ConsoleEvent,
    ) {
        match event {
            ConsoleEvent::Message(message) => self.apply_message(store, effects, ui, *message),
            ConsoleEvent::ConnectionOpened {
                resync,
                reconnect_count,
            } => {
                store.mutate(|s| {
                    s.connection.connected = true;
                    s.connection.reconnect_count = reconnect_count;
                    s.connection.terminal_failure = None;
                });
                ui.notify(NotificationLevel::Success, "connected");
                effects.send(ClientMessage::RequestAgents);
                if resync {
                    for plan in self.engine.begin_resync(store) {
                        effects.run_fetch(plan);
                    }
                }
            }
            ConsoleEvent::ConnectionClosed { reason } => {
                store.mutate(|s| s.connection.connected = false);
                ui.notify(NotificationLevel::Warning, &format!("disconnected: {reason}"));
            }
            ConsoleEvent::TerminalFailure { attempts } => {
                store.mutate(|s| {
                    s.connection.connected = false;
                    s.connection.terminal_failure = Some(attempts);
                });
                ui.terminal_failure(attempts);
            }
            ConsoleEvent::HistoryFetched {
                agent_id,
                seq,
                kind: _,
                result,
            } => {
                self.engine.apply(store, &agent_id, seq, result);
            }
            ConsoleEvent::ToolHistoryFetched(Ok(response)) => {
                store.mutate(|s| world::apply_tool_history(s, response));
            }
            ConsoleEvent::ToolHistoryFetched(Err(err)) => {
                ui.notify(
                    NotificationLevel::Error,
                    &format!("tool history fetch failed: {err}"),
                );
            }
            ConsoleEvent::ApiError(message) => {
                ui.notify(NotificationLevel::Error, &message);
            }
        }
    }

    fn apply_message(
        &mut self,
        store: &mut Store,
        effects: &Effects,
        ui: &mut dyn UiSink,
        message: ServerMessage,
    ) {
        match message {
            ServerMessage::AgentsUpdate { agents } => {
                store.mutate(|s| agents::apply_roster(s, agents));
                effects.fetch_tool_history();
            }
            ServerMessage::AgentCreated { agent } => {
                ui.notify(
                    NotificationLevel::Info,
                    &format!("agent {} joined", agent.name),
                );
                store.mutate(|s| agents::upsert_agent(s, agent));
            }
            ServerMessage::AgentUpdated { agent } => {
                store.mutate(|s| agents::upsert_agent(s, agent));
            }
            ServerMessage::AgentDeleted { agent_id } => {
                store.mutate(|s| agents::remove_agent(s, &agent_id));
            }
            ServerMessage::SessionStarted {
                agent_id,
                session_id,
            } => {
                store.mutate(|s| agents::set_session(s, &agent_id, Some(session_id)));
            }
            ServerMessage::ContextUsage {
                agent_id,
                used_tokens,
                max_tokens,
            } => {
                store.mutate(|s| {
                    agents::set_context_usage(
                        s,
                        &agent_id,
                        ContextUsage {
                            used_tokens,
                            max_tokens,
                        },
                    )
                });
            }

            ServerMessage::Output(payload) => {
                let entry = payload.to_entry();
                if !entry.is_user_prompt && !entry.is_streaming {
                    ui.agent_spoke(&payload.agent_id, &entry.text);
                }
                store.mutate(|s| outputs::append_output(s, &payload.agent_id, entry));
            }
            ServerMessage::CommandStarted {
                agent_id,
                command,
                timestamp,
            } => {
                store.mutate(|s| {
                    outputs::append_output(s, &agent_id, OutputEntry::user(command, timestamp))
                });
            }
            ServerMessage::OutputsCleared { agent_id } => {
                store.mutate(|s| outputs::clear_outputs(s, &agent_id));
            }

            ServerMessage::AreasUpdate { areas } => {
                store.mutate(|s| world::apply_areas(s, areas));
            }
            ServerMessage::AreaUpdated { area } => {
                store.mutate(|s| world::upsert_area(s, area));
            }
            ServerMessage::BuildingsUpdate { buildings } => {
                store.mutate(|s| world::apply_buildings(s, buildings));
            }
            ServerMessage::BuildingPlaced { building } => {
                store.mutate(|s| world::upsert_building(s, building));
            }

            ServerMessage::SupervisorReport {
                text,
                timestamp,
                agent_id,
            } => {
                store.mutate(|s| {
                    world::push_activity(
                        s,
                        ActivityEntry {
                            text,
                            timestamp,
                            agent_id,
                        },
                    )
                });
            }
            ServerMessage::SupervisorNarrative { text, timestamp } => {
                store.mutate(|s| {
                    world::push_activity(
                        s,
                        ActivityEntry {
                            text,
                            timestamp,
                            agent_id: None,
                        },
                    )
                });
            }

            ServerMessage::DelegationDecision { decision } => {
                store.mutate(|s| delegation::record_decision(s, decision));
            }
            ServerMessage::BossSubordinatesUpdated {
                boss_id,
                subordinate_ids,
            } => {
                store.mutate(|s| agents::set_subordinates(s, &boss_id, subordinate_ids));
            }
            ServerMessage::AgentTaskStarted {
                boss_id,
                agent_id,
                command: _,
                timestamp,
            } => {
                store.mutate(|s| tasks::task_started(s, (boss_id, agent_id), timestamp));
            }
            ServerMessage::AgentTaskOutput {
                boss_id,
                agent_id,
                line,
                timestamp,
            } => {
                store.mutate(|s| tasks::task_output(s, (boss_id, agent_id), line, timestamp));
            }
            ServerMessage::AgentTaskCompleted {
                boss_id,
                agent_id,
                status,
                timestamp,
            } => {
                store.mutate(|s| {
                    tasks::task_completed(s, (boss_id, agent_id.clone()), status, timestamp);
                    delegation::clear_last_delegation(s, &agent_id);
                });
            }

            ServerMessage::SkillsUpdate { skills } => {
                store.mutate(|s| world::apply_skills(s, skills));
            }
            ServerMessage::SkillLearned { skill, agent_id } => {
                store.mutate(|s| world::skill_learned(s, skill, agent_id));
            }

            ServerMessage::ExecTasksUpdate { tasks } => {
                store.mutate(|s| world::apply_exec_tasks(s, tasks));
            }
            ServerMessage::ExecTaskStarted { task } => {
                store.mutate(|s| world::exec_task_started(s, task));
            }
            ServerMessage::ExecTaskOutput { task_id, line } => {
                store.mutate(|s| world::exec_task_output(s, &task_id, line));
            }
            ServerMessage::ExecTaskCompleted {
                task_id,
                status,
                timestamp,
            } => {
                store.mutate(|s| world::exec_task_completed(s, &task_id, status, timestamp));
            }

            ServerMessage::DatabaseStats(stats) => {
                store.mutate(|s| world::set_database_stats(s, stats));
            }
            ServerMessage::SubagentsUpdate {
                agent_id,
                subagents,
            } => {
                store.mutate(|s| world::set_subagents(s, agent_id, subagents));
            }
            ServerMessage::SubagentCompleted {
                agent_id,
                subagent_id,
            } => {
                store.mutate(|s| world::subagent_completed(s, &agent_id, &subagent_id));
            }
            ServerMessage::SecretRequest {
                agent_id,
                name,
                prompt,
            } => {
                ui.secret_requested(&agent_id, &name, prompt.as_deref());
                store.mutate(|s| {
                    world::push_secret_request(
                        s,
                        SecretRequest {
                            agent_id,
                            name,
                            prompt,
                        },
                    )
                });
            }
            ServerMessage::SecretResolved { agent_id, name } => {
                store.mutate(|s| world::resolve_secret_request(s, &agent_id, &name));
            }

            ServerMessage::Error { message } => {
                ui.notify(NotificationLevel::Error, &message);
            }
            ServerMessage::Pong => {}
        }
    }

    // Operator-initiated commands.

    pub fn open_transcript(&mut self, store: &mut Store, effects: &Effects, agent_id: &AgentId) {
        if let Some(plan) = self.engine.open_transcript(store, agent_id) {
            effects.run_fetch(plan);
        }
    }

    pub fn load_more_history(&mut self, store: &mut Store, effects: &Effects, agent_id: &AgentId) {
        if let Some(plan) = self.engine.load_more(store, agent_id) {
            effects.run_fetch(plan);
        }
    }

    pub fn send_command(&self, effects: &Effects, agent_id: AgentId, command: String) {
        effects.send(ClientMessage::SendCommand { agent_id, command });
    }

    pub fn delegate_command(&self, effects: &Effects, boss_id: AgentId, command: String) {
        effects.send(ClientMessage::DelegateCommand { boss_id, command });
    }

    /// Ask the server to move an agent. The local position updates when the
    /// server echoes the full agent through `agent_updated`.
    pub fn move_agent(&self, effects: &Effects, agent_id: AgentId, position: Position) {
        effects.send(ClientMessage::MoveAgent { agent_id, position });
    }

    pub fn interrupt_agent(&self, effects: &Effects, agent_id: AgentId) {
        effects.send(ClientMessage::InterruptAgent { agent_id });
    }

    /// Ask the server to clear an agent's transcript. The local buffer is
    /// cleared when the `outputs_cleared` echo arrives.
    pub fn clear_outputs(&self, effects: &Effects, agent_id: AgentId) {
        effects.send(ClientMessage::ClearOutputs { agent_id });
    }

    /// Answer a pending secret request and drop it locally right away.
    pub fn respond_secret(
        &self,
        store: &mut Store,
        effects: &Effects,
        agent_id: AgentId,
        name: String,
        value: String,
    ) {
        store.mutate(|s| world::resolve_secret_request(s, &agent_id, &name));
        effects.send(ClientMessage::SecretResponse {
            agent_id,
            name,
            value,
        });
    }

    /// Dismiss a finished exec task locally and delete it on the server.
    pub fn dismiss_exec_task(&self, store: &mut Store, effects: &Effects, task_id: String) {
        store.mutate(|s| world::remove_exec_task(s, &task_id));
        effects.delete_exec_task(task_id);
    }

    pub fn toggle_select(&self, store: &mut Store, agent_id: &AgentId) {
        store.mutate(|s| agents::toggle_selected(s, agent_id));
    }

    /// Dismiss the progress card of a finished delegated task.
    pub fn clear_task(&self, store: &mut Store, boss_id: AgentId, subordinate_id: AgentId) {
        store.mutate(|s| {
            let key = (boss_id, subordinate_id);
            if let Some(progress) = s.task_progress.get(&key) {
                if progress.status == TaskStatus::Working {
                    tracing::debug!(?key, "refusing to clear a running task");
                    return;
                }
            }
            tasks::clear_task(s, &key);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_client::RestClient;
    use crate::callbacks::test_support::RecordingSink;
    use crate::config::{ConsoleConfig, HistoryConfig, ReconnectConfig};
    use crate::events::HistoryFetchKind;
    use crate::store::test_support::sample_agent;
    use overseer_core::{DecisionStatus, DelegationDecision, TimestampMs};
    use overseer_wire::{HistoryPage, OutputPayload};
    use std::path::PathBuf;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    struct Fixture {
        store: Store,
        router: Router,
        effects: Effects,
        ui: RecordingSink,
        events_rx: mpsc::Receiver<ConsoleEvent>,
        outbound_rx: mpsc::Receiver<ClientMessage>,
    }

    fn fixture() -> Fixture {
        let config = ConsoleConfig {
            // Discard port; spawned fetches fail fast and are not asserted on.
            api_base_url: "http://127.0.0.1:9".to_string(),
            ws_endpoint: "ws://127.0.0.1:9/ws".to_string(),
            auth_token: None,
            request_timeout_ms: 200,
            state_path: PathBuf::from("/tmp/overseer-router-test.json"),
            reconnect: ReconnectConfig {
                initial_ms: 10,
                max_ms: 50,
                max_attempts: 2,
            },
            history: HistoryConfig {
                page_limit: 50,
                resync_settle_ms: 1,
                tool_history_limit: 25,
            },
        };
        let rest = RestClient::new(&config).unwrap();
        let (events_tx, events_rx) = mpsc::channel(64);
        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let effects = Effects::new(rest, events_tx, outbound_tx, 25);
        let engine = ReconcileEngine::new(50, std::time::Duration::from_millis(1));
        Fixture {
            store: Store::new(),
            router: Router::new(engine),
            effects,
            ui: RecordingSink::default(),
            events_rx,
            outbound_rx,
        }
    }

    fn message(f: &mut Fixture, message: ServerMessage) {
        let Fixture {
            store,
            router,
            effects,
            ui,
            ..
        } = f;
        router.handle(store, effects, ui, ConsoleEvent::Message(Box::new(message)));
    }

    fn output(agent: &str, text: &str, timestamp: TimestampMs) -> ServerMessage {
        ServerMessage::Output(OutputPayload {
            agent_id: AgentId::new(agent),
            text: text.to_string(),
            timestamp,
            is_streaming: false,
            is_user_prompt: false,
            is_delegation: false,
            uuid: None,
        })
    }

    #[tokio::test]
    async fn replaying_a_roster_message_leaves_state_unchanged() {
        let mut f = fixture();
        let roster = vec![sample_agent("a1"), sample_agent("a2")];
        message(
            &mut f,
            ServerMessage::AgentsUpdate {
                agents: roster.clone(),
            },
        );
        let first = f.store.state().agents.clone();
        message(&mut f, ServerMessage::AgentsUpdate { agents: roster });
        assert_eq!(*f.store.state().agents, *first);
    }

    #[tokio::test]
    async fn output_appends_and_raises_the_speech_callback() {
        let mut f = fixture();
        message(&mut f, output("a1", "build finished", 1_000));

        assert_eq!(
            f.store.state().outputs[&AgentId::new("a1")]
                .back()
                .unwrap()
                .text,
            "build finished"
        );
        assert_eq!(f.ui.speeches.len(), 1);
        assert_eq!(f.ui.speeches[0].1, "build finished");
    }

    #[tokio::test]
    async fn command_started_appends_a_user_prompt_line() {
        let mut f = fixture();
        message(
            &mut f,
            ServerMessage::CommandStarted {
                agent_id: AgentId::new("a1"),
                command: "cargo test".to_string(),
                timestamp: 500,
            },
        );

        let entry = f.store.state().outputs[&AgentId::new("a1")]
            .back()
            .unwrap()
            .clone();
        assert!(entry.is_user_prompt);
        assert_eq!(entry.text, "cargo test");
        assert!(f.ui.speeches.is_empty());
    }

    #[tokio::test]
    async fn task_completion_clears_the_last_delegation_marker() {
        let mut f = fixture();
        let boss = AgentId::new("boss");
        let sub = AgentId::new("sub");
        message(
            &mut f,
            ServerMessage::DelegationDecision {
                decision: DelegationDecision {
                    id: "d1".into(),
                    boss_id: boss.clone(),
                    selected_agent_id: Some(sub.clone()),
                    status: DecisionStatus::Sent,
                    reasoning: "free right now".into(),
                    user_command: "update deps".into(),
                    timestamp: 1_000,
                },
            },
        );
        assert!(f.store.state().last_delegations.contains_key(&sub));

        message(
            &mut f,
            ServerMessage::AgentTaskCompleted {
                boss_id: boss.clone(),
                agent_id: sub.clone(),
                status: TaskStatus::Completed,
                timestamp: 2_000,
            },
        );
        assert!(!f.store.state().last_delegations.contains_key(&sub));
        assert_eq!(
            f.store.state().task_progress[&(boss, sub)].status,
            TaskStatus::Completed
        );
    }

    #[tokio::test]
    async fn connection_opened_requests_roster_and_clears_terminal_failure() {
        let mut f = fixture();
        {
            let Fixture {
                store,
                router,
                effects,
                ui,
                ..
            } = &mut f;
            router.handle(store, effects, ui, ConsoleEvent::TerminalFailure { attempts: 2 });
            assert_eq!(store.state().connection.terminal_failure, Some(2));

            router.handle(
                store,
                effects,
                ui,
                ConsoleEvent::ConnectionOpened {
                    resync: false,
                    reconnect_count: 3,
                },
            );
        }

        let state = f.store.state();
        assert!(state.connection.connected);
        assert_eq!(state.connection.reconnect_count, 3);
        assert_eq!(state.connection.terminal_failure, None);
        assert_eq!(f.ui.terminal_failures, vec![2]);
        assert_eq!(f.outbound_rx.try_recv().unwrap(), ClientMessage::RequestAgents);
    }

    #[tokio::test]
    async fn resync_reconciles_buffer_against_fetched_history() {
        let mut f = fixture();
        let aid = AgentId::new("a1");
        let uuid = Uuid::new_v4();

        message(&mut f, output("a1", "hi there", 100));
        message(
            &mut f,
            ServerMessage::Output(OutputPayload {
                agent_id: aid.clone(),
                text: "ok".into(),
                timestamp: 200,
                is_streaming: false,
                is_user_prompt: false,
                is_delegation: false,
                uuid: Some(uuid),
            }),
        );
        message(&mut f, output("a1", "bye", 300));

        {
            let Fixture {
                store,
                router,
                effects,
                ui,
                ..
            } = &mut f;
            router.handle(
                store,
                effects,
                ui,
                ConsoleEvent::ConnectionOpened {
                    resync: true,
                    reconnect_count: 2,
                },
            );
        }

        // Intercept the spawned fetch's completion (a connection error, the
        // fixture has no backend) to learn the issued seq, then feed the
        // router a crafted page under that seq instead.
        let fetched = f.events_rx.recv().await.expect("fetch completion");
        let ConsoleEvent::HistoryFetched { agent_id, seq, .. } = fetched else {
            panic!("expected history fetch completion");
        };
        assert_eq!(agent_id, aid);

        let mut history_entry = OutputEntry::assistant("ok", 200);
        history_entry.uuid = Some(uuid);
        {
            let Fixture {
                store,
                router,
                effects,
                ui,
                ..
            } = &mut f;
            router.handle(
                store,
                effects,
                ui,
                ConsoleEvent::HistoryFetched {
                    agent_id: aid.clone(),
                    seq,
                    kind: HistoryFetchKind::Initial,
                    result: Ok(HistoryPage {
                        messages: vec![history_entry],
                        has_more: false,
                        total_count: 1,
                    }),
                },
            );
        }

        let texts: Vec<String> = f.store.state().outputs[&aid]
            .iter()
            .map(|e| e.text.clone())
            .collect();
        assert_eq!(texts, vec!["ok", "bye"]);
    }

    #[tokio::test]
    async fn secret_request_raises_callback_and_is_tracked() {
        let mut f = fixture();
        message(
            &mut f,
            ServerMessage::SecretRequest {
                agent_id: AgentId::new("a1"),
                name: "GH_TOKEN".into(),
                prompt: Some("paste a repo token".into()),
            },
        );
        assert_eq!(f.ui.secret_requests.len(), 1);
        assert_eq!(f.store.state().secret_requests.len(), 1);

        let Fixture {
            store,
            router,
            effects,
            ..
        } = &mut f;
        router.respond_secret(
            store,
            effects,
            AgentId::new("a1"),
            "GH_TOKEN".into(),
            "value".into(),
        );
        assert!(f.store.state().secret_requests.is_empty());
        let sent = f.outbound_rx.try_recv().unwrap();
        assert!(matches!(sent, ClientMessage::SecretResponse { .. }));
    }

    #[tokio::test]
    async fn move_request_goes_out_with_the_target_position() {
        let mut f = fixture();
        let target = Position {
            x: 4.0,
            y: 0.0,
            z: -2.5,
        };
        f.router.move_agent(&f.effects, AgentId::new("a1"), target);

        let sent = f.outbound_rx.try_recv().unwrap();
        assert_eq!(
            sent,
            ClientMessage::MoveAgent {
                agent_id: AgentId::new("a1"),
                position: target,
            }
        );
    }

    #[tokio::test]
    async fn running_tasks_cannot_be_dismissed() {
        let mut f = fixture();
        let boss = AgentId::new("boss");
        let sub = AgentId::new("sub");
        message(
            &mut f,
            ServerMessage::AgentTaskStarted {
                boss_id: boss.clone(),
                agent_id: sub.clone(),
                command: "long job".into(),
                timestamp: 1_000,
            },
        );

        let Fixture { store, router, .. } = &mut f;
        router.clear_task(store, boss.clone(), sub.clone());
        assert!(f.store.state().task_progress.contains_key(&(boss, sub)));
    }
}
