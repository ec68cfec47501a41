//! Central reactive store.
//!
//! One [`Store`] handle per process, built by [`Store::new`] and passed by
//! reference into every consumer; nothing in this crate reaches for a global.
//! Domain mutations live in the submodules as free functions over
//! [`AppState`], and callers run them inside [`Store::mutate`] so each
//! read-modify-write is one synchronous closure followed by one notify.
//!
//! Top-level collections sit behind `Arc` and every mutation goes through
//! [`with_new`], which always allocates a fresh collection. Selectors then
//! detect change with `Arc::ptr_eq` instead of deep comparison.

pub mod agents;
pub mod delegation;
pub mod outputs;
pub mod tasks;
pub mod world;

pub use outputs::AgentHistory;
pub use world::SecretRequest;

use overseer_core::{
    ActivityEntry, Agent, AgentId, AgentTaskProgress, Area, BoundedDeque, Building,
    DelegationDecision, ExecTask, LastDelegation, OutputEntry, Skill, TaskKey, ToolExecution,
    ACTIVITY_FEED_CAP, TOOL_EXECUTION_CAP,
};
use overseer_wire::{DatabaseStats, SubagentInfo};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Connection status mirrored into the state tree for observers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub connected: bool,
    /// Number of times a socket has been opened; never decreases.
    pub reconnect_count: u64,
    /// Set once the retry budget is exhausted; cleared only by a manual
    /// reconnect.
    pub terminal_failure: Option<u32>,
}

/// The whole client-side mirror of server state.
#[derive(Clone)]
pub struct AppState {
    pub agents: Arc<HashMap<AgentId, Agent>>,
    pub selected_agent_ids: Arc<HashSet<AgentId>>,
    pub outputs: Arc<HashMap<AgentId, BoundedDeque<OutputEntry>>>,
    pub histories: Arc<HashMap<AgentId, AgentHistory>>,
    /// Per-boss delegation ledgers, most-recent-first.
    pub ledgers: Arc<HashMap<AgentId, BoundedDeque<DelegationDecision>>>,
    /// Per-subordinate "last delegation received" markers.
    pub last_delegations: Arc<HashMap<AgentId, LastDelegation>>,
    pub task_progress: Arc<HashMap<TaskKey, AgentTaskProgress>>,
    pub areas: Arc<HashMap<String, Area>>,
    pub buildings: Arc<HashMap<String, Building>>,
    pub activities: Arc<BoundedDeque<ActivityEntry>>,
    pub tool_executions: Arc<BoundedDeque<ToolExecution>>,
    pub skills: Arc<Vec<Skill>>,
    pub exec_tasks: Arc<HashMap<String, ExecTask>>,
    pub subagents: Arc<HashMap<AgentId, Vec<SubagentInfo>>>,
    pub secret_requests: Arc<Vec<SecretRequest>>,
    pub database: Option<DatabaseStats>,
    pub connection: ConnectionInfo,
}

impl AppState {
    fn empty() -> Self {
        Self {
            agents: Arc::new(HashMap::new()),
            selected_agent_ids: Arc::new(HashSet::new()),
            outputs: Arc::new(HashMap::new()),
            histories: Arc::new(HashMap::new()),
            ledgers: Arc::new(HashMap::new()),
            last_delegations: Arc::new(HashMap::new()),
            task_progress: Arc::new(HashMap::new()),
            areas: Arc::new(HashMap::new()),
            buildings: Arc::new(HashMap::new()),
            activities: Arc::new(BoundedDeque::new(ACTIVITY_FEED_CAP)),
            tool_executions: Arc::new(BoundedDeque::new(TOOL_EXECUTION_CAP)),
            skills: Arc::new(Vec::new()),
            exec_tasks: Arc::new(HashMap::new()),
            subagents: Arc::new(HashMap::new()),
            secret_requests: Arc::new(Vec::new()),
            database: None,
            connection: ConnectionInfo::default(),
        }
    }
}

/// Replace the collection behind `slot` with a freshly allocated copy mutated
/// by `f`.
///
/// Never switch this to `Arc::make_mut`: reuse of a uniquely-held allocation
/// would keep the pointer identical and break `Arc::ptr_eq` change detection.
pub(crate) fn with_new<C: Clone>(slot: &mut Arc<C>, f: impl FnOnce(&mut C)) {
    let mut next = (**slot).clone();
    f(&mut next);
    *slot = Arc::new(next);
}

type Subscriber = Box<dyn FnMut(&AppState) + Send>;

/// Explicit store handle. Owned by the driver task; no locks, because every
/// mutation happens on that one task.
pub struct Store {
    state: AppState,
    subscribers: Vec<Subscriber>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            state: AppState::empty(),
            subscribers: Vec::new(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run a synchronous mutation, then notify every subscriber once.
    pub fn mutate<R>(&mut self, f: impl FnOnce(&mut AppState) -> R) -> R {
        let result = f(&mut self.state);
        self.notify();
        result
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&AppState) + Send + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    fn notify(&mut self) {
        for subscriber in &mut self.subscribers {
            subscriber(&self.state);
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::sample_agent;
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn mutate_notifies_every_subscriber_once() {
        let mut store = Store::new();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        store.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        store.mutate(|state| {
            with_new(&mut state.agents, |agents| {
                agents.insert(AgentId::new("a1"), sample_agent("a1"));
            });
        });

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn mutation_replaces_only_the_touched_slice() {
        let mut store = Store::new();
        let agents_before = store.state().agents.clone();
        let outputs_before = store.state().outputs.clone();

        store.mutate(|state| {
            with_new(&mut state.agents, |agents| {
                agents.insert(AgentId::new("a1"), sample_agent("a1"));
            });
        });

        assert!(!Arc::ptr_eq(&agents_before, &store.state().agents));
        assert!(Arc::ptr_eq(&outputs_before, &store.state().outputs));
    }

    #[test]
    fn with_new_always_produces_a_new_allocation() {
        let mut slot: Arc<Vec<i32>> = Arc::new(vec![1]);
        let before = slot.clone();
        // No other Arc clone alive besides `before`; a make_mut-style
        // implementation would still have to copy, but drop `before` and the
        // reuse bug appears. Assert on identity, not content.
        with_new(&mut slot, |v| v.push(2));
        assert!(!Arc::ptr_eq(&before, &slot));
        assert_eq!(*slot, vec![1, 2]);
    }
}
