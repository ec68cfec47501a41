//! Memoized derived views over [`AppState`](crate::store::AppState).
//!
//! Every store slice is replaced wholesale on mutation, so a selector can
//! decide "did my input change" with `Arc::ptr_eq` alone. A hit returns the
//! cached `Arc` without touching the data; a miss recomputes, and when the
//! recomputed value equals the cached one the cached allocation is kept, so
//! observers of one agent see a stable pointer even while unrelated entries
//! in the same slice churn. Recompute counts are tracked so tests can assert
//! on caching behavior.

use crate::store::AppState;
use overseer_core::{Agent, AgentId, AgentStatus, BoundedDeque, DelegationDecision, OutputEntry};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One memo cell: caches the output for a single input slice.
struct Memo<I, O> {
    input: Option<Arc<I>>,
    output: Option<Arc<O>>,
    computes: u64,
}

impl<I, O> Memo<I, O> {
    fn new() -> Self {
        Self {
            input: None,
            output: None,
            computes: 0,
        }
    }

    fn get(&mut self, input: &Arc<I>, compute: impl FnOnce(&I) -> O) -> Arc<O>
    where
        O: PartialEq,
    {
        if let (Some(cached_in), Some(cached_out)) = (&self.input, &self.output) {
            if Arc::ptr_eq(cached_in, input) {
                return cached_out.clone();
            }
        }
        let value = compute(input);
        self.computes += 1;
        self.input = Some(input.clone());
        // An equal result keeps the cached allocation.
        if let Some(cached_out) = &self.output {
            if **cached_out == value {
                return cached_out.clone();
            }
        }
        let output = Arc::new(value);
        self.output = Some(output.clone());
        output
    }
}

/// A memo cell over two input slices; recomputes when either changes.
struct Memo2<A, B, O> {
    inputs: Option<(Arc<A>, Arc<B>)>,
    output: Option<Arc<O>>,
    computes: u64,
}

impl<A, B, O> Memo2<A, B, O> {
    fn new() -> Self {
        Self {
            inputs: None,
            output: None,
            computes: 0,
        }
    }

    fn get(&mut self, a: &Arc<A>, b: &Arc<B>, compute: impl FnOnce(&A, &B) -> O) -> Arc<O>
    where
        O: PartialEq,
    {
        if let (Some((ca, cb)), Some(cached_out)) = (&self.inputs, &self.output) {
            if Arc::ptr_eq(ca, a) && Arc::ptr_eq(cb, b) {
                return cached_out.clone();
            }
        }
        let value = compute(a, b);
        self.computes += 1;
        self.inputs = Some((a.clone(), b.clone()));
        if let Some(cached_out) = &self.output {
            if **cached_out == value {
                return cached_out.clone();
            }
        }
        let output = Arc::new(value);
        self.output = Some(output.clone());
        output
    }
}

type AgentMap = HashMap<AgentId, Agent>;
type OutputsMap = HashMap<AgentId, BoundedDeque<OutputEntry>>;
type LedgerMap = HashMap<AgentId, BoundedDeque<DelegationDecision>>;

/// The selector set a view layer holds alongside the store.
pub struct Selectors {
    status_counts: Memo<AgentMap, HashMap<AgentStatus, usize>>,
    selected_agents: Memo2<AgentMap, HashSet<AgentId>, Vec<Agent>>,
    outputs_for: HashMap<AgentId, Memo<OutputsMap, Vec<OutputEntry>>>,
    subordinates_of: HashMap<AgentId, Memo<AgentMap, Vec<Agent>>>,
    decisions_for: HashMap<AgentId, Memo<LedgerMap, Vec<DelegationDecision>>>,
}

impl Selectors {
    pub fn new() -> Self {
        Self {
            status_counts: Memo::new(),
            selected_agents: Memo2::new(),
            outputs_for: HashMap::new(),
            subordinates_of: HashMap::new(),
            decisions_for: HashMap::new(),
        }
    }

    /// How many agents sit in each status.
    pub fn status_counts(&mut self, state: &AppState) -> Arc<HashMap<AgentStatus, usize>> {
        self.status_counts.get(&state.agents, |agents| {
            let mut counts = HashMap::new();
            for agent in agents.values() {
                *counts.entry(agent.status).or_insert(0) += 1;
            }
            counts
        })
    }

    /// The selected agents, name-sorted for stable presentation.
    pub fn selected_agents(&mut self, state: &AppState) -> Arc<Vec<Agent>> {
        self.selected_agents
            .get(&state.agents, &state.selected_agent_ids, |agents, selected| {
                let mut picked: Vec<Agent> = selected
                    .iter()
                    .filter_map(|id| agents.get(id).cloned())
                    .collect();
                picked.sort_by(|a, b| a.name.cmp(&b.name));
                picked
            })
    }

    /// The live output buffer of one agent, oldest first.
    pub fn outputs_for(&mut self, state: &AppState, agent_id: &AgentId) -> Arc<Vec<OutputEntry>> {
        self.outputs_for
            .entry(agent_id.clone())
            .or_insert_with(Memo::new)
            .get(&state.outputs, |outputs| {
                outputs
                    .get(agent_id)
                    .map(|buffer| buffer.to_vec())
                    .unwrap_or_default()
            })
    }

    /// The subordinates reporting to `boss_id`, name-sorted.
    pub fn subordinates_of(&mut self, state: &AppState, boss_id: &AgentId) -> Arc<Vec<Agent>> {
        self.subordinates_of
            .entry(boss_id.clone())
            .or_insert_with(Memo::new)
            .get(&state.agents, |agents| {
                let mut subs: Vec<Agent> = agents
                    .values()
                    .filter(|agent| agent.boss_id.as_ref() == Some(boss_id))
                    .cloned()
                    .collect();
                subs.sort_by(|a, b| a.name.cmp(&b.name));
                subs
            })
    }

    /// One boss's delegation ledger, newest first.
    pub fn decisions_for(
        &mut self,
        state: &AppState,
        boss_id: &AgentId,
    ) -> Arc<Vec<DelegationDecision>> {
        self.decisions_for
            .entry(boss_id.clone())
            .or_insert_with(Memo::new)
            .get(&state.ledgers, |ledgers| {
                ledgers
                    .get(boss_id)
                    .map(|ledger| ledger.to_vec())
                    .unwrap_or_default()
            })
    }

    /// Total recomputations across all cells, for cache assertions.
    pub fn recomputes(&self) -> u64 {
        self.status_counts.computes
            + self.selected_agents.computes
            + self.outputs_for.values().map(|m| m.computes).sum::<u64>()
            + self.subordinates_of.values().map(|m| m.computes).sum::<u64>()
            + self.decisions_for.values().map(|m| m.computes).sum::<u64>()
    }
}

impl Default for Selectors {
    fn default() -> Self {
        Self::new()
    }
}
