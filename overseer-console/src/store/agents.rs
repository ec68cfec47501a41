//! Agent roster mutations.
//!
//! Roster messages are authoritative and idempotent: replaying the same
//! update leaves the tree unchanged, and a full roster replace prunes every
//! per-agent slice for ids the server no longer reports.

use super::{with_new, AppState};
use overseer_core::{Agent, AgentId, ContextUsage};

/// Replace the whole roster with a server snapshot.
pub fn apply_roster(state: &mut AppState, roster: Vec<Agent>) {
    with_new(&mut state.agents, |agents| {
        agents.clear();
        for agent in roster {
            agents.insert(agent.id.clone(), agent);
        }
    });
    prune_departed(state);
}

/// Insert or replace one agent.
pub fn upsert_agent(state: &mut AppState, agent: Agent) {
    with_new(&mut state.agents, |agents| {
        agents.insert(agent.id.clone(), agent);
    });
}

pub fn remove_agent(state: &mut AppState, id: &AgentId) {
    with_new(&mut state.agents, |agents| {
        agents.remove(id);
    });
    prune_departed(state);
}

pub fn set_session(state: &mut AppState, id: &AgentId, session_id: Option<String>) {
    update(state, id, |agent| agent.session_id = session_id);
}

pub fn set_context_usage(state: &mut AppState, id: &AgentId, usage: ContextUsage) {
    update(state, id, |agent| agent.context = usage);
}

/// Rewire the boss/subordinate links under `boss_id`.
///
/// Every agent in `subordinate_ids` gets its `boss_id` set, and agents that
/// used to report to this boss but are no longer listed get it cleared. The
/// hierarchy is two levels deep, so no transitive fixup is needed.
pub fn set_subordinates(state: &mut AppState, boss_id: &AgentId, subordinate_ids: Vec<AgentId>) {
    with_new(&mut state.agents, |agents| {
        for agent in agents.values_mut() {
            if agent.boss_id.as_ref() == Some(boss_id)
                && !subordinate_ids.contains(&agent.id)
            {
                agent.boss_id = None;
            }
        }
        for sub_id in &subordinate_ids {
            if let Some(sub) = agents.get_mut(sub_id) {
                sub.boss_id = Some(boss_id.clone());
            }
        }
        if let Some(boss) = agents.get_mut(boss_id) {
            boss.subordinate_ids = subordinate_ids;
        }
    });
}

pub fn toggle_selected(state: &mut AppState, id: &AgentId) {
    if !state.agents.contains_key(id) {
        return;
    }
    with_new(&mut state.selected_agent_ids, |selected| {
        if !selected.remove(id) {
            selected.insert(id.clone());
        }
    });
}

fn update(state: &mut AppState, id: &AgentId, f: impl FnOnce(&mut Agent)) {
    if !state.agents.contains_key(id) {
        tracing::debug!(agent_id = %id, "update for unknown agent dropped");
        return;
    }
    with_new(&mut state.agents, |agents| {
        if let Some(agent) = agents.get_mut(id) {
            f(agent);
        }
    });
}

/// Drop per-agent slices whose owner left the roster.
fn prune_departed(state: &mut AppState) {
    let agents = state.agents.clone();
    let known = |id: &AgentId| agents.contains_key(id);

    if state.outputs.keys().any(|id| !known(id)) {
        with_new(&mut state.outputs, |outputs| outputs.retain(|id, _| known(id)));
    }
    if state.histories.keys().any(|id| !known(id)) {
        with_new(&mut state.histories, |histories| {
            histories.retain(|id, _| known(id))
        });
    }
    if state.ledgers.keys().any(|id| !known(id)) {
        with_new(&mut state.ledgers, |ledgers| ledgers.retain(|id, _| known(id)));
    }
    if state.last_delegations.keys().any(|id| !known(id)) {
        with_new(&mut state.last_delegations, |last| {
            last.retain(|id, _| known(id))
        });
    }
    if state
        .task_progress
        .keys()
        .any(|(boss, sub)| !known(boss) || !known(sub))
    {
        with_new(&mut state.task_progress, |progress| {
            progress.retain(|(boss, sub), _| known(boss) && known(sub))
        });
    }
    if state.selected_agent_ids.iter().any(|id| !known(id)) {
        with_new(&mut state.selected_agent_ids, |selected| {
            selected.retain(known)
        });
    }
}
