//! Live output buffers and the per-agent history cache.

use super::{with_new, AppState};
use overseer_core::{AgentId, BoundedDeque, OutputEntry, OUTPUT_BUFFER_CAP};

/// Cached slice of the server-side transcript for one agent.
///
/// `messages` holds the oldest-first page(s) fetched so far; `has_more` and
/// `total_count` come from the last page response and drive pagination.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentHistory {
    pub messages: Vec<OutputEntry>,
    pub loading: bool,
    pub has_more: bool,
    pub total_count: u64,
}

/// Append one line to an agent's live buffer.
///
/// If the entry carries a uuid already present in the buffer, the existing
/// line is rewritten in place instead of appended. That makes replays
/// idempotent and lets a streaming line be finalized without duplication.
pub fn append_output(state: &mut AppState, agent_id: &AgentId, entry: OutputEntry) {
    with_new(&mut state.outputs, |outputs| {
        let buffer = outputs
            .entry(agent_id.clone())
            .or_insert_with(|| BoundedDeque::new(OUTPUT_BUFFER_CAP));
        if let Some(uuid) = entry.uuid {
            if let Some(existing) = buffer.iter_mut().find(|e| e.uuid == Some(uuid)) {
                *existing = entry;
                return;
            }
        }
        buffer.push_back(entry);
    });
}

/// Replace an agent's live buffer wholesale, keeping only the newest lines
/// when the replacement exceeds the cap.
pub fn replace_outputs(state: &mut AppState, agent_id: &AgentId, entries: Vec<OutputEntry>) {
    with_new(&mut state.outputs, |outputs| {
        let buffer = outputs
            .entry(agent_id.clone())
            .or_insert_with(|| BoundedDeque::new(OUTPUT_BUFFER_CAP));
        buffer.replace_with(entries);
    });
}

/// Prepend older lines to the front of an agent's buffer. Lines that no
/// longer fit under the cap are dropped from the front.
pub fn prepend_outputs(state: &mut AppState, agent_id: &AgentId, older: Vec<OutputEntry>) {
    if older.is_empty() {
        return;
    }
    with_new(&mut state.outputs, |outputs| {
        let buffer = outputs
            .entry(agent_id.clone())
            .or_insert_with(|| BoundedDeque::new(OUTPUT_BUFFER_CAP));
        let mut merged = older;
        merged.extend(buffer.iter().cloned());
        buffer.replace_with(merged);
    });
}

pub fn clear_outputs(state: &mut AppState, agent_id: &AgentId) {
    if !state.outputs.contains_key(agent_id) {
        return;
    }
    with_new(&mut state.outputs, |outputs| {
        if let Some(buffer) = outputs.get_mut(agent_id) {
            buffer.clear();
        }
    });
}

pub fn clear_all_outputs(state: &mut AppState) {
    with_new(&mut state.outputs, |outputs| {
        for buffer in outputs.values_mut() {
            buffer.clear();
        }
    });
}

pub fn set_history_loading(state: &mut AppState, agent_id: &AgentId, loading: bool) {
    with_new(&mut state.histories, |histories| {
        histories.entry(agent_id.clone()).or_default().loading = loading;
    });
}

pub fn set_history(state: &mut AppState, agent_id: &AgentId, history: AgentHistory) {
    with_new(&mut state.histories, |histories| {
        histories.insert(agent_id.clone(), history);
    });
}

/// Splice an older page in front of the cached history.
pub fn prepend_history(
    state: &mut AppState,
    agent_id: &AgentId,
    older: Vec<OutputEntry>,
    has_more: bool,
    total_count: u64,
) {
    with_new(&mut state.histories, |histories| {
        let history = histories.entry(agent_id.clone()).or_default();
        let mut merged = older;
        merged.extend(history.messages.drain(..));
        history.messages = merged;
        history.has_more = has_more;
        history.total_count = total_count;
        history.loading = false;
    });
}
