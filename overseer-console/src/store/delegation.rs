//! Delegation decision ledgers and last-delegation markers.

use super::{with_new, AppState};
use overseer_core::{
    AgentId, BoundedDeque, DecisionStatus, DelegationDecision, LastDelegation,
    DECISION_LEDGER_CAP,
};

/// Upsert a decision into its boss's ledger.
///
/// An existing decision with the same id is rewritten in place, so status
/// progressions (pending, then sent, then completed) update one entry rather
/// than accumulating duplicates. New decisions land at the front, newest
/// first.
///
/// A decision that reaches `Sent` with a concrete subordinate also stamps
/// that subordinate's last-delegation marker.
pub fn record_decision(state: &mut AppState, decision: DelegationDecision) {
    let marker = marker_for(state, &decision);

    with_new(&mut state.ledgers, |ledgers| {
        let ledger = ledgers
            .entry(decision.boss_id.clone())
            .or_insert_with(|| BoundedDeque::new(DECISION_LEDGER_CAP));
        let existing = ledger.iter().position(|d| d.id == decision.id);
        match existing {
            Some(pos) => {
                if let Some(slot) = ledger.iter_mut().nth(pos) {
                    *slot = decision;
                }
            }
            None => ledger.push_front(decision),
        }
    });

    if let Some((subordinate_id, marker)) = marker {
        with_new(&mut state.last_delegations, |last| {
            last.insert(subordinate_id, marker);
        });
    }
}

/// Drop a subordinate's last-delegation marker, typically once its task
/// finishes.
pub fn clear_last_delegation(state: &mut AppState, subordinate_id: &AgentId) {
    if !state.last_delegations.contains_key(subordinate_id) {
        return;
    }
    with_new(&mut state.last_delegations, |last| {
        last.remove(subordinate_id);
    });
}

fn marker_for(
    state: &AppState,
    decision: &DelegationDecision,
) -> Option<(AgentId, LastDelegation)> {
    if decision.status != DecisionStatus::Sent {
        return None;
    }
    let subordinate_id = decision.selected_agent_id.clone()?;
    let boss_name = state
        .agents
        .get(&decision.boss_id)
        .map(|boss| boss.name.clone())
        .unwrap_or_else(|| decision.boss_id.to_string());
    Some((
        subordinate_id,
        LastDelegation {
            boss_name,
            command: decision.user_command.clone(),
            timestamp: decision.timestamp,
        },
    ))
}
