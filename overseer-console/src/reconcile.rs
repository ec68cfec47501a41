//! Transcript reconciliation.
//!
//! The live buffer and the server-side history race: lines stream in over the
//! socket while pages of the persisted transcript arrive over HTTP. This
//! module decides, line by line, which buffered entries survive a history
//! fetch and in what order the merged transcript reads.
//!
//! All fetch bookkeeping lives in [`ReconcileEngine`], which is sequence
//! numbered per agent so a response from an abandoned fetch can never clobber
//! a newer one. The engine never performs I/O itself; it hands back
//! [`FetchPlan`]s for the driver to execute and consumes the results through
//! [`ReconcileEngine::apply`].

use crate::api_client::ApiClientError;
use crate::events::HistoryFetchKind;
use crate::store::{outputs, AgentHistory, Store};
use overseer_core::{AgentId, OutputEntry, OutputRole, TimestampMs, DEDUP_WINDOW_MS};
use overseer_wire::HistoryPage;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use uuid::Uuid;

/// A history fetch the driver should run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    pub agent_id: AgentId,
    pub seq: u64,
    pub kind: HistoryFetchKind,
    pub limit: u64,
    pub offset: u64,
    /// Wait this long before fetching, letting the server flush lines that
    /// were queued while the socket was down.
    pub settle: Option<Duration>,
}

#[derive(Debug, Default)]
struct FetchGuard {
    next_seq: u64,
    pending: Option<Pending>,
}

#[derive(Debug)]
struct Pending {
    seq: u64,
    kind: HistoryFetchKind,
    /// Snapshot of the live buffer taken before the fetch started.
    preserved: Vec<OutputEntry>,
}

/// Per-agent fetch state machine. Owned by the driver next to the store.
pub struct ReconcileEngine {
    guards: HashMap<AgentId, FetchGuard>,
    page_limit: u64,
    resync_settle: Duration,
}

impl ReconcileEngine {
    pub fn new(page_limit: u64, resync_settle: Duration) -> Self {
        Self {
            guards: HashMap::new(),
            page_limit,
            resync_settle,
        }
    }

    /// Start an initial history fetch for one agent.
    ///
    /// Fetches are single-flight per agent: while one is pending, further
    /// opens are no-ops.
    pub fn open_transcript(&mut self, store: &mut Store, agent_id: &AgentId) -> Option<FetchPlan> {
        self.begin_initial(store, agent_id, None)
    }

    /// After a reconnect, refetch history for every agent with transcript
    /// state, deferred by the settle delay.
    ///
    /// Buffers are snapshotted into the fetch guard BEFORE anything is
    /// cleared; a fetch failure restores them.
    pub fn begin_resync(&mut self, store: &mut Store) -> Vec<FetchPlan> {
        let mut agent_ids: Vec<AgentId> = store
            .state()
            .histories
            .keys()
            .chain(
                store
                    .state()
                    .outputs
                    .iter()
                    .filter(|(_, buffer)| !buffer.is_empty())
                    .map(|(id, _)| id),
            )
            .cloned()
            .collect();
        agent_ids.sort();
        agent_ids.dedup();

        let settle = self.resync_settle;
        agent_ids
            .iter()
            .filter_map(|id| self.begin_initial(store, id, Some(settle)))
            .collect()
    }

    /// Fetch the next older page for one agent. No-op unless the cached
    /// history says there is more and no fetch is in flight.
    pub fn load_more(&mut self, store: &mut Store, agent_id: &AgentId) -> Option<FetchPlan> {
        let offset = {
            let history = store.state().histories.get(agent_id)?;
            if !history.has_more {
                return None;
            }
            history.messages.len() as u64
        };
        let guard = self.guards.entry(agent_id.clone()).or_default();
        if guard.pending.is_some() {
            return None;
        }
        let seq = guard.issue(HistoryFetchKind::OlderPage, Vec::new());
        store.mutate(|s| outputs::set_history_loading(s, agent_id, true));
        Some(FetchPlan {
            agent_id: agent_id.clone(),
            seq,
            kind: HistoryFetchKind::OlderPage,
            limit: self.page_limit,
            offset,
            settle: None,
        })
    }

    /// Feed one fetch result back into the store. Responses whose sequence
    /// number no longer matches the pending fetch are discarded.
    pub fn apply(
        &mut self,
        store: &mut Store,
        agent_id: &AgentId,
        seq: u64,
        result: Result<HistoryPage, ApiClientError>,
    ) {
        let guard = match self.guards.get_mut(agent_id) {
            Some(guard) => guard,
            None => {
                tracing::debug!(agent_id = %agent_id, seq, "history result with no guard dropped");
                return;
            }
        };
        let pending = match guard.pending.take() {
            Some(pending) if pending.seq == seq => pending,
            other => {
                guard.pending = other;
                tracing::debug!(agent_id = %agent_id, seq, "stale history result discarded");
                return;
            }
        };

        match (pending.kind, result) {
            (HistoryFetchKind::Initial, Ok(page)) => {
                self.finish_initial(store, agent_id, pending.preserved, page);
            }
            (HistoryFetchKind::OlderPage, Ok(page)) => {
                store.mutate(|s| {
                    outputs::prepend_history(
                        s,
                        agent_id,
                        page.messages.clone(),
                        page.has_more,
                        page.total_count,
                    );
                    outputs::prepend_outputs(s, agent_id, page.messages);
                });
            }
            (kind, Err(err)) => {
                tracing::warn!(agent_id = %agent_id, ?kind, error = %err, "history fetch failed");
                store.mutate(|s| {
                    // Put the snapshot back in front of whatever streamed in
                    // while the fetch was out.
                    outputs::prepend_outputs(s, agent_id, pending.preserved);
                    outputs::set_history_loading(s, agent_id, false);
                });
            }
        }
    }

    fn begin_initial(
        &mut self,
        store: &mut Store,
        agent_id: &AgentId,
        settle: Option<Duration>,
    ) -> Option<FetchPlan> {
        let guard = self.guards.entry(agent_id.clone()).or_default();
        if guard.pending.is_some() {
            return None;
        }
        let preserved = store
            .state()
            .outputs
            .get(agent_id)
            .map(|buffer| buffer.to_vec())
            .unwrap_or_default();
        let seq = guard.issue(HistoryFetchKind::Initial, preserved);
        store.mutate(|s| {
            outputs::clear_outputs(s, agent_id);
            outputs::set_history_loading(s, agent_id, true);
        });
        Some(FetchPlan {
            agent_id: agent_id.clone(),
            seq,
            kind: HistoryFetchKind::Initial,
            limit: self.page_limit,
            offset: 0,
            settle,
        })
    }

    fn finish_initial(
        &mut self,
        store: &mut Store,
        agent_id: &AgentId,
        preserved: Vec<OutputEntry>,
        page: HistoryPage,
    ) {
        store.mutate(|s| {
            // Candidates are the snapshot plus anything that streamed in
            // while the fetch was out.
            let mut candidates = preserved;
            if let Some(buffer) = s.outputs.get(agent_id) {
                candidates.extend(buffer.iter().cloned());
            }
            let survivors = merge_history(&page.messages, candidates);

            let mut merged = page.messages.clone();
            merged.extend(survivors);
            merged.sort_by_key(|entry| entry.timestamp);

            outputs::replace_outputs(s, agent_id, merged);
            outputs::set_history(
                s,
                agent_id,
                AgentHistory {
                    messages: page.messages,
                    loading: false,
                    has_more: page.has_more,
                    total_count: page.total_count,
                },
            );
        });
    }
}

impl FetchGuard {
    fn issue(&mut self, kind: HistoryFetchKind, preserved: Vec<OutputEntry>) -> u64 {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.pending = Some(Pending {
            seq,
            kind,
            preserved,
        });
        seq
    }
}

/// Decide which buffered lines survive against a fetched history slice.
///
/// A candidate is dropped when any of these hold:
/// - its uuid appears in the history;
/// - a history line with the same `(role, normalized text)` key sits within
///   [`DEDUP_WINDOW_MS`] of it;
/// - it is not newer than the newest history line (the history already
///   covers that span, so an unmatched buffered line there is a local echo
///   the backend never persisted).
pub fn merge_history(history: &[OutputEntry], candidates: Vec<OutputEntry>) -> Vec<OutputEntry> {
    let history_uuids: HashSet<Uuid> = history.iter().filter_map(|entry| entry.uuid).collect();
    let mut latest_by_key: HashMap<(OutputRole, String), TimestampMs> = HashMap::new();
    for entry in history {
        let slot = latest_by_key.entry(entry.dedup_key()).or_insert(entry.timestamp);
        *slot = (*slot).max(entry.timestamp);
    }
    let newest_ts = history.iter().map(|entry| entry.timestamp).max();

    candidates
        .into_iter()
        .filter(|candidate| {
            if let Some(uuid) = candidate.uuid {
                if history_uuids.contains(&uuid) {
                    return false;
                }
            }
            if let Some(&ts) = latest_by_key.get(&candidate.dedup_key()) {
                if (candidate.timestamp - ts).abs() <= DEDUP_WINDOW_MS {
                    return false;
                }
            }
            if let Some(newest) = newest_ts {
                if candidate.timestamp <= newest {
                    return false;
                }
            }
            true
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::outputs::append_output;
    use overseer_core::OUTPUT_BUFFER_CAP;

    fn aid() -> AgentId {
        AgentId::new("a1")
    }

    fn engine() -> ReconcileEngine {
        ReconcileEngine::new(50, Duration::from_millis(500))
    }

    fn with_uuid(mut entry: OutputEntry, uuid: Uuid) -> OutputEntry {
        entry.uuid = Some(uuid);
        entry
    }

    fn page(messages: Vec<OutputEntry>, has_more: bool) -> HistoryPage {
        let total = messages.len() as u64;
        HistoryPage {
            messages,
            has_more,
            total_count: total,
        }
    }

    mod merge {
        use super::*;

        #[test]
        fn uuid_match_drops_the_candidate() {
            let uuid = Uuid::new_v4();
            let history = vec![with_uuid(OutputEntry::assistant("ok", 200), uuid)];
            let candidates = vec![with_uuid(OutputEntry::assistant("ok", 205), uuid)];
            assert!(merge_history(&history, candidates).is_empty());
        }

        #[test]
        fn key_match_inside_the_window_drops_either_side() {
            let history = vec![OutputEntry::assistant("done", 100_000)];
            // 50s after and 50s before the history line.
            let after = OutputEntry::assistant("  done  ", 150_000);
            let before = OutputEntry::assistant("done", 50_000);
            assert!(merge_history(&history, vec![after]).is_empty());
            assert!(merge_history(&history, vec![before]).is_empty());
        }

        #[test]
        fn key_match_outside_the_window_survives_when_newer() {
            let history = vec![OutputEntry::assistant("done", 100_000)];
            let later = OutputEntry::assistant("done", 100_000 + DEDUP_WINDOW_MS + 1);
            let survivors = merge_history(&history, vec![later.clone()]);
            assert_eq!(survivors, vec![later]);
        }

        #[test]
        fn unmatched_line_older_than_history_tail_is_dropped() {
            let history = vec![OutputEntry::assistant("ok", 200)];
            let echo = OutputEntry::user("hi", 100);
            assert!(merge_history(&history, vec![echo]).is_empty());
        }

        #[test]
        fn empty_history_keeps_every_candidate() {
            let candidates = vec![
                OutputEntry::user("hi", 100),
                OutputEntry::assistant("hello", 200),
            ];
            assert_eq!(merge_history(&[], candidates.clone()), candidates);
        }

        #[test]
        fn streaming_race_keeps_only_the_unpersisted_tail() {
            // Buffer accumulated three lines while the history fetch ran; the
            // fetched slice already contains the middle one.
            let uuid = Uuid::new_v4();
            let history = vec![with_uuid(OutputEntry::assistant("ok", 200), uuid)];
            let candidates = vec![
                OutputEntry::user("hi", 100),
                with_uuid(OutputEntry::assistant("ok", 200), uuid),
                OutputEntry::assistant("bye", 300),
            ];
            let survivors = merge_history(&history, candidates);
            assert_eq!(survivors, vec![OutputEntry::assistant("bye", 300)]);
        }
    }

    #[test]
    fn initial_fetch_replaces_buffer_with_history_plus_survivors() {
        let mut store = Store::new();
        let mut engine = engine();
        let uuid = Uuid::new_v4();
        store.mutate(|s| {
            append_output(s, &aid(), OutputEntry::user("hi", 100));
            append_output(s, &aid(), with_uuid(OutputEntry::assistant("ok", 200), uuid));
            append_output(s, &aid(), OutputEntry::assistant("bye", 300));
        });

        let plan = engine.open_transcript(&mut store, &aid()).unwrap();
        assert_eq!(plan.offset, 0);
        assert!(store.state().histories[&aid()].loading);

        let history = vec![with_uuid(OutputEntry::assistant("ok", 200), uuid)];
        engine.apply(&mut store, &aid(), plan.seq, Ok(page(history, false)));

        let buffer = store.state().outputs[&aid()].to_vec();
        let texts: Vec<&str> = buffer.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["ok", "bye"]);
        let cached = &store.state().histories[&aid()];
        assert!(!cached.loading);
        assert_eq!(cached.messages.len(), 1);
    }

    #[test]
    fn open_is_single_flight_per_agent() {
        let mut store = Store::new();
        let mut engine = engine();
        let first = engine.open_transcript(&mut store, &aid());
        let second = engine.open_transcript(&mut store, &aid());
        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[test]
    fn stale_sequence_result_is_discarded() {
        let mut store = Store::new();
        let mut engine = engine();
        let plan = engine.open_transcript(&mut store, &aid()).unwrap();

        engine.apply(
            &mut store,
            &aid(),
            plan.seq + 1,
            Ok(page(vec![OutputEntry::assistant("wrong", 1)], false)),
        );

        // The real fetch is still pending and still applies.
        engine.apply(
            &mut store,
            &aid(),
            plan.seq,
            Ok(page(vec![OutputEntry::assistant("right", 1)], false)),
        );
        assert_eq!(store.state().outputs[&aid()].back().unwrap().text, "right");
    }

    #[test]
    fn resync_preserves_buffers_before_clearing() {
        let mut store = Store::new();
        let mut engine = engine();
        store.mutate(|s| append_output(s, &aid(), OutputEntry::assistant("buffered", 100)));

        let plans = engine.begin_resync(&mut store);
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].settle, Some(Duration::from_millis(500)));
        // Buffer is cleared for the duration of the fetch.
        assert!(store.state().outputs[&aid()].is_empty());

        // Empty history: the preserved line must come back.
        engine.apply(&mut store, &aid(), plans[0].seq, Ok(page(vec![], false)));
        assert_eq!(
            store.state().outputs[&aid()].back().unwrap().text,
            "buffered"
        );
    }

    #[test]
    fn failed_fetch_restores_the_preserved_buffer() {
        let mut store = Store::new();
        let mut engine = engine();
        store.mutate(|s| append_output(s, &aid(), OutputEntry::assistant("keep me", 100)));

        let plan = engine.open_transcript(&mut store, &aid()).unwrap();
        // A line streams in while the fetch is out.
        store.mutate(|s| append_output(s, &aid(), OutputEntry::assistant("newer", 200)));

        engine.apply(
            &mut store,
            &aid(),
            plan.seq,
            Err(ApiClientError::InvalidResponse("503".into())),
        );

        let texts: Vec<String> = store.state().outputs[&aid()]
            .iter()
            .map(|e| e.text.clone())
            .collect();
        assert_eq!(texts, vec!["keep me", "newer"]);
        assert!(!store.state().histories[&aid()].loading);
    }

    #[test]
    fn load_more_prepends_without_rededup() {
        let mut store = Store::new();
        let mut engine = engine();

        let plan = engine.open_transcript(&mut store, &aid()).unwrap();
        engine.apply(
            &mut store,
            &aid(),
            plan.seq,
            Ok(HistoryPage {
                messages: vec![OutputEntry::assistant("recent", 2_000)],
                has_more: true,
                total_count: 2,
            }),
        );

        let older = engine.load_more(&mut store, &aid()).unwrap();
        assert_eq!(older.offset, 1);
        engine.apply(
            &mut store,
            &aid(),
            older.seq,
            Ok(HistoryPage {
                messages: vec![OutputEntry::assistant("older", 1_000)],
                has_more: false,
                total_count: 2,
            }),
        );

        let history = &store.state().histories[&aid()];
        assert_eq!(history.messages[0].text, "older");
        assert!(!history.has_more);
        let texts: Vec<String> = store.state().outputs[&aid()]
            .iter()
            .map(|e| e.text.clone())
            .collect();
        assert_eq!(texts, vec!["older", "recent"]);

        // Exhausted history: further loads are no-ops.
        assert!(engine.load_more(&mut store, &aid()).is_none());
    }

    #[test]
    fn load_more_is_single_flight() {
        let mut store = Store::new();
        let mut engine = engine();
        store.mutate(|s| {
            outputs::set_history(
                s,
                &aid(),
                AgentHistory {
                    messages: vec![OutputEntry::assistant("recent", 2_000)],
                    loading: false,
                    has_more: true,
                    total_count: 10,
                },
            );
        });

        assert!(engine.load_more(&mut store, &aid()).is_some());
        assert!(engine.load_more(&mut store, &aid()).is_none());
    }

    mod merge_props {
        use super::*;
        use proptest::prelude::*;

        fn entry_strategy() -> impl Strategy<Value = OutputEntry> {
            ("[a-d]{1,3}", 0i64..400_000, any::<bool>()).prop_map(|(text, ts, user)| {
                if user {
                    OutputEntry::user(text, ts)
                } else {
                    OutputEntry::assistant(text, ts)
                }
            })
        }

        proptest! {
            #[test]
            fn survivors_are_a_subsequence_of_candidates(
                history in proptest::collection::vec(entry_strategy(), 0..8),
                candidates in proptest::collection::vec(entry_strategy(), 0..8),
            ) {
                let survivors = merge_history(&history, candidates.clone());
                let mut remaining = candidates.iter();
                for survivor in &survivors {
                    prop_assert!(remaining.any(|candidate| candidate == survivor));
                }
            }

            #[test]
            fn survivors_are_strictly_newer_than_the_history_tail(
                history in proptest::collection::vec(entry_strategy(), 1..8),
                candidates in proptest::collection::vec(entry_strategy(), 0..8),
            ) {
                let newest = history.iter().map(|e| e.timestamp).max().unwrap();
                for survivor in merge_history(&history, candidates) {
                    prop_assert!(survivor.timestamp > newest);
                }
            }
        }
    }

    #[test]
    fn merged_transcript_is_capped() {
        let mut store = Store::new();
        let mut engine = engine();
        store.mutate(|s| {
            for i in 0..100 {
                append_output(
                    s,
                    &aid(),
                    OutputEntry::assistant(format!("live {i}"), 10_000_000 + i as i64),
                );
            }
        });

        let plan = engine.open_transcript(&mut store, &aid()).unwrap();
        let history: Vec<OutputEntry> = (0..150)
            .map(|i| OutputEntry::assistant(format!("hist {i}"), i as i64))
            .collect();
        engine.apply(&mut store, &aid(), plan.seq, Ok(page(history, true)));

        let buffer = &store.state().outputs[&aid()];
        assert_eq!(buffer.len(), OUTPUT_BUFFER_CAP);
        // Newest lines win; the oldest history lines fall off the front.
        assert_eq!(buffer.back().unwrap().text, "live 99");
        assert_eq!(buffer.front().unwrap().text, "hist 50");
    }
}
