//! Subordinate task-progress tracking.
//!
//! Task events arrive over the socket and can be reordered or replayed, so
//! each mutation tolerates missing or already-present entries.

use super::{with_new, AppState};
use overseer_core::{AgentTaskProgress, TaskKey, TaskStatus, TimestampMs};

/// Start (or restart) tracking the task identified by `key`.
///
/// A restart with a newer timestamp resets accumulated output; replaying the
/// same start event changes nothing.
pub fn task_started(state: &mut AppState, key: TaskKey, at: TimestampMs) {
    if let Some(existing) = state.task_progress.get(&key) {
        if existing.status == TaskStatus::Working && existing.started_at == at {
            return;
        }
    }
    with_new(&mut state.task_progress, |progress| {
        progress.insert(key, AgentTaskProgress::started(at));
    });
}

/// Append one output line to a running task.
///
/// A line arriving before its start event implicitly opens the task; a line
/// arriving after completion is dropped.
pub fn task_output(state: &mut AppState, key: TaskKey, line: String, at: TimestampMs) {
    if let Some(existing) = state.task_progress.get(&key) {
        if existing.status.is_terminal() {
            tracing::debug!(?key, "output line for finished task dropped");
            return;
        }
    }
    with_new(&mut state.task_progress, |progress| {
        progress
            .entry(key)
            .or_insert_with(|| AgentTaskProgress::started(at))
            .output
            .push(line);
    });
}

/// Finalize a task with a terminal status.
///
/// Completion for an unknown key still records a finalized entry, so a
/// dropped start event does not hide the result.
pub fn task_completed(state: &mut AppState, key: TaskKey, status: TaskStatus, at: TimestampMs) {
    debug_assert!(status.is_terminal());
    with_new(&mut state.task_progress, |progress| {
        let entry = progress
            .entry(key)
            .or_insert_with(|| AgentTaskProgress::started(at));
        entry.status = status;
        entry.completed_at = Some(at);
    });
}

/// Drop a tracked task, e.g. when the operator dismisses a finished card.
pub fn clear_task(state: &mut AppState, key: &TaskKey) {
    if !state.task_progress.contains_key(key) {
        return;
    }
    with_new(&mut state.task_progress, |progress| {
        progress.remove(key);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use overseer_core::AgentId;

    fn key() -> TaskKey {
        (AgentId::new("boss"), AgentId::new("sub"))
    }

    #[test]
    fn full_lifecycle_accumulates_output_then_finalizes() {
        let mut store = Store::new();
        store.mutate(|s| {
            task_started(s, key(), 1_000);
            task_output(s, key(), "cloning repo".into(), 1_100);
            task_output(s, key(), "running tests".into(), 1_200);
            task_completed(s, key(), TaskStatus::Completed, 1_300);
        });

        let progress = &store.state().task_progress[&key()];
        assert_eq!(progress.status, TaskStatus::Completed);
        assert_eq!(progress.output, vec!["cloning repo", "running tests"]);
        assert_eq!(progress.started_at, 1_000);
        assert_eq!(progress.completed_at, Some(1_300));
    }

    #[test]
    fn replayed_start_event_keeps_output() {
        let mut store = Store::new();
        store.mutate(|s| {
            task_started(s, key(), 1_000);
            task_output(s, key(), "step one".into(), 1_100);
            task_started(s, key(), 1_000);
        });
        assert_eq!(store.state().task_progress[&key()].output, vec!["step one"]);
    }

    #[test]
    fn restart_with_new_timestamp_resets_the_run() {
        let mut store = Store::new();
        store.mutate(|s| {
            task_started(s, key(), 1_000);
            task_output(s, key(), "old run".into(), 1_100);
            task_completed(s, key(), TaskStatus::Failed, 1_200);
            task_started(s, key(), 2_000);
        });

        let progress = &store.state().task_progress[&key()];
        assert_eq!(progress.status, TaskStatus::Working);
        assert!(progress.output.is_empty());
        assert_eq!(progress.started_at, 2_000);
    }

    #[test]
    fn output_before_start_opens_the_task() {
        let mut store = Store::new();
        store.mutate(|s| task_output(s, key(), "early line".into(), 900));

        let progress = &store.state().task_progress[&key()];
        assert_eq!(progress.status, TaskStatus::Working);
        assert_eq!(progress.output, vec!["early line"]);
        assert_eq!(progress.started_at, 900);
    }

    #[test]
    fn output_after_completion_is_dropped() {
        let mut store = Store::new();
        store.mutate(|s| {
            task_started(s, key(), 1_000);
            task_completed(s, key(), TaskStatus::Completed, 1_100);
            task_output(s, key(), "straggler".into(), 1_200);
        });
        assert!(store.state().task_progress[&key()].output.is_empty());
    }

    #[test]
    fn completion_without_start_still_records_a_result() {
        let mut store = Store::new();
        store.mutate(|s| task_completed(s, key(), TaskStatus::Failed, 1_000));

        let progress = &store.state().task_progress[&key()];
        assert_eq!(progress.status, TaskStatus::Failed);
        assert_eq!(progress.completed_at, Some(1_000));
    }
}
