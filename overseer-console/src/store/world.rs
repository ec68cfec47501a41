//! World, feed, and infrastructure slices: areas, buildings, the supervisor
//! activity feed, tool executions, skills, exec tasks, subagents, secrets,
//! and database stats.

use super::{with_new, AppState};
use overseer_core::{
    ActivityEntry, AgentId, Area, Building, ExecTask, ExecTaskStatus, Skill, TimestampMs,
};
use overseer_wire::{DatabaseStats, SubagentInfo, ToolHistoryResponse};

/// An unresolved secret prompt waiting on the operator.
#[derive(Debug, Clone, PartialEq)]
pub struct SecretRequest {
    pub agent_id: AgentId,
    pub name: String,
    pub prompt: Option<String>,
}

pub fn apply_areas(state: &mut AppState, areas: Vec<Area>) {
    with_new(&mut state.areas, |map| {
        map.clear();
        for area in areas {
            map.insert(area.id.clone(), area);
        }
    });
}

pub fn upsert_area(state: &mut AppState, area: Area) {
    with_new(&mut state.areas, |map| {
        map.insert(area.id.clone(), area);
    });
}

pub fn apply_buildings(state: &mut AppState, buildings: Vec<Building>) {
    with_new(&mut state.buildings, |map| {
        map.clear();
        for building in buildings {
            map.insert(building.id.clone(), building);
        }
    });
}

pub fn upsert_building(state: &mut AppState, building: Building) {
    with_new(&mut state.buildings, |map| {
        map.insert(building.id.clone(), building);
    });
}

/// Append one line to the bounded supervisor activity feed.
pub fn push_activity(state: &mut AppState, entry: ActivityEntry) {
    with_new(&mut state.activities, |feed| feed.push_back(entry));
}

/// Replace the tool-execution feed with a fetched history snapshot.
pub fn apply_tool_history(state: &mut AppState, response: ToolHistoryResponse) {
    with_new(&mut state.tool_executions, |feed| {
        feed.replace_with(response.executions);
    });
}

pub fn apply_skills(state: &mut AppState, skills: Vec<Skill>) {
    state.skills = std::sync::Arc::new(skills);
}

/// Merge a learned skill: extend the learner set if the skill is already
/// known, otherwise add it.
pub fn skill_learned(state: &mut AppState, skill: Skill, agent_id: AgentId) {
    with_new(&mut state.skills, |skills| {
        if let Some(existing) = skills.iter_mut().find(|s| s.name == skill.name) {
            if !existing.agent_ids.contains(&agent_id) {
                existing.agent_ids.push(agent_id);
            }
        } else {
            let mut skill = skill;
            if !skill.agent_ids.contains(&agent_id) {
                skill.agent_ids.push(agent_id);
            }
            skills.push(skill);
        }
    });
}

pub fn apply_exec_tasks(state: &mut AppState, tasks: Vec<ExecTask>) {
    with_new(&mut state.exec_tasks, |map| {
        map.clear();
        for task in tasks {
            map.insert(task.id.clone(), task);
        }
    });
}

pub fn exec_task_started(state: &mut AppState, task: ExecTask) {
    with_new(&mut state.exec_tasks, |map| {
        map.insert(task.id.clone(), task);
    });
}

pub fn exec_task_output(state: &mut AppState, task_id: &str, line: String) {
    if !state.exec_tasks.contains_key(task_id) {
        tracing::debug!(task_id, "output for unknown exec task dropped");
        return;
    }
    with_new(&mut state.exec_tasks, |map| {
        if let Some(task) = map.get_mut(task_id) {
            task.output.push(line);
        }
    });
}

pub fn exec_task_completed(
    state: &mut AppState,
    task_id: &str,
    status: ExecTaskStatus,
    at: TimestampMs,
) {
    if !state.exec_tasks.contains_key(task_id) {
        tracing::debug!(task_id, "completion for unknown exec task dropped");
        return;
    }
    with_new(&mut state.exec_tasks, |map| {
        if let Some(task) = map.get_mut(task_id) {
            task.status = status;
            task.completed_at = Some(at);
        }
    });
}

pub fn remove_exec_task(state: &mut AppState, task_id: &str) {
    if !state.exec_tasks.contains_key(task_id) {
        return;
    }
    with_new(&mut state.exec_tasks, |map| {
        map.remove(task_id);
    });
}

pub fn set_subagents(state: &mut AppState, agent_id: AgentId, subagents: Vec<SubagentInfo>) {
    with_new(&mut state.subagents, |map| {
        map.insert(agent_id, subagents);
    });
}

pub fn subagent_completed(state: &mut AppState, agent_id: &AgentId, subagent_id: &str) {
    if !state.subagents.contains_key(agent_id) {
        return;
    }
    with_new(&mut state.subagents, |map| {
        if let Some(subagents) = map.get_mut(agent_id) {
            if let Some(info) = subagents.iter_mut().find(|s| s.id == subagent_id) {
                info.status = overseer_core::TaskStatus::Completed;
            }
        }
    });
}

/// Record a secret prompt, replacing any earlier request for the same
/// `(agent, name)` pair.
pub fn push_secret_request(state: &mut AppState, request: SecretRequest) {
    with_new(&mut state.secret_requests, |requests| {
        requests.retain(|r| !(r.agent_id == request.agent_id && r.name == request.name));
        requests.push(request);
    });
}

pub fn resolve_secret_request(state: &mut AppState, agent_id: &AgentId, name: &str) {
    if !state
        .secret_requests
        .iter()
        .any(|r| &r.agent_id == agent_id && r.name == name)
    {
        return;
    }
    with_new(&mut state.secret_requests, |requests| {
        requests.retain(|r| !(&r.agent_id == agent_id && r.name == name));
    });
}

pub fn set_database_stats(state: &mut AppState, stats: DatabaseStats) {
    state.database = Some(stats);
}
