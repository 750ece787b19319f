//! Stage 6: bounded dry run. Walks everything wired to `onPageLoad`, marks
//! mutated keys as set and wakes their `StateChange` listeners, until the
//! queue drains or the step budget runs out. Never fails.

use crate::audit::{Diagnostic, Stage};
use crate::reachability::listeners;
use crate::types::{Mutation, Snapshot, ON_PAGE_LOAD};
use crate::view::DocumentView;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationOutcome {
    Completed,
    StepBudgetExceeded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub outcome: SimulationOutcome,
    pub steps: usize,
    pub budget: usize,
    /// Actions in first-visit order.
    pub visited: Vec<String>,
    pub keys_set: BTreeSet<String>,
    /// Actions that ran more than once.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reentrant: Vec<String>,
}

impl SimulationReport {
    pub fn is_completed(&self) -> bool {
        self.outcome == SimulationOutcome::Completed
    }

    /// Budget overruns surface as a diagnostic, never as a rejection.
    pub fn diagnostic(&self) -> Option<Diagnostic> {
        if self.is_completed() {
            return None;
        }
        let mut message = format!(
            "dry run exceeded its budget of {} steps; possible infinite trigger loop",
            self.budget
        );
        if !self.reentrant.is_empty() {
            message.push_str(&format!(" through {}", self.reentrant.join(", ")));
        }
        Some(Diagnostic::new(Stage::Simulate, "step_budget_exceeded", message))
    }
}

pub fn simulate(mutation: &Mutation, prior: Option<&Snapshot>, budget: usize) -> SimulationReport {
    let view = DocumentView::new(mutation, prior);
    let actions = view.actions();
    let by_id: BTreeMap<&str, _> = actions.iter().map(|&a| (a.id.as_str(), a)).collect();
    let listeners = listeners(&actions);

    let page_load: BTreeSet<&str> = view
        .pages()
        .into_iter()
        .flat_map(|p| p.events.iter())
        .filter(|e| e.kind == ON_PAGE_LOAD)
        .map(|e| e.action_id.as_str())
        .collect();
    let starts = actions
        .iter()
        .filter(|a| a.has_lifecycle_trigger(ON_PAGE_LOAD) || page_load.contains(a.id.as_str()))
        .map(|&a| a.id.as_str());

    let mut queue: VecDeque<&str> = VecDeque::new();
    let mut pending: BTreeSet<&str> = BTreeSet::new();
    for id in starts {
        if pending.insert(id) {
            queue.push_back(id);
        }
    }

    let mut visits: BTreeMap<&str, usize> = BTreeMap::new();
    let mut visited = Vec::new();
    let mut keys_set = BTreeSet::new();
    let mut steps = 0;
    let mut outcome = SimulationOutcome::Completed;

    while let Some(id) = queue.pop_front() {
        pending.remove(id);
        if steps >= budget {
            outcome = SimulationOutcome::StepBudgetExceeded;
            break;
        }
        steps += 1;
        let count = visits.entry(id).or_insert(0);
        *count += 1;
        if *count == 1 {
            visited.push(id.to_string());
        }

        let Some(action) = by_id.get(id) else {
            continue;
        };
        if !action.kind.is_mutating() {
            continue;
        }
        for key in action.mutated_keys() {
            for &listener in listeners.get(key.as_str()).into_iter().flatten() {
                if pending.insert(listener) {
                    queue.push_back(listener);
                }
            }
            keys_set.insert(key);
        }
    }

    let reentrant: Vec<String> = visits
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(id, _)| id.to_string())
        .collect();
    if outcome == SimulationOutcome::StepBudgetExceeded {
        tracing::warn!(budget, reentrant = ?reentrant, "dry run exceeded step budget");
    } else {
        tracing::debug!(steps, "dry run completed");
    }

    SimulationReport {
        outcome,
        steps,
        budget,
        visited,
        keys_set,
        reentrant,
    }
}
