//! Which `(agent, spec)` pairs are runnable right now. Generalized from the
//! teacher's sort-then-greedily-assign `Scheduler::plan()` (task → model)
//! to a (spec → remaining agents) assignment: a work item is one spec paired
//! with every agent in the roster not already covered by a cached result,
//! so a single worker can walk the whole roster under one container.

use std::collections::{HashMap, HashSet};

use evb_core::{AgentConfig, RepoId, Spec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    RepoLimitReached,
    WorkerLimitReached,
    AlreadyCached,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub repo: RepoId,
    pub instance_id: String,
    pub agent_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedItem {
    pub agent_name: String,
    pub instance_id: String,
    pub reason: BlockReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchedulePlan {
    pub ready: Vec<WorkItem>,
    pub blocked: Vec<BlockedItem>,
}

pub struct SchedulingInput<'a> {
    pub specs: &'a [Spec],
    pub agents: &'a [AgentConfig],
    /// `(agent_name, instance_id)` pairs a prior run already recorded.
    pub cached: &'a HashSet<(String, String)>,
    pub max_specs_per_repo: usize,
    pub max_eval_workers: usize,
}

/// Build the work list of `(spec, remaining agents)` pairs: filters out
/// cached pairs, then caps per-repo spec admission at `max_specs_per_repo`,
/// in dataset order (earlier specs in a repo win a slot over later ones).
pub fn plan(input: &SchedulingInput<'_>) -> SchedulePlan {
    let mut repo_counts: HashMap<&RepoId, usize> = HashMap::new();
    let mut ready = Vec::new();
    let mut blocked = Vec::new();

    for spec in input.specs {
        let mut remaining = Vec::new();
        for agent in input.agents {
            let key = (agent.name.clone(), spec.instance_id.0.clone());
            if input.cached.contains(&key) {
                blocked.push(BlockedItem {
                    agent_name: agent.name.clone(),
                    instance_id: spec.instance_id.0.clone(),
                    reason: BlockReason::AlreadyCached,
                });
            } else {
                remaining.push(agent);
            }
        }

        if remaining.is_empty() {
            continue;
        }

        if input.max_eval_workers == 0 {
            for agent in remaining {
                blocked.push(BlockedItem {
                    agent_name: agent.name.clone(),
                    instance_id: spec.instance_id.0.clone(),
                    reason: BlockReason::WorkerLimitReached,
                });
            }
            continue;
        }

        let count = repo_counts.entry(&spec.repo).or_insert(0);
        if *count >= input.max_specs_per_repo {
            for agent in remaining {
                blocked.push(BlockedItem {
                    agent_name: agent.name.clone(),
                    instance_id: spec.instance_id.0.clone(),
                    reason: BlockReason::RepoLimitReached,
                });
            }
            continue;
        }
        *count += 1;

        ready.push(WorkItem {
            repo: spec.repo.clone(),
            instance_id: spec.instance_id.0.clone(),
            agent_names: remaining.into_iter().map(|a| a.name.clone()).collect(),
        });
    }

    SchedulePlan { ready, blocked }
}
