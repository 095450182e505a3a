//! Top-level orchestration: load the dataset and config, plan the work,
//! then fan it out across a fixed worker pool over the shared `swap/`
//! checkout area (spec.md §4.7 "Main Loop").

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::Mutex;

use evb_container::{ContainerExecutor, ContainerOperator};
use evb_core::{AgentConfig, EvaluationResult, HarnessConfig, Spec};
use evb_env::{BollardRuntime, EnvironmentManager, RuntimeVersionManifest};
use rand::seq::SliceRandom;

use crate::error::SchedulerError;
use crate::lock::{clear_stale_locks, RepoLock};
use crate::persistence::{cached_keys, load_results, write_results_atomically, PersistenceHandle};
use crate::plan::{self, SchedulingInput, WorkItem};
use crate::signal::CleanupCoordinator;
use crate::worker::{evaluate_pair, EvaluationInputs};

fn results_path(config: &HarnessConfig) -> PathBuf {
    config.harness_root.join("results.json")
}

fn manifest_path(config: &HarnessConfig) -> PathBuf {
    config.harness_root.join("swap").join("recommended_python_version.json")
}

fn load_manifest(config: &HarnessConfig) -> RuntimeVersionManifest {
    let path = manifest_path(config);
    RuntimeVersionManifest::load(&path).unwrap_or_default()
}

/// Outcome of one `run()` invocation, enough for the CLI to print a report.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub evaluated: usize,
    pub blocked: usize,
    pub stopped_early: bool,
    pub results_path: PathBuf,
}

/// Run every ready `(agent, spec)` pair from `config`'s dataset, persisting
/// results incrementally to `<harness_root>/results.json`.
///
/// `requested_agents`, if non-empty, restricts the roster to the named
/// entries (spec.md §6 `--agents`); `test_only` is threaded straight into
/// [`EvaluationInputs`] for every pair.
pub fn run(
    config: HarnessConfig,
    requested_agents: &[String],
    test_only: bool,
) -> Result<RunSummary, SchedulerError> {
    let specs = crate::dataset::load_dataset(&config.dataset)?;
    let agents = select_agents(&config.agents, requested_agents)?;

    let results_path = results_path(&config);
    let prior_results = load_results(&results_path)?;
    let cached = cached_keys(&prior_results);

    let cleared = clear_stale_locks(&config.harness_root)?;
    if cleared > 0 {
        tracing::info!(cleared, "cleared stale repo locks from a prior run");
    }

    let schedule = plan::plan(&SchedulingInput {
        specs: &specs,
        agents: &agents,
        cached: &cached,
        max_specs_per_repo: config.concurrency.max_specs_per_repo,
        max_eval_workers: config.concurrency.max_eval_workers,
    });

    for blocked in &schedule.blocked {
        tracing::debug!(
            agent = %blocked.agent_name,
            instance_id = %blocked.instance_id,
            reason = ?blocked.reason,
            "pair not scheduled this run"
        );
    }

    if schedule.ready.is_empty() {
        write_results_atomically(&results_path, &prior_results)?;
        return Ok(RunSummary {
            evaluated: 0,
            blocked: schedule.blocked.len(),
            stopped_early: false,
            results_path,
        });
    }

    let mut queue: Vec<WorkItem> = schedule.ready;
    queue.shuffle(&mut rand::rng());

    let specs_by_id: std::collections::HashMap<&str, &Spec> =
        specs.iter().map(|spec| (spec.instance_id.0.as_str(), spec)).collect();
    let agents_by_name: std::collections::HashMap<&str, &AgentConfig> =
        agents.iter().map(|agent| (agent.name.as_str(), agent)).collect();

    let persistence = PersistenceHandle::spawn(results_path.clone(), prior_results);
    let coordinator = CleanupCoordinator::new();
    coordinator
        .install_signal_handlers()
        .map_err(|source| SchedulerError::FileOperationError {
            path: PathBuf::from("<signal handlers>"),
            source,
        })?;

    let runtime = BollardRuntime::connect().map_err(|err| SchedulerError::ConfigurationError {
        message: err.to_string(),
    })?;
    let manager = EnvironmentManager::new(runtime, config.clone()).map_err(|err| SchedulerError::ConfigurationError {
        message: err.to_string(),
    })?;
    let manifest = load_manifest(&config);
    let (host_uid, host_gid) = evb_env::host_ids();

    let work = Mutex::new(VecDeque::from(queue));
    let evaluated = std::sync::atomic::AtomicUsize::new(0);
    let worker_count = config.concurrency.max_eval_workers.max(1);

    std::thread::scope(|scope| {
        for worker_id in 0..worker_count {
            let work = &work;
            let config = &config;
            let manager = &manager;
            let manifest = &manifest;
            let coordinator = coordinator.clone();
            let sender = persistence.sender();
            let specs_by_id = &specs_by_id;
            let agents_by_name = &agents_by_name;
            let evaluated = &evaluated;

            scope.spawn(move || {
                run_worker(
                    worker_id,
                    work,
                    config,
                    manager,
                    manifest,
                    &coordinator,
                    sender,
                    specs_by_id,
                    agents_by_name,
                    host_uid,
                    host_gid,
                    test_only,
                    evaluated,
                );
            });
        }
    });

    let stopped_early = coordinator.should_stop();
    persistence.finish();

    Ok(RunSummary {
        evaluated: evaluated.load(std::sync::atomic::Ordering::SeqCst),
        blocked: schedule.blocked.len(),
        stopped_early,
        results_path,
    })
}

#[allow(clippy::too_many_arguments)]
fn run_worker(
    worker_id: usize,
    work: &Mutex<VecDeque<WorkItem>>,
    config: &HarnessConfig,
    manager: &EnvironmentManager<BollardRuntime>,
    manifest: &RuntimeVersionManifest,
    coordinator: &CleanupCoordinator,
    sender: Sender<EvaluationResult>,
    specs_by_id: &std::collections::HashMap<&str, &Spec>,
    agents_by_name: &std::collections::HashMap<&str, &AgentConfig>,
    host_uid: u32,
    host_gid: u32,
    test_only: bool,
    evaluated: &std::sync::atomic::AtomicUsize,
) {
    loop {
        if coordinator.should_stop() {
            tracing::info!(worker_id, "stopping early on shutdown signal");
            return;
        }

        let item = {
            let mut queue = work.lock().unwrap();
            queue.pop_front()
        };
        let Some(item) = item else {
            return;
        };

        let Some(spec) = specs_by_id.get(item.instance_id.as_str()) else {
            tracing::warn!(instance_id = %item.instance_id, "planned instance_id missing from dataset");
            continue;
        };

        let lock = match RepoLock::acquire(&config.harness_root, spec.repo_name()) {
            Ok(lock) => lock,
            Err(err) => {
                tracing::error!(error = %err, repo = %item.repo, "failed to acquire repo lock");
                continue;
            }
        };

        let acquired = if test_only {
            manager.acquire_prebuilt_container(spec, manifest)
        } else {
            manager.acquire_container(spec, manifest)
        };
        let handle = match acquired {
            Ok(handle) => handle,
            Err(err) => {
                tracing::error!(error = %err, instance_id = %item.instance_id, "failed to acquire container");
                drop(lock);
                continue;
            }
        };
        coordinator.register(handle.clone());

        let executor = ContainerExecutor::new(handle.container_id.clone());
        let operator = ContainerOperator::default();
        let swap_root = config.harness_root.join("swap");

        for agent_name in &item.agent_names {
            let Some(agent) = agents_by_name.get(agent_name.as_str()) else {
                continue;
            };

            let inputs = EvaluationInputs {
                spec,
                agent,
                config,
                executor: &executor,
                operator: &operator,
                swap_root: &swap_root,
                host_uid,
                host_gid,
                test_only,
            };
            let result = evaluate_pair(&inputs);
            evaluated.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if sender.send(result).is_err() {
                tracing::warn!("persistence channel closed; dropping remaining results");
            }
        }

        coordinator.unregister(&handle.container_id);
        if let Err(err) = manager.cleanup(&handle, !config.container.keep_containers) {
            tracing::warn!(error = %err, container_id = %handle.container_id, "container cleanup failed");
        }
        drop(lock);
    }
}

fn select_agents(roster: &[AgentConfig], requested: &[String]) -> Result<Vec<AgentConfig>, SchedulerError> {
    if requested.is_empty() {
        return Ok(roster.to_vec());
    }

    let mut selected = Vec::with_capacity(requested.len());
    for name in requested {
        match roster.iter().find(|agent| &agent.name == name) {
            Some(agent) => selected.push(agent.clone()),
            None => {
                return Err(SchedulerError::ConfigurationError {
                    message: format!("no agent named '{name}' in the configured roster"),
                })
            }
        }
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use evb_core::AgentVariant;

    fn mk_agent(name: &str) -> AgentConfig {
        AgentConfig {
            name: name.to_string(),
            variant: AgentVariant::ClaudeCode,
            model_override: None,
            extra_args: Vec::new(),
        }
    }

    #[test]
    fn select_agents_returns_full_roster_when_nothing_requested() {
        let roster = vec![mk_agent("claude-main"), mk_agent("gemini-main")];
        let selected = select_agents(&roster, &[]).expect("select");
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn select_agents_filters_down_to_named_entries() {
        let roster = vec![mk_agent("claude-main"), mk_agent("gemini-main")];
        let selected = select_agents(&roster, &["gemini-main".to_string()]).expect("select");
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "gemini-main");
    }

    #[test]
    fn select_agents_rejects_unknown_name() {
        let roster = vec![mk_agent("claude-main")];
        let err = select_agents(&roster, &["unknown-agent".to_string()]).expect_err("must reject");
        assert!(matches!(err, SchedulerError::ConfigurationError { .. }));
    }
}
