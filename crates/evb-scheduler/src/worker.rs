//! Per-`(agent, spec)` evaluation: the full checkout → run agent → reset →
//! apply → test cycle described in spec.md §4.7 step 7.d, expressed as one
//! pure function over injected collaborators so it can be driven by the
//! worker pool or exercised directly in tests with fake executors/drivers.

use std::path::{Path, PathBuf};

use evb_agents::{default_driver_for, RunRequest};
use evb_container::ContainerOperator;
use evb_core::{AgentConfig, DiffPayload, EvaluationResult, HarnessConfig, Spec};
use evb_exec::CommandExecutor;
use evb_testparse::TestResultParser;

const MAX_ERROR_OUTPUT_CHARS: usize = 4000;

/// Name of the file the agent driver contract writes its captured diff to,
/// inside the repository's working directory (spec.md §6, Container surface).
const PATCH_DIFF_FILE: &str = "patch.diff";

fn repo_workdir(swap_root: &Path, repo_name: &str) -> PathBuf {
    swap_root.join(repo_name)
}

fn truncate(output: &str) -> String {
    if output.len() <= MAX_ERROR_OUTPUT_CHARS {
        output.to_string()
    } else {
        format!("{}… ({} bytes total)", &output[..MAX_ERROR_OUTPUT_CHARS], output.len())
    }
}

/// Run expected F2P or P2P selectors against the working tree and return the
/// subset of `expected` that came back PASSED, per the `Query()` contract
/// (exact node id, else aggregate-by-base-name) rather than the broader
/// passed-set `RunTests` itself returns.
fn run_expected_tests(
    executor: &dyn CommandExecutor,
    operator: &ContainerOperator,
    workdir: &Path,
    expected: &[String],
    timeout_secs: u64,
    use_xdist: bool,
) -> Result<Vec<String>, String> {
    let outcome = operator
        .run_tests(executor, workdir, Some(expected), timeout_secs, use_xdist)
        .map_err(|err| err.to_string())?;

    let parser = TestResultParser::new(&outcome.raw_output);
    let statuses = parser.query_tests(expected);
    Ok(expected
        .iter()
        .filter(|id| statuses.get(*id).copied() == Some(evb_core::TestStatus::Passed))
        .cloned()
        .collect())
}

/// Reset to `base_commit` preserving `patch.diff`, apply the agent's patch
/// (source files only) plus the dataset's test patch (both kinds), per the
/// "two call sites share one method" decision recorded in DESIGN.md.
fn reset_and_apply(
    executor: &dyn CommandExecutor,
    operator: &ContainerOperator,
    workdir: &Path,
    base_commit: &str,
    agent_patch: &DiffPayload,
    test_patch: &DiffPayload,
    preserve: &[&str],
) -> Result<(), String> {
    operator
        .checkout(executor, workdir, base_commit, preserve)
        .map_err(|err| err.to_string())?;

    if !agent_patch.is_empty() {
        operator
            .apply_patches(executor, workdir, agent_patch, false, true)
            .map_err(|err| err.to_string())?;
    }

    operator
        .apply_patches(executor, workdir, test_patch, true, true)
        .map_err(|err| err.to_string())?;

    Ok(())
}

/// Best-effort ownership fix for `/logs` so the host can read logs an agent
/// wrote as the container's internal user (spec.md §4.7 step 7.d). Failures
/// are logged, not propagated: an unreadable log is not an evaluation failure.
fn fix_log_ownership(executor: &dyn CommandExecutor, host_uid: u32, host_gid: u32) {
    use evb_exec::ExecRequest;
    let request = ExecRequest::new(
        format!("chown -R {host_uid}:{host_gid} /logs 2>/dev/null || true"),
        PathBuf::from("/workdir"),
        30,
    );
    if let Err(err) = executor.execute(&request) {
        tracing::warn!(error = %err, "failed to fix /logs ownership");
    }
}

pub struct EvaluationInputs<'a> {
    pub spec: &'a Spec,
    pub agent: &'a AgentConfig,
    pub config: &'a HarnessConfig,
    pub executor: &'a dyn CommandExecutor,
    pub operator: &'a ContainerOperator,
    pub swap_root: &'a Path,
    pub host_uid: u32,
    pub host_gid: u32,
    /// Skip installing/running the agent and apply the dataset's own gold
    /// `patch` instead, to sanity-check F2P/P2P selectors without spending an
    /// agent run (spec.md §6 `--test-only`).
    pub test_only: bool,
}

/// Drive one full `(agent, spec)` evaluation to a terminal `EvaluationResult`.
/// Every internal failure is recovered locally (spec.md §7 propagation
/// policy): the scheduler never sees an `Err` from this function.
pub fn evaluate_pair(inputs: &EvaluationInputs<'_>) -> EvaluationResult {
    let EvaluationInputs {
        spec,
        agent,
        config,
        executor,
        operator,
        swap_root,
        host_uid,
        host_gid,
        test_only,
    } = *inputs;

    let workdir = repo_workdir(swap_root, spec.repo_name());
    let driver = default_driver_for(agent.variant);

    if let Err(err) = operator.ensure_cloned(executor, swap_root, &spec.repo.0, spec.repo_name()) {
        return EvaluationResult::failed(agent.name.clone(), spec.instance_id.clone(), err.to_string());
    }

    if let Err(err) = operator.checkout(executor, &workdir, &spec.base_commit, &[]) {
        return EvaluationResult::failed(agent.name.clone(), spec.instance_id.clone(), err.to_string());
    }

    let (agent_patch, tokens, preserve): (DiffPayload, evb_agents::ParsedTokens, &[&str]) = if test_only {
        (spec.patch.clone(), evb_agents::ParsedTokens::default(), &[])
    } else {
        if let Err(err) = driver.install(executor, &workdir) {
            return EvaluationResult::failed(agent.name.clone(), spec.instance_id.clone(), err.to_string());
        }

        let run_request = RunRequest {
            problem_statement: spec.problem_statement.clone(),
            instance_id: spec.instance_id.0.clone(),
            repo_name: spec.repo_name().to_string(),
            timeout_secs: config.container.agent_timeout_secs,
            model_override: agent.model_override.clone(),
            extra_args: agent.extra_args.clone(),
        };

        let run_outcome = match driver.run(executor, &workdir, &run_request) {
            Ok(outcome) => outcome,
            Err(err) => {
                return EvaluationResult::failed(agent.name.clone(), spec.instance_id.clone(), err.to_string())
            }
        };

        let tokens = driver.parse_tokens(&run_outcome.output);

        if !run_outcome.success {
            let mut result = EvaluationResult::failed(
                agent.name.clone(),
                spec.instance_id.clone(),
                format!("agent exited unsuccessfully: {}", truncate(&run_outcome.output)),
            );
            result.tokens = tokens.into();
            return result;
        }

        fix_log_ownership(executor, host_uid, host_gid);

        let agent_patch = match operator.read_file(executor, &workdir, PATCH_DIFF_FILE) {
            Ok(content) => content,
            Err(err) => {
                let mut result =
                    EvaluationResult::failed(agent.name.clone(), spec.instance_id.clone(), err.to_string());
                result.tokens = tokens.into();
                return result;
            }
        };

        (DiffPayload::Unified(agent_patch), tokens, &[PATCH_DIFF_FILE])
    };

    if let Err(message) = reset_and_apply(
        executor,
        operator,
        &workdir,
        &spec.base_commit,
        &agent_patch,
        &spec.test_patch,
        preserve,
    ) {
        let mut result = EvaluationResult::failed(agent.name.clone(), spec.instance_id.clone(), message);
        result.tokens = tokens.into();
        return result;
    }

    let passed_f2p_tests = match run_expected_tests(
        executor,
        operator,
        &workdir,
        &spec.fail_to_pass.0,
        config.container.test_timeout_secs,
        config.container.use_xdist,
    ) {
        Ok(passed) => passed,
        Err(message) => {
            let mut result = EvaluationResult::failed(agent.name.clone(), spec.instance_id.clone(), message);
            result.tokens = tokens.into();
            return result;
        }
    };

    if let Err(message) = reset_and_apply(
        executor,
        operator,
        &workdir,
        &spec.base_commit,
        &agent_patch,
        &spec.test_patch,
        preserve,
    ) {
        let mut result = EvaluationResult::failed(agent.name.clone(), spec.instance_id.clone(), message);
        result.tokens = tokens.into();
        return result;
    }

    let passed_p2p_tests = match run_expected_tests(
        executor,
        operator,
        &workdir,
        &spec.pass_to_pass.0,
        config.container.test_timeout_secs,
        config.container.use_xdist,
    ) {
        Ok(passed) => passed,
        Err(message) => {
            let mut result = EvaluationResult::failed(agent.name.clone(), spec.instance_id.clone(), message);
            result.tokens = tokens.into();
            return result;
        }
    };

    let success_f2p = passed_f2p_tests.len() == spec.fail_to_pass.0.len();
    let success_p2p = passed_p2p_tests.len() == spec.pass_to_pass.0.len();

    EvaluationResult {
        agent_name: agent.name.clone(),
        instance_id: spec.instance_id.clone(),
        success_f2p,
        success_p2p,
        success: success_f2p && success_p2p,
        passed_f2p_tests,
        passed_p2p_tests,
        expected_f2p_tests: spec.fail_to_pass.0.clone(),
        expected_p2p_tests: spec.pass_to_pass.0.clone(),
        tokens: tokens.into(),
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evb_core::{AgentVariant, InstanceId, RepoId, TestIdList};
    use evb_exec::{ExecOutcome, ExecRequest, ExecutorError};
    use std::cell::RefCell;

    /// Matches each exec call against a command substring instead of a fixed
    /// call order, since the exact number of shell invocations (patch
    /// application in particular) is an implementation detail of collaborator
    /// crates this function drives, not something the test should pin down.
    struct PatternExecutor {
        rules: Vec<(&'static str, &'static str)>,
        commands: RefCell<Vec<String>>,
    }

    impl PatternExecutor {
        fn new(rules: Vec<(&'static str, &'static str)>) -> Self {
            Self {
                rules,
                commands: RefCell::new(Vec::new()),
            }
        }
    }

    impl CommandExecutor for PatternExecutor {
        fn execute(&self, request: &ExecRequest) -> Result<ExecOutcome, ExecutorError> {
            self.commands.borrow_mut().push(request.command.clone());
            let output = self
                .rules
                .iter()
                .find(|(pattern, _)| request.command.contains(pattern))
                .map(|(_, output)| output.to_string())
                .unwrap_or_default();
            Ok(ExecOutcome {
                exit_code: Some(0),
                output,
            })
        }
    }

    fn mk_spec() -> Spec {
        Spec {
            instance_id: InstanceId("demo-1".to_string()),
            repo: RepoId("astropy/astropy".to_string()),
            base_commit: "deadbeef".to_string(),
            problem_statement: "fix the bug".to_string(),
            patch: DiffPayload::Unified(String::new()),
            test_patch: DiffPayload::Unified(
                "diff --git a/tests/test_x.py b/tests/test_x.py\nnew file mode 100644\nindex 0000000..1111111\n--- /dev/null\n+++ b/tests/test_x.py\n@@ -0,0 +1,2 @@\n+def test_a(): ...\n+def test_b(): ...\n"
                    .to_string(),
            ),
            fail_to_pass: TestIdList::parse("tests/test_x.py::test_a"),
            pass_to_pass: TestIdList::parse("tests/test_x.py::test_b"),
            created_at: chrono::DateTime::from_timestamp(0, 0).unwrap(),
            number: 1,
        }
    }

    fn mk_agent() -> AgentConfig {
        AgentConfig {
            name: "claude-main".to_string(),
            variant: AgentVariant::ClaudeCode,
            model_override: None,
            extra_args: Vec::new(),
        }
    }

    #[test]
    fn happy_path_reports_both_phases_succeeding() {
        let executor = PatternExecutor::new(vec![
            ("test -d astropy/.git", "present\n"),
            ("cat patch.diff", "diff --git a/src/x.py b/src/x.py\n@@ -1 +1 @@\n-a\n+b\n"),
            ("test_x.py::test_a", "short test summary info\nPASSED tests/test_x.py::test_a\n"),
            ("test_x.py::test_b", "short test summary info\nPASSED tests/test_x.py::test_b\n"),
        ]);
        let spec = mk_spec();
        let agent = mk_agent();
        let config = HarnessConfig::default();
        let operator = ContainerOperator::default();
        let inputs = EvaluationInputs {
            spec: &spec,
            agent: &agent,
            config: &config,
            executor: &executor,
            operator: &operator,
            swap_root: Path::new("/workdir/swap"),
            host_uid: 1000,
            host_gid: 1000,
            test_only: false,
        };

        let result = evaluate_pair(&inputs);
        assert!(result.success_f2p);
        assert!(result.success_p2p);
        assert!(result.success);
        assert_eq!(result.passed_f2p_tests, vec!["tests/test_x.py::test_a".to_string()]);
        assert_eq!(result.passed_p2p_tests, vec!["tests/test_x.py::test_b".to_string()]);
        assert!(result.error.is_none());
    }

    #[test]
    fn agent_failure_skips_test_phases_and_records_error() {
        struct FailingExecutor(PatternExecutor);
        impl CommandExecutor for FailingExecutor {
            fn execute(&self, request: &ExecRequest) -> Result<ExecOutcome, ExecutorError> {
                if request.command.contains("claude --dangerously-skip-permissions") {
                    self.0.commands.borrow_mut().push(request.command.clone());
                    return Ok(ExecOutcome {
                        exit_code: Some(1),
                        output: "boom: agent crashed".to_string(),
                    });
                }
                self.0.execute(request)
            }
        }

        let executor = FailingExecutor(PatternExecutor::new(vec![("test -d astropy/.git", "present\n")]));
        let spec = mk_spec();
        let agent = mk_agent();
        let config = HarnessConfig::default();
        let operator = ContainerOperator::default();
        let inputs = EvaluationInputs {
            spec: &spec,
            agent: &agent,
            config: &config,
            executor: &executor,
            operator: &operator,
            swap_root: Path::new("/workdir/swap"),
            host_uid: 1000,
            host_gid: 1000,
            test_only: false,
        };

        let result = evaluate_pair(&inputs);
        assert!(!result.success);
        assert!(!result.success_f2p);
        assert!(!result.success_p2p);
        assert!(result.passed_f2p_tests.is_empty());
        assert!(result.error.as_deref().unwrap_or_default().contains("agent crashed"));
    }

    #[test]
    fn partial_pass_reports_only_the_tests_that_actually_passed() {
        let executor = PatternExecutor::new(vec![
            ("test -d astropy/.git", "present\n"),
            ("cat patch.diff", "diff --git a/src/x.py b/src/x.py\n@@ -1 +1 @@\n-a\n+b\n"),
            ("test_x.py::test_a", "short test summary info\nPASSED tests/test_x.py::test_a\n"),
        ]);
        let mut spec = mk_spec();
        spec.fail_to_pass = TestIdList::parse("tests/test_x.py::test_a,tests/test_x.py::test_other");
        let agent = mk_agent();
        let config = HarnessConfig::default();
        let operator = ContainerOperator::default();
        let inputs = EvaluationInputs {
            spec: &spec,
            agent: &agent,
            config: &config,
            executor: &executor,
            operator: &operator,
            swap_root: Path::new("/workdir/swap"),
            host_uid: 1000,
            host_gid: 1000,
            test_only: false,
        };

        let result = evaluate_pair(&inputs);
        assert!(!result.success_f2p);
        assert!(!result.success);
        assert_eq!(result.passed_f2p_tests, vec!["tests/test_x.py::test_a".to_string()]);
    }

    #[test]
    fn test_only_mode_applies_the_gold_patch_without_touching_the_agent() {
        struct NoAgentExecutor(PatternExecutor);
        impl CommandExecutor for NoAgentExecutor {
            fn execute(&self, request: &ExecRequest) -> Result<ExecOutcome, ExecutorError> {
                assert!(
                    !request.command.contains("claude")
                        && !request.command.contains("install"),
                    "test-only mode must never invoke the agent: {}",
                    request.command
                );
                self.0.execute(request)
            }
        }

        let executor = NoAgentExecutor(PatternExecutor::new(vec![
            ("test -d astropy/.git", "present\n"),
            ("test_x.py::test_a", "short test summary info\nPASSED tests/test_x.py::test_a\n"),
            ("test_x.py::test_b", "short test summary info\nPASSED tests/test_x.py::test_b\n"),
        ]));
        let mut spec = mk_spec();
        spec.patch = DiffPayload::Unified(
            "diff --git a/src/x.py b/src/x.py\nindex 1111111..2222222 100644\n--- a/src/x.py\n+++ b/src/x.py\n@@ -1 +1 @@\n-a\n+b\n"
                .to_string(),
        );
        let agent = mk_agent();
        let config = HarnessConfig::default();
        let operator = ContainerOperator::default();
        let inputs = EvaluationInputs {
            spec: &spec,
            agent: &agent,
            config: &config,
            executor: &executor,
            operator: &operator,
            swap_root: Path::new("/workdir/swap"),
            host_uid: 1000,
            host_gid: 1000,
            test_only: true,
        };

        let result = evaluate_pair(&inputs);
        assert!(result.success_f2p);
        assert!(result.success_p2p);
        assert!(result.success);
        assert!(result.tokens.is_empty());
    }

    #[test]
    fn truncate_leaves_short_output_untouched() {
        assert_eq!(truncate("short"), "short");
    }

    #[test]
    fn truncate_shortens_long_output_with_a_suffix() {
        let long = "x".repeat(MAX_ERROR_OUTPUT_CHARS + 10);
        let truncated = truncate(&long);
        assert!(truncated.len() < long.len());
        assert!(truncated.contains("bytes total"));
    }
}
