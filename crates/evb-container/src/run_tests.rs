//! Test invocation with command-length batching and result parsing.

use std::collections::HashSet;
use std::path::Path;

use evb_core::TestStatus;
use evb_exec::{CommandExecutor, ExecRequest};
use evb_testparse::TestResultParser;

use crate::discover::find_test_dirs;
use crate::error::ContainerOperatorError;

const MAX_COMMAND_CHARS: usize = 100_000;
const MAX_BATCH_ITEMS: usize = 250;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRunOutcome {
    pub passed: HashSet<String>,
    pub raw_output: String,
}

/// Run the discovered test directories, or the given selectors if supplied,
/// batching the invocation when the selector list would overflow a single
/// command line.
pub fn run_tests(
    executor: &dyn CommandExecutor,
    workdir: &Path,
    selectors: Option<&[String]>,
    timeout_secs: u64,
    use_xdist: bool,
) -> Result<TestRunOutcome, ContainerOperatorError> {
    let targets: Vec<String> = match selectors {
        Some(list) => list.to_vec(),
        None => find_test_dirs(executor, workdir)?,
    };

    let mut passed = HashSet::new();
    let mut raw_output = String::new();

    for batch in batch_selectors(&targets) {
        let command = build_pytest_command(&batch, use_xdist);
        let request = ExecRequest::new(command.clone(), workdir.to_path_buf(), timeout_secs);
        let outcome =
            executor
                .execute(&request)
                .map_err(|source| ContainerOperatorError::TestExec {
                    command: command.clone(),
                    source,
                })?;

        let parser = TestResultParser::new(&outcome.output);
        passed.extend(parser.filter_tests_by_status(&[TestStatus::Passed]));
        raw_output.push_str(&outcome.output);
        raw_output.push('\n');
    }

    Ok(TestRunOutcome { passed, raw_output })
}

fn batch_selectors(targets: &[String]) -> Vec<Vec<String>> {
    let total_chars: usize = targets.iter().map(|t| t.len() + 1).sum();
    if total_chars <= MAX_COMMAND_CHARS {
        vec![targets.to_vec()]
    } else {
        targets
            .chunks(MAX_BATCH_ITEMS)
            .map(|chunk| chunk.to_vec())
            .collect()
    }
}

fn build_pytest_command(targets: &[String], use_xdist: bool) -> String {
    let parallel_flags = if use_xdist {
        "--timeout-method=thread -n auto"
    } else {
        "--timeout-method=signal"
    };

    let quoted_targets = targets
        .iter()
        .map(|t| format!("'{t}'"))
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        "python -m pytest -q -rA --tb=no -p no:pretty --timeout=5 --continue-on-collection-errors {parallel_flags} {quoted_targets}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use evb_exec::{ExecOutcome, ExecutorError};
    use std::cell::RefCell;

    struct RecordingExecutor {
        commands: RefCell<Vec<String>>,
        outputs: RefCell<Vec<String>>,
    }

    impl CommandExecutor for RecordingExecutor {
        fn execute(&self, request: &ExecRequest) -> Result<ExecOutcome, ExecutorError> {
            self.commands.borrow_mut().push(request.command.clone());
            Ok(ExecOutcome {
                exit_code: Some(0),
                output: self.outputs.borrow_mut().remove(0),
            })
        }
    }

    #[test]
    fn single_batch_when_under_command_length_threshold() {
        let executor = RecordingExecutor {
            commands: RefCell::new(Vec::new()),
            outputs: RefCell::new(vec![
                "short test summary info\nPASSED a.py::test_one\n".to_string(),
            ]),
        };
        let selectors = vec!["a.py::test_one".to_string()];
        let outcome = run_tests(&executor, Path::new("/repo"), Some(&selectors), 30, false)
            .expect("run_tests");
        assert_eq!(executor.commands.borrow().len(), 1);
        assert!(outcome.passed.contains("a.py::test_one"));
    }

    #[test]
    fn batches_selectors_exceeding_the_command_length_guard() {
        let padding = "x".repeat(300);
        let selectors: Vec<String> = (0..300)
            .map(|i| format!("pkg/test_mod_{padding}.py::test_case_number_{i:04}"))
            .collect();
        let total_chars: usize = selectors.iter().map(|s| s.len() + 1).sum();
        assert!(total_chars > MAX_COMMAND_CHARS);
        assert!(selectors.len() > MAX_BATCH_ITEMS);

        let first_selector = selectors[0].clone();
        let last_selector = selectors[selectors.len() - 1].clone();
        let executor = RecordingExecutor {
            commands: RefCell::new(Vec::new()),
            outputs: RefCell::new(vec![
                format!("short test summary info\nPASSED {first_selector}\n"),
                format!("short test summary info\nPASSED {last_selector}\n"),
            ]),
        };
        let outcome = run_tests(&executor, Path::new("/repo"), Some(&selectors), 30, false)
            .expect("run_tests");
        assert!(executor.commands.borrow().len() >= 2);
        assert!(outcome.passed.contains(&first_selector));
        assert!(outcome.passed.contains(&last_selector));
    }

    #[test]
    fn xdist_flag_switches_timeout_method_and_adds_worker_count() {
        let command = build_pytest_command(&["a.py".to_string()], true);
        assert!(command.contains("--timeout-method=thread -n auto"));
        assert!(!command.contains("--timeout-method=signal"));
    }
}
