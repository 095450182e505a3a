//! Locate the test directories of a checked-out repository.

use std::path::Path;

use evb_exec::{CommandExecutor, ExecRequest};

use crate::error::ContainerOperatorError;

const TOP_LEVEL_CANDIDATES: [&str; 6] = ["tests", "test", "Tests", "TESTS", "TEST", "unit_tests"];
const DISCOVERY_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TEST_DIR: &str = "tests";

/// Look for a candidate test directory at the working tree root; if none
/// exists there, recurse excluding `.venv`/`build`. Falls back to `["tests"]`.
pub fn find_test_dirs(
    executor: &dyn CommandExecutor,
    workdir: &Path,
) -> Result<Vec<String>, ContainerOperatorError> {
    let top_level_command = format!("ls -1d {} 2>/dev/null", TOP_LEVEL_CANDIDATES.join(" "));
    let top_level = run_listing(executor, workdir, &top_level_command)?;
    if !top_level.is_empty() {
        return Ok(top_level);
    }

    let recursive_command = format!(
        "find . -type d \\( {} \\) -not -path '*/.venv/*' -not -path '*/build/*'",
        TOP_LEVEL_CANDIDATES
            .iter()
            .map(|name| format!("-iname {name}"))
            .collect::<Vec<_>>()
            .join(" -o ")
    );
    let found = run_listing(executor, workdir, &recursive_command)?
        .into_iter()
        .map(|path| path.strip_prefix("./").unwrap_or(&path).to_string())
        .collect::<Vec<_>>();

    if found.is_empty() {
        Ok(vec![DEFAULT_TEST_DIR.to_string()])
    } else {
        Ok(found)
    }
}

fn run_listing(
    executor: &dyn CommandExecutor,
    workdir: &Path,
    command: &str,
) -> Result<Vec<String>, ContainerOperatorError> {
    let request = ExecRequest::new(command, workdir.to_path_buf(), DISCOVERY_TIMEOUT_SECS);
    let outcome = executor
        .execute(&request)
        .map_err(|source| ContainerOperatorError::Exec {
            command: command.to_string(),
            source,
        })?;

    Ok(outcome
        .output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
