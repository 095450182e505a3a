//! Ties the git runner, patch engine, and test runner together into the
//! clone/checkout/apply/test operations the scheduler drives per task.

use std::path::Path;

use evb_core::DiffPayload;
use evb_exec::{CommandExecutor, ExecOutcome, ExecRequest};
use evb_patch::{apply as apply_patches_impl, filter_patches, parse as parse_diff};

use crate::discover::find_test_dirs;
use crate::error::ContainerOperatorError;
use crate::git::GitRunner;
use crate::run_tests::{run_tests as run_tests_impl, TestRunOutcome};

const CHECKOUT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Default)]
pub struct ContainerOperator {
    pub git: GitRunner,
}

impl ContainerOperator {
    pub fn new(git: GitRunner) -> Self {
        Self { git }
    }

    pub fn clone_repo(
        &self,
        executor: &dyn CommandExecutor,
        source_dir: &Path,
        source: &str,
        dest: &str,
    ) -> Result<(), ContainerOperatorError> {
        self.git.run(executor, source_dir, &["clone", source, dest])?;
        Ok(())
    }

    /// Idempotent `Clone()` per spec.md §4.4: no-op if `<source_dir>/<dest>`
    /// already exists, otherwise `git clone https://github.com/<repo>.git <dest>`.
    pub fn ensure_cloned(
        &self,
        executor: &dyn CommandExecutor,
        source_dir: &Path,
        repo: &str,
        dest: &str,
    ) -> Result<(), ContainerOperatorError> {
        let check = run_shell(
            executor,
            source_dir,
            &format!("test -d {dest}/.git && echo present || echo absent"),
        )?;
        if check.output.trim().ends_with("present") {
            return Ok(());
        }
        self.clone_repo(executor, source_dir, &format!("https://github.com/{repo}.git"), dest)
    }

    /// Read a file out of the working tree (e.g. the agent-captured
    /// `patch.diff`) so its contents can be parsed on the harness side.
    pub fn read_file(
        &self,
        executor: &dyn CommandExecutor,
        workdir: &Path,
        relative_path: &str,
    ) -> Result<String, ContainerOperatorError> {
        let outcome = run_shell(executor, workdir, &format!("cat {relative_path} 2>/dev/null"))?;
        Ok(outcome.output)
    }

    /// Forcibly switch the working tree to `commit`, per spec.md §4.4's
    /// `Checkout(commit, excludeFiles, useDocker)`: `git reset --hard`, then
    /// `git clean -fd` with one `-e <file>` per excluded path, then
    /// `git checkout <commit>`. Each step runs through [`GitRunner::run`],
    /// which fails the whole operation on a nonzero exit.
    pub fn checkout(
        &self,
        executor: &dyn CommandExecutor,
        workdir: &Path,
        commit: &str,
        exclude_files: &[&str],
    ) -> Result<(), ContainerOperatorError> {
        self.git.run(executor, workdir, &["reset", "--hard"])?;

        let mut clean_args = vec!["clean", "-fd"];
        for file in exclude_files {
            clean_args.push("-e");
            clean_args.push(file);
        }
        self.git.run(executor, workdir, &clean_args)?;

        self.git.run(executor, workdir, &["checkout", commit])?;

        Ok(())
    }

    /// Parse (if needed) and apply a diff payload, keeping only test or
    /// source files per the caller's filter.
    pub fn apply_patches(
        &self,
        executor: &dyn CommandExecutor,
        workdir: &Path,
        diff: &DiffPayload,
        include_tests: bool,
        include_sources: bool,
    ) -> Result<Vec<String>, ContainerOperatorError> {
        let records = match diff {
            DiffPayload::Unified(raw) => parse_diff(raw).unwrap_or_default(),
            DiffPayload::Records(records) => records.clone(),
        };
        let filtered = filter_patches(records, include_tests, include_sources);
        let workdir_str = workdir.to_string_lossy().into_owned();
        Ok(apply_patches_impl(&filtered, executor, &workdir_str))
    }

    pub fn find_test_dirs(
        &self,
        executor: &dyn CommandExecutor,
        workdir: &Path,
    ) -> Result<Vec<String>, ContainerOperatorError> {
        find_test_dirs(executor, workdir)
    }

    pub fn run_tests(
        &self,
        executor: &dyn CommandExecutor,
        workdir: &Path,
        selectors: Option<&[String]>,
        timeout_secs: u64,
        use_xdist: bool,
    ) -> Result<TestRunOutcome, ContainerOperatorError> {
        run_tests_impl(executor, workdir, selectors, timeout_secs, use_xdist)
    }
}

fn run_shell(
    executor: &dyn CommandExecutor,
    workdir: &Path,
    command: &str,
) -> Result<ExecOutcome, ContainerOperatorError> {
    let request = ExecRequest::new(command, workdir.to_path_buf(), CHECKOUT_TIMEOUT_SECS);
    executor
        .execute(&request)
        .map_err(|source| ContainerOperatorError::Exec {
            command: command.to_string(),
            source,
        })
}
