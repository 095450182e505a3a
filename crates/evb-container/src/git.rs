//! A `git`-command runner dispatched through a bound `CommandExecutor`,
//! so the same operator code drives a local checkout in tests and a
//! container exec transport in production.

use std::path::{Path, PathBuf};

use evb_exec::{CommandExecutor, ExecRequest};

use crate::error::ContainerOperatorError;

const GIT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitOutput {
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRunner {
    pub binary: String,
}

impl Default for GitRunner {
    fn default() -> Self {
        Self {
            binary: "git".to_string(),
        }
    }
}

impl GitRunner {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn run(
        &self,
        executor: &dyn CommandExecutor,
        workdir: &Path,
        args: &[&str],
    ) -> Result<GitOutput, ContainerOperatorError> {
        let rendered = render_command(&self.binary, args);
        let request = ExecRequest::new(rendered.clone(), to_pathbuf(workdir), GIT_TIMEOUT_SECS);

        let outcome =
            executor
                .execute(&request)
                .map_err(|source| ContainerOperatorError::Exec {
                    command: rendered.clone(),
                    source,
                })?;

        if !outcome.success() {
            return Err(ContainerOperatorError::CommandFailed {
                command: rendered,
                exit_code: outcome.exit_code,
                output: outcome.output,
            });
        }

        Ok(GitOutput {
            output: outcome.output,
        })
    }
}

fn to_pathbuf(path: &Path) -> PathBuf {
    path.to_path_buf()
}

fn render_command(binary: &str, args: &[&str]) -> String {
    let mut rendered = binary.to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(arg);
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use evb_exec::{ExecOutcome, ExecutorError};
    use std::cell::RefCell;

    struct FakeExecutor {
        outcome: RefCell<Option<Result<ExecOutcome, ()>>>,
        seen_command: RefCell<Option<String>>,
    }

    impl CommandExecutor for FakeExecutor {
        fn execute(&self, request: &ExecRequest) -> Result<ExecOutcome, ExecutorError> {
            *self.seen_command.borrow_mut() = Some(request.command.clone());
            match self.outcome.borrow_mut().take().unwrap() {
                Ok(outcome) => Ok(outcome),
                Err(()) => Err(ExecutorError::Runtime {
                    message: "boom".to_string(),
                }),
            }
        }
    }

    #[test]
    fn run_renders_args_into_a_single_command_string() {
        let executor = FakeExecutor {
            outcome: RefCell::new(Some(Ok(ExecOutcome {
                exit_code: Some(0),
                output: "ok".to_string(),
            }))),
            seen_command: RefCell::new(None),
        };
        let git = GitRunner::default();
        git.run(&executor, Path::new("/repo"), &["checkout", "abc123"])
            .expect("run");
        assert_eq!(
            executor.seen_command.borrow().as_deref(),
            Some("git checkout abc123")
        );
    }

    #[test]
    fn run_surfaces_nonzero_exit_as_command_failed() {
        let executor = FakeExecutor {
            outcome: RefCell::new(Some(Ok(ExecOutcome {
                exit_code: Some(1),
                output: "fatal: bad revision".to_string(),
            }))),
            seen_command: RefCell::new(None),
        };
        let git = GitRunner::default();
        let err = git
            .run(&executor, Path::new("/repo"), &["checkout", "nope"])
            .expect_err("must fail");
        assert!(matches!(err, ContainerOperatorError::CommandFailed { .. }));
    }
}
