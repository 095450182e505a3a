use evb_exec::ExecutorError;

#[derive(Debug, thiserror::Error)]
pub enum ContainerOperatorError {
    #[error("git command failed ({command}): {source}")]
    Exec {
        command: String,
        #[source]
        source: ExecutorError,
    },
    #[error("git command returned non-zero exit ({command}), exit_code={exit_code:?}: {output}")]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        output: String,
    },
    #[error("test run failed ({command}): {source}")]
    TestExec {
        command: String,
        #[source]
        source: ExecutorError,
    },
}
