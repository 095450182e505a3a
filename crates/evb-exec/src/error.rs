use std::string::FromUtf8Error;

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("invalid exec request: {message}")]
    InvalidRequest { message: String },
    #[error("pty setup failed: {message}")]
    PtySetup { message: String },
    #[error("failed to spawn command ({command}): {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("command execution failed: {message}")]
    Runtime { message: String },
    #[error("command output was not valid UTF-8 ({command}, {stream}): {source}")]
    NonUtf8Output {
        command: String,
        stream: &'static str,
        #[source]
        source: FromUtf8Error,
    },
    #[error("command timed out after {timeout_secs}s: {command}")]
    TestExecutionTimeout { command: String, timeout_secs: u64 },
}
