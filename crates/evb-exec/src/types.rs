use std::path::PathBuf;

/// One command invocation, uniform across local and in-container transports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    pub command: String,
    pub workdir: PathBuf,
    /// Forward live output while still accumulating the full buffer.
    pub stream: bool,
    /// Allocate a pseudo-terminal for the child process.
    pub tty: bool,
    pub timeout_secs: u64,
    pub env: Vec<(String, String)>,
}

impl ExecRequest {
    pub fn new(command: impl Into<String>, workdir: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            command: command.into(),
            workdir: workdir.into(),
            stream: false,
            tty: false,
            timeout_secs,
            env: Vec::new(),
        }
    }
}

/// Combined stdout+stderr plus exit status. The caller parses `output` itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutcome {
    pub exit_code: Option<i32>,
    pub output: String,
}

impl ExecOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Environment variables injected into every exec, per spec.md §4.3.
pub fn base_env(columns: u16, lines: u16) -> Vec<(String, String)> {
    vec![
        ("COLUMNS".to_string(), columns.to_string()),
        ("LINES".to_string(), lines.to_string()),
        ("HF_HUB_OFFLINE".to_string(), "1".to_string()),
    ]
}

/// Wrap a command so an inner timeout kills it even if the host-side exec
/// handle never returns (spec.md §4.3, container executor).
pub fn wrap_with_inner_timeout(command: &str, timeout_secs: u64) -> String {
    format!("timeout -s TERM -k 10s {timeout_secs}s {command}")
}

/// Map a raw exit code to whether it represents the inner `timeout` utility
/// having killed the process (124 = TERM, 137 = KILL/128+9).
pub fn is_timeout_exit_code(exit_code: i32) -> bool {
    exit_code == 124 || exit_code == 137
}
