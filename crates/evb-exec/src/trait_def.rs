use crate::error::ExecutorError;
use crate::types::{ExecOutcome, ExecRequest};

/// Uniform command execution, local or in-container (spec.md §4.3).
pub trait CommandExecutor {
    fn execute(&self, request: &ExecRequest) -> Result<ExecOutcome, ExecutorError>;
}
