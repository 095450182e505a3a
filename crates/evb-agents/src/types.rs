use serde::{Deserialize, Serialize};

/// What the scheduler hands a driver for one `Run()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub problem_statement: String,
    pub instance_id: String,
    pub repo_name: String,
    pub timeout_secs: u64,
    pub model_override: Option<String>,
    pub extra_args: Vec<String>,
}

/// Step 5 of the `Run()` contract: exit-code-derived success plus captured output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub success: bool,
    pub output: String,
}

/// Token usage as reported by the agent CLI. Every field is optional because
/// `ParseTokens` must never fail — an unparseable transcript yields all-null.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTokens {
    pub input: Option<u64>,
    pub output: Option<u64>,
    pub total: Option<u64>,
}

impl From<ParsedTokens> for evb_core::TokenUsage {
    fn from(tokens: ParsedTokens) -> Self {
        Self {
            input_tokens: tokens.input,
            output_tokens: tokens.output,
            total_tokens: tokens.total,
        }
    }
}

/// Pre-computed data an oracle-style driver could hand back instead of doing
/// its own work. No shipped variant currently produces one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub payload: String,
}
