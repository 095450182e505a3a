use std::path::Path;

use evb_core::config::AgentVariant;
use evb_exec::{CommandExecutor, ExecRequest};

use crate::error::AgentError;
use crate::tokens::{
    parse_claude_code_tokens, parse_gemini_cli_tokens, parse_openhands_tokens, parse_trae_tokens,
};
use crate::types::{ParsedTokens, Resource, RunOutcome, RunRequest};

const INSTALL_TIMEOUT_SECS: u64 = 600;

/// Polymorphic agent-CLI surface the scheduler drives: one instance per
/// roster entry in `HarnessConfig::agents`.
pub trait AgentDriver: Send + Sync {
    fn variant(&self) -> AgentVariant;

    /// Idempotently provision the agent CLI inside `workdir`'s container.
    fn install(&self, executor: &dyn CommandExecutor, workdir: &Path) -> Result<(), AgentError>;

    /// Shell-quote the problem statement, inject credentials, run the CLI
    /// with a TTY and streaming, then capture `git diff > patch.diff`.
    fn run(
        &self,
        executor: &dyn CommandExecutor,
        workdir: &Path,
        request: &RunRequest,
    ) -> Result<RunOutcome, AgentError>;

    /// Never fails: on any parse error, every field is `None`.
    fn parse_tokens(&self, output: &str) -> ParsedTokens;

    /// Pre-computed data for a hypothetical oracle-style variant. No shipped
    /// driver currently produces one.
    fn prepare_resources(&self) -> Option<Vec<Resource>> {
        None
    }
}

fn shell_quote(value: &str) -> String {
    let escaped = value.replace('\'', "'\"'\"'");
    format!("'{escaped}'")
}

fn run_step(
    executor: &dyn CommandExecutor,
    workdir: &Path,
    command: String,
    timeout_secs: u64,
    tty: bool,
    variant: &'static str,
) -> Result<(bool, String), AgentError> {
    let mut req = ExecRequest::new(command, workdir, timeout_secs);
    req.stream = true;
    req.tty = tty;
    let outcome = executor
        .execute(&req)
        .map_err(|source| AgentError::Run { variant, source })?;
    Ok((outcome.success(), outcome.output))
}

/// Shared tail of every variant's `run()`: capture the working tree as
/// `patch.diff`, the contract file the scheduler looks for next.
fn capture_patch(executor: &dyn CommandExecutor, workdir: &Path, variant: &'static str) -> Result<(), AgentError> {
    let (ok, _output) = run_step(executor, workdir, "git diff > patch.diff".to_string(), 60, false, variant)?;
    if !ok {
        tracing::warn!(variant, "failed to capture git diff after agent run");
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct ClaudeCodeDriver;

impl AgentDriver for ClaudeCodeDriver {
    fn variant(&self) -> AgentVariant {
        AgentVariant::ClaudeCode
    }

    fn install(&self, executor: &dyn CommandExecutor, workdir: &Path) -> Result<(), AgentError> {
        let (ok, output) = run_step(
            executor,
            workdir,
            "curl -fsSL https://claude.ai/install.sh | bash".to_string(),
            INSTALL_TIMEOUT_SECS,
            false,
            "claude-code",
        )?;
        if !ok {
            return Err(AgentError::InvalidRequest {
                message: format!("failed to install claude-code: {output}"),
            });
        }
        Ok(())
    }

    fn run(
        &self,
        executor: &dyn CommandExecutor,
        workdir: &Path,
        request: &RunRequest,
    ) -> Result<RunOutcome, AgentError> {
        let mut env_prefix = String::from("ANTHROPIC_API_KEY='' IS_SANDBOX=1 ");
        if let Some(model) = &request.model_override {
            let quoted = shell_quote(model);
            env_prefix.push_str(&format!(
                "ANTHROPIC_MODEL={quoted} ANTHROPIC_DEFAULT_OPUS_MODEL={quoted} \
                 ANTHROPIC_DEFAULT_SONNET_MODEL={quoted} ANTHROPIC_DEFAULT_HAIKU_MODEL={quoted} \
                 CLAUDE_CODE_SUBAGENT_MODEL={quoted} "
            ));
        }
        let command = format!(
            "{env_prefix}$HOME/.local/bin/claude --dangerously-skip-permissions -p {}",
            shell_quote(&request.problem_statement)
        );

        let (success, output) =
            run_step(executor, workdir, command, request.timeout_secs, true, "claude-code")?;
        if success {
            capture_patch(executor, workdir, "claude-code")?;
        }
        Ok(RunOutcome { success, output })
    }

    fn parse_tokens(&self, output: &str) -> ParsedTokens {
        parse_claude_code_tokens(output)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GeminiCliDriver;

impl AgentDriver for GeminiCliDriver {
    fn variant(&self) -> AgentVariant {
        AgentVariant::GeminiCli
    }

    fn install(&self, executor: &dyn CommandExecutor, workdir: &Path) -> Result<(), AgentError> {
        let install_cmd = "bash -c 'export NVM_DIR=\"$HOME/.nvm\" && \
             curl -fsSL https://raw.githubusercontent.com/nvm-sh/nvm/v0.40.3/install.sh | bash && \
             source \"$NVM_DIR/nvm.sh\" && nvm install --lts && npm install -g @google/gemini-cli'";
        let (ok, output) = run_step(
            executor,
            workdir,
            install_cmd.to_string(),
            INSTALL_TIMEOUT_SECS,
            false,
            "gemini-cli",
        )?;
        if !ok {
            return Err(AgentError::InvalidRequest {
                message: format!("failed to install gemini-cli: {output}"),
            });
        }
        Ok(())
    }

    fn run(
        &self,
        executor: &dyn CommandExecutor,
        workdir: &Path,
        request: &RunRequest,
    ) -> Result<RunOutcome, AgentError> {
        let mut env_prefix = String::new();
        if let Some(model) = &request.model_override {
            env_prefix.push_str(&format!("GEMINI_MODEL={} ", shell_quote(model)));
        }
        let node_bin = "$(ls -d \"$HOME/.nvm/versions/node/\"*/bin | tail -1)";
        let command = format!(
            "{env_prefix}PATH=\"{node_bin}:$PATH\" gemini -p {} --yolo --output-format json",
            shell_quote(&request.problem_statement)
        );

        let (success, output) =
            run_step(executor, workdir, command, request.timeout_secs, true, "gemini-cli")?;
        if success {
            capture_patch(executor, workdir, "gemini-cli")?;
        }
        Ok(RunOutcome { success, output })
    }

    fn parse_tokens(&self, output: &str) -> ParsedTokens {
        parse_gemini_cli_tokens(output)
    }
}

#[derive(Debug, Clone, Default)]
pub struct OpenhandsDriver;

impl AgentDriver for OpenhandsDriver {
    fn variant(&self) -> AgentVariant {
        AgentVariant::Openhands
    }

    fn install(&self, executor: &dyn CommandExecutor, workdir: &Path) -> Result<(), AgentError> {
        let (ok, output) = run_step(
            executor,
            workdir,
            "uv tool install openhands --python 3.12".to_string(),
            INSTALL_TIMEOUT_SECS,
            false,
            "openhands",
        )?;
        if !ok {
            return Err(AgentError::InvalidRequest {
                message: format!("failed to install openhands: {output}"),
            });
        }
        let _ = run_step(
            executor,
            workdir,
            "uv tool update-shell".to_string(),
            60,
            false,
            "openhands",
        );
        Ok(())
    }

    fn run(
        &self,
        executor: &dyn CommandExecutor,
        workdir: &Path,
        request: &RunRequest,
    ) -> Result<RunOutcome, AgentError> {
        let mut env_prefix = String::new();
        if let Some(model) = &request.model_override {
            env_prefix.push_str(&format!("LLM_MODEL={} ", shell_quote(model)));
        }
        let command = format!(
            "{env_prefix}$HOME/.local/bin/openhands --headless --json -t {} --override-with-envs | tee /logs/output.jsonl",
            shell_quote(&request.problem_statement)
        );

        let (success, output) =
            run_step(executor, workdir, command, request.timeout_secs, true, "openhands")?;
        if success {
            capture_patch(executor, workdir, "openhands")?;
        }
        Ok(RunOutcome { success, output })
    }

    fn parse_tokens(&self, output: &str) -> ParsedTokens {
        parse_openhands_tokens(output)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TraeDriver;

impl AgentDriver for TraeDriver {
    fn variant(&self) -> AgentVariant {
        AgentVariant::Trae
    }

    fn install(&self, executor: &dyn CommandExecutor, workdir: &Path) -> Result<(), AgentError> {
        let _ = run_step(executor, workdir, "mkdir -p agent/".to_string(), 60, false, "trae");
        let (ok, output) = run_step(
            executor,
            workdir,
            "git clone https://github.com/bytedance/trae-agent agent/".to_string(),
            300,
            false,
            "trae",
        )?;
        if !ok {
            return Err(AgentError::InvalidRequest {
                message: format!("failed to clone trae-agent: {output}"),
            });
        }
        Ok(())
    }

    fn run(
        &self,
        executor: &dyn CommandExecutor,
        workdir: &Path,
        request: &RunRequest,
    ) -> Result<RunOutcome, AgentError> {
        let model = request.model_override.as_deref().unwrap_or("default");
        let patch_path = format!("/workdir/swap/{}/patch.diff", request.repo_name);
        let command = format!(
            ".venv/bin/python3.12 -m trae_agent.cli run {} --must-patch --patch-path {} \
             --working-dir /workdir/swap/{} --model {} --config-file /workdir/swap/trae-agent/trae_config.yaml",
            shell_quote(&request.problem_statement),
            patch_path,
            request.repo_name,
            shell_quote(model),
        );

        let (success, output) =
            run_step(executor, workdir, command, request.timeout_secs, true, "trae")?;
        Ok(RunOutcome { success, output })
    }

    fn parse_tokens(&self, output: &str) -> ParsedTokens {
        parse_trae_tokens(output)
    }
}

pub fn default_driver_for(variant: AgentVariant) -> Box<dyn AgentDriver> {
    match variant {
        AgentVariant::Trae => Box::new(TraeDriver),
        AgentVariant::GeminiCli => Box::new(GeminiCliDriver),
        AgentVariant::ClaudeCode => Box::new(ClaudeCodeDriver),
        AgentVariant::Openhands => Box::new(OpenhandsDriver),
    }
}
