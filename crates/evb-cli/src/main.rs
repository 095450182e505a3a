mod error;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use evb_core::{load_harness_config, Validate, ValidationLevel};
use evb_scheduler::run::run;

use error::HarnessError;

#[derive(Parser)]
#[command(name = "evb")]
#[command(about = "Coding-agent evaluation harness")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every ready (agent, instance) pair from the dataset.
    Evaluate {
        /// Restrict the run to these agent names; omit to run the full roster.
        #[arg(long, value_delimiter = ',')]
        agents: Vec<String>,
        /// Skip environment setup and assume every image already exists.
        #[arg(long)]
        test_only: bool,
        /// Override the dataset path from the config file.
        #[arg(long)]
        dataset: Option<PathBuf>,
        /// Path to the harness config TOML.
        #[arg(long, default_value = "harness.toml")]
        config: PathBuf,
    },
    /// Config-file operations.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a harness config file, printing any issues found.
    Validate {
        #[arg(long, default_value = "harness.toml")]
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    logging::init();

    match dispatch(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "run failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> Result<ExitCode, HarnessError> {
    let success = match cli.command {
        Commands::Evaluate {
            agents,
            test_only,
            dataset,
            config,
        } => evaluate(&config, dataset, &agents, test_only)?,
        Commands::Config {
            action: ConfigAction::Validate { config },
        } => validate_config(&config)?,
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn evaluate(
    config_path: &PathBuf,
    dataset_override: Option<PathBuf>,
    agents: &[String],
    test_only: bool,
) -> Result<bool, HarnessError> {
    let mut config = load_harness_config(config_path)?;
    if let Some(dataset) = dataset_override {
        config.dataset = dataset;
    }

    let summary = run(config, agents, test_only)?;
    println!(
        "evaluated {} pair(s), {} blocked, results at {}",
        summary.evaluated,
        summary.blocked,
        summary.results_path.display()
    );

    if summary.stopped_early {
        println!("run stopped early on shutdown signal");
        return Ok(false);
    }
    Ok(true)
}

fn validate_config(config_path: &PathBuf) -> Result<bool, HarnessError> {
    let config = load_harness_config(config_path)?;
    let issues = config.validate();

    if issues.is_empty() {
        println!("{} is valid", config_path.display());
        return Ok(true);
    }

    let mut has_error = false;
    for issue in &issues {
        has_error |= issue.level == ValidationLevel::Error;
        println!("[{:?}] {}: {}", issue.level, issue.code, issue.message);
    }

    Ok(!has_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("harness.toml");
        let mut file = std::fs::File::create(&path).expect("create config");
        file.write_all(contents.as_bytes()).expect("write config");
        (dir, path)
    }

    #[test]
    fn validate_config_succeeds_for_a_well_formed_roster() {
        let (_dir, path) = write_config(
            r#"
[[agents]]
name = "claude-main"
variant = "claude_code"
"#,
        );

        assert!(validate_config(&path).expect("validate"));
    }

    #[test]
    fn validate_config_fails_for_an_empty_agent_roster() {
        let (_dir, path) = write_config("");

        assert!(!validate_config(&path).expect("validate"));
    }

    #[test]
    fn validate_config_reports_a_read_error_for_a_missing_file() {
        let err = validate_config(&PathBuf::from("/nonexistent/harness.toml"))
            .expect_err("missing file must error");
        assert!(matches!(err, HarnessError::Config(_)));
    }
}
