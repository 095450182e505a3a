//! Applying parsed patch records inside a sandbox via a `CommandExecutor`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use evb_core::PatchInfo;
use evb_exec::{CommandExecutor, ExecRequest};

use crate::error::PatchEngineError;
use crate::filter::filter_patches;
use crate::parser::parse;
use crate::rebuild::rebuild_diff;

const APPLY_TIMEOUT_SECS: u64 = 60;

/// Apply each record independently. A single file's `patch` failure is
/// logged and skipped; the caller gets back only the filenames that landed.
pub fn apply(patches: &[PatchInfo], executor: &dyn CommandExecutor, workdir: &str) -> Vec<String> {
    let mut applied = Vec::new();

    for (index, patch) in patches.iter().enumerate() {
        let diff = rebuild_diff(patch);
        let encoded = STANDARD.encode(diff.as_bytes());
        let tmp_path = format!("/tmp/evb-patch-{index}.diff");
        let command = format!(
            "echo '{encoded}' | base64 -d > {tmp_path} && patch -p1 --no-backup-if-mismatch --force < {tmp_path}"
        );
        let request = ExecRequest::new(command, workdir, APPLY_TIMEOUT_SECS);

        match executor.execute(&request) {
            Ok(outcome) if outcome.success() => applied.push(patch.filename.clone()),
            Ok(outcome) => {
                tracing::warn!(
                    filename = %patch.filename,
                    exit_code = ?outcome.exit_code,
                    output = %outcome.output,
                    "patch application failed, continuing"
                );
            }
            Err(err) => {
                tracing::warn!(
                    filename = %patch.filename,
                    error = %err,
                    "patch exec failed, continuing"
                );
            }
        }
    }

    applied
}

/// Outcome of the read-parse-filter-apply convenience pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyFileResult {
    pub total: usize,
    pub applied: usize,
    pub filenames: Vec<String>,
    pub raw: String,
}

/// Read a diff file off disk, parse it, filter by file kind, and apply.
pub fn apply_file(
    diff_path: &str,
    executor: &dyn CommandExecutor,
    workdir: &str,
    include_tests: bool,
    include_sources: bool,
) -> Result<ApplyFileResult, PatchEngineError> {
    let raw = std::fs::read_to_string(diff_path).map_err(|source| PatchEngineError::Io {
        path: diff_path.to_string(),
        source,
    })?;
    let records = parse(&raw)?;
    let filtered = filter_patches(records, include_tests, include_sources);
    let total = filtered.len();
    let filenames = apply(&filtered, executor, workdir);

    Ok(ApplyFileResult {
        total,
        applied: filenames.len(),
        filenames,
        raw,
    })
}
