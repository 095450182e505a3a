//! Result-file persistence: write-temp-then-rename on every save, with a
//! single owner thread draining an `mpsc` channel of completed evaluations
//! so concurrent workers never contend on the same file (spec.md §4.7 step 8,
//! §9 "Result persistence").

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

use evb_core::EvaluationResult;

use crate::error::SchedulerError;

/// Load a prior run's results file, if any, for cache-resumption.
pub fn load_results(path: &Path) -> Result<Vec<EvaluationResult>, SchedulerError> {
    match std::fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw).map_err(|source| SchedulerError::SpecProcessingError {
            path: path.to_path_buf(),
            source,
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => Err(SchedulerError::FileOperationError {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// `(agent_name, instance_id)` pairs a prior run already recorded.
pub fn cached_keys(results: &[EvaluationResult]) -> HashSet<(String, String)> {
    results.iter().map(EvaluationResult::cache_key).collect()
}

/// Atomically overwrite `path` with `results` serialized as a JSON array:
/// write to a sibling temp file, then rename over the destination so a
/// process kill mid-write never leaves a truncated results file.
pub fn write_results_atomically(path: &Path, results: &[EvaluationResult]) -> Result<(), SchedulerError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| SchedulerError::FileOperationError {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let serialized = serde_json::to_string_pretty(results).map_err(|source| SchedulerError::SpecProcessingError {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, serialized).map_err(|source| SchedulerError::FileOperationError {
        path: tmp_path.clone(),
        source,
    })?;
    std::fs::rename(&tmp_path, path).map_err(|source| SchedulerError::FileOperationError {
        path: path.to_path_buf(),
        source,
    })
}

/// The single owner of the cumulative results list. Workers send completed
/// records through [`PersistenceHandle::sender`]; the owner thread appends
/// and persists after every receive, starting from whatever a prior run
/// already wrote.
pub struct PersistenceHandle {
    sender: Sender<EvaluationResult>,
    join: JoinHandle<Vec<EvaluationResult>>,
}

impl PersistenceHandle {
    pub fn spawn(path: PathBuf, initial: Vec<EvaluationResult>) -> Self {
        let (sender, receiver): (Sender<EvaluationResult>, Receiver<EvaluationResult>) = mpsc::channel();
        let join = std::thread::spawn(move || {
            let mut results = initial;
            while let Ok(result) = receiver.recv() {
                results.push(result);
                if let Err(err) = write_results_atomically(&path, &results) {
                    tracing::error!(error = %err, path = %path.display(), "failed to persist results");
                }
            }
            results
        });

        Self { sender, join }
    }

    pub fn sender(&self) -> Sender<EvaluationResult> {
        self.sender.clone()
    }

    /// Close the channel and wait for the owner thread to drain, returning
    /// the final cumulative result list.
    pub fn finish(self) -> Vec<EvaluationResult> {
        drop(self.sender);
        self.join.join().unwrap_or_default()
    }
}
