#[derive(Debug, thiserror::Error)]
pub enum PatchEngineError {
    #[error("malformed diff: {reason}")]
    MalformedDiff { reason: String },
    #[error("failed to apply patch for {filename}: {reason}")]
    PatchApplyFailed { filename: String, reason: String },
    #[error("io error reading diff file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
