use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("failed to read dataset at {path}: {source}")]
    DatasetRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse dataset at {path}: {source}")]
    SpecProcessingError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid scheduler configuration: {message}")]
    ConfigurationError { message: String },
    #[error("file operation failed on {path}: {source}")]
    FileOperationError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
