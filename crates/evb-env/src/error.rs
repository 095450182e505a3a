#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("failed to create container for {repo}: {reason}")]
    ContainerCreationError { repo: String, reason: String },
    #[error("container operation failed ({container_id}): {reason}")]
    ContainerOperationError { container_id: String, reason: String },
    #[error("image build failed for {repo}: {reason}")]
    ImageBuildError { repo: String, reason: String },
    #[error("io error reading manifest {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid manifest {path}: {source}")]
    Manifest {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to start environment runtime: {message}")]
    RuntimeInit { message: String },
}
