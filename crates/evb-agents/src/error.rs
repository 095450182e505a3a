use evb_exec::ExecutorError;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("invalid run request: {message}")]
    InvalidRequest { message: String },
    #[error("setup for {variant} failed: {source}")]
    Setup {
        variant: &'static str,
        #[source]
        source: ExecutorError,
    },
    #[error("run for {variant} failed: {source}")]
    Run {
        variant: &'static str,
        #[source]
        source: ExecutorError,
    },
}
