use thiserror::Error;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration Error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("No window matching '{0}' was found")]
    WindowNotFound(String),
    #[error("Capture Error: {0}")]
    Capture(#[from] CaptureError),
    #[error("The orchestrator was already started, workers cannot be restarted.")]
    AlreadyStarted,
    #[error("The orchestrator was never started")]
    NotStarted,
    #[error("Missing component: {0}")]
    MissingComponent(&'static str),
    #[error("Workers failed during shutdown: {}", .0.join("; "))]
    WorkerFailures(Vec<String>),
}

// Worker loop error type. `Cancelled` is the expected way out of every loop.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker was cancelled")]
    Cancelled,
    #[error("Capture Error: {0}")]
    Capture(#[from] CaptureError),
    #[error("Target hand-off channel closed")]
    HandoffClosed,
    #[error("Worker failed: {0}")]
    Failed(String),
}

impl WorkerError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, WorkerError::Cancelled)
    }
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to read capture source: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("Capture source at {0} contains no images")]
    EmptySource(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_cancelled_counts_as_cancellation() {
        assert!(WorkerError::Cancelled.is_cancellation());
        assert!(!WorkerError::HandoffClosed.is_cancellation());
        assert!(!WorkerError::Failed("boom".to_string()).is_cancellation());
    }

    #[test]
    fn worker_failures_are_joined_in_message() {
        let err = BotError::WorkerFailures(vec!["aim: boom".into(), "flow: bang".into()]);
        assert_eq!(
            err.to_string(),
            "Workers failed during shutdown: aim: boom; flow: bang"
        );
    }
}
