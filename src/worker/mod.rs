//! Uniform lifecycle for every long-running loop.
//!
//! A [`Worker`] is started exactly once with the shared cancellation token and
//! hands back a [`StopCompletion`] that resolves when its loop has really
//! exited. Loops call [`ensure_running`] at the top of each iteration and use
//! [`sleep_or_cancel`] (or another `select!` on the token) for every wait, so a
//! cancelled worker never sits out a full timeout.

use crate::error::WorkerError;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[async_trait]
pub trait Worker: Send + 'static {
    fn name(&self) -> &'static str;

    /// Runs until cancelled. Returning `Err(WorkerError::Cancelled)` is the
    /// normal way out.
    async fn run(&mut self, cancel: CancellationToken) -> Result<(), WorkerError>;

    /// Spawns the loop on the runtime. Consumes the worker, so it cannot be
    /// started twice.
    fn start(self: Box<Self>, cancel: CancellationToken) -> StopCompletion {
        let name = self.name();
        let handle = tokio::spawn(async move {
            let mut worker = self;
            info!("{} worker started", name);
            let result = worker.run(cancel).await;
            match &result {
                Ok(()) => info!("{} worker finished", name),
                Err(e) if e.is_cancellation() => debug!("{} worker cancelled", name),
                Err(e) => error!("{} worker failed: {}", name, e),
            }
            result
        });
        StopCompletion::new(name, handle)
    }
}

/// How a worker's loop ended, as observed by whoever awaited it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    Completed,
    Cancelled,
    Failed(String),
    Panicked(String),
    /// Did not exit within the stop timeout and was aborted.
    TimedOut,
}

impl WorkerExit {
    pub fn is_unexpected(&self) -> bool {
        matches!(self, WorkerExit::Failed(_) | WorkerExit::Panicked(_))
    }
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerExit::Completed => write!(f, "completed"),
            WorkerExit::Cancelled => write!(f, "cancelled"),
            WorkerExit::Failed(reason) => write!(f, "failed: {}", reason),
            WorkerExit::Panicked(reason) => write!(f, "panicked: {}", reason),
            WorkerExit::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Resolves once the worker's task has exited. Awaiting it is cancel-safe:
/// dropping a pending [`StopCompletion::wait`] keeps the task handle.
pub struct StopCompletion {
    name: &'static str,
    handle: Option<JoinHandle<Result<(), WorkerError>>>,
    exit: Option<WorkerExit>,
}

impl StopCompletion {
    fn new(name: &'static str, handle: JoinHandle<Result<(), WorkerError>>) -> Self {
        Self {
            name,
            handle: Some(handle),
            exit: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn exit(&self) -> Option<&WorkerExit> {
        self.exit.as_ref()
    }

    pub async fn wait(&mut self) {
        let Some(handle) = self.handle.as_mut() else {
            return;
        };
        let exit = match handle.await {
            Ok(Ok(())) => WorkerExit::Completed,
            Ok(Err(e)) if e.is_cancellation() => WorkerExit::Cancelled,
            Ok(Err(e)) => WorkerExit::Failed(e.to_string()),
            Err(e) if e.is_cancelled() => WorkerExit::TimedOut,
            Err(e) => WorkerExit::Panicked(e.to_string()),
        };
        self.handle = None;
        self.exit = Some(exit);
    }

    /// Aborts a worker that is still running and records it as timed out.
    pub fn abandon(&mut self) {
        if self.handle.is_some() {
            warn!("{} worker did not stop in time, aborting", self.name);
            self.abort();
        }
    }

    /// Aborts without logging. Returns whether the task was still running.
    pub fn abort(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                self.exit = Some(WorkerExit::TimedOut);
                true
            }
            None => false,
        }
    }
}

pub fn ensure_running(cancel: &CancellationToken) -> Result<(), WorkerError> {
    if cancel.is_cancelled() {
        Err(WorkerError::Cancelled)
    } else {
        Ok(())
    }
}

/// Sleeps for `duration` unless the token trips first.
pub async fn sleep_or_cancel(
    cancel: &CancellationToken,
    duration: Duration,
) -> Result<(), WorkerError> {
    ensure_running(cancel)?;
    tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(WorkerError::Cancelled),
        _ = tokio::time::sleep(duration) => {}
    }
    ensure_running(cancel)
}
