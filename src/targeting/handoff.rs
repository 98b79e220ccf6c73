use crate::common::{Point, Size};
use crate::error::WorkerError;
use crate::vision::Target;
use crate::worker::ensure_running;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// One queued aim request, in detector space plus the window geometry it was
/// taken against.
#[derive(Debug, Clone)]
pub struct AimAction {
    pub target: Target,
    pub window_size: Size,
    pub window_origin: Point,
    pub enqueued_at: Instant,
}

pub fn target_channel() -> (TargetSender, TargetReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TargetSender { tx }, TargetReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct TargetSender {
    tx: mpsc::UnboundedSender<AimAction>,
}

impl TargetSender {
    /// Never waits; fails only once the receiving loop is gone.
    pub fn push(&self, action: AimAction) -> Result<(), WorkerError> {
        self.tx.send(action).map_err(|_| WorkerError::HandoffClosed)
    }
}

#[derive(Debug)]
pub struct TargetReceiver {
    rx: mpsc::UnboundedReceiver<AimAction>,
}

impl TargetReceiver {
    /// Waits for the next action, or returns `Cancelled` as soon as the token trips.
    pub async fn take(&mut self, cancel: &CancellationToken) -> Result<AimAction, WorkerError> {
        ensure_running(cancel)?;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(WorkerError::Cancelled),
            action = self.rx.recv() => action.ok_or(WorkerError::HandoffClosed),
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
