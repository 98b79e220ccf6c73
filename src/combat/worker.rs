use crate::capture::FrameSignal;
use crate::error::WorkerError;
use crate::state::SharedHandle;
use crate::vision::Probe;
use crate::worker::{Worker, ensure_running};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Watches for the death marker and advances the liveness tracker. A respawn
/// raises the purchase request.
pub struct LivenessWorker {
    death: Probe,
    signal: FrameSignal,
    shared: SharedHandle,
    poll: Duration,
}

impl LivenessWorker {
    /// `poll` bounds how long the worker waits for a frame before advancing
    /// time-driven transitions anyway.
    pub fn new(death: Probe, signal: FrameSignal, shared: SharedHandle, poll: Duration) -> Self {
        Self {
            death,
            signal,
            shared,
            poll,
        }
    }

    fn observe(&self, died: bool, now: Instant) {
        let mut state = self.shared.lock();
        if died && state.liveness.mark_dead(now) {
            info!("Death detected");
        }
        state.liveness.update(now);
        if state.liveness.take_just_respawned() {
            info!("Respawned, requesting purchase");
            state.request_purchase();
        }
    }
}

#[async_trait]
impl Worker for LivenessWorker {
    fn name(&self) -> &'static str {
        "liveness"
    }

    async fn run(&mut self, cancel: CancellationToken) -> Result<(), WorkerError> {
        loop {
            ensure_running(&cancel)?;
            let frame = match tokio::time::timeout(self.poll, self.signal.next_frame(&cancel)).await {
                Ok(frame) => frame?,
                Err(_) => None,
            };
            let died = match frame {
                Some(frame) if !frame.is_empty() => self.death.matches(&frame),
                _ => {
                    debug!("No fresh frame for liveness check");
                    false
                }
            };
            self.observe(died, Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::FrameDistributor;
    use crate::testing::{StubClassifier, shared_test_state};
    use image::DynamicImage;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn death_then_respawn_requests_purchase() {
        let distributor = Arc::new(FrameDistributor::new());
        let marker = StubClassifier::fixed(0.9);
        let shared = shared_test_state();
        let worker = LivenessWorker::new(
            Probe::new("death", marker.clone(), 0.75),
            distributor.register_consumer(),
            shared.clone(),
            Duration::from_millis(100),
        );
        let cancel = CancellationToken::new();
        let mut completion = Box::new(worker).start(cancel.clone());

        distributor.publish(DynamicImage::new_rgb8(4, 4));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(shared.lock().liveness.is_dead());
        assert!(!shared.lock().purchase_requested());

        marker.set(0.0);
        tokio::time::sleep(Duration::from_secs(4)).await;
        {
            let state = shared.lock();
            assert!(!state.liveness.is_dead());
            assert!(state.liveness.state().last_respawn.is_some());
            assert!(state.purchase_requested());
        }

        cancel.cancel();
        completion.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_death_marker_keeps_first_timestamp() {
        let distributor = Arc::new(FrameDistributor::new());
        let shared = shared_test_state();
        let worker = LivenessWorker::new(
            Probe::new("death", StubClassifier::fixed(0.9), 0.75),
            distributor.register_consumer(),
            shared.clone(),
            Duration::from_millis(100),
        );
        let cancel = CancellationToken::new();
        let mut completion = Box::new(worker).start(cancel.clone());

        distributor.publish(DynamicImage::new_rgb8(4, 4));
        tokio::time::sleep(Duration::from_millis(10)).await;
        let first = shared.lock().liveness.state().death_timestamp;
        assert!(first.is_some());

        distributor.publish(DynamicImage::new_rgb8(4, 4));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(shared.lock().liveness.state().death_timestamp, first);

        cancel.cancel();
        completion.wait().await;
    }
}
