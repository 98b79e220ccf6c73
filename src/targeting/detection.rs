use super::cooldown::CooldownGate;
use super::handoff::{AimAction, TargetSender};
use crate::capture::FrameSignal;
use crate::common::Frame;
use crate::config::{AimSettings, TimingSettings};
use crate::error::WorkerError;
use crate::input::GameWindow;
use crate::state::SharedHandle;
use crate::vision::{TargetDetector, select_best_target};
use crate::worker::{Worker, ensure_running, sleep_or_cancel};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Runs the neural detector on every fresh frame and queues at most one aim
/// action per cooldown window.
pub struct DetectionWorker {
    detector: Arc<dyn TargetDetector>,
    signal: FrameSignal,
    shared: SharedHandle,
    window: GameWindow,
    sender: TargetSender,
    gate: CooldownGate,
    min_confidence: f32,
    aim: AimSettings,
    timing: TimingSettings,
}

impl DetectionWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        detector: Arc<dyn TargetDetector>,
        signal: FrameSignal,
        shared: SharedHandle,
        window: GameWindow,
        sender: TargetSender,
        gate: CooldownGate,
        min_confidence: f32,
        aim: AimSettings,
        timing: TimingSettings,
    ) -> Self {
        Self {
            detector,
            signal,
            shared,
            window,
            sender,
            gate,
            min_confidence,
            aim,
            timing,
        }
    }

    /// Returns whether an action was queued for this frame.
    pub fn process(&self, frame: &Frame, now: Instant) -> Result<bool, WorkerError> {
        let targets = self.detector.detect(frame);
        if targets.is_empty() {
            trace!("No targets in frame {}", frame.sequence());
            return Ok(false);
        }
        let Some(rect) = self.window.rect() else {
            debug!("Window geometry unavailable, dropping detections");
            return Ok(false);
        };
        let Some(best) =
            select_best_target(&targets, self.min_confidence, self.aim.model_input, rect.size)
        else {
            return Ok(false);
        };

        let admitted = {
            let mut state = self.shared.lock();
            state.liveness.observe_target(now);
            if !state.auto_target_enabled || state.liveness.is_dead() || state.in_menu {
                false
            } else {
                let weapon = state.current_weapon.clone();
                self.gate
                    .try_acquire(&mut state.last_action_at, weapon.as_deref(), now)
            }
        };
        if !admitted {
            return Ok(false);
        }

        debug!("Queueing {} at {:.2}", best.label, best.confidence);
        self.sender.push(AimAction {
            target: best.clone(),
            window_size: rect.size,
            window_origin: rect.origin,
            enqueued_at: now,
        })?;
        Ok(true)
    }
}

#[async_trait]
impl Worker for DetectionWorker {
    fn name(&self) -> &'static str {
        "detection"
    }

    async fn run(&mut self, cancel: CancellationToken) -> Result<(), WorkerError> {
        loop {
            ensure_running(&cancel)?;
            match self.signal.next_frame(&cancel).await? {
                Some(frame) if !frame.is_empty() => {
                    self.process(&frame, Instant::now())?;
                }
                _ => sleep_or_cancel(&cancel, self.timing.idle_backoff()).await?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::FrameDistributor;
    use crate::config::CooldownSettings;
    use crate::targeting::{TargetReceiver, target_channel};
    use crate::testing::{StubDetector, shared_test_state, test_frame, test_window};
    use crate::vision::Target;
    use crate::common::BoundingBox;
    use std::time::Duration;

    fn worker(detector: Arc<StubDetector>) -> (DetectionWorker, TargetReceiver, SharedHandle) {
        let (tx, rx) = target_channel();
        let shared = shared_test_state();
        let distributor = FrameDistributor::new();
        let worker = DetectionWorker::new(
            detector,
            distributor.register_consumer(),
            shared.clone(),
            test_window(true),
            tx,
            CooldownGate::from_settings(&CooldownSettings::default()),
            0.5,
            AimSettings::default(),
            TimingSettings::default(),
        );
        (worker, rx, shared)
    }

    fn body() -> Target {
        Target::new(BoundingBox::new(300.0, 300.0, 340.0, 380.0), "body", 0.9)
    }

    #[tokio::test]
    async fn target_is_queued_and_combat_entered() {
        let (worker, rx, shared) = worker(StubDetector::with_targets(vec![body()]));
        let now = Instant::now();
        assert!(worker.process(&test_frame(1), now).unwrap());
        assert_eq!(rx.len(), 1);
        let state = shared.lock();
        assert!(state.liveness.in_combat());
        assert_eq!(state.last_action_at, Some(now));
    }

    #[tokio::test]
    async fn disabled_auto_target_still_tracks_combat() {
        let (worker, rx, shared) = worker(StubDetector::with_targets(vec![body()]));
        shared.lock().auto_target_enabled = false;
        assert!(!worker.process(&test_frame(1), Instant::now()).unwrap());
        assert!(rx.is_empty());
        assert!(shared.lock().liveness.in_combat());
    }

    #[tokio::test]
    async fn cooldown_follows_current_weapon() {
        let (worker, rx, shared) = worker(StubDetector::with_targets(vec![body()]));
        shared.lock().current_weapon = Some("smg".into());
        let start = Instant::now();
        assert!(worker.process(&test_frame(1), start).unwrap());
        assert!(!worker.process(&test_frame(2), start + Duration::from_millis(100)).unwrap());
        assert!(worker.process(&test_frame(3), start + Duration::from_millis(120)).unwrap());
        assert_eq!(rx.len(), 2);
    }

    #[tokio::test]
    async fn low_confidence_targets_are_ignored() {
        let weak = Target::new(BoundingBox::new(0.0, 0.0, 1.0, 1.0), "head", 0.2);
        let (worker, rx, shared) = worker(StubDetector::with_targets(vec![weak]));
        assert!(!worker.process(&test_frame(1), Instant::now()).unwrap());
        assert!(rx.is_empty());
        assert!(!shared.lock().liveness.in_combat());
    }
}
