use crate::capture::FrameSignal;
use crate::config::TimingSettings;
use crate::error::WorkerError;
use crate::state::SharedHandle;
use crate::vision::{Probe, best_match};
use crate::worker::{Worker, ensure_running, sleep_or_cancel};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Identifies the equipped weapon so the cooldown gate can pick its spacing.
/// With no match the last known weapon is kept.
pub struct WeaponWorker {
    probes: Vec<Probe>,
    signal: FrameSignal,
    shared: SharedHandle,
    timing: TimingSettings,
}

impl WeaponWorker {
    pub fn new(
        probes: Vec<Probe>,
        signal: FrameSignal,
        shared: SharedHandle,
        timing: TimingSettings,
    ) -> Self {
        Self {
            probes,
            signal,
            shared,
            timing,
        }
    }
}

#[async_trait]
impl Worker for WeaponWorker {
    fn name(&self) -> &'static str {
        "weapon"
    }

    async fn run(&mut self, cancel: CancellationToken) -> Result<(), WorkerError> {
        loop {
            ensure_running(&cancel)?;
            let Some(frame) = self.signal.next_frame(&cancel).await? else {
                sleep_or_cancel(&cancel, self.timing.idle_backoff()).await?;
                continue;
            };
            if let Some((probe, _)) = best_match(&self.probes, &frame) {
                let mut state = self.shared.lock();
                if state.current_weapon.as_deref() != Some(probe.label()) {
                    info!("Weapon changed to {}", probe.label());
                    state.current_weapon = Some(probe.label().to_string());
                }
            }
            drop(frame);
            sleep_or_cancel(&cancel, self.timing.identify_interval()).await?;
        }
    }
}
