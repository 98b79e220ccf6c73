use super::handoff::{AimAction, TargetReceiver};
use crate::config::AimSettings;
use crate::error::WorkerError;
use crate::input::InputInjector;
use crate::state::SharedHandle;
use crate::vision::scale_to_window;
use crate::worker::{Worker, ensure_running, sleep_or_cancel};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Window-pixel point to aim at for `action`: the box centre shifted by the
/// label's correction offset (a fraction of the box size), then scaled out of
/// detector space.
pub fn aim_point(action: &AimAction, settings: &AimSettings) -> (f32, f32) {
    let bbox = &action.target.bbox;
    let offset = if action.target.is_head() {
        settings.head_offset
    } else {
        settings.body_offset
    };
    let (cx, cy) = bbox.center();
    let x = cx + offset.dx * bbox.width();
    let y = cy + offset.dy * bbox.height();
    scale_to_window(x, y, settings.model_input, action.window_size)
}

/// Consumes queued aim actions: aim, settle, fire.
pub struct AimWorker {
    receiver: TargetReceiver,
    injector: Arc<dyn InputInjector>,
    shared: SharedHandle,
    settings: AimSettings,
}

impl AimWorker {
    pub fn new(
        receiver: TargetReceiver,
        injector: Arc<dyn InputInjector>,
        shared: SharedHandle,
        settings: AimSettings,
    ) -> Self {
        Self {
            receiver,
            injector,
            shared,
            settings,
        }
    }

    /// Returns whether the action was carried out.
    async fn execute(
        &self,
        action: AimAction,
        cancel: &CancellationToken,
    ) -> Result<bool, WorkerError> {
        let age = Instant::now().saturating_duration_since(action.enqueued_at);
        if age > self.settings.max_action_age() {
            debug!("Dropping aim action queued {:?} ago", age);
            return Ok(false);
        }
        {
            let state = self.shared.lock();
            if !state.auto_target_enabled || state.liveness.is_dead() {
                debug!("Auto-target unavailable, dropping aim action");
                return Ok(false);
            }
        }

        let (x, y) = aim_point(&action, &self.settings);
        info!("Engaging {} at ({:.0}, {:.0})", action.target.label, x, y);
        self.injector
            .aim_to(x, y, action.window_origin, action.window_size);
        sleep_or_cancel(cancel, self.settings.settle()).await?;
        self.injector.fire();
        Ok(true)
    }
}

#[async_trait]
impl Worker for AimWorker {
    fn name(&self) -> &'static str {
        "aim"
    }

    async fn run(&mut self, cancel: CancellationToken) -> Result<(), WorkerError> {
        loop {
            ensure_running(&cancel)?;
            let action = self.receiver.take(&cancel).await?;
            self.execute(action, &cancel).await?;
        }
    }
}
