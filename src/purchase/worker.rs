use super::guard::PurchaseGuard;
use crate::config::{PurchaseSettings, TimingSettings};
use crate::error::WorkerError;
use crate::input::{GameWindow, InputInjector};
use crate::state::SharedHandle;
use crate::worker::{Worker, ensure_running, sleep_or_cancel};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How waiting for the buy preconditions ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preconditions {
    Ready,
    Died,
    TimedOut,
}

/// How one purchase cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Purchased,
    Skipped,
    Interrupted,
    TimedOut,
}

/// Buys after a respawn, with auto-target suspended for the whole cycle.
pub struct PurchaseWorker {
    shared: SharedHandle,
    window: GameWindow,
    injector: Arc<dyn InputInjector>,
    settings: PurchaseSettings,
    timing: TimingSettings,
}

impl PurchaseWorker {
    pub fn new(
        shared: SharedHandle,
        window: GameWindow,
        injector: Arc<dyn InputInjector>,
        settings: PurchaseSettings,
        timing: TimingSettings,
    ) -> Self {
        Self {
            shared,
            window,
            injector,
            settings,
            timing,
        }
    }

    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleOutcome, WorkerError> {
        let _guard = PurchaseGuard::enter(&self.shared);
        info!("Purchase requested, waiting for map preconditions");

        match self.wait_for_preconditions(cancel).await? {
            Preconditions::Died => {
                info!("Died before purchase could run");
                return Ok(CycleOutcome::Interrupted);
            }
            Preconditions::TimedOut => {
                warn!("Purchase preconditions not met in time, skipping");
                return Ok(CycleOutcome::TimedOut);
            }
            Preconditions::Ready => {}
        }

        if self.shared.lock().liveness.is_dead() || !self.window.is_focused() {
            debug!("Dead or unfocused at purchase time, skipping");
            return Ok(CycleOutcome::Skipped);
        }
        self.purchase(cancel).await?;
        Ok(CycleOutcome::Purchased)
    }

    async fn wait_for_preconditions(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Preconditions, WorkerError> {
        let deadline = Instant::now() + self.timing.precondition_timeout();
        loop {
            {
                let state = self.shared.lock();
                if state.liveness.is_dead() {
                    return Ok(Preconditions::Died);
                }
                if state.map.name.is_some()
                    && state.map.confidence >= self.settings.min_map_confidence
                    && state.map.in_bounds
                {
                    return Ok(Preconditions::Ready);
                }
            }
            if Instant::now() >= deadline {
                return Ok(Preconditions::TimedOut);
            }
            sleep_or_cancel(cancel, self.timing.purchase_poll()).await?;
        }
    }

    async fn purchase(&self, cancel: &CancellationToken) -> Result<(), WorkerError> {
        let Some(rect) = self.window.rect() else {
            warn!("Window geometry unavailable, skipping purchase");
            return Ok(());
        };
        let handle = self.window.handle();
        info!("Purchasing loadout");
        self.injector.press_key(handle, &self.settings.open_key);
        sleep_or_cancel(cancel, self.settings.step_delay()).await?;
        for point in &self.settings.item_clicks {
            self.injector.click_at(handle, point.resolve(rect.size));
            sleep_or_cancel(cancel, self.settings.step_delay()).await?;
        }
        self.injector.press_key(handle, &self.settings.close_key);
        Ok(())
    }
}

#[async_trait]
impl Worker for PurchaseWorker {
    fn name(&self) -> &'static str {
        "purchase"
    }

    async fn run(&mut self, cancel: CancellationToken) -> Result<(), WorkerError> {
        loop {
            ensure_running(&cancel)?;
            let requested = self.shared.lock().purchase_requested();
            if requested {
                let outcome = self.run_cycle(&cancel).await?;
                debug!("Purchase cycle ended: {:?}", outcome);
            }
            sleep_or_cancel(&cancel, self.timing.purchase_poll()).await?;
        }
    }
}
