use super::machine::{FlowProbes, FlowStep, SearchCheck};
use crate::capture::FrameSignal;
use crate::common::{Frame, RelativePoint};
use crate::config::{ClickSettings, TimingSettings};
use crate::error::WorkerError;
use crate::input::{GameWindow, InputInjector};
use crate::state::{ArtifactSlot, SharedHandle};
use crate::worker::{Worker, ensure_running, sleep_or_cancel};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drives menus and matchmaking: one decision, and at most one navigation
/// action, per tick.
pub struct FlowWorker {
    probes: FlowProbes,
    signal: FrameSignal,
    shared: SharedHandle,
    window: GameWindow,
    injector: Arc<dyn InputInjector>,
    clicks: ClickSettings,
    timing: TimingSettings,
}

impl FlowWorker {
    pub fn new(
        probes: FlowProbes,
        signal: FrameSignal,
        shared: SharedHandle,
        window: GameWindow,
        injector: Arc<dyn InputInjector>,
        clicks: ClickSettings,
        timing: TimingSettings,
    ) -> Self {
        Self {
            probes,
            signal,
            shared,
            window,
            injector,
            clicks,
            timing,
        }
    }

    /// Runs one decision against `frame` and applies it.
    pub async fn tick(
        &mut self,
        frame: Frame,
        cancel: &CancellationToken,
    ) -> Result<FlowStep, WorkerError> {
        let awaiting_match = self.shared.lock().match_ready;
        let decision = self.probes.decide(&frame, awaiting_match);
        drop(frame);
        let step = decision.step;

        {
            let mut state = self.shared.lock();
            state.flow_state = step.state();
            if let Some(artifact) = decision.artifact {
                state.store_artifact(ArtifactSlot::Flow, artifact);
            }
        }

        match step {
            FlowStep::DismissTeamSelect => {
                info!("Team select visible, dismissing");
                self.click(self.clicks.team_select_dismiss);
                let mut state = self.shared.lock();
                state.searching = false;
                state.match_ready = false;
            }
            FlowStep::MarkMatchReady => {
                info!("Match ready prompt visible");
                let mut state = self.shared.lock();
                state.searching = false;
                state.match_ready = true;
            }
            FlowStep::DismissDisconnect => {
                warn!("Disconnection prompt visible, dismissing");
                self.click(self.clicks.disconnect_dismiss);
                let mut state = self.shared.lock();
                state.searching = false;
                state.match_ready = false;
            }
            FlowStep::LeaveMenu => {
                let mut state = self.shared.lock();
                state.in_menu = false;
                state.searching = false;
            }
            FlowStep::AwaitMatchLoad => {
                debug!("Waiting for match to load");
                self.shared.lock().in_menu = true;
            }
            FlowStep::MarkSearching => {
                let mut state = self.shared.lock();
                state.in_menu = true;
                if !state.searching {
                    info!("Search in progress");
                }
                state.searching = true;
            }
            FlowStep::StartSearch => {
                self.shared.lock().in_menu = true;
                let started = self.start_search(cancel).await?;
                if started {
                    info!("Search started");
                    self.shared.lock().searching = true;
                } else {
                    warn!("Search macro finished without a running search");
                }
            }
        }
        Ok(step)
    }

    /// Clicks through the search sequence and verifies on a frame captured
    /// after the last click that a search is actually running. The caller
    /// sets `searching` only on `true`.
    async fn start_search(&mut self, cancel: &CancellationToken) -> Result<bool, WorkerError> {
        info!("Starting a new search");
        let sequence = self.clicks.search_sequence.clone();
        for point in sequence {
            ensure_running(cancel)?;
            self.signal.mark_seen();
            self.click(point);
            sleep_or_cancel(cancel, self.timing.search_click_delay()).await?;
        }

        let Some(frame) = self.frame_after_click(cancel).await? else {
            debug!("No frame captured after the search clicks");
            return Ok(false);
        };
        match self.probes.check_search(&frame) {
            SearchCheck::Running => Ok(true),
            SearchCheck::NotStarted => Ok(false),
            SearchCheck::NeedsConfirm => {
                drop(frame);
                debug!("Start and mode visible, confirming");
                self.signal.mark_seen();
                self.click(self.clicks.search_confirm);
                Ok(self
                    .frame_after_click(cancel)
                    .await?
                    .is_some_and(|frame| self.probes.search_running(&frame)))
            }
        }
    }

    /// Lets the screen settle, then returns a frame published after the
    /// signal was last marked seen. Waits at most one more settle period for
    /// it; `None` when none arrives.
    async fn frame_after_click(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<Frame>, WorkerError> {
        let settle = self.timing.search_settle();
        sleep_or_cancel(cancel, settle).await?;
        if self.signal.has_changed() {
            return Ok(self.signal.latest());
        }
        match tokio::time::timeout(settle, self.signal.next_frame(cancel)).await {
            Ok(frame) => frame,
            Err(_) => Ok(None),
        }
    }

    fn click(&self, point: RelativePoint) {
        if !self.window.is_focused() {
            debug!("Window not focused, skipping click");
            return;
        }
        match self.window.rect() {
            Some(rect) => self
                .injector
                .click_at(self.window.handle(), point.resolve(rect.size)),
            None => warn!("Window geometry unavailable, skipping click"),
        }
    }
}

#[async_trait]
impl Worker for FlowWorker {
    fn name(&self) -> &'static str {
        "flow"
    }

    async fn run(&mut self, cancel: CancellationToken) -> Result<(), WorkerError> {
        loop {
            ensure_running(&cancel)?;
            let frame = match self.signal.next_frame(&cancel).await? {
                Some(frame) if !frame.is_empty() => frame,
                _ => {
                    debug!("No frame for flow tick, backing off");
                    sleep_or_cancel(&cancel, self.timing.idle_backoff()).await?;
                    continue;
                }
            };
            let step = self.tick(frame, &cancel).await?;
            debug!("Flow step {:?}", step);
            sleep_or_cancel(&cancel, self.timing.flow_interval()).await?;
        }
    }
}
