//! Map identification and minimap position.
//!
//! The purchase loop only buys once a map has been identified with high
//! confidence and the tracked marker sits inside the configured bounds; this
//! worker keeps both observations current in shared state.

use crate::capture::FrameSignal;
use crate::common::{Frame, Region};
use crate::config::TimingSettings;
use crate::error::WorkerError;
use crate::state::{ArtifactSlot, MapObservation, SharedHandle};
use crate::vision::{Probe, best_match};
use crate::worker::{Worker, ensure_running, sleep_or_cancel};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct MapWorker {
    maps: Vec<Probe>,
    marker: Probe,
    bounds: Region,
    signal: FrameSignal,
    shared: SharedHandle,
    timing: TimingSettings,
}

impl MapWorker {
    pub fn new(
        maps: Vec<Probe>,
        marker: Probe,
        bounds: Region,
        signal: FrameSignal,
        shared: SharedHandle,
        timing: TimingSettings,
    ) -> Self {
        Self {
            maps,
            marker,
            bounds,
            signal,
            shared,
            timing,
        }
    }

    /// Runs every probe on `frame` and writes the observation. A frame with
    /// no map match keeps the last identified map.
    pub fn observe(&self, frame: &Frame) -> MapObservation {
        let identified = best_match(&self.maps, frame);
        let marker = self.marker.evaluate(frame);
        let in_bounds = marker.matched
            && marker
                .result
                .region
                .is_some_and(|region| self.bounds.contains(&region));

        let mut state = self.shared.lock();
        let previous = state.map.clone();
        let mut artifact = marker.result.artifact;
        match identified {
            Some((probe, outcome)) => {
                if previous.name.as_deref() != Some(probe.label()) {
                    info!(
                        "Map identified as {} ({:.2})",
                        probe.label(),
                        outcome.result.confidence
                    );
                }
                state.map.name = Some(probe.label().to_string());
                state.map.confidence = outcome.result.confidence;
                artifact = outcome.result.artifact.or(artifact);
            }
            None => debug!("No map match in frame {}", frame.sequence()),
        }
        if previous.in_bounds != in_bounds {
            debug!("Marker in bounds: {}", in_bounds);
        }
        state.map.in_bounds = in_bounds;
        if let Some(artifact) = artifact {
            state.store_artifact(ArtifactSlot::Map, artifact);
        }
        state.map.clone()
    }
}

#[async_trait]
impl Worker for MapWorker {
    fn name(&self) -> &'static str {
        "map"
    }

    async fn run(&mut self, cancel: CancellationToken) -> Result<(), WorkerError> {
        loop {
            ensure_running(&cancel)?;
            match self.signal.next_frame(&cancel).await? {
                Some(frame) if !frame.is_empty() => {
                    self.observe(&frame);
                    drop(frame);
                    sleep_or_cancel(&cancel, self.timing.identify_interval()).await?;
                }
                _ => sleep_or_cancel(&cancel, self.timing.idle_backoff()).await?,
            }
        }
    }
}
