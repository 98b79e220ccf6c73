use crate::combat::LivenessTracker;
use crate::common::Frame;
use crate::flow::FlowState;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;

/// The one lock every worker and the read facade go through. Never hold the
/// guard across an `.await`.
pub type SharedHandle = Arc<Mutex<SharedState>>;

pub fn shared(state: SharedState) -> SharedHandle {
    Arc::new(Mutex::new(state))
}

/// Debug artifact slots kept for the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactSlot {
    Map,
    Flow,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MapObservation {
    pub name: Option<String>,
    pub confidence: f32,
    pub in_bounds: bool,
}

/// Flags, timestamps and last observations shared by all workers.
///
/// Plain flags are public fields; the one-shot and paired values
/// (`should_purchase`, the saved auto-target value, debug artifacts) are only
/// reachable through methods so their contracts hold.
#[derive(Debug)]
pub struct SharedState {
    pub auto_target_enabled: bool,
    pub in_menu: bool,
    pub searching: bool,
    pub match_ready: bool,
    pub last_action_at: Option<Instant>,
    pub current_weapon: Option<String>,
    pub map: MapObservation,
    pub flow_state: FlowState,
    pub liveness: LivenessTracker,
    debug_artifacts: bool,
    should_purchase: bool,
    purchase_depth: u32,
    saved_auto_target: Option<bool>,
    map_artifact: Option<Frame>,
    flow_artifact: Option<Frame>,
}

impl SharedState {
    pub fn new(liveness: LivenessTracker, debug_artifacts: bool) -> Self {
        Self {
            auto_target_enabled: true,
            in_menu: false,
            searching: false,
            match_ready: false,
            last_action_at: None,
            current_weapon: None,
            map: MapObservation::default(),
            flow_state: FlowState::Unknown,
            liveness,
            debug_artifacts,
            should_purchase: false,
            purchase_depth: 0,
            saved_auto_target: None,
            map_artifact: None,
            flow_artifact: None,
        }
    }

    pub fn request_purchase(&mut self) {
        self.should_purchase = true;
    }

    pub fn purchase_requested(&self) -> bool {
        self.should_purchase
    }

    pub fn purchase_in_progress(&self) -> bool {
        self.purchase_depth > 0
    }

    pub fn saved_auto_target(&self) -> Option<bool> {
        self.saved_auto_target
    }

    /// Enters a purchase cycle: remembers auto-target on the outermost entry
    /// only, then forces it off.
    pub fn begin_purchase_cycle(&mut self) {
        if self.purchase_depth == 0 && self.saved_auto_target.is_none() {
            self.saved_auto_target = Some(self.auto_target_enabled);
        }
        self.purchase_depth += 1;
        self.auto_target_enabled = false;
    }

    /// Leaves a purchase cycle. The outermost exit restores auto-target
    /// (enabled when nothing was saved), clears the saved slot and the
    /// purchase request. Returns the restored value on that exit.
    pub fn end_purchase_cycle(&mut self) -> Option<bool> {
        self.purchase_depth = self.purchase_depth.saturating_sub(1);
        if self.purchase_depth > 0 {
            return None;
        }
        let restored = self.saved_auto_target.take().unwrap_or(true);
        self.auto_target_enabled = restored;
        self.should_purchase = false;
        Some(restored)
    }

    pub fn debug_artifacts(&self) -> bool {
        self.debug_artifacts
    }

    /// Turning debug output off drops whatever artifacts are held.
    pub fn set_debug_artifacts(&mut self, enabled: bool) {
        self.debug_artifacts = enabled;
        if !enabled {
            self.map_artifact = None;
            self.flow_artifact = None;
        }
    }

    /// Keeps `artifact` for the UI when debug output is on. The previous
    /// artifact in the slot is dropped first either way.
    pub fn store_artifact(&mut self, slot: ArtifactSlot, artifact: Frame) {
        let target = match slot {
            ArtifactSlot::Map => &mut self.map_artifact,
            ArtifactSlot::Flow => &mut self.flow_artifact,
        };
        *target = None;
        if self.debug_artifacts {
            *target = Some(artifact);
        }
    }

    pub fn artifact(&self, slot: ArtifactSlot) -> Option<Frame> {
        match slot {
            ArtifactSlot::Map => self.map_artifact.clone(),
            ArtifactSlot::Flow => self.flow_artifact.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_frame, test_state};

    #[test]
    fn purchase_cycle_restores_saved_value() {
        let mut state = test_state();
        state.auto_target_enabled = false;
        state.request_purchase();

        state.begin_purchase_cycle();
        assert!(!state.auto_target_enabled);
        assert_eq!(state.saved_auto_target(), Some(false));

        assert_eq!(state.end_purchase_cycle(), Some(false));
        assert!(!state.auto_target_enabled);
        assert_eq!(state.saved_auto_target(), None);
        assert!(!state.purchase_requested());
    }

    #[test]
    fn nested_entry_does_not_overwrite_saved_value() {
        let mut state = test_state();
        state.request_purchase();
        state.begin_purchase_cycle();
        // auto-target is now forced off; a nested entry must not save that.
        state.begin_purchase_cycle();
        assert_eq!(state.saved_auto_target(), Some(true));

        assert_eq!(state.end_purchase_cycle(), None);
        assert!(state.purchase_requested());
        assert!(!state.auto_target_enabled);

        assert_eq!(state.end_purchase_cycle(), Some(true));
        assert!(state.auto_target_enabled);
        assert!(!state.purchase_requested());
        assert!(!state.purchase_in_progress());
    }

    #[test]
    fn unbalanced_exit_restores_enabled() {
        let mut state = test_state();
        state.auto_target_enabled = false;
        assert_eq!(state.end_purchase_cycle(), Some(true));
        assert!(state.auto_target_enabled);
    }

    #[test]
    fn artifacts_only_kept_in_debug_mode() {
        let mut state = test_state();
        state.store_artifact(ArtifactSlot::Map, test_frame(1));
        assert!(state.artifact(ArtifactSlot::Map).is_none());

        state.set_debug_artifacts(true);
        state.store_artifact(ArtifactSlot::Map, test_frame(2));
        state.store_artifact(ArtifactSlot::Map, test_frame(3));
        assert_eq!(state.artifact(ArtifactSlot::Map).map(|f| f.sequence()), Some(3));
        assert!(state.artifact(ArtifactSlot::Flow).is_none());

        state.set_debug_artifacts(false);
        assert!(state.artifact(ArtifactSlot::Map).is_none());
    }

    #[test]
    fn overwritten_artifact_is_released() {
        let mut state = test_state();
        state.set_debug_artifacts(true);
        let first = test_frame(1);
        let weak = std::sync::Arc::downgrade(&crate::testing::frame_buffer(&first));
        state.store_artifact(ArtifactSlot::Flow, first);
        state.store_artifact(ArtifactSlot::Flow, test_frame(2));
        assert!(weak.upgrade().is_none());
    }
}
