use super::shared::{ArtifactSlot, MapObservation, SharedHandle};
use crate::common::Frame;
use crate::flow::FlowState;
use serde::Serialize;
use tokio::time::Instant;
use tracing::info;

/// Copy of shared state taken under one lock acquisition. Timestamps are
/// expressed as milliseconds elapsed at snapshot time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub auto_target_enabled: bool,
    pub debug_artifacts: bool,
    pub in_menu: bool,
    pub searching: bool,
    pub match_ready: bool,
    pub should_purchase: bool,
    pub purchase_in_progress: bool,
    pub flow_state: FlowState,
    pub current_weapon: Option<String>,
    pub map: MapObservation,
    pub is_dead: bool,
    pub in_combat: bool,
    pub since_death_ms: Option<u64>,
    pub since_last_target_ms: Option<u64>,
    pub since_respawn_ms: Option<u64>,
    pub since_last_action_ms: Option<u64>,
}

/// Lock-respecting accessors for a UI. Never hands out the guard itself.
#[derive(Clone)]
pub struct StateReader {
    shared: SharedHandle,
}

impl StateReader {
    pub fn new(shared: SharedHandle) -> Self {
        Self { shared }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let now = Instant::now();
        let since = |at: Option<Instant>| {
            at.map(|at| now.saturating_duration_since(at).as_millis() as u64)
        };
        let state = self.shared.lock();
        let liveness = state.liveness.state();
        StateSnapshot {
            auto_target_enabled: state.auto_target_enabled,
            debug_artifacts: state.debug_artifacts(),
            in_menu: state.in_menu,
            searching: state.searching,
            match_ready: state.match_ready,
            should_purchase: state.purchase_requested(),
            purchase_in_progress: state.purchase_in_progress(),
            flow_state: state.flow_state,
            current_weapon: state.current_weapon.clone(),
            map: state.map.clone(),
            is_dead: liveness.is_dead,
            in_combat: liveness.in_combat,
            since_death_ms: since(liveness.death_timestamp),
            since_last_target_ms: since(liveness.last_target_seen),
            since_respawn_ms: since(liveness.last_respawn),
            since_last_action_ms: since(state.last_action_at),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.snapshot())
    }

    /// A purchase cycle in progress restores its own saved value when it
    /// ends, so a toggle made mid-cycle only lasts until then.
    pub fn set_auto_target(&self, enabled: bool) {
        self.shared.lock().auto_target_enabled = enabled;
        info!("Auto-target {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn set_debug(&self, enabled: bool) {
        self.shared.lock().set_debug_artifacts(enabled);
        info!("Debug artifacts {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn artifact(&self, slot: ArtifactSlot) -> Option<Frame> {
        self.shared.lock().artifact(slot)
    }
}
