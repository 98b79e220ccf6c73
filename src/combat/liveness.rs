use std::time::Duration;
use tokio::time::Instant;

/// Alive/dead and in-combat tracking for the controlled entity.
///
/// Death is signalled by a classifier; coming back to life is purely a
/// function of time since the recorded death. `in_combat` has hysteresis: it
/// turns on with the first observed target and off only once no target has
/// been seen for longer than the grace period.
#[derive(Debug, Clone)]
pub struct LivenessTracker {
    death_duration: Duration,
    combat_grace: Duration,
    dead_since: Option<Instant>,
    last_target_seen: Option<Instant>,
    last_respawn: Option<Instant>,
    in_combat: bool,
    just_respawned: bool,
}

/// Point-in-time copy of the tracker, safe to hand out after the lock is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessState {
    pub is_dead: bool,
    pub death_timestamp: Option<Instant>,
    pub last_target_seen: Option<Instant>,
    pub last_respawn: Option<Instant>,
    pub in_combat: bool,
    pub just_respawned: bool,
}

impl LivenessTracker {
    pub fn new(death_duration: Duration, combat_grace: Duration) -> Self {
        Self {
            death_duration,
            combat_grace,
            dead_since: None,
            last_target_seen: None,
            last_respawn: None,
            in_combat: false,
            just_respawned: false,
        }
    }

    /// Records a death at `now`. Returns `false` (and keeps the original
    /// timestamp) when already dead.
    pub fn mark_dead(&mut self, now: Instant) -> bool {
        if self.dead_since.is_some() {
            return false;
        }
        self.dead_since = Some(now);
        true
    }

    /// Advances time-driven transitions: respawn once the death duration has
    /// elapsed, and combat exit after the grace period.
    pub fn update(&mut self, now: Instant) -> LivenessState {
        if let Some(died_at) = self.dead_since {
            if now.saturating_duration_since(died_at) >= self.death_duration {
                self.dead_since = None;
                self.last_respawn = Some(now);
                self.just_respawned = true;
            }
        }
        if self.in_combat {
            let quiet_for = self
                .last_target_seen
                .map(|seen| now.saturating_duration_since(seen))
                .unwrap_or(Duration::MAX);
            if quiet_for > self.combat_grace {
                self.in_combat = false;
            }
        }
        self.state()
    }

    pub fn observe_target(&mut self, now: Instant) {
        self.last_target_seen = Some(now);
        self.in_combat = true;
    }

    /// Reads and clears the respawn flag in one step.
    pub fn take_just_respawned(&mut self) -> bool {
        std::mem::take(&mut self.just_respawned)
    }

    pub fn is_dead(&self) -> bool {
        self.dead_since.is_some()
    }

    pub fn in_combat(&self) -> bool {
        self.in_combat
    }

    pub fn state(&self) -> LivenessState {
        LivenessState {
            is_dead: self.dead_since.is_some(),
            death_timestamp: self.dead_since,
            last_target_seen: self.last_target_seen,
            last_respawn: self.last_respawn,
            in_combat: self.in_combat,
            just_respawned: self.just_respawned,
        }
    }
}
