use crate::config::CooldownSettings;
use indexmap::IndexMap;
use std::time::Duration;
use tokio::time::Instant;

/// Per-weapon minimum spacing between two enqueued aim actions.
#[derive(Debug, Clone)]
pub struct CooldownGate {
    default: Duration,
    weapons: IndexMap<String, Duration>,
}

impl CooldownGate {
    pub fn new(default: Duration) -> Self {
        Self {
            default,
            weapons: IndexMap::new(),
        }
    }

    pub fn from_settings(settings: &CooldownSettings) -> Self {
        let mut gate = Self::new(Duration::from_millis(settings.default_ms));
        for (weapon, ms) in &settings.weapons {
            gate = gate.with_weapon(weapon.clone(), Duration::from_millis(*ms));
        }
        gate
    }

    pub fn with_weapon(mut self, weapon: impl Into<String>, cooldown: Duration) -> Self {
        self.weapons.insert(weapon.into().to_ascii_lowercase(), cooldown);
        self
    }

    /// Cooldown for `weapon`, or the default when it is unknown.
    pub fn cooldown_for(&self, weapon: Option<&str>) -> Duration {
        weapon
            .and_then(|name| self.weapons.get(&name.to_ascii_lowercase()))
            .copied()
            .unwrap_or(self.default)
    }

    /// Admits an action at `now` if the cooldown since `last_action` has
    /// passed, and records `now` as the new last action.
    pub fn try_acquire(
        &self,
        last_action: &mut Option<Instant>,
        weapon: Option<&str>,
        now: Instant,
    ) -> bool {
        let ready = match *last_action {
            Some(last) => now.saturating_duration_since(last) >= self.cooldown_for(weapon),
            None => true,
        };
        if ready {
            *last_action = Some(now);
        }
        ready
    }
}
