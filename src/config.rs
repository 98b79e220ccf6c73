use crate::common::{Region, RelativePoint, Size};
use crate::error::BotError;
use config::{Config, Environment, File};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "AUTOPLAY";

/// Everything the core treats as opaque input: thresholds, cooldowns, click
/// positions and timing constants. Loaded once before the orchestrator is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log_level: String,
    pub debug_artifacts: bool,
    pub window: WindowSettings,
    pub capture: CaptureSettings,
    pub timing: TimingSettings,
    pub thresholds: Thresholds,
    pub cooldowns: CooldownSettings,
    pub clicks: ClickSettings,
    pub aim: AimSettings,
    pub purchase: PurchaseSettings,
    pub map: MapSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            debug_artifacts: false,
            window: WindowSettings::default(),
            capture: CaptureSettings::default(),
            timing: TimingSettings::default(),
            thresholds: Thresholds::default(),
            cooldowns: CooldownSettings::default(),
            clicks: ClickSettings::default(),
            aim: AimSettings::default(),
            purchase: PurchaseSettings::default(),
            map: MapSettings::default(),
        }
    }
}

impl Settings {
    /// Layers defaults, an optional settings file and `AUTOPLAY__*` environment
    /// variables, in that order.
    pub fn load(path: Option<&Path>) -> Result<Self, BotError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let settings: Settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), BotError> {
        for (name, value) in self.thresholds.named() {
            if !(0.0..=1.0).contains(&value) {
                return Err(BotError::InvalidConfig(format!(
                    "threshold '{}' must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.purchase.min_map_confidence) {
            return Err(BotError::InvalidConfig(
                "purchase.min_map_confidence must be within [0, 1]".to_string(),
            ));
        }
        for (name, value) in self.named_durations() {
            if value == 0 {
                return Err(BotError::InvalidConfig(format!("{} must be positive", name)));
            }
        }
        if self.aim.model_input.width == 0 || self.aim.model_input.height == 0 {
            return Err(BotError::InvalidConfig(
                "aim.model_input must have a non-zero size".to_string(),
            ));
        }
        if self.window.title.trim().is_empty() {
            return Err(BotError::InvalidConfig(
                "window.title must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Every pacing and timing value, in milliseconds. None may be zero.
    fn named_durations(&self) -> [(&'static str, u64); 15] {
        let timing = &self.timing;
        [
            ("timing.death_duration_ms", timing.death_duration_ms),
            ("timing.combat_grace_ms", timing.combat_grace_ms),
            ("timing.idle_backoff_ms", timing.idle_backoff_ms),
            ("timing.stop_timeout_ms", timing.stop_timeout_ms),
            ("timing.flow_interval_ms", timing.flow_interval_ms),
            ("timing.purchase_poll_ms", timing.purchase_poll_ms),
            ("timing.precondition_timeout_ms", timing.precondition_timeout_ms),
            ("timing.search_click_delay_ms", timing.search_click_delay_ms),
            ("timing.search_settle_ms", timing.search_settle_ms),
            ("timing.identify_interval_ms", timing.identify_interval_ms),
            ("capture.frame_interval_ms", self.capture.frame_interval_ms),
            ("aim.settle_ms", self.aim.settle_ms),
            ("aim.max_action_age_ms", self.aim.max_action_age_ms),
            ("purchase.step_delay_ms", self.purchase.step_delay_ms),
            ("cooldowns.default_ms", self.cooldowns.default_ms),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub title: String,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "Game".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub replay_dir: Option<PathBuf>,
    pub frame_interval_ms: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            replay_dir: None,
            frame_interval_ms: 16,
        }
    }
}

impl CaptureSettings {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    pub death_duration_ms: u64,
    pub combat_grace_ms: u64,
    pub idle_backoff_ms: u64,
    pub stop_timeout_ms: u64,
    pub flow_interval_ms: u64,
    pub purchase_poll_ms: u64,
    pub precondition_timeout_ms: u64,
    pub search_click_delay_ms: u64,
    pub search_settle_ms: u64,
    pub identify_interval_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            death_duration_ms: 3_000,
            combat_grace_ms: 1_500,
            idle_backoff_ms: 25,
            stop_timeout_ms: 5_000,
            flow_interval_ms: 500,
            purchase_poll_ms: 100,
            precondition_timeout_ms: 15_000,
            search_click_delay_ms: 400,
            search_settle_ms: 800,
            identify_interval_ms: 250,
        }
    }
}

impl TimingSettings {
    pub fn death_duration(&self) -> Duration {
        Duration::from_millis(self.death_duration_ms)
    }

    pub fn combat_grace(&self) -> Duration {
        Duration::from_millis(self.combat_grace_ms)
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn flow_interval(&self) -> Duration {
        Duration::from_millis(self.flow_interval_ms)
    }

    pub fn purchase_poll(&self) -> Duration {
        Duration::from_millis(self.purchase_poll_ms)
    }

    pub fn precondition_timeout(&self) -> Duration {
        Duration::from_millis(self.precondition_timeout_ms)
    }

    pub fn search_click_delay(&self) -> Duration {
        Duration::from_millis(self.search_click_delay_ms)
    }

    pub fn search_settle(&self) -> Duration {
        Duration::from_millis(self.search_settle_ms)
    }

    pub fn identify_interval(&self) -> Duration {
        Duration::from_millis(self.identify_interval_ms)
    }
}

/// Match thresholds, one per probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub team_select: f32,
    pub match_ready: f32,
    pub disconnected: f32,
    pub in_menu: f32,
    pub cancel_search: f32,
    pub start_button: f32,
    pub mode_indicator: f32,
    pub death_marker: f32,
    pub weapon: f32,
    pub map: f32,
    pub map_marker: f32,
    pub target: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            team_select: 0.8,
            match_ready: 0.8,
            disconnected: 0.8,
            in_menu: 0.8,
            cancel_search: 0.8,
            start_button: 0.8,
            mode_indicator: 0.8,
            death_marker: 0.75,
            weapon: 0.7,
            map: 0.7,
            map_marker: 0.6,
            target: 0.5,
        }
    }
}

impl Thresholds {
    fn named(&self) -> [(&'static str, f32); 12] {
        [
            ("team_select", self.team_select),
            ("match_ready", self.match_ready),
            ("disconnected", self.disconnected),
            ("in_menu", self.in_menu),
            ("cancel_search", self.cancel_search),
            ("start_button", self.start_button),
            ("mode_indicator", self.mode_indicator),
            ("death_marker", self.death_marker),
            ("weapon", self.weapon),
            ("map", self.map),
            ("map_marker", self.map_marker),
            ("target", self.target),
        ]
    }
}

/// Per-weapon minimum interval between two aim actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownSettings {
    pub default_ms: u64,
    pub weapons: IndexMap<String, u64>,
}

impl Default for CooldownSettings {
    fn default() -> Self {
        let mut weapons = IndexMap::new();
        weapons.insert("rifle".to_string(), 170);
        weapons.insert("smg".to_string(), 120);
        weapons.insert("pistol".to_string(), 400);
        weapons.insert("sniper".to_string(), 1_500);
        Self {
            default_ms: 250,
            weapons,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickSettings {
    pub team_select_dismiss: RelativePoint,
    pub disconnect_dismiss: RelativePoint,
    pub search_sequence: Vec<RelativePoint>,
    pub search_confirm: RelativePoint,
}

impl Default for ClickSettings {
    fn default() -> Self {
        Self {
            team_select_dismiss: RelativePoint::new(0.5, 0.92),
            disconnect_dismiss: RelativePoint::new(0.5, 0.58),
            search_sequence: vec![
                RelativePoint::new(0.5, 0.04),
                RelativePoint::new(0.42, 0.1),
                RelativePoint::new(0.5, 0.9),
            ],
            search_confirm: RelativePoint::new(0.5, 0.9),
        }
    }
}

/// Fractions of the target box size added to the box centre before aiming.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AimOffset {
    pub dx: f32,
    pub dy: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AimSettings {
    pub model_input: Size,
    pub head_offset: AimOffset,
    pub body_offset: AimOffset,
    pub settle_ms: u64,
    pub max_action_age_ms: u64,
}

impl Default for AimSettings {
    fn default() -> Self {
        Self {
            model_input: Size::new(640, 640),
            head_offset: AimOffset { dx: 0.0, dy: 0.1 },
            body_offset: AimOffset { dx: 0.0, dy: -0.3 },
            settle_ms: 15,
            max_action_age_ms: 150,
        }
    }
}

impl AimSettings {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn max_action_age(&self) -> Duration {
        Duration::from_millis(self.max_action_age_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PurchaseSettings {
    pub min_map_confidence: f32,
    pub open_key: String,
    pub close_key: String,
    pub item_clicks: Vec<RelativePoint>,
    pub step_delay_ms: u64,
}

impl Default for PurchaseSettings {
    fn default() -> Self {
        Self {
            min_map_confidence: 0.9,
            open_key: "b".to_string(),
            close_key: "b".to_string(),
            item_clicks: vec![RelativePoint::new(0.63, 0.38)],
            step_delay_ms: 120,
        }
    }
}

impl PurchaseSettings {
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapSettings {
    /// Area of the frame (the minimap) the tracked marker must stay inside.
    pub bounds: Region,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            bounds: Region::new(0, 0, 420, 420),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.timing.stop_timeout(), Duration::from_secs(5));
        assert_eq!(settings.cooldowns.weapons.get("rifle"), Some(&170));
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let mut settings = Settings::default();
        settings.thresholds.match_ready = 1.5;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("match_ready"));
    }

    #[test]
    fn zero_death_duration_is_rejected() {
        let mut settings = Settings::default();
        settings.timing.death_duration_ms = 0;
        assert!(matches!(
            settings.validate(),
            Err(BotError::InvalidConfig(_))
        ));
    }

    #[test]
    fn every_zero_duration_is_rejected() {
        let zeroings: [(&str, fn(&mut Settings)); 15] = [
            ("timing.death_duration_ms", |s| s.timing.death_duration_ms = 0),
            ("timing.combat_grace_ms", |s| s.timing.combat_grace_ms = 0),
            ("timing.idle_backoff_ms", |s| s.timing.idle_backoff_ms = 0),
            ("timing.stop_timeout_ms", |s| s.timing.stop_timeout_ms = 0),
            ("timing.flow_interval_ms", |s| s.timing.flow_interval_ms = 0),
            ("timing.purchase_poll_ms", |s| s.timing.purchase_poll_ms = 0),
            ("timing.precondition_timeout_ms", |s| s.timing.precondition_timeout_ms = 0),
            ("timing.search_click_delay_ms", |s| s.timing.search_click_delay_ms = 0),
            ("timing.search_settle_ms", |s| s.timing.search_settle_ms = 0),
            ("timing.identify_interval_ms", |s| s.timing.identify_interval_ms = 0),
            ("capture.frame_interval_ms", |s| s.capture.frame_interval_ms = 0),
            ("aim.settle_ms", |s| s.aim.settle_ms = 0),
            ("aim.max_action_age_ms", |s| s.aim.max_action_age_ms = 0),
            ("purchase.step_delay_ms", |s| s.purchase.step_delay_ms = 0),
            ("cooldowns.default_ms", |s| s.cooldowns.default_ms = 0),
        ];
        for (name, zero) in zeroings {
            let mut settings = Settings::default();
            zero(&mut settings);
            match settings.validate() {
                Err(BotError::InvalidConfig(message)) => {
                    assert!(message.contains(name), "{}: {}", name, message)
                }
                other => panic!("{} = 0 was accepted: {:?}", name, other),
            }
        }
    }

    #[test]
    fn several_zero_pacing_values_are_rejected() {
        let mut settings = Settings::default();
        settings.timing.purchase_poll_ms = 0;
        settings.timing.idle_backoff_ms = 0;
        settings.timing.flow_interval_ms = 0;
        settings.capture.frame_interval_ms = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let settings: Settings = Config::builder()
            .add_source(config::File::from_str(
                r#"{ "debug_artifacts": true, "cooldowns": { "default_ms": 90 } }"#,
                config::FileFormat::Json,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert!(settings.debug_artifacts);
        assert_eq!(settings.cooldowns.default_ms, 90);
        assert_eq!(settings.timing.death_duration_ms, 3_000);
        assert_eq!(settings.window.title, "Game");
    }
}
