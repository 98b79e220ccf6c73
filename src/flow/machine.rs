use crate::common::Frame;
use crate::config::Thresholds;
use crate::vision::{Classifier, Probe};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Menu/matchmaking phase, derived fresh on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowState {
    InMenu,
    Searching,
    MatchReady,
    Disconnected,
    InTeamSelect,
    Unknown,
}

/// What the flow worker does this tick. Variants are listed in priority
/// order; the first applicable one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStep {
    DismissTeamSelect,
    MarkMatchReady,
    DismissDisconnect,
    LeaveMenu,
    AwaitMatchLoad,
    MarkSearching,
    StartSearch,
}

impl FlowStep {
    pub fn state(&self) -> FlowState {
        match self {
            FlowStep::DismissTeamSelect => FlowState::InTeamSelect,
            FlowStep::MarkMatchReady | FlowStep::AwaitMatchLoad => FlowState::MatchReady,
            FlowStep::DismissDisconnect => FlowState::Disconnected,
            FlowStep::LeaveMenu => FlowState::Unknown,
            FlowStep::MarkSearching => FlowState::Searching,
            FlowStep::StartSearch => FlowState::InMenu,
        }
    }
}

/// Result of checking the screen after the search macro.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchCheck {
    /// The cancel-search affordance is up: a search is running.
    Running,
    /// Start button and mode indicator are visible: one confirming click needed.
    NeedsConfirm,
    NotStarted,
}

/// Raw classifiers for every menu affordance the flow machine looks at.
#[derive(Clone)]
pub struct FlowClassifiers {
    pub team_select: Arc<dyn Classifier>,
    pub match_ready: Arc<dyn Classifier>,
    pub disconnected: Arc<dyn Classifier>,
    pub in_menu: Arc<dyn Classifier>,
    pub cancel_search: Arc<dyn Classifier>,
    pub start_button: Arc<dyn Classifier>,
    pub mode_indicator: Arc<dyn Classifier>,
}

#[derive(Debug, Clone)]
pub struct FlowProbes {
    team_select: Probe,
    match_ready: Probe,
    disconnected: Probe,
    in_menu: Probe,
    cancel_search: Probe,
    start_button: Probe,
    mode_indicator: Probe,
}

#[derive(Debug, Clone)]
pub struct FlowDecision {
    pub step: FlowStep,
    pub artifact: Option<Frame>,
}

impl FlowProbes {
    pub fn new(classifiers: FlowClassifiers, thresholds: &Thresholds) -> Self {
        Self {
            team_select: Probe::new("team_select", classifiers.team_select, thresholds.team_select),
            match_ready: Probe::new("match_ready", classifiers.match_ready, thresholds.match_ready),
            disconnected: Probe::new(
                "disconnected",
                classifiers.disconnected,
                thresholds.disconnected,
            ),
            in_menu: Probe::new("in_menu", classifiers.in_menu, thresholds.in_menu),
            cancel_search: Probe::new(
                "cancel_search",
                classifiers.cancel_search,
                thresholds.cancel_search,
            ),
            start_button: Probe::new(
                "start_button",
                classifiers.start_button,
                thresholds.start_button,
            ),
            mode_indicator: Probe::new(
                "mode_indicator",
                classifiers.mode_indicator,
                thresholds.mode_indicator,
            ),
        }
    }

    /// Walks the fixed priority list against `frame`. Checks below the first
    /// hit are never run. `awaiting_match` is the match-ready flag left by an
    /// earlier tick.
    pub fn decide(&self, frame: &Frame, awaiting_match: bool) -> FlowDecision {
        let screens = [
            (&self.team_select, FlowStep::DismissTeamSelect),
            (&self.match_ready, FlowStep::MarkMatchReady),
            (&self.disconnected, FlowStep::DismissDisconnect),
        ];
        for (probe, step) in screens {
            let outcome = probe.evaluate(frame);
            if outcome.matched {
                return FlowDecision {
                    step,
                    artifact: outcome.result.artifact,
                };
            }
        }

        let menu = self.in_menu.evaluate(frame);
        if !menu.matched {
            return FlowDecision {
                step: FlowStep::LeaveMenu,
                artifact: None,
            };
        }
        if awaiting_match {
            return FlowDecision {
                step: FlowStep::AwaitMatchLoad,
                artifact: menu.result.artifact,
            };
        }
        let cancel = self.cancel_search.evaluate(frame);
        let step = if cancel.matched {
            FlowStep::MarkSearching
        } else {
            FlowStep::StartSearch
        };
        FlowDecision {
            step,
            artifact: cancel.result.artifact.or(menu.result.artifact),
        }
    }

    pub fn check_search(&self, frame: &Frame) -> SearchCheck {
        if self.cancel_search.matches(frame) {
            SearchCheck::Running
        } else if self.start_button.matches(frame) && self.mode_indicator.matches(frame) {
            SearchCheck::NeedsConfirm
        } else {
            SearchCheck::NotStarted
        }
    }

    pub fn search_running(&self, frame: &Frame) -> bool {
        self.cancel_search.matches(frame)
    }
}
