//! UI state classification.
//!
//! Each concrete state owns one template and an optional search region.
//! Probes run in priority order and the first match wins, so overlay
//! states (a dialog on top of the game view) must be listed before the
//! states they can cover.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::vision::matcher::{match_template, MatchResult, Template};
use crate::vision::region::{Region, WindowRect};
use crate::vision::Screenshot;

/// Which screen the game client is showing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameState {
    InGame,
    Dialog,
    Inventory,
    CharacterMenu,
    Unknown,
}

impl GameState {
    /// The states that have a template. `Unknown` is what's left.
    pub const CONCRETE: [GameState; 4] = [
        GameState::InGame,
        GameState::Dialog,
        GameState::Inventory,
        GameState::CharacterMenu,
    ];

    /// Overlays before base states.
    pub const DEFAULT_PRIORITY: [GameState; 4] = [
        GameState::Dialog,
        GameState::Inventory,
        GameState::CharacterMenu,
        GameState::InGame,
    ];
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameState::InGame => write!(f, "InGame"),
            GameState::Dialog => write!(f, "Dialog"),
            GameState::Inventory => write!(f, "Inventory"),
            GameState::CharacterMenu => write!(f, "CharacterMenu"),
            GameState::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A template bound to the state it identifies.
#[derive(Clone, Debug)]
pub struct StateProbe {
    pub state: GameState,
    pub template: Template,
    /// Where to look. The whole screenshot when `None`.
    pub search: Option<Region>,
}

impl StateProbe {
    /// Runs this probe. A search region that doesn't fit the screenshot
    /// counts as "not matched" rather than an error: the layout is wrong,
    /// which is exactly what a failed probe means.
    pub fn run(&self, screenshot: &Screenshot, window: Option<&WindowRect>) -> MatchResult {
        let search = match &self.search {
            Some(region) => match region.resolve(screenshot.width(), screenshot.height(), window) {
                Ok(rect) => Some(rect),
                Err(e) => {
                    debug!("{} search region unusable: {}", self.state, e);
                    return MatchResult {
                        template: self.template.name.clone(),
                        location: (0, 0),
                        size: self.template.image.dimensions(),
                        confidence: 0.0,
                        matched: false,
                    };
                }
            },
            None => None,
        };
        match_template(&screenshot.image, &self.template, search.as_ref())
    }
}

/// Result of classifying one screenshot, with the probes that ran.
#[derive(Clone, Debug)]
pub struct Classification {
    pub state: GameState,
    pub matches: Vec<MatchResult>,
}

#[derive(Clone, Debug)]
pub struct StateClassifier {
    probes: Vec<StateProbe>,
}

impl StateClassifier {
    /// Orders `probes` by `priority`.
    ///
    /// `priority` must list each concrete state exactly once and every
    /// listed state needs a probe.
    pub fn new(probes: Vec<StateProbe>, priority: &[GameState]) -> Result<Self, ConfigError> {
        validate_priority(priority)?;

        let mut ordered = Vec::with_capacity(priority.len());
        for state in priority {
            let probe = probes
                .iter()
                .find(|p| p.state == *state)
                .ok_or_else(|| {
                    ConfigError::invalid("templates", format!("no template configured for {}", state))
                })?;
            ordered.push(probe.clone());
        }

        Ok(Self { probes: ordered })
    }

    pub fn classify(&self, screenshot: &Screenshot, window: Option<&WindowRect>) -> GameState {
        self.classify_detailed(screenshot, window).state
    }

    /// Classifies, stopping at the first match.
    pub fn classify_detailed(
        &self,
        screenshot: &Screenshot,
        window: Option<&WindowRect>,
    ) -> Classification {
        let mut matches = Vec::new();
        for probe in &self.probes {
            let result = probe.run(screenshot, window);
            debug!(
                "Probe {}: confidence={:.3} matched={}",
                probe.state, result.confidence, result.matched
            );
            let matched = result.matched;
            matches.push(result);
            if matched {
                return Classification {
                    state: probe.state,
                    matches,
                };
            }
        }
        Classification {
            state: GameState::Unknown,
            matches,
        }
    }

    /// Runs only the probe for `state`.
    pub fn probe(
        &self,
        state: GameState,
        screenshot: &Screenshot,
        window: Option<&WindowRect>,
    ) -> Option<MatchResult> {
        self.probes
            .iter()
            .find(|p| p.state == state)
            .map(|p| p.run(screenshot, window))
    }

    pub fn priority(&self) -> Vec<GameState> {
        self.probes.iter().map(|p| p.state).collect()
    }
}

/// Checks that `priority` is a permutation of the concrete states.
pub fn validate_priority(priority: &[GameState]) -> Result<(), ConfigError> {
    if priority.contains(&GameState::Unknown) {
        return Err(ConfigError::invalid(
            "classifier_priority",
            "Unknown is the fallback and cannot be prioritised",
        ));
    }
    for state in GameState::CONCRETE {
        let count = priority.iter().filter(|s| **s == state).count();
        if count != 1 {
            return Err(ConfigError::invalid(
                "classifier_priority",
                format!("{} must appear exactly once (found {})", state, count),
            ));
        }
    }
    Ok(())
}
