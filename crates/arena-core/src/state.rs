//! Symbolic screen states

use serde::{Deserialize, Serialize};
use std::fmt;

/// What the device is currently showing, as far as the mode region tells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenState {
    Home,
    Main,
    Outside,
    Select,
    InGame,
    Clearing,
    Win,
    Lose,
    Loading,
    Intermediate,
    Prepare,
    Unknown,
}

impl ScreenState {
    pub const ALL: [ScreenState; 12] = [
        ScreenState::Home,
        ScreenState::Main,
        ScreenState::Outside,
        ScreenState::Select,
        ScreenState::InGame,
        ScreenState::Clearing,
        ScreenState::Win,
        ScreenState::Lose,
        ScreenState::Loading,
        ScreenState::Intermediate,
        ScreenState::Prepare,
        ScreenState::Unknown,
    ];

    /// Map a mode-template label to a state.
    ///
    /// Numbered variants (`ingame3`, `clearing2`) collapse onto their base
    /// state; anything unrecognised is `Unknown`.
    pub fn from_label(label: &str) -> Self {
        let base = label
            .trim()
            .trim_end_matches(|c: char| c.is_ascii_digit())
            .to_ascii_lowercase();

        match base.as_str() {
            "home" => ScreenState::Home,
            "main" => ScreenState::Main,
            "outside" => ScreenState::Outside,
            "select" => ScreenState::Select,
            "ingame" => ScreenState::InGame,
            "clearing" => ScreenState::Clearing,
            "win" => ScreenState::Win,
            "lose" => ScreenState::Lose,
            "loading" => ScreenState::Loading,
            "interm" | "intermediate" => ScreenState::Intermediate,
            "prepare" => ScreenState::Prepare,
            _ => ScreenState::Unknown,
        }
    }

    /// Win or lose: the round is over and its result is on screen.
    pub fn is_result(&self) -> bool {
        matches!(self, ScreenState::Win | ScreenState::Lose)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScreenState::Home => "home",
            ScreenState::Main => "main",
            ScreenState::Outside => "outside",
            ScreenState::Select => "select",
            ScreenState::InGame => "ingame",
            ScreenState::Clearing => "clearing",
            ScreenState::Win => "win",
            ScreenState::Lose => "lose",
            ScreenState::Loading => "loading",
            ScreenState::Intermediate => "intermediate",
            ScreenState::Prepare => "prepare",
            ScreenState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ScreenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
