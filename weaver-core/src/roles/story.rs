//! Story specialist.
//!
//! Directs plot progression and pacing: records story beats and player
//! choices, and writes the climax and epilogue when the turn limit arrives.

use super::{Role, RoleKind};
use crate::prompts;
use crate::state::GameState;
use crate::tools::RoleTools;

pub struct StoryRole;

const TRIGGERS: &[&str] = &[
    "choose", "choice", "decide", "accept", "refuse", "agree", "promise", "plan", "plot",
    "quest", "story", "remember",
];

impl Role for StoryRole {
    fn kind(&self) -> RoleKind {
        RoleKind::Story
    }

    fn triggers(&self) -> &'static [&'static str] {
        TRIGGERS
    }

    fn tools(&self) -> Vec<claude::Tool> {
        RoleTools::story()
    }

    fn system_prompt(&self, state: &GameState) -> String {
        prompts::story_prompt(state)
    }

    fn fallback_line(&self, _state: &GameState) -> String {
        "The story holds its breath; the moment passes.".to_string()
    }
}
