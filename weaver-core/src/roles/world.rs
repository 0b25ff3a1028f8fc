//! World specialist.
//!
//! Handles geography and the physical scene: creating and connecting
//! locations, moving the player, placing and picking up items.

use super::{Role, RoleKind};
use crate::prompts;
use crate::state::GameState;
use crate::tools::RoleTools;

pub struct WorldRole;

const TRIGGERS: &[&str] = &[
    "go",
    "walk",
    "move",
    "travel",
    "enter",
    "leave",
    "climb",
    "north",
    "south",
    "east",
    "west",
    "up",
    "down",
    "look",
    "examine",
    "inspect",
    "search",
    "explore",
    "open",
    "take",
    "grab",
    "pick up",
];

impl Role for WorldRole {
    fn kind(&self) -> RoleKind {
        RoleKind::World
    }

    fn triggers(&self) -> &'static [&'static str] {
        TRIGGERS
    }

    fn tools(&self) -> Vec<claude::Tool> {
        RoleTools::world()
    }

    fn system_prompt(&self, state: &GameState) -> String {
        prompts::world_prompt(state)
    }

    fn fallback_line(&self, state: &GameState) -> String {
        match state.current_location() {
            Some((_, location)) => format!(
                "The air shifts over {}, but the scene stays as it was.",
                location.name
            ),
            None => "The world is still taking shape.".to_string(),
        }
    }
}
