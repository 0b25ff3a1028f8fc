//! Character specialist.
//!
//! Introduces people, moves them around, and speaks for them in their
//! established voice. Always selected when someone is present and the
//! player's intent is ambiguous, so conversations never drop mid-thread.

use super::{Role, RoleKind};
use crate::prompts;
use crate::state::GameState;
use crate::tools::RoleTools;

pub struct CharacterRole;

const TRIGGERS: &[&str] = &[
    "talk", "speak", "say", "ask", "tell", "greet", "chat", "answer", "reply", "persuade",
    "whisper", "shout", "introduce",
];

impl Role for CharacterRole {
    fn kind(&self) -> RoleKind {
        RoleKind::Character
    }

    fn triggers(&self) -> &'static [&'static str] {
        TRIGGERS
    }

    fn tools(&self) -> Vec<claude::Tool> {
        RoleTools::character()
    }

    fn system_prompt(&self, state: &GameState) -> String {
        prompts::character_prompt(state)
    }

    fn fallback_line(&self, state: &GameState) -> String {
        match state.characters_present().first() {
            Some((_, character)) => format!(
                "{} regards {} in silence.",
                character.name,
                state.player().name
            ),
            None => "There is no one here to answer.".to_string(),
        }
    }
}
