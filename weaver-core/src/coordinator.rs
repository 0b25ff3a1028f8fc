//! The coordinator.
//!
//! Inspects player input and decides, per turn, which specialist roles run
//! and in what order. System commands (`status`, `help`, `recap`) are
//! answered directly without delegation. Roles always run in the fixed
//! sequence World -> Character -> Story so later roles observe earlier
//! mutations.

use std::fmt::Write as _;

use crate::roles::{CharacterRole, Role, RoleKind, StoryRole, WorldRole};
use crate::state::GameState;

/// How a command should be handled this turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routing {
    /// Answered by the coordinator itself; no turn is consumed.
    Direct(String),
    /// Delegated to these roles, in invocation order. Never empty.
    Delegate(Vec<RoleKind>),
}

pub struct Coordinator {
    world: WorldRole,
    character: CharacterRole,
    story: StoryRole,
}

impl Coordinator {
    pub fn new() -> Self {
        Self {
            world: WorldRole,
            character: CharacterRole,
            story: StoryRole,
        }
    }

    pub fn role(&self, kind: RoleKind) -> &dyn Role {
        match kind {
            RoleKind::World => &self.world,
            RoleKind::Character => &self.character,
            RoleKind::Story => &self.story,
        }
    }

    /// Decide how to handle a command against the current state.
    pub fn route(&self, command: &str, state: &GameState) -> Routing {
        let trimmed = command.trim();
        match trimmed.to_lowercase().as_str() {
            "help" | "h" => return Routing::Direct(help_text()),
            "status" | "stats" => return Routing::Direct(status_text(state)),
            "recap" | "summary" => return Routing::Direct(recap_text(state)),
            _ => {}
        }

        let characters_present = !state.characters_present().is_empty();
        let mut kinds = Vec::new();

        if self.world.matches(trimmed) {
            kinds.push(RoleKind::World);
        }
        if self.character.matches(trimmed)
            || (characters_present && mentions_present_character(trimmed, state))
        {
            kinds.push(RoleKind::Character);
        }
        if self.story.matches(trimmed) {
            kinds.push(RoleKind::Story);
        }

        // NPC continuity: an ambiguous command never bypasses the people in
        // the room. With no one around it falls to the World role.
        if kinds.is_empty() {
            if characters_present {
                kinds.push(RoleKind::Character);
            } else {
                kinds.push(RoleKind::World);
            }
        }

        // The turn that reaches the limit always gets the Story role for the
        // concluding narrative.
        if state.turn().remaining() == 1 && !kinds.contains(&RoleKind::Story) {
            kinds.push(RoleKind::Story);
        }

        kinds.sort();
        Routing::Delegate(kinds)
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// True when the command names any character at the player's location.
fn mentions_present_character(command: &str, state: &GameState) -> bool {
    let lower = command.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    state.characters_present().iter().any(|(_, character)| {
        character
            .name
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|part| part.len() > 2)
            .any(|part| words.contains(&part))
    })
}

fn help_text() -> String {
    "Play by typing what you do in plain language: move (go north, enter the \
     tower), examine things (look around, take the lantern), talk to people \
     (ask the warden about the key), or make choices (I choose to help her).\n\
     System commands: status, recap, help, quit."
        .to_string()
}

fn status_text(state: &GameState) -> String {
    let mut out = String::new();
    let player = state.player();
    let turn = state.turn();

    let _ = writeln!(
        out,
        "Turn {} of {} ({} story).",
        turn.current(),
        turn.limit(),
        turn.phase().name()
    );
    match state.current_location() {
        Some((_, location)) => {
            let _ = writeln!(out, "{} is at {}.", player.name, location.name);
        }
        None => {
            let _ = writeln!(out, "{} is nowhere yet.", player.name);
        }
    }

    let present = state.characters_present();
    if !present.is_empty() {
        let names: Vec<&str> = present
            .iter()
            .map(|(_, c)| c.name.as_str())
            .collect();
        let _ = writeln!(out, "Here with you: {}.", names.join(", "));
    }

    if player.inventory.is_empty() {
        let _ = writeln!(out, "Carrying: nothing.");
    } else {
        let items: Vec<&str> = player.inventory.iter().map(String::as_str).collect();
        let _ = writeln!(out, "Carrying: {}.", items.join(", "));
    }
    let _ = write!(
        out,
        "Known places: {}. Choices made: {}.",
        state.location_count(),
        player.choices.len()
    );

    out
}

fn recap_text(state: &GameState) -> String {
    let tail = state.log_tail(10);
    if tail.is_empty() {
        return "Nothing has happened yet.".to_string();
    }
    let mut out = String::from("The story so far:\n");
    for event in tail {
        let _ = writeln!(out, "- [turn {}] {}", event.turn, event.text);
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Theme;

    fn empty_state() -> GameState {
        GameState::new("Robin", Theme::FantasyAdventure, 5)
    }

    fn state_with_npc() -> GameState {
        let mut state = empty_state();
        state.add_location("Glade", "Quiet.", Vec::new()).unwrap();
        state
            .add_character("Old Warden", "Gruff but fair.", "Glade")
            .unwrap();
        state
    }

    fn delegated(routing: Routing) -> Vec<RoleKind> {
        match routing {
            Routing::Delegate(kinds) => kinds,
            Routing::Direct(text) => panic!("expected delegation, got direct: {text}"),
        }
    }

    #[test]
    fn test_system_commands_answered_directly() {
        let coordinator = Coordinator::new();
        let state = state_with_npc();

        assert!(matches!(coordinator.route("help", &state), Routing::Direct(_)));
        assert!(matches!(coordinator.route("STATUS", &state), Routing::Direct(_)));
        assert!(matches!(coordinator.route("recap", &state), Routing::Direct(_)));
    }

    #[test]
    fn test_movement_routes_to_world() {
        let coordinator = Coordinator::new();
        let state = empty_state();
        assert_eq!(
            delegated(coordinator.route("go north", &state)),
            vec![RoleKind::World]
        );
    }

    #[test]
    fn test_dialogue_routes_to_character() {
        let coordinator = Coordinator::new();
        let state = state_with_npc();
        assert_eq!(
            delegated(coordinator.route("talk to the warden", &state)),
            vec![RoleKind::Character]
        );
    }

    #[test]
    fn test_choice_routes_to_story() {
        let coordinator = Coordinator::new();
        let state = empty_state();
        assert_eq!(
            delegated(coordinator.route("I choose the left path", &state)),
            vec![RoleKind::Story]
        );
    }

    #[test]
    fn test_ambiguous_with_npc_present_includes_character() {
        let coordinator = Coordinator::new();
        let state = state_with_npc();
        let kinds = delegated(coordinator.route("hum a quiet tune", &state));
        assert!(kinds.contains(&RoleKind::Character));
    }

    #[test]
    fn test_ambiguous_alone_defaults_to_world() {
        let coordinator = Coordinator::new();
        let mut state = empty_state();
        state.add_location("Glade", "Quiet.", Vec::new()).unwrap();
        assert_eq!(
            delegated(coordinator.route("hum a quiet tune", &state)),
            vec![RoleKind::World]
        );
    }

    #[test]
    fn test_naming_a_present_character_includes_character() {
        let coordinator = Coordinator::new();
        let state = state_with_npc();
        let kinds = delegated(coordinator.route("go find the Warden", &state));
        assert_eq!(kinds, vec![RoleKind::World, RoleKind::Character]);
    }

    #[test]
    fn test_roles_come_back_in_fixed_order() {
        let coordinator = Coordinator::new();
        let state = state_with_npc();
        let kinds = delegated(
            coordinator.route("walk over and ask the warden, I choose to trust him", &state),
        );
        assert_eq!(
            kinds,
            vec![RoleKind::World, RoleKind::Character, RoleKind::Story]
        );
    }

    #[test]
    fn test_final_turn_always_includes_story() {
        let coordinator = Coordinator::new();
        let mut state = empty_state();
        state.add_location("Glade", "Quiet.", Vec::new()).unwrap();
        for _ in 0..4 {
            state.advance_turn();
        }
        assert_eq!(state.turn().remaining(), 1);

        let kinds = delegated(coordinator.route("go north", &state));
        assert_eq!(kinds, vec![RoleKind::World, RoleKind::Story]);
    }
}
