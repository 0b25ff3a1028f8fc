//! Prompt templates for the storyteller roles.
//!
//! Every prompt embeds a snapshot built from `GameState` read accessors, so
//! roles can only describe state that actually exists. The snapshot is the
//! single source of truth; the templates tell the model so, repeatedly.

use std::fmt::Write as _;

use crate::state::{GameState, StoryPhase};

/// Describe the player's immediate surroundings.
pub fn scene_snapshot(state: &GameState) -> String {
    let mut out = String::new();

    match state.current_location() {
        Some((key, location)) => {
            let _ = writeln!(out, "Current location: {} (key `{key}`)", location.name);
            let _ = writeln!(out, "{}", location.description);

            if location.exits.is_empty() {
                let _ = writeln!(out, "Exits: none yet.");
            } else {
                let exits: Vec<String> = location
                    .exits
                    .iter()
                    .map(|(direction, to)| format!("{direction} -> {to}"))
                    .collect();
                let _ = writeln!(out, "Exits: {}.", exits.join(", "));
            }

            if !location.items.is_empty() {
                let items: Vec<&str> = location.items.keys().map(String::as_str).collect();
                let _ = writeln!(out, "Items here: {}.", items.join(", "));
            }
        }
        None => {
            let _ = writeln!(out, "The world has no locations yet.");
        }
    }

    let present = state.characters_present();
    if present.is_empty() {
        let _ = writeln!(out, "No characters are present.");
    } else {
        let _ = writeln!(out, "Characters present:");
        for (_, character) in present {
            let _ = writeln!(out, "- {}: {}", character.name, character.persona);
            if let Some(line) = character.dialogue.last() {
                let _ = writeln!(out, "  last said: \"{line}\"");
            }
        }
    }

    let player = state.player();
    if player.inventory.is_empty() {
        let _ = writeln!(out, "{} carries nothing.", player.name);
    } else {
        let items: Vec<&str> = player.inventory.iter().map(String::as_str).collect();
        let _ = writeln!(out, "{} carries: {}.", player.name, items.join(", "));
    }

    out
}

/// Describe every known location and its connections.
pub fn world_overview(state: &GameState) -> String {
    let mut out = String::new();
    for (key, location) in state.locations() {
        let exits: Vec<String> = location
            .exits
            .iter()
            .map(|(direction, to)| format!("{direction} -> {to}"))
            .collect();
        let _ = writeln!(
            out,
            "- {} (key `{key}`): exits [{}]",
            location.name,
            exits.join(", ")
        );
    }
    if out.is_empty() {
        out.push_str("(no locations yet)\n");
    }
    out
}

/// Recent story log entries plus turn/pacing information.
pub fn story_snapshot(state: &GameState) -> String {
    let turn = state.turn();
    let mut out = format!(
        "Turn {} of {} ({} remaining). Story phase: {}.\n",
        turn.current(),
        turn.limit(),
        turn.remaining(),
        turn.phase().name()
    );

    let tail = state.log_tail(8);
    if !tail.is_empty() {
        out.push_str("Recent events:\n");
        for event in tail {
            let _ = writeln!(out, "- [turn {}] {}", event.turn, event.text);
        }
    }

    let choices = &state.player().choices;
    if !choices.is_empty() {
        let _ = writeln!(out, "Choices made so far: {}.", choices.join("; "));
    }

    out
}

fn shared_rules(state: &GameState) -> String {
    format!(
        r#"## Ground Rules
- This is a {theme} story. Lean on: {elements}. Avoid: {avoid}.
- The game state below is the single source of truth. Describe ONLY what it
  contains. Anything new must be created through a tool call first.
- Use tools for every state change. Never narrate a change you did not make
  with a tool.
- If a tool call is rejected, accept the rejection and narrate around it;
  never pretend it succeeded.
- Keep the narration to a few vivid sentences in present tense."#,
        theme = state.theme().name(),
        elements = state.theme().elements(),
        avoid = state.theme().avoid(),
    )
}

/// System prompt for the World role.
pub fn world_prompt(state: &GameState) -> String {
    format!(
        r#"You are the world builder for an interactive {theme} story. You manage
geography, atmosphere, and objects: creating locations, connecting them, and
moving {player} through them.

{rules}

## World
{overview}
## Scene
{scene}
## Story
{story}"#,
        theme = state.theme().name(),
        player = state.player().name,
        rules = shared_rules(state),
        overview = world_overview(state),
        scene = scene_snapshot(state),
        story = story_snapshot(state),
    )
}

/// System prompt for the Character role.
pub fn character_prompt(state: &GameState) -> String {
    format!(
        r#"You bring the characters of an interactive {theme} story to life. You
introduce people, move them around, and speak for them in their established
voice.

{rules}
- Only characters listed as present can speak. Record every spoken line with
  the record_dialogue tool.
- Stay true to each persona. Do not reveal what a character would not know.

## Scene
{scene}
## Story
{story}"#,
        theme = state.theme().name(),
        rules = shared_rules(state),
        scene = scene_snapshot(state),
        story = story_snapshot(state),
    )
}

/// System prompt for the Story role.
pub fn story_prompt(state: &GameState) -> String {
    let pacing = match state.turn().phase() {
        StoryPhase::Beginning => "Establish stakes and hooks; the adventure is just starting.",
        StoryPhase::Middle => "Complicate the situation; raise the tension.",
        StoryPhase::Late => "Draw the threads together; consequences arrive.",
        StoryPhase::Climax => {
            "This is the climax. Pay off the established threads and the player's choices."
        }
    };

    format!(
        r#"You direct the plot of an interactive {theme} story. You record story
beats and the player's meaningful choices, and you keep the pacing on track.

{rules}
- Record plot developments with advance_story and meaningful decisions with
  record_choice.
- Pacing: {pacing}

## Scene
{scene}
## Story
{story}"#,
        theme = state.theme().name(),
        rules = shared_rules(state),
        pacing = pacing,
        scene = scene_snapshot(state),
        story = story_snapshot(state),
    )
}

/// User instruction for turn 0: generate the starting world.
pub fn opening_instruction(state: &GameState) -> String {
    format!(
        "Begin a new {theme} adventure for {player}. Create the starting location \
         with create_location (it becomes where {player} starts), optionally one or \
         two connected places, and narrate an opening scene that ends with a hook.",
        theme = state.theme().name(),
        player = state.player().name,
    )
}

/// User instruction for the final interaction: render the epilogue.
pub fn epilogue_instruction(state: &GameState) -> String {
    let choices = if state.player().choices.is_empty() {
        "none recorded".to_string()
    } else {
        state.player().choices.join("; ")
    };
    format!(
        "The adventure is over after {turns} turns. Write a short epilogue that \
         resolves the story, reflecting the choices made ({choices}). Record the \
         resolution with advance_story.",
        turns = state.turn().current(),
        choices = choices,
    )
}

/// Corrective instruction sent after rejected or unrecognized tool calls.
pub fn corrective_instruction() -> &'static str {
    "One or more of your tool calls were invalid; their errors are attached. \
     Use only the tools you were given, with their documented arguments, and \
     refer to locations and characters exactly as named in the game state. \
     Respond again with corrected tool calls, or with narration alone if no \
     state change is needed."
}
