//! Scenario tests for the turn loop, driven by the scripted model.
//!
//! These cover the end-to-end contracts: one turn per accepted command, the
//! climax/epilogue transitions at the turn limit, and graceful degradation
//! when tool calls are rejected.

use std::sync::Arc;

use serde_json::json;
use weaver_core::{
    GameSession, ScriptedModel, SessionConfig, StateError, Theme, TurnPhase,
};

fn config() -> SessionConfig {
    SessionConfig::new()
        .with_player_name("Robin")
        .with_theme(Theme::FantasyAdventure)
        .with_turn_limit(5)
}

fn session_with(model: Arc<ScriptedModel>) -> GameSession {
    GameSession::with_model(model, config())
}

/// Script a world-generation response that creates one starting location.
fn opening_response() -> claude::Response {
    ScriptedModel::tool_response(
        "Mist hangs over the glade as your story begins.",
        vec![(
            "create_location",
            json!({"name": "Moonlit Glade", "description": "Silver light on old stones."}),
        )],
    )
}

#[tokio::test]
async fn test_full_game_reaches_climax_then_ends() {
    let model = Arc::new(ScriptedModel::new(vec![opening_response()]));
    let mut session = session_with(model.clone());

    let opening = session.begin().await.unwrap();
    assert_eq!(opening.phase, TurnPhase::WorldGenerated);
    assert_eq!(opening.turn, 0);
    assert_eq!(session.state().location_count(), 1);

    // Four ordinary turns, World role only.
    for expected in 1..=4 {
        model.queue(ScriptedModel::text_response("You take in the scene."));
        let response = session.command("look around").await;
        assert_eq!(response.turn, expected);
        assert_eq!(response.phase, TurnPhase::InProgress { turn: expected });
    }

    // The fifth command reaches the limit: World plus the forced Story role.
    model.queue(ScriptedModel::text_response("The glade falls silent."));
    model.queue(ScriptedModel::text_response(
        "Every thread you pulled now draws tight.",
    ));
    let climax = session.command("look around").await;
    assert_eq!(climax.turn, 5);
    assert_eq!(climax.phase, TurnPhase::Climax);
    assert!(climax.narrative.contains("draws tight"));

    // The next interaction renders the epilogue and ends the session.
    model.queue(ScriptedModel::text_response("And so the story closes."));
    let epilogue = session.command("what happens to me?").await;
    assert_eq!(epilogue.phase, TurnPhase::Ended);
    assert_eq!(epilogue.turn, 5);
    assert!(epilogue.narrative.contains("story closes"));
    assert!(epilogue.narrative.contains("Robin"));
    assert!(session.is_over());

    // Ended: no further commands reach the model, nothing mutates.
    let calls = model.calls();
    let after = session.command("go north").await;
    assert_eq!(after.phase, TurnPhase::Ended);
    assert!(after.effects.is_empty());
    assert_eq!(model.calls(), calls);

    session.state().check_invariants().unwrap();
}

#[tokio::test]
async fn test_turn_advances_once_despite_multiple_roles() {
    let model = Arc::new(ScriptedModel::new(vec![opening_response()]));
    let mut session = session_with(model.clone());
    session.begin().await.unwrap();

    // Seed a character so the Character role has someone to voice.
    model.queue(ScriptedModel::tool_response(
        "A warden steps out of the trees.",
        vec![(
            "add_character",
            json!({"name": "Old Warden", "persona": "Gruff but fair.", "location": "Moonlit Glade"}),
        )],
    ));
    let response = session.command("talk to whoever is here").await;
    assert_eq!(response.turn, 1);

    // One command that routes to World, Character, and Story.
    model.queue(ScriptedModel::text_response("You cross the clearing."));
    model.queue(ScriptedModel::tool_response(
        "\"Mind the roots,\" the warden mutters.",
        vec![(
            "record_dialogue",
            json!({"character": "Old Warden", "line": "Mind the roots."}),
        )],
    ));
    model.queue(ScriptedModel::tool_response(
        "A promise is made.",
        vec![("record_choice", json!({"choice": "trust the warden"}))],
    ));

    let response = session
        .command("walk over and ask the Warden, I choose to trust him")
        .await;

    assert_eq!(response.turn, 2, "three roles, one turn");
    assert_eq!(response.phase, TurnPhase::InProgress { turn: 2 });
    assert_eq!(response.effects.len(), 2);
    assert!(response.narrative.contains("Mind the roots"));
    assert_eq!(session.state().player().choices, vec!["trust the warden"]);
    session.state().check_invariants().unwrap();
}

#[tokio::test]
async fn test_roles_run_sequentially_and_see_earlier_mutations() {
    let model = Arc::new(ScriptedModel::new(vec![opening_response()]));
    let mut session = session_with(model.clone());
    session.begin().await.unwrap();

    // World creates and links a new location; Character then places someone
    // in it. The second call only succeeds because the first already ran.
    model.queue(ScriptedModel::tool_response(
        "A cave mouth yawns to the north.",
        vec![
            (
                "create_location",
                json!({"name": "Echoing Cave", "description": "Dripping dark."}),
            ),
            (
                "connect_locations",
                json!({"from": "Moonlit Glade", "to": "Echoing Cave", "direction": "north", "return_direction": "south"}),
            ),
        ],
    ));
    model.queue(ScriptedModel::tool_response(
        "Something waits inside.",
        vec![(
            "add_character",
            json!({"name": "Pale Hermit", "persona": "Speaks in riddles.", "location": "Echoing Cave"}),
        )],
    ));

    let response = session.command("explore the area and say hello").await;
    assert_eq!(response.effects.len(), 3);
    session.state().check_invariants().unwrap();
}

#[tokio::test]
async fn test_failed_move_leaves_state_and_turn_untouched() {
    let model = Arc::new(ScriptedModel::new(vec![opening_response()]));
    let mut session = session_with(model.clone());
    session.begin().await.unwrap();

    // The model tries to move the player somewhere that does not exist, with
    // no narration of its own.
    model.queue(ScriptedModel::tool_response(
        "",
        vec![("move_player", json!({"destination": "North Meadow"}))],
    ));

    let log_before = session.state().log().len();
    let response = session.command("go north").await;

    assert_eq!(response.turn, 0, "a refused command consumes no turn");
    assert_eq!(response.phase, TurnPhase::WorldGenerated);
    assert!(response.effects.is_empty());
    assert!(response.narrative.contains("doesn't work"));
    assert!(response.narrative.contains("reference error"));
    assert_eq!(session.state().log().len(), log_before);
    assert_eq!(
        session.state().current_location().unwrap().1.name,
        "Moonlit Glade"
    );
}

#[tokio::test]
async fn test_talking_to_missing_character_degrades_but_advances() {
    let model = Arc::new(ScriptedModel::new(vec![opening_response()]));
    let mut session = session_with(model.clone());
    session.begin().await.unwrap();

    // The Character role narrates but its tool call names a character that
    // does not exist: narrative-only fallback, turn still advances.
    model.queue(ScriptedModel::tool_response(
        "You call out, but only the wind answers.",
        vec![(
            "record_dialogue",
            json!({"character": "Wizard", "line": "Greetings, traveler."}),
        )],
    ));

    let response = session.command("talk to the wizard").await;

    assert_eq!(response.turn, 1, "degraded turns still advance");
    assert!(response.effects.is_empty());
    assert!(response.narrative.contains("only the wind answers"));
    assert!(response.narrative.contains("reference error"));
    assert_eq!(session.state().characters().count(), 0);
    session.state().check_invariants().unwrap();
}

#[tokio::test]
async fn test_error_kinds_are_distinct() {
    let mut state = weaver_core::GameState::new("Robin", Theme::FantasyAdventure, 5);
    state.add_location("Glade", "Quiet.", Vec::new()).unwrap();

    // Well-formed name, malformed content: blank event text.
    let call = weaver_core::parse_tool_call("advance_story", &json!({"event": "  "}));
    assert!(matches!(call, weaver_core::ToolCall::Unparsed { .. }));

    // Reference and validation errors are distinct kinds.
    let err = state.move_player("Nowhere").unwrap_err();
    assert!(matches!(err, StateError::Reference(_)));
    let err = state.add_location("Glade", "Twice.", Vec::new()).unwrap_err();
    assert!(matches!(err, StateError::Validation(_)));
}

#[tokio::test]
async fn test_model_outage_never_fails_the_turn() {
    let failing = Arc::new(ScriptedModel::failing());
    let mut dark_session = GameSession::with_model(failing.clone(), config());

    let opening = dark_session.begin().await.unwrap();
    assert_eq!(opening.phase, TurnPhase::WorldGenerated);
    // The degraded opening still seeds a playable starting location.
    assert_eq!(dark_session.state().location_count(), 1);

    let response = dark_session.command("look around").await;
    assert_eq!(response.turn, 1, "model outage still advances the turn");
    assert!(!response.narrative.is_empty());
    dark_session.state().check_invariants().unwrap();
}

#[tokio::test]
async fn test_quit_ends_with_summary() {
    let model = Arc::new(ScriptedModel::new(vec![opening_response()]));
    let mut session = session_with(model.clone());
    session.begin().await.unwrap();

    let response = session.command("quit").await;
    assert_eq!(response.phase, TurnPhase::Ended);
    assert!(response.narrative.contains("Robin"));
    assert!(session.is_over());
}

#[tokio::test]
async fn test_system_commands_consume_no_turn() {
    let model = Arc::new(ScriptedModel::new(vec![opening_response()]));
    let mut session = session_with(model.clone());
    session.begin().await.unwrap();

    let calls = model.calls();
    for command in ["status", "help", "recap"] {
        let response = session.command(command).await;
        assert_eq!(response.turn, 0);
        assert!(!response.narrative.is_empty());
    }
    assert_eq!(model.calls(), calls, "system commands never hit the model");
}
