//! Storyteller tools.
//!
//! Each tool is a validated state mutation the model can request. Tool-use
//! blocks from the model are parsed into the typed [`ToolCall`] enum; calls
//! the parser does not recognize land in the `Unparsed` variant and trigger
//! the corrective-retry path instead of touching the state.

use serde_json::{json, Value};

use crate::state::{GameState, StateError};

/// A parsed tool directive from the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    CreateLocation {
        name: String,
        description: String,
        items: Vec<(String, String)>,
    },
    ConnectLocations {
        from: String,
        to: String,
        direction: String,
        return_direction: Option<String>,
    },
    MovePlayer {
        destination: String,
    },
    AddItem {
        location: String,
        item: String,
        description: String,
    },
    TakeItem {
        item: String,
    },
    AddCharacter {
        name: String,
        persona: String,
        location: String,
    },
    MoveCharacter {
        character: String,
        destination: String,
    },
    RecordDialogue {
        character: String,
        line: String,
    },
    AdvanceStory {
        event: String,
    },
    RecordChoice {
        choice: String,
    },
    /// The model asked for something outside the known tool set.
    Unparsed {
        name: String,
        input: Value,
    },
}

impl ToolCall {
    /// The tool name this call answers to.
    pub fn name(&self) -> &str {
        match self {
            ToolCall::CreateLocation { .. } => "create_location",
            ToolCall::ConnectLocations { .. } => "connect_locations",
            ToolCall::MovePlayer { .. } => "move_player",
            ToolCall::AddItem { .. } => "add_item",
            ToolCall::TakeItem { .. } => "take_item",
            ToolCall::AddCharacter { .. } => "add_character",
            ToolCall::MoveCharacter { .. } => "move_character",
            ToolCall::RecordDialogue { .. } => "record_dialogue",
            ToolCall::AdvanceStory { .. } => "advance_story",
            ToolCall::RecordChoice { .. } => "record_choice",
            ToolCall::Unparsed { .. } => "unparsed",
        }
    }

    /// Apply the call to the game state, returning the effect description.
    pub fn apply(&self, state: &mut GameState) -> Result<String, StateError> {
        match self {
            ToolCall::CreateLocation {
                name,
                description,
                items,
            } => state.add_location(name, description, items.clone()),
            ToolCall::ConnectLocations {
                from,
                to,
                direction,
                return_direction,
            } => state.connect_locations(from, to, direction, return_direction.as_deref()),
            ToolCall::MovePlayer { destination } => state.move_player(destination),
            ToolCall::AddItem {
                location,
                item,
                description,
            } => state.add_item(location, item, description),
            ToolCall::TakeItem { item } => state.take_item(item),
            ToolCall::AddCharacter {
                name,
                persona,
                location,
            } => state.add_character(name, persona, location),
            ToolCall::MoveCharacter {
                character,
                destination,
            } => state.move_character(character, destination),
            ToolCall::RecordDialogue { character, line } => {
                state.record_dialogue(character, line)
            }
            ToolCall::AdvanceStory { event } => state.push_story_event(event),
            ToolCall::RecordChoice { choice } => state.record_choice(choice),
            ToolCall::Unparsed { name, .. } => Err(StateError::Validation(format!(
                "unknown tool `{name}`"
            ))),
        }
    }
}

/// Parse a model tool-use block into a typed call.
///
/// Unknown names and missing required arguments yield `Unparsed`, which the
/// role driver answers with a corrective retry. Optional arguments default.
pub fn parse_tool_call(name: &str, input: &Value) -> ToolCall {
    fn required(input: &Value, field: &str) -> Option<String> {
        let value = input[field].as_str()?.trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }

    fn optional(input: &Value, field: &str) -> Option<String> {
        required(input, field)
    }

    let unparsed = || ToolCall::Unparsed {
        name: name.to_string(),
        input: input.clone(),
    };

    match name {
        "create_location" => {
            let Some(location_name) = required(input, "name") else {
                return unparsed();
            };
            let description = optional(input, "description")
                .unwrap_or_else(|| "A place waiting to be described.".to_string());
            let items = input["items"]
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| {
                            let name = item["name"].as_str()?.trim();
                            if name.is_empty() {
                                return None;
                            }
                            let description =
                                item["description"].as_str().unwrap_or_default();
                            Some((name.to_string(), description.to_string()))
                        })
                        .collect()
                })
                .unwrap_or_default();
            ToolCall::CreateLocation {
                name: location_name,
                description,
                items,
            }
        }
        "connect_locations" => {
            let (Some(from), Some(to), Some(direction)) = (
                required(input, "from"),
                required(input, "to"),
                required(input, "direction"),
            ) else {
                return unparsed();
            };
            ToolCall::ConnectLocations {
                from,
                to,
                direction,
                return_direction: optional(input, "return_direction"),
            }
        }
        "move_player" => match required(input, "destination") {
            Some(destination) => ToolCall::MovePlayer { destination },
            None => unparsed(),
        },
        "add_item" => {
            let (Some(location), Some(item)) =
                (required(input, "location"), required(input, "item"))
            else {
                return unparsed();
            };
            ToolCall::AddItem {
                location,
                item,
                description: optional(input, "description").unwrap_or_default(),
            }
        }
        "take_item" => match required(input, "item") {
            Some(item) => ToolCall::TakeItem { item },
            None => unparsed(),
        },
        "add_character" => {
            let (Some(name), Some(persona), Some(location)) = (
                required(input, "name"),
                required(input, "persona"),
                required(input, "location"),
            ) else {
                return unparsed();
            };
            ToolCall::AddCharacter {
                name,
                persona,
                location,
            }
        }
        "move_character" => {
            let (Some(character), Some(destination)) = (
                required(input, "character"),
                required(input, "destination"),
            ) else {
                return unparsed();
            };
            ToolCall::MoveCharacter {
                character,
                destination,
            }
        }
        "record_dialogue" => {
            let (Some(character), Some(line)) =
                (required(input, "character"), required(input, "line"))
            else {
                return unparsed();
            };
            ToolCall::RecordDialogue { character, line }
        }
        "advance_story" => match required(input, "event") {
            Some(event) => ToolCall::AdvanceStory { event },
            None => unparsed(),
        },
        "record_choice" => match required(input, "choice") {
            Some(choice) => ToolCall::RecordChoice { choice },
            None => unparsed(),
        },
        _ => unparsed(),
    }
}

/// Tool definitions offered to each role.
pub struct RoleTools;

impl RoleTools {
    /// Tools for the World role: geography, movement, items.
    pub fn world() -> Vec<claude::Tool> {
        vec![
            Self::create_location(),
            Self::connect_locations(),
            Self::move_player(),
            Self::add_item(),
            Self::take_item(),
        ]
    }

    /// Tools for the Character role: people and dialogue.
    pub fn character() -> Vec<claude::Tool> {
        vec![
            Self::add_character(),
            Self::move_character(),
            Self::record_dialogue(),
        ]
    }

    /// Tools for the Story role: plot beats and choices.
    pub fn story() -> Vec<claude::Tool> {
        vec![Self::advance_story(), Self::record_choice()]
    }

    fn create_location() -> claude::Tool {
        claude::Tool {
            name: "create_location".to_string(),
            description: "Add a new location to the world. The first location created becomes the player's starting point. Use connect_locations afterwards to link it to existing places.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Display name, e.g. 'The Moonlit Glade'"
                    },
                    "description": {
                        "type": "string",
                        "description": "Two or three sentences of atmosphere"
                    },
                    "items": {
                        "type": "array",
                        "description": "Items present at creation",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": { "type": "string" },
                                "description": { "type": "string" }
                            },
                            "required": ["name"]
                        }
                    }
                },
                "required": ["name", "description"]
            }),
        }
    }

    fn connect_locations() -> claude::Tool {
        claude::Tool {
            name: "connect_locations".to_string(),
            description: "Create a directional exit between two existing locations. Both must already exist.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "from": { "type": "string", "description": "Name of the origin location" },
                    "to": { "type": "string", "description": "Name of the destination location" },
                    "direction": {
                        "type": "string",
                        "description": "Exit direction from the origin, e.g. 'north' or 'through the iron door'"
                    },
                    "return_direction": {
                        "type": "string",
                        "description": "Optional direction of the return exit"
                    }
                },
                "required": ["from", "to", "direction"]
            }),
        }
    }

    fn move_player() -> claude::Tool {
        claude::Tool {
            name: "move_player".to_string(),
            description: "Move the player to a location that exists and is connected to where they stand. Never invent a destination: if the place is not in the world state, create and connect it first.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "destination": { "type": "string", "description": "Name of the destination location" }
                },
                "required": ["destination"]
            }),
        }
    }

    fn add_item() -> claude::Tool {
        claude::Tool {
            name: "add_item".to_string(),
            description: "Place an item in an existing location.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "location": { "type": "string", "description": "Name of the location" },
                    "item": { "type": "string", "description": "Item name" },
                    "description": { "type": "string", "description": "Short item description" }
                },
                "required": ["location", "item"]
            }),
        }
    }

    fn take_item() -> claude::Tool {
        claude::Tool {
            name: "take_item".to_string(),
            description: "Move an item from the player's current location into their inventory. The item must actually be there.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "item": { "type": "string", "description": "Name of the item to pick up" }
                },
                "required": ["item"]
            }),
        }
    }

    fn add_character() -> claude::Tool {
        claude::Tool {
            name: "add_character".to_string(),
            description: "Introduce a new character at an existing location.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Character name" },
                    "persona": {
                        "type": "string",
                        "description": "One or two sentences of personality, voice, and motivation"
                    },
                    "location": { "type": "string", "description": "Name of an existing location" }
                },
                "required": ["name", "persona", "location"]
            }),
        }
    }

    fn move_character() -> claude::Tool {
        claude::Tool {
            name: "move_character".to_string(),
            description: "Move an existing character to an existing location.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "character": { "type": "string", "description": "Character name" },
                    "destination": { "type": "string", "description": "Name of an existing location" }
                },
                "required": ["character", "destination"]
            }),
        }
    }

    fn record_dialogue() -> claude::Tool {
        claude::Tool {
            name: "record_dialogue".to_string(),
            description: "Record a line spoken by a character who is at the player's location. Keep the line in the character's established voice.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "character": { "type": "string", "description": "Name of the speaking character" },
                    "line": { "type": "string", "description": "The spoken line, without surrounding quotes" }
                },
                "required": ["character", "line"]
            }),
        }
    }

    fn advance_story() -> claude::Tool {
        claude::Tool {
            name: "advance_story".to_string(),
            description: "Record a plot development in the story log.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "event": { "type": "string", "description": "One sentence describing what happened" }
                },
                "required": ["event"]
            }),
        }
    }

    fn record_choice() -> claude::Tool {
        claude::Tool {
            name: "record_choice".to_string(),
            description: "Record a meaningful choice the player just made, so later scenes can reference it.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "choice": { "type": "string", "description": "The choice, phrased as a short clause" }
                },
                "required": ["choice"]
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Theme;

    #[test]
    fn test_parse_create_location() {
        let input = json!({
            "name": "The Moonlit Glade",
            "description": "Silver light on old stones.",
            "items": [{"name": "Rusty Lantern", "description": "Dented but whole."}]
        });

        match parse_tool_call("create_location", &input) {
            ToolCall::CreateLocation { name, items, .. } => {
                assert_eq!(name, "The Moonlit Glade");
                assert_eq!(items.len(), 1);
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_parse_missing_required_field_is_unparsed() {
        let call = parse_tool_call("move_player", &json!({}));
        assert!(matches!(call, ToolCall::Unparsed { .. }));

        let call = parse_tool_call("record_dialogue", &json!({"character": "Mira"}));
        assert!(matches!(call, ToolCall::Unparsed { .. }));
    }

    #[test]
    fn test_parse_unknown_tool_is_unparsed() {
        let call = parse_tool_call("summon_meteor", &json!({"target": "everything"}));
        match call {
            ToolCall::Unparsed { name, .. } => assert_eq!(name, "summon_meteor"),
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_apply_reference_error_leaves_state_unchanged() {
        let mut state = GameState::new("Robin", Theme::FantasyAdventure, 5);
        state.add_location("Glade", "Quiet.", Vec::new()).unwrap();
        let before = state.log().len();

        let call = parse_tool_call("move_player", &json!({"destination": "The Void"}));
        let err = call.apply(&mut state).unwrap_err();
        assert!(matches!(err, StateError::Reference(_)));
        assert_eq!(state.log().len(), before);
        state.check_invariants().unwrap();
    }

    #[test]
    fn test_apply_round_trip() {
        let mut state = GameState::new("Robin", Theme::FantasyAdventure, 5);

        let calls = [
            parse_tool_call(
                "create_location",
                &json!({"name": "Glade", "description": "Quiet."}),
            ),
            parse_tool_call(
                "add_character",
                &json!({"name": "Mira", "persona": "Nervous herbalist.", "location": "Glade"}),
            ),
            parse_tool_call(
                "record_dialogue",
                &json!({"character": "Mira", "line": "Watch your step."}),
            ),
            parse_tool_call("advance_story", &json!({"event": "A horn sounds."})),
        ];
        for call in &calls {
            call.apply(&mut state).unwrap();
        }

        assert_eq!(state.location_count(), 1);
        assert_eq!(state.characters_present().len(), 1);
        state.check_invariants().unwrap();
    }

    #[test]
    fn test_role_tool_sets_are_disjoint() {
        let world: Vec<_> = RoleTools::world().into_iter().map(|t| t.name).collect();
        let character: Vec<_> = RoleTools::character().into_iter().map(|t| t.name).collect();
        let story: Vec<_> = RoleTools::story().into_iter().map(|t| t.name).collect();

        for name in &world {
            assert!(!character.contains(name) && !story.contains(name));
        }
        for name in &character {
            assert!(!story.contains(name));
        }
        assert_eq!(world.len() + character.len() + story.len(), 10);
    }
}
