//! Shared game state.
//!
//! `GameState` is the single source of truth for world, character, and player
//! data. All containers are private; the validated mutation operations in
//! this module are the only way any component changes the state, and every
//! successful mutation appends an entry to the story log.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors returned by state mutation operations.
///
/// A `Reference` error means a tool named a location, character, item, or
/// exit that does not exist; a `Validation` error means the arguments were
/// malformed or conflict with the current state. Either way the mutation is
/// rejected and the state is left untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("reference error: {0}")]
    Reference(String),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Normalize a display name into a stable key.
///
/// Lowercases, maps runs of non-alphanumeric characters to a single
/// underscore, and trims leading/trailing underscores. The model refers to
/// entities by name, so keys must be derivable from whatever casing and
/// punctuation it uses.
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_sep = true;
    for c in name.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            slug.push('_');
            last_was_sep = true;
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    slug
}

macro_rules! define_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Derive a key from a display name.
            pub fn from_name(name: &str) -> Self {
                Self(slugify(name))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// A key is empty when the source name had no usable characters.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_key!(
    /// Normalized identifier for a location.
    LocationKey
);

define_key!(
    /// Normalized identifier for a character.
    CharacterKey
);

/// A place in the game world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub description: String,
    /// Exits by direction, e.g. "north" -> the key of the destination.
    pub exits: BTreeMap<String, LocationKey>,
    /// Items lying here, by name.
    pub items: BTreeMap<String, String>,
}

impl Location {
    fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            exits: BTreeMap::new(),
            items: BTreeMap::new(),
        }
    }
}

/// A non-player character.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    /// Short personality summary used to keep dialogue in voice.
    pub persona: String,
    pub location: LocationKey,
    /// Spoken lines, oldest first.
    pub dialogue: Vec<String>,
}

/// The player record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    /// None until the first location exists.
    pub location: Option<LocationKey>,
    pub inventory: BTreeSet<String>,
    /// Choices the player has made, oldest first.
    pub choices: Vec<String>,
}

/// Story pacing phase derived from turn progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoryPhase {
    Beginning,
    Middle,
    Late,
    Climax,
}

impl StoryPhase {
    pub fn name(&self) -> &'static str {
        match self {
            StoryPhase::Beginning => "beginning",
            StoryPhase::Middle => "middle",
            StoryPhase::Late => "late",
            StoryPhase::Climax => "climax",
        }
    }
}

/// The turn counter: monotonically non-decreasing, bounded by the limit.
///
/// Only the session advances it; `advance` is crate-private so no role or
/// tool can increment the turn on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnCounter {
    current: u32,
    limit: u32,
}

impl TurnCounter {
    fn new(limit: u32) -> Self {
        Self { current: 0, limit }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.current)
    }

    pub fn at_limit(&self) -> bool {
        self.current >= self.limit
    }

    /// Pacing phase for story prompts.
    pub fn phase(&self) -> StoryPhase {
        let progress = self.current as f32 / self.limit.max(1) as f32;
        if progress <= 0.2 {
            StoryPhase::Beginning
        } else if progress <= 0.6 {
            StoryPhase::Middle
        } else if progress <= 0.8 {
            StoryPhase::Late
        } else {
            StoryPhase::Climax
        }
    }

    pub(crate) fn advance(&mut self) -> u32 {
        if self.current < self.limit {
            self.current += 1;
        }
        self.current
    }
}

/// An entry in the append-only story log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryEvent {
    pub turn: u32,
    pub at: DateTime<Utc>,
    pub text: String,
}

/// Story theme, fixed at session start. Flavors every prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Theme {
    #[default]
    FantasyAdventure,
    SciFiExploration,
    MysteryDetective,
    HorrorSurvival,
    ModernThriller,
    SteampunkAdventure,
}

impl Theme {
    pub fn all() -> [Theme; 6] {
        [
            Theme::FantasyAdventure,
            Theme::SciFiExploration,
            Theme::MysteryDetective,
            Theme::HorrorSurvival,
            Theme::ModernThriller,
            Theme::SteampunkAdventure,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Theme::FantasyAdventure => "fantasy adventure",
            Theme::SciFiExploration => "sci-fi exploration",
            Theme::MysteryDetective => "mystery detective",
            Theme::HorrorSurvival => "horror survival",
            Theme::ModernThriller => "modern thriller",
            Theme::SteampunkAdventure => "steampunk adventure",
        }
    }

    /// Genre elements the storytellers should lean on.
    pub fn elements(&self) -> &'static str {
        match self {
            Theme::FantasyAdventure => "magic, swords, dragons, castles, wizards, medieval settings",
            Theme::SciFiExploration => {
                "space, technology, aliens, futuristic cities, starships, advanced science"
            }
            Theme::MysteryDetective => {
                "clues, investigation, suspects, crime scenes, deduction, noir atmosphere"
            }
            Theme::HorrorSurvival => {
                "darkness, fear, survival, psychological tension, monsters, abandoned places"
            }
            Theme::ModernThriller => {
                "contemporary settings, espionage, chase scenes, modern technology, suspense"
            }
            Theme::SteampunkAdventure => {
                "steam, brass, gears, airships, Victorian technology, clockwork"
            }
        }
    }

    /// Genre elements the storytellers must avoid.
    pub fn avoid(&self) -> &'static str {
        match self {
            Theme::FantasyAdventure => "modern technology, sci-fi elements",
            Theme::SciFiExploration => "medieval fantasy, steampunk",
            Theme::MysteryDetective => "action movie elements, fantasy magic",
            Theme::HorrorSurvival => "comedy, bright cheerful settings",
            Theme::ModernThriller => "fantasy elements, historical settings",
            Theme::SteampunkAdventure => "fantasy magic, modern electronics",
        }
    }
}

/// The complete mutable game state for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    session_id: Uuid,
    theme: Theme,
    locations: BTreeMap<LocationKey, Location>,
    characters: BTreeMap<CharacterKey, Character>,
    player: Player,
    turn: TurnCounter,
    log: Vec<StoryEvent>,
    started_at: DateTime<Utc>,
    #[serde(skip)]
    player_moved_this_turn: bool,
}

impl GameState {
    pub fn new(player_name: impl Into<String>, theme: Theme, turn_limit: u32) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            theme,
            locations: BTreeMap::new(),
            characters: BTreeMap::new(),
            player: Player {
                name: player_name.into(),
                location: None,
                inventory: BTreeSet::new(),
                choices: Vec::new(),
            },
            turn: TurnCounter::new(turn_limit),
            log: Vec::new(),
            started_at: Utc::now(),
            player_moved_this_turn: false,
        }
    }

    // ------------------------------------------------------------------
    // Read accessors
    // ------------------------------------------------------------------

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn turn(&self) -> &TurnCounter {
        &self.turn
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn location(&self, key: &LocationKey) -> Option<&Location> {
        self.locations.get(key)
    }

    pub fn locations(&self) -> impl Iterator<Item = (&LocationKey, &Location)> {
        self.locations.iter()
    }

    pub fn location_count(&self) -> usize {
        self.locations.len()
    }

    /// The location the player is standing in, if the world exists yet.
    pub fn current_location(&self) -> Option<(&LocationKey, &Location)> {
        let key = self.player.location.as_ref()?;
        self.locations.get(key).map(|loc| (key, loc))
    }

    pub fn character(&self, key: &CharacterKey) -> Option<&Character> {
        self.characters.get(key)
    }

    pub fn characters(&self) -> impl Iterator<Item = (&CharacterKey, &Character)> {
        self.characters.iter()
    }

    pub fn characters_at(&self, key: &LocationKey) -> Vec<(&CharacterKey, &Character)> {
        self.characters
            .iter()
            .filter(|(_, c)| &c.location == key)
            .collect()
    }

    /// Characters at the player's current location.
    pub fn characters_present(&self) -> Vec<(&CharacterKey, &Character)> {
        match self.player.location.as_ref() {
            Some(key) => self.characters_at(key),
            None => Vec::new(),
        }
    }

    pub fn log(&self) -> &[StoryEvent] {
        &self.log
    }

    pub fn log_tail(&self, n: usize) -> &[StoryEvent] {
        let start = self.log.len().saturating_sub(n);
        &self.log[start..]
    }

    /// Verify the structural invariants. Used by tests after tool sequences.
    pub fn check_invariants(&self) -> Result<(), String> {
        if let Some(key) = self.player.location.as_ref() {
            if !self.locations.contains_key(key) {
                return Err(format!("player is in unknown location `{key}`"));
            }
        }
        for (key, character) in &self.characters {
            if !self.locations.contains_key(&character.location) {
                return Err(format!(
                    "character `{key}` is in unknown location `{}`",
                    character.location
                ));
            }
        }
        for (key, location) in &self.locations {
            for (direction, destination) in &location.exits {
                if !self.locations.contains_key(destination) {
                    return Err(format!(
                        "exit `{direction}` from `{key}` leads to unknown location `{destination}`"
                    ));
                }
            }
        }
        if self.turn.current > self.turn.limit {
            return Err(format!(
                "turn counter {} exceeds limit {}",
                self.turn.current, self.turn.limit
            ));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mutation operations (the only sanctioned write path)
    // ------------------------------------------------------------------

    /// Add a new location. The first location becomes the player's start.
    pub fn add_location(
        &mut self,
        name: &str,
        description: &str,
        items: Vec<(String, String)>,
    ) -> Result<String, StateError> {
        let key = LocationKey::from_name(name);
        if key.is_empty() {
            return Err(StateError::Validation(
                "location name must not be empty".to_string(),
            ));
        }
        if self.locations.contains_key(&key) {
            return Err(StateError::Validation(format!(
                "location `{key}` already exists"
            )));
        }

        let mut location = Location::new(name, description);
        for (item, item_description) in items {
            if !item.trim().is_empty() {
                location.items.insert(item, item_description);
            }
        }
        self.locations.insert(key.clone(), location);

        let mut effect = format!("New location: {name}.");
        if self.player.location.is_none() {
            self.player.location = Some(key.clone());
            effect.push_str(&format!(" {} starts here.", self.player.name));
            log::info!("starting location set: {key}");
        }
        self.log_event(&effect);
        log::info!("location created: {key}");
        Ok(effect)
    }

    /// Connect two existing locations with a directional exit.
    pub fn connect_locations(
        &mut self,
        from: &str,
        to: &str,
        direction: &str,
        return_direction: Option<&str>,
    ) -> Result<String, StateError> {
        let from_key = self.resolve_location(from)?;
        let to_key = self.resolve_location(to)?;
        let direction = direction.trim().to_lowercase();
        if direction.is_empty() {
            return Err(StateError::Validation(
                "exit direction must not be empty".to_string(),
            ));
        }

        match self.locations[&from_key].exits.get(&direction) {
            Some(existing) if *existing == to_key => {
                return Ok(format!(
                    "{direction} from {from} already leads to {to}."
                ));
            }
            Some(existing) => {
                return Err(StateError::Validation(format!(
                    "exit `{direction}` from `{from_key}` already leads to `{existing}`"
                )));
            }
            None => {}
        }

        self.locations
            .get_mut(&from_key)
            .expect("checked above")
            .exits
            .insert(direction.clone(), to_key.clone());

        if let Some(back) = return_direction {
            let back = back.trim().to_lowercase();
            if !back.is_empty() {
                let destination = self
                    .locations
                    .get_mut(&to_key)
                    .expect("checked above");
                destination.exits.entry(back).or_insert(from_key.clone());
            }
        }

        let effect = format!("A path opens {direction} from {from} to {to}.");
        self.log_event(&effect);
        log::info!("exit added: {from_key} --{direction}--> {to_key}");
        Ok(effect)
    }

    /// Move the player to a connected location. First writer wins within a
    /// turn: a second move in the same turn is rejected.
    pub fn move_player(&mut self, destination: &str) -> Result<String, StateError> {
        let to_key = self.resolve_location(destination)?;

        if self.player_moved_this_turn {
            return Err(StateError::Validation(
                "the player already moved this turn".to_string(),
            ));
        }

        if let Some(current) = self.player.location.clone() {
            if current == to_key {
                return Err(StateError::Validation(format!(
                    "the player is already at `{to_key}`"
                )));
            }
            let connected = self.locations[&current]
                .exits
                .values()
                .any(|dest| *dest == to_key);
            if !connected {
                return Err(StateError::Reference(format!(
                    "no exit leads from `{current}` to `{to_key}`"
                )));
            }
        }

        let from = self.player.location.replace(to_key.clone());
        self.player_moved_this_turn = true;

        let name = &self.locations[&to_key].name;
        let effect = match from {
            Some(from) => format!(
                "{} moves from {} to {name}.",
                self.player.name, self.locations[&from].name
            ),
            None => format!("{} arrives at {name}.", self.player.name),
        };
        self.log_event(&effect);
        log::info!("player moved: {to_key}");
        Ok(effect)
    }

    /// Place an item in an existing location.
    pub fn add_item(
        &mut self,
        location: &str,
        item: &str,
        description: &str,
    ) -> Result<String, StateError> {
        let key = self.resolve_location(location)?;
        let item = item.trim();
        if item.is_empty() {
            return Err(StateError::Validation(
                "item name must not be empty".to_string(),
            ));
        }

        let record = self.locations.get_mut(&key).expect("checked above");
        record
            .items
            .insert(item.to_string(), description.to_string());

        let effect = format!("{item} appears at {}.", record.name);
        self.log_event(&effect);
        log::info!("item added: {item} -> {key}");
        Ok(effect)
    }

    /// Move an item from the player's current location into the inventory.
    pub fn take_item(&mut self, item: &str) -> Result<String, StateError> {
        let key = self
            .player
            .location
            .clone()
            .ok_or_else(|| StateError::Reference("the player is nowhere yet".to_string()))?;
        let item = item.trim();

        let location = self.locations.get_mut(&key).expect("invariant");
        let found = location
            .items
            .keys()
            .find(|name| name.eq_ignore_ascii_case(item))
            .cloned();
        let Some(name) = found else {
            return Err(StateError::Reference(format!(
                "there is no `{item}` at `{key}`"
            )));
        };
        location.items.remove(&name);
        self.player.inventory.insert(name.clone());

        let effect = format!("{} takes the {name}.", self.player.name);
        self.log_event(&effect);
        log::info!("item taken: {name}");
        Ok(effect)
    }

    /// Add a new character at an existing location.
    pub fn add_character(
        &mut self,
        name: &str,
        persona: &str,
        location: &str,
    ) -> Result<String, StateError> {
        let location_key = self.resolve_location(location)?;
        let key = CharacterKey::from_name(name);
        if key.is_empty() {
            return Err(StateError::Validation(
                "character name must not be empty".to_string(),
            ));
        }
        if self.characters.contains_key(&key) {
            return Err(StateError::Validation(format!(
                "character `{key}` already exists"
            )));
        }

        self.characters.insert(
            key.clone(),
            Character {
                name: name.to_string(),
                persona: persona.to_string(),
                location: location_key.clone(),
                dialogue: Vec::new(),
            },
        );

        let effect = format!(
            "{name} appears at {}.",
            self.locations[&location_key].name
        );
        self.log_event(&effect);
        log::info!("character created: {key} at {location_key}");
        Ok(effect)
    }

    /// Move an existing character to an existing location.
    pub fn move_character(
        &mut self,
        character: &str,
        destination: &str,
    ) -> Result<String, StateError> {
        let character_key = self.resolve_character(character)?;
        let location_key = self.resolve_location(destination)?;

        let record = self
            .characters
            .get_mut(&character_key)
            .expect("checked above");
        record.location = location_key.clone();

        let effect = format!(
            "{} moves to {}.",
            record.name, self.locations[&location_key].name
        );
        self.log_event(&effect);
        log::info!("character moved: {character_key} -> {location_key}");
        Ok(effect)
    }

    /// Append a spoken line to a character at the player's location.
    pub fn record_dialogue(&mut self, character: &str, line: &str) -> Result<String, StateError> {
        let key = self.resolve_character(character)?;
        let here = self.player.location.clone();
        let record = self.characters.get_mut(&key).expect("checked above");

        if here.as_ref() != Some(&record.location) {
            return Err(StateError::Reference(format!(
                "`{key}` is not at the player's location"
            )));
        }
        let line = line.trim();
        if line.is_empty() {
            return Err(StateError::Validation(
                "dialogue line must not be empty".to_string(),
            ));
        }

        record.dialogue.push(line.to_string());
        let effect = format!("{}: \"{line}\"", record.name);
        self.log_event(&effect);
        log::info!("dialogue recorded for {key}");
        Ok(effect)
    }

    /// Append a story event.
    pub fn push_story_event(&mut self, event: &str) -> Result<String, StateError> {
        let event = event.trim();
        if event.is_empty() {
            return Err(StateError::Validation(
                "story event must not be empty".to_string(),
            ));
        }
        self.log_event(event);
        log::info!("story event: {event}");
        Ok(event.to_string())
    }

    /// Record a choice the player made.
    pub fn record_choice(&mut self, choice: &str) -> Result<String, StateError> {
        let choice = choice.trim();
        if choice.is_empty() {
            return Err(StateError::Validation(
                "choice must not be empty".to_string(),
            ));
        }
        self.player.choices.push(choice.to_string());
        let effect = format!("{} chose: {choice}", self.player.name);
        self.log_event(&effect);
        log::info!("player choice: {choice}");
        Ok(effect)
    }

    // ------------------------------------------------------------------
    // Session-owned transitions
    // ------------------------------------------------------------------

    /// Reset per-turn tracking. Called by the session before each accepted
    /// command.
    pub(crate) fn start_command(&mut self) {
        self.player_moved_this_turn = false;
    }

    /// Advance the turn counter. Called by the session, and only the session,
    /// exactly once per accepted command.
    pub(crate) fn advance_turn(&mut self) -> u32 {
        let turn = self.turn.advance();
        log::info!("turn {turn}/{} begins", self.turn.limit());
        turn
    }

    fn resolve_location(&self, name: &str) -> Result<LocationKey, StateError> {
        let key = LocationKey::from_name(name);
        if self.locations.contains_key(&key) {
            Ok(key)
        } else {
            Err(StateError::Reference(format!("no such location `{name}`")))
        }
    }

    fn resolve_character(&self, name: &str) -> Result<CharacterKey, StateError> {
        let key = CharacterKey::from_name(name);
        if self.characters.contains_key(&key) {
            Ok(key)
        } else {
            Err(StateError::Reference(format!("no such character `{name}`")))
        }
    }

    fn log_event(&mut self, text: &str) {
        self.log.push(StoryEvent {
            turn: self.turn.current(),
            at: Utc::now(),
            text: text.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> GameState {
        GameState::new("Robin", Theme::FantasyAdventure, 5)
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("The Dark Forest"), "the_dark_forest");
        assert_eq!(slugify("  Iron-Spire  City "), "iron_spire_city");
        assert_eq!(slugify("???"), "");
    }

    #[test]
    fn test_first_location_becomes_start() {
        let mut state = state();
        assert!(state.current_location().is_none());

        let effect = state
            .add_location("Moonlit Glade", "Silver light on old stones.", Vec::new())
            .unwrap();
        assert!(effect.contains("Robin starts here"));
        assert_eq!(
            state.player().location,
            Some(LocationKey::from_name("Moonlit Glade"))
        );
        state.check_invariants().unwrap();
    }

    #[test]
    fn test_duplicate_location_rejected() {
        let mut state = state();
        state.add_location("Glade", "Quiet.", Vec::new()).unwrap();
        let err = state.add_location("Glade", "Again.", Vec::new()).unwrap_err();
        assert!(matches!(err, StateError::Validation(_)));
        assert_eq!(state.location_count(), 1);
    }

    #[test]
    fn test_connect_and_move() {
        let mut state = state();
        state.add_location("Glade", "Quiet.", Vec::new()).unwrap();
        state.add_location("Cave", "Dark.", Vec::new()).unwrap();
        state
            .connect_locations("Glade", "Cave", "north", Some("south"))
            .unwrap();

        state.move_player("Cave").unwrap();
        assert_eq!(
            state.player().location,
            Some(LocationKey::from_name("Cave"))
        );
        // Return exit exists too.
        let cave = state.location(&LocationKey::from_name("Cave")).unwrap();
        assert_eq!(cave.exits.get("south"), Some(&LocationKey::from_name("Glade")));
        state.check_invariants().unwrap();
    }

    #[test]
    fn test_move_to_unknown_location_is_reference_error() {
        let mut state = state();
        state.add_location("Glade", "Quiet.", Vec::new()).unwrap();

        let log_len = state.log().len();
        let err = state.move_player("North Meadow").unwrap_err();
        assert!(matches!(err, StateError::Reference(_)));
        assert_eq!(
            state.player().location,
            Some(LocationKey::from_name("Glade"))
        );
        assert_eq!(state.log().len(), log_len, "failed move must not log");
    }

    #[test]
    fn test_move_without_exit_is_reference_error() {
        let mut state = state();
        state.add_location("Glade", "Quiet.", Vec::new()).unwrap();
        state.add_location("Cave", "Dark.", Vec::new()).unwrap();

        let err = state.move_player("Cave").unwrap_err();
        assert!(matches!(err, StateError::Reference(_)));
    }

    #[test]
    fn test_second_move_in_same_turn_rejected() {
        let mut state = state();
        state.add_location("Glade", "Quiet.", Vec::new()).unwrap();
        state.add_location("Cave", "Dark.", Vec::new()).unwrap();
        state.add_location("Ridge", "Windy.", Vec::new()).unwrap();
        state
            .connect_locations("Glade", "Cave", "north", None)
            .unwrap();
        state
            .connect_locations("Cave", "Ridge", "up", None)
            .unwrap();

        state.start_command();
        state.move_player("Cave").unwrap();
        let err = state.move_player("Ridge").unwrap_err();
        assert!(matches!(err, StateError::Validation(_)));

        // Next turn the player can move again.
        state.start_command();
        state.move_player("Ridge").unwrap();
    }

    #[test]
    fn test_conflicting_exit_rejected() {
        let mut state = state();
        state.add_location("Glade", "Quiet.", Vec::new()).unwrap();
        state.add_location("Cave", "Dark.", Vec::new()).unwrap();
        state.add_location("Ridge", "Windy.", Vec::new()).unwrap();
        state
            .connect_locations("Glade", "Cave", "north", None)
            .unwrap();

        let err = state
            .connect_locations("Glade", "Ridge", "north", None)
            .unwrap_err();
        assert!(matches!(err, StateError::Validation(_)));

        // Re-declaring the same connection is accepted quietly.
        state
            .connect_locations("Glade", "Cave", "north", None)
            .unwrap();
    }

    #[test]
    fn test_take_item() {
        let mut state = state();
        state
            .add_location(
                "Glade",
                "Quiet.",
                vec![("Rusty Lantern".to_string(), "Dented but whole.".to_string())],
            )
            .unwrap();

        state.take_item("rusty lantern").unwrap();
        assert!(state.player().inventory.contains("Rusty Lantern"));

        let err = state.take_item("rusty lantern").unwrap_err();
        assert!(matches!(err, StateError::Reference(_)));
    }

    #[test]
    fn test_character_requires_existing_location() {
        let mut state = state();
        let err = state
            .add_character("Mira", "A nervous herbalist.", "Glade")
            .unwrap_err();
        assert!(matches!(err, StateError::Reference(_)));

        state.add_location("Glade", "Quiet.", Vec::new()).unwrap();
        state
            .add_character("Mira", "A nervous herbalist.", "Glade")
            .unwrap();
        state.check_invariants().unwrap();

        let err = state
            .add_character("Mira", "Someone else.", "Glade")
            .unwrap_err();
        assert!(matches!(err, StateError::Validation(_)));
    }

    #[test]
    fn test_dialogue_requires_presence() {
        let mut state = state();
        state.add_location("Glade", "Quiet.", Vec::new()).unwrap();
        state.add_location("Cave", "Dark.", Vec::new()).unwrap();
        state
            .add_character("Mira", "A nervous herbalist.", "Cave")
            .unwrap();

        // Unknown character.
        let err = state.record_dialogue("Wizard", "Hello.").unwrap_err();
        assert!(matches!(err, StateError::Reference(_)));

        // Known character, but elsewhere.
        let err = state.record_dialogue("Mira", "Hello.").unwrap_err();
        assert!(matches!(err, StateError::Reference(_)));

        state.move_character("Mira", "Glade").unwrap();
        state.record_dialogue("Mira", "Oh! You startled me.").unwrap();
        let mira = state.character(&CharacterKey::from_name("Mira")).unwrap();
        assert_eq!(mira.dialogue.len(), 1);
    }

    #[test]
    fn test_turn_counter_bounds_and_phase() {
        let mut state = state();
        assert_eq!(state.turn().phase(), StoryPhase::Beginning);

        for expected in 1..=5 {
            assert_eq!(state.advance_turn(), expected);
        }
        assert_eq!(state.turn().phase(), StoryPhase::Climax);
        assert!(state.turn().at_limit());

        // Advancing past the limit saturates.
        assert_eq!(state.advance_turn(), 5);
        state.check_invariants().unwrap();
    }

    #[test]
    fn test_log_is_append_only_and_tagged_with_turn() {
        let mut state = state();
        state.add_location("Glade", "Quiet.", Vec::new()).unwrap();
        state.advance_turn();
        state.push_story_event("A horn sounds in the distance.").unwrap();

        let tail = state.log_tail(1);
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].turn, 1);
        assert!(tail[0].text.contains("horn"));
        assert!(state.log().len() >= 2);
    }

    #[test]
    fn test_record_choice() {
        let mut state = state();
        state.record_choice("spare the thief").unwrap();
        assert_eq!(state.player().choices, vec!["spare the thief".to_string()]);
        assert!(matches!(
            state.record_choice("  "),
            Err(StateError::Validation(_))
        ));
    }
}
