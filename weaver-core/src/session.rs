//! GameSession - the turn loop and primary public API.
//!
//! The session owns the state machine `NotStarted -> WorldGenerated ->
//! InProgress -> Climax -> Ended` and is the only component that advances the
//! turn counter. Every accepted command performs exactly one transition and
//! always yields a player-visible response, however degraded.

use std::sync::Arc;

use thiserror::Error;

use crate::coordinator::{Coordinator, Routing};
use crate::prompts;
use crate::roles::{invoke_role, ModelSettings, NarrativeModel, RoleKind, RoleReport};
use crate::state::{GameState, Theme};

/// Errors from session construction and startup.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no API key configured - set ANTHROPIC_API_KEY environment variable")]
    NoApiKey,

    #[error("the adventure has already begun")]
    AlreadyStarted,
}

/// Configuration for a new game session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Player display name.
    pub player_name: String,
    /// Story theme.
    pub theme: Theme,
    /// Number of ordinary turns before the climax.
    pub turn_limit: u32,
    /// Model override; the client default is used when unset.
    pub model: Option<String>,
    /// Maximum tokens per role completion.
    pub max_tokens: usize,
    /// Generation temperature.
    pub temperature: f32,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self {
            player_name: "Adventurer".to_string(),
            theme: Theme::default(),
            turn_limit: 5,
            model: None,
            max_tokens: 1024,
            temperature: 0.8,
        }
    }

    pub fn with_player_name(mut self, name: impl Into<String>) -> Self {
        self.player_name = name.into();
        self
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    pub fn with_turn_limit(mut self, limit: u32) -> Self {
        self.turn_limit = limit.max(1);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the session stands in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    NotStarted,
    WorldGenerated,
    InProgress { turn: u32 },
    Climax,
    Ended,
}

/// One player-visible response.
#[derive(Debug, Clone)]
pub struct Response {
    /// Merged narrative, in role invocation order.
    pub narrative: String,
    /// Phase after handling this input.
    pub phase: TurnPhase,
    /// Turn counter after handling this input.
    pub turn: u32,
    /// Effect descriptions of state mutations applied this turn.
    pub effects: Vec<String>,
}

/// An interactive fiction session.
pub struct GameSession {
    model: Arc<dyn NarrativeModel>,
    coordinator: Coordinator,
    state: GameState,
    phase: TurnPhase,
    settings: ModelSettings,
}

impl GameSession {
    /// Create a session backed by the Claude API.
    ///
    /// Requires `ANTHROPIC_API_KEY`; a missing credential fails here, before
    /// any turn begins.
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        let client = claude::Claude::from_env().map_err(|_| SessionError::NoApiKey)?;
        Ok(Self::with_model(Arc::new(client), config))
    }

    /// Create a session with any narrative model. Tests use this with the
    /// scripted model.
    pub fn with_model(model: Arc<dyn NarrativeModel>, config: SessionConfig) -> Self {
        let state = GameState::new(config.player_name.clone(), config.theme, config.turn_limit);
        let settings = ModelSettings {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        };
        Self {
            model,
            coordinator: Coordinator::new(),
            state,
            phase: TurnPhase::NotStarted,
            settings,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn is_over(&self) -> bool {
        self.phase == TurnPhase::Ended
    }

    /// Turn 0: generate the starting world through the World role.
    pub async fn begin(&mut self) -> Result<Response, SessionError> {
        if self.phase != TurnPhase::NotStarted {
            return Err(SessionError::AlreadyStarted);
        }

        let instruction = prompts::opening_instruction(&self.state);
        let report = invoke_role(
            self.model.as_ref(),
            self.coordinator.role(RoleKind::World),
            &mut self.state,
            &instruction,
            &self.settings,
        )
        .await;

        let mut narrative = report.player_text();
        if self.state.location_count() == 0 {
            // Degraded opening: seed a minimal start so the invariants hold
            // and the session remains playable.
            let (name, description) = fallback_opening(self.state.theme());
            if let Ok(effect) = self.state.add_location(name, description, Vec::new()) {
                if !narrative.is_empty() {
                    narrative.push('\n');
                }
                narrative.push_str(&effect);
            }
        }

        self.phase = TurnPhase::WorldGenerated;
        log::info!("world generated: {} locations", self.state.location_count());

        Ok(Response {
            narrative,
            phase: self.phase,
            turn: self.state.turn().current(),
            effects: report.effects,
        })
    }

    /// Handle one line of player input.
    ///
    /// Never fails: model errors, parse failures, and rejected tool calls
    /// all degrade into the returned narrative.
    pub async fn command(&mut self, input: &str) -> Response {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return self.direct("Say what you do, or type `help`.".to_string());
        }

        if matches!(trimmed.to_lowercase().as_str(), "quit" | "exit" | "q") {
            let text = format!(
                "You step away from the story.\n\n{}",
                summary_text(&self.state)
            );
            self.phase = TurnPhase::Ended;
            return self.direct(text);
        }

        match self.phase {
            TurnPhase::NotStarted => {
                self.direct("The adventure has not started yet.".to_string())
            }
            TurnPhase::Ended => self.direct(
                "The story has ended. Thanks for playing.".to_string(),
            ),
            TurnPhase::Climax => self.render_epilogue().await,
            TurnPhase::WorldGenerated | TurnPhase::InProgress { .. } => {
                match self.coordinator.route(trimmed, &self.state) {
                    Routing::Direct(text) => self.direct(text),
                    Routing::Delegate(kinds) => self.run_roles(trimmed, kinds).await,
                }
            }
        }
    }

    /// Invoke the selected roles sequentially and advance the turn.
    async fn run_roles(&mut self, command: &str, kinds: Vec<RoleKind>) -> Response {
        self.state.start_command();
        let final_turn = self.state.turn().remaining() == 1;

        let mut reports: Vec<RoleReport> = Vec::with_capacity(kinds.len());
        for kind in kinds {
            let instruction = if kind == RoleKind::Story && final_turn {
                format!(
                    "{command}\n\n(This is the final turn: bring the story to its climax.)"
                )
            } else {
                command.to_string()
            };
            let report = invoke_role(
                self.model.as_ref(),
                self.coordinator.role(kind),
                &mut self.state,
                &instruction,
                &self.settings,
            )
            .await;
            reports.push(report);
        }

        debug_assert!(self.state.check_invariants().is_ok());

        // A command whose only outcome was rejected tool calls is refused
        // outright: the state did not change, so the turn is not consumed.
        let contributed = reports.iter().any(RoleReport::contributed);
        if !contributed {
            let notes: Vec<String> = reports
                .iter()
                .flat_map(|r| r.failures.iter())
                .map(|f| f.to_string())
                .collect();
            let narrative = format!("That doesn't work. ({})", notes.join("; "));
            return self.direct(narrative);
        }

        let turn = self.state.advance_turn();
        self.phase = if self.state.turn().at_limit() {
            TurnPhase::Climax
        } else {
            TurnPhase::InProgress { turn }
        };

        let narrative = reports
            .iter()
            .map(RoleReport::player_text)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        let effects = reports
            .into_iter()
            .flat_map(|r| r.effects)
            .collect();

        Response {
            narrative,
            phase: self.phase,
            turn,
            effects,
        }
    }

    /// The final interaction: epilogue from the Story role, then `Ended`.
    async fn render_epilogue(&mut self) -> Response {
        let instruction = prompts::epilogue_instruction(&self.state);
        let report = invoke_role(
            self.model.as_ref(),
            self.coordinator.role(RoleKind::Story),
            &mut self.state,
            &instruction,
            &self.settings,
        )
        .await;

        self.phase = TurnPhase::Ended;
        let narrative = format!(
            "{}\n\n{}",
            report.player_text(),
            summary_text(&self.state)
        );

        Response {
            narrative,
            phase: self.phase,
            turn: self.state.turn().current(),
            effects: report.effects,
        }
    }

    fn direct(&self, narrative: String) -> Response {
        Response {
            narrative,
            phase: self.phase,
            turn: self.state.turn().current(),
            effects: Vec::new(),
        }
    }
}

/// Starting location used when the opening completion degrades.
fn fallback_opening(theme: Theme) -> (&'static str, &'static str) {
    match theme {
        Theme::FantasyAdventure => (
            "The Old Crossroads",
            "A mist-wreathed crossroads beneath ancient oaks.",
        ),
        Theme::SciFiExploration => (
            "Docking Bay Seven",
            "A humming bay lit by strips of pale blue light.",
        ),
        Theme::MysteryDetective => (
            "The Rain-Slick Street",
            "Neon bleeds across wet cobblestones.",
        ),
        Theme::HorrorSurvival => (
            "The Broken Gate",
            "A rusted gate hangs open onto overgrown grounds.",
        ),
        Theme::ModernThriller => (
            "The Station Concourse",
            "Crowds stream past under departure boards.",
        ),
        Theme::SteampunkAdventure => (
            "The Brass Terminus",
            "Steam curls around idle clockwork carriages.",
        ),
    }
}

/// Final summary shown on quit and at the end of the story.
fn summary_text(state: &GameState) -> String {
    let minutes = (chrono::Utc::now() - state.started_at()).num_minutes().max(0);
    let characters: Vec<&str> = state
        .characters()
        .map(|(_, c)| c.name.as_str())
        .collect();
    let met = if characters.is_empty() {
        "no one".to_string()
    } else {
        characters.join(", ")
    };
    format!(
        "{} played {} turns over {} minutes, explored {} places, met {}, and made {} choices.",
        state.player().name,
        state.turn().current(),
        minutes,
        state.location_count(),
        met,
        state.player().choices.len()
    )
}
