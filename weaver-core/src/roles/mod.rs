//! Storyteller roles.
//!
//! Each role wraps a subset of the tools behind a role-specific prompt. A
//! shared driver performs the single completion per invocation, applies the
//! parsed tool calls to the game state, and handles the two degraded paths:
//! one retry on a failed model call, one corrective retry on unparseable
//! tool directives. A role never fabricates state; when everything fails it
//! returns narrative text only.

pub mod character;
pub mod story;
pub mod world;

pub use character::CharacterRole;
pub use story::StoryRole;
pub use world::WorldRole;

use async_trait::async_trait;

use crate::state::GameState;
use crate::tools::{parse_tool_call, ToolCall};

/// Identifier for one of the three specialists, in fixed invocation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RoleKind {
    World,
    Character,
    Story,
}

impl RoleKind {
    pub fn name(&self) -> &'static str {
        match self {
            RoleKind::World => "World",
            RoleKind::Character => "Character",
            RoleKind::Story => "Story",
        }
    }
}

/// The seam to the language model. `claude::Claude` is the production
/// implementation; tests swap in a scripted model.
#[async_trait]
pub trait NarrativeModel: Send + Sync {
    async fn complete(&self, request: claude::Request)
        -> Result<claude::Response, claude::Error>;
}

#[async_trait]
impl NarrativeModel for claude::Claude {
    async fn complete(
        &self,
        request: claude::Request,
    ) -> Result<claude::Response, claude::Error> {
        claude::Claude::complete(self, request).await
    }
}

/// A specialist storytelling role.
pub trait Role: Send + Sync {
    fn kind(&self) -> RoleKind;

    /// Keywords that route a command to this role.
    fn triggers(&self) -> &'static [&'static str];

    /// The tools this role may call.
    fn tools(&self) -> Vec<claude::Tool>;

    /// System prompt built from the current state snapshot.
    fn system_prompt(&self, state: &GameState) -> String;

    /// In-character filler used when the model is unavailable.
    fn fallback_line(&self, state: &GameState) -> String;

    /// Whether the command hits this role's trigger vocabulary.
    ///
    /// Single-word triggers match whole words only ("go" must not fire on
    /// "dragon"); multi-word triggers match as substrings.
    fn matches(&self, command: &str) -> bool {
        let lower = command.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        self.triggers().iter().any(|trigger| {
            if trigger.contains(' ') {
                lower.contains(trigger)
            } else {
                words.contains(trigger)
            }
        })
    }
}

/// Generation settings shared by every role invocation.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub model: Option<String>,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 1024,
            temperature: 0.8,
        }
    }
}

/// What one role invocation produced.
#[derive(Debug, Clone)]
pub struct RoleReport {
    pub role: RoleKind,
    /// Narrative text for the player, in invocation order.
    pub narrative: String,
    /// Effect descriptions of the state mutations that were applied.
    pub effects: Vec<String>,
    /// Player-visible failure notes from rejected tool calls.
    pub failures: Vec<String>,
    /// True when the model call itself failed and the filler line was used.
    pub degraded: bool,
}

impl RoleReport {
    pub fn mutated(&self) -> bool {
        !self.effects.is_empty()
    }

    /// Whether the role actually added something to the turn: applied
    /// effects or model narrative. Failure notes alone do not count.
    pub fn contributed(&self) -> bool {
        self.mutated() || !self.narrative.trim().is_empty()
    }

    /// The text shown to the player: narrative plus failure notes.
    pub fn player_text(&self) -> String {
        let mut text = self.narrative.trim().to_string();
        for failure in &self.failures {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&format!("({failure})"));
        }
        text
    }
}

/// Invoke a role once: one completion, parsed tool calls applied to the
/// state, one corrective retry if directives were unrecognizable.
pub async fn invoke_role(
    model: &dyn NarrativeModel,
    role: &dyn Role,
    state: &mut GameState,
    instruction: &str,
    settings: &ModelSettings,
) -> RoleReport {
    let system = role.system_prompt(state);
    let mut messages = vec![claude::Message::user(instruction)];

    let request = build_request(role, &system, messages.clone(), settings);
    let response = match complete_with_retry(model, request).await {
        Ok(response) => response,
        Err(error) => {
            log::warn!("{} role: model call failed: {error}", role.kind().name());
            return RoleReport {
                role: role.kind(),
                narrative: role.fallback_line(state),
                effects: Vec::new(),
                failures: Vec::new(),
                degraded: true,
            };
        }
    };

    let mut report = RoleReport {
        role: role.kind(),
        narrative: response.text(),
        effects: Vec::new(),
        failures: Vec::new(),
        degraded: false,
    };

    let (results, any_unparsed) = apply_tool_uses(&response, state, &mut report);

    if any_unparsed {
        // Corrective retry: answer every call (the API requires a result per
        // tool_use), attach the correction, and give the model one more shot.
        messages.push(claude::Message {
            role: claude::Role::Assistant,
            content: response.content.clone(),
        });
        let mut content: Vec<claude::ContentBlock> = results
            .into_iter()
            .map(|(id, result)| result.into_block(id))
            .collect();
        content.push(claude::ContentBlock::Text {
            text: crate::prompts::corrective_instruction().to_string(),
        });
        messages.push(claude::Message {
            role: claude::Role::User,
            content,
        });

        let retry_request = build_request(role, &system, messages, settings);
        match model.complete(retry_request).await {
            Ok(retry_response) => {
                let retry_text = retry_response.text();
                if !retry_text.trim().is_empty() {
                    if !report.narrative.trim().is_empty() {
                        report.narrative.push('\n');
                    }
                    report.narrative.push_str(&retry_text);
                }
                // Still-unparseable calls are dropped: narrative-only fallback.
                let _ = apply_tool_uses(&retry_response, state, &mut report);
            }
            Err(error) => {
                log::warn!(
                    "{} role: corrective retry failed: {error}",
                    role.kind().name()
                );
            }
        }
    }

    // A response that produced nothing at all gets the filler line. A
    // response whose only content is rejected tool calls keeps its empty
    // narrative: the session treats that as a failed command.
    if report.narrative.trim().is_empty()
        && report.effects.is_empty()
        && report.failures.is_empty()
    {
        report.narrative = role.fallback_line(state);
    }

    report
}

fn build_request(
    role: &dyn Role,
    system: &str,
    messages: Vec<claude::Message>,
    settings: &ModelSettings,
) -> claude::Request {
    let mut request = claude::Request::new(messages)
        .with_system(system)
        .with_max_tokens(settings.max_tokens)
        .with_temperature(settings.temperature)
        .with_tools(role.tools())
        .with_tool_choice(claude::ToolChoice::Auto);
    if let Some(model) = &settings.model {
        request = request.with_model(model.clone());
    }
    request
}

async fn complete_with_retry(
    model: &dyn NarrativeModel,
    request: claude::Request,
) -> Result<claude::Response, claude::Error> {
    match model.complete(request.clone()).await {
        Ok(response) => Ok(response),
        Err(first) => {
            log::warn!("model call failed, retrying once: {first}");
            model.complete(request).await
        }
    }
}

/// Parse and apply every tool use in a response. Returns one result per call
/// and whether any call was unrecognizable.
fn apply_tool_uses(
    response: &claude::Response,
    state: &mut GameState,
    report: &mut RoleReport,
) -> (Vec<(String, claude::ToolResult)>, bool) {
    let mut results = Vec::new();
    let mut any_unparsed = false;

    for tool_use in response.tool_uses() {
        let call = parse_tool_call(&tool_use.name, &tool_use.input);
        if let ToolCall::Unparsed { name, .. } = &call {
            log::warn!("unrecognized tool directive `{name}`");
            any_unparsed = true;
            results.push((
                tool_use.id.clone(),
                claude::ToolResult::error(format!(
                    "unrecognized tool or arguments for `{name}`"
                )),
            ));
            continue;
        }

        match call.apply(state) {
            Ok(effect) => {
                report.effects.push(effect.clone());
                results.push((tool_use.id.clone(), claude::ToolResult::success(effect)));
            }
            Err(error) => {
                log::warn!("tool `{}` rejected: {error}", call.name());
                report.failures.push(error.to_string());
                results.push((
                    tool_use.id.clone(),
                    claude::ToolResult::error(error.to_string()),
                ));
            }
        }
    }

    (results, any_unparsed)
}
