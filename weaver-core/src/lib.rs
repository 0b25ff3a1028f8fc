//! Multi-agent interactive fiction engine.
//!
//! This crate provides:
//! - A validated, single-source-of-truth game state
//! - Three AI storyteller roles (World, Character, Story) with typed tools
//! - A coordinator that routes player commands to roles
//! - A fixed-length turn loop with climax and epilogue
//!
//! # Quick Start
//!
//! ```ignore
//! use weaver_core::{GameSession, SessionConfig, Theme};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::new()
//!         .with_player_name("Robin")
//!         .with_theme(Theme::MysteryDetective);
//!
//!     let mut session = GameSession::new(config)?;
//!     println!("{}", session.begin().await?.narrative);
//!
//!     let response = session.command("look around").await;
//!     println!("{}", response.narrative);
//!     Ok(())
//! }
//! ```

pub mod coordinator;
pub mod prompts;
pub mod roles;
pub mod session;
pub mod state;
pub mod testing;
pub mod tools;

// Primary public API
pub use coordinator::{Coordinator, Routing};
pub use roles::{ModelSettings, NarrativeModel, RoleKind, RoleReport};
pub use session::{GameSession, Response, SessionConfig, SessionError, TurnPhase};
pub use state::{GameState, StateError, StoryPhase, Theme};
pub use testing::ScriptedModel;
pub use tools::{parse_tool_call, RoleTools, ToolCall};
