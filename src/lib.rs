//! # Guessbot - Chat Guessing Game Bot
//!
//! Guessbot runs prediction games in stream chat: viewers guess which item
//! a player will find next (or where a whole set of items will turn up), and
//! moderators reveal the answers to pay out points.
//!
//! ## Features
//!
//! - **Single-item guesses**: `!guess <item>`, resolved through per-channel item codes.
//! - **Extra families**: ordered multi-slot guesses such as medallion locations,
//!   scored per correct slot with a bonus for a perfect guess.
//! - **Modes**: named modes that gate which items are guessable for a game.
//! - **Points**: session and lifetime totals per participant, with a first-guess bonus.
//! - **Access control**: moderators plus a per-channel whitelist and blacklist.
//! - **Reports**: CSV guess logs written when a game finishes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use guessbot::config::Config;
//! use guessbot::game::{ChatMessage, GameServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let mut server = GameServer::new(config).await?;
//!     let msg = ChatMessage::new("12345", "12345", "streamer", "!start");
//!     if let Some(reply) = server.handle_message(&msg).await {
//!         println!("{}", reply);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`game`] - Game rules, sessions, commands and the channel router
//! - [`storage`] - Channel documents and participant points
//! - [`config`] - Configuration management
//! - [`validation`] - Input validation helpers
//! - [`metrics`] - In-process counters
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   GameServer    │ ← Prefix parsing, permissions, one bot per channel
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ GuessingGameBot │ ← Session state machine, scoring
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   Storage       │ ← Channel documents
//! └─────────────────┘
//! ```

pub mod config;
pub mod game;
pub mod logutil;
pub mod metrics;
pub mod storage;
pub mod validation;
