//! Guessing game core: items, extra families, modes, the guess ledger,
//! scoring, the session state machine and the per-channel bot.

pub mod bot;
pub mod commands;
pub mod errors;
pub mod extra;
pub mod guessables;
pub mod ledger;
pub mod modes;
pub mod report;
pub mod scoring;
pub mod server;
pub mod session;

pub use bot::{Caller, GuessingGameBot};
pub use errors::GameError;
pub use server::{ChatMessage, GameServer};
pub use session::GameSession;
