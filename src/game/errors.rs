use thiserror::Error;

use crate::validation::ValidationError;

/// Failures raised while handling a game command.
///
/// None of these are fatal. The channel bot logs them and, when the variant
/// has a viewer-facing message, relays it to chat.
#[derive(Debug, Error)]
pub enum GameError {
    /// A command was invoked without the arguments it needs.
    #[error("{usage}")]
    MissingArguments {
        command: &'static str,
        usage: &'static str,
    },

    /// A single-item code that no active item answers to.
    #[error("Item {0} not found")]
    UnknownItem(String),

    /// An extra-guess family name that is not configured for the channel.
    #[error("Unknown guess type {0}")]
    UnknownFamily(String),

    /// An item code inside a family that does not resolve.
    #[error("{family} does not have an item with code {code}")]
    UnknownFamilyItem { family: String, code: String },

    /// A location code inside a family that does not resolve.
    #[error("{family} does not have a location with code {code}")]
    UnknownLocation { family: String, code: String },

    /// An extra guess that does not cover every slot of the family.
    #[error("{family} guess needs {expected} locations, got {got}")]
    IncompleteGuess {
        family: String,
        expected: usize,
        got: usize,
    },

    /// An extra guess with more locations than the family has slots.
    #[error("{family} guess has {got} locations but only {expected} are needed")]
    OverlongGuess {
        family: String,
        expected: usize,
        got: usize,
    },

    /// Argument or configuration validation failure.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// Persistence layer failure.
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl GameError {
    /// The message relayed to chat, if this error is one viewers should see.
    pub fn chat_message(&self) -> Option<String> {
        match self {
            GameError::Storage(_) => None,
            other => Some(other.to_string()),
        }
    }
}
