//! Game modes: named gates over canonical items.
//!
//! A mode lists the items it gates. An item listed by one or more modes is
//! only guessable when every one of those modes is active. Definitions come
//! from the channel document and cannot be created from chat; chat only
//! toggles which of them are active, and only while the game is stopped
//! (the caller enforces that, see [`super::session::GameSession`]).

use std::collections::BTreeSet;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::logutil::escape_log;

/// Keyword that clears every active mode.
pub const NORMAL_MODE: &str = "normal";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeDefinition {
    pub name: String,
    /// Canonical item names gated by this mode.
    #[serde(default)]
    pub items: Vec<String>,
}

impl ModeDefinition {
    pub fn new(name: &str, items: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            items: items.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn gates(&self, item_name: &str) -> bool {
        self.items.iter().any(|gated| gated == item_name)
    }
}

/// Fixed set of mode definitions plus the currently active subset.
#[derive(Debug, Clone, Default)]
pub struct ModeRegistry {
    definitions: Vec<ModeDefinition>,
    active: BTreeSet<String>,
}

impl ModeRegistry {
    pub fn new(definitions: Vec<ModeDefinition>) -> Self {
        Self {
            definitions,
            active: BTreeSet::new(),
        }
    }

    pub fn definitions(&self) -> &[ModeDefinition] {
        &self.definitions
    }

    pub fn active(&self) -> &BTreeSet<String> {
        &self.active
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.active.contains(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.definitions.iter().any(|m| m.name == name)
    }

    /// Whether `item_name` passes every mode that lists it.
    pub fn permits(&self, item_name: &str) -> bool {
        self.definitions
            .iter()
            .filter(|mode| mode.gates(item_name))
            .all(|mode| self.active.contains(&mode.name))
    }

    /// Activate a defined mode. Returns the chat message, or `None` when the
    /// mode is unknown or already active.
    pub fn activate(&mut self, name: &str, username: &str) -> Option<String> {
        if !self.exists(name) {
            debug!("Mode {} is not defined", escape_log(name));
            return None;
        }
        if !self.active.insert(name.to_string()) {
            debug!("Mode {} already active", name);
            return None;
        }
        let message = format!("Mode {} added by {}", name, username);
        info!("{}", message);
        Some(message)
    }

    /// Deactivate a mode. Returns `None` if it was not active.
    pub fn deactivate(&mut self, name: &str, username: &str) -> Option<String> {
        if !self.active.remove(name) {
            debug!("Mode {} is not active", escape_log(name));
            return None;
        }
        let message = format!("Mode {} removed by {}", name, username);
        info!("{}", message);
        Some(message)
    }

    /// Clear every active mode. Always succeeds, even when nothing was active.
    pub fn reset(&mut self, username: &str) -> String {
        self.active.clear();
        let message = format!("Mode reset to normal by {}", username);
        info!("{}", message);
        message
    }

    /// Re-activate modes carried over from a previous registry, skipping any
    /// that no longer exist.
    pub fn restore<I: IntoIterator<Item = String>>(&mut self, names: I) {
        for name in names {
            if self.exists(&name) {
                self.active.insert(name);
            }
        }
    }

    /// Drop active modes without a chat message (used when a game finishes).
    pub fn clear(&mut self) {
        self.active.clear();
    }
}
