//! Item taxonomy: resolves chat guess codes to canonical item names.
//!
//! The resolvable set is rebuilt once per game start by [`Guessables::set_items`]
//! from the channel's item configuration, the channel's name blacklist and the
//! modes active at that moment. During play only [`Guessables::resolve`] runs,
//! which is a single hash lookup.
//!
//! Items are dropped from the resolvable set (they behave as if they did not
//! exist) when their name contains a blacklisted substring, or when a mode
//! that gates them is not active.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use super::modes::ModeRegistry;
use crate::logutil::escape_log;
use crate::validation::{check_unique_codes, ValidationError};

/// Guess codes as stored by the dashboard: either a list, or one
/// comma-separated string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CodeList {
    List(Vec<String>),
    Joined(String),
}

impl CodeList {
    pub fn codes(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            CodeList::List(list) => list.iter().map(|s| s.as_str()).collect(),
            CodeList::Joined(joined) => joined.split(',').collect(),
        };
        raw.into_iter()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect()
    }
}

/// One progressive stage of an item (e.g. Hookshot then Longshot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStage {
    #[serde(default)]
    pub codes: Option<CodeList>,
}

/// Raw item entry from the channel document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codes: Option<CodeList>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<ItemStage>,
}

impl ItemConfig {
    pub fn new(name: &str, codes: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            codes: Some(CodeList::List(codes.iter().map(|c| c.to_string()).collect())),
            stages: Vec::new(),
        }
    }

    /// All codes for this item, lowercased. Direct codes win over stages; a
    /// stage sharing a code with an earlier stage is skipped entirely.
    pub fn all_codes(&self) -> Vec<String> {
        if let Some(codes) = &self.codes {
            return codes.codes();
        }
        let mut out: Vec<String> = Vec::new();
        for stage in &self.stages {
            let Some(stage_codes) = &stage.codes else {
                continue;
            };
            let stage_codes = stage_codes.codes();
            if stage_codes.iter().any(|c| out.contains(c)) {
                continue;
            }
            out.extend(stage_codes);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalItem {
    pub name: String,
    pub codes: Vec<String>,
}

/// The resolvable item set for one channel.
#[derive(Debug, Clone, Default)]
pub struct Guessables {
    blacklist: Vec<String>,
    items: Vec<CanonicalItem>,
    index: HashMap<String, usize>,
}

impl Guessables {
    pub fn new(blacklist: Vec<String>) -> Self {
        Self {
            blacklist,
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn items(&self) -> &[CanonicalItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_blacklisted(&self, item_name: &str) -> bool {
        self.blacklist
            .iter()
            .any(|skip| !skip.is_empty() && item_name.contains(skip.as_str()))
    }

    /// Rebuild the resolvable set. On error the previous set is kept.
    pub fn set_items(
        &mut self,
        raw: &[ItemConfig],
        modes: &ModeRegistry,
    ) -> Result<usize, ValidationError> {
        let mut items = Vec::new();
        for entry in raw {
            if self.is_blacklisted(&entry.name) {
                debug!("Item {} is blacklisted", entry.name);
                continue;
            }
            if !modes.permits(&entry.name) {
                debug!(
                    "Item {} not allowed in active modes {:?}",
                    entry.name,
                    modes.active()
                );
                continue;
            }
            let codes = entry.all_codes();
            debug!("Item {} with codes {:?} found", entry.name, codes);
            items.push(CanonicalItem {
                name: entry.name.clone(),
                codes,
            });
        }
        check_unique_codes(items.iter().map(|i| (i.name.as_str(), i.codes.as_slice())))?;

        let mut index = HashMap::new();
        for (pos, item) in items.iter().enumerate() {
            for code in &item.codes {
                index.entry(code.clone()).or_insert(pos);
            }
        }
        self.items = items;
        self.index = index;
        debug!("Items set ({} resolvable)", self.items.len());
        Ok(self.items.len())
    }

    /// Resolve a guess code to the canonical item name.
    pub fn resolve(&self, code: &str) -> Option<&str> {
        let key = code.trim().to_lowercase();
        match self.index.get(&key) {
            Some(&pos) => {
                let name = self.items[pos].name.as_str();
                debug!("Item {} found", name);
                Some(name)
            }
            None => {
                debug!("No item for code {}", escape_log(&key));
                None
            }
        }
    }

    /// Drop the resolvable set (used when a game finishes).
    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }
}
