//! Extra guess families: multi-slot guessables such as medallion-to-dungeon
//! or song-to-location assignments.
//!
//! Each family has an ordered list of items (the slots) and a list of
//! locations, both with their own guess codes. A viewer guesses a family by
//! naming one location per slot in the family's item order.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use super::errors::GameError;
use super::guessables::CodeList;

/// Item name -> location name.
pub type Assignment = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraEntry {
    pub name: String,
    pub codes: CodeList,
}

impl ExtraEntry {
    pub fn new(name: &str, codes: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            codes: CodeList::List(codes.iter().map(|c| c.to_string()).collect()),
        }
    }
}

/// Raw family entry from the channel document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraFamilyConfig {
    pub name: String,
    pub items: Vec<ExtraEntry>,
    pub locations: Vec<ExtraEntry>,
}

#[derive(Debug, Clone)]
struct Named {
    name: String,
    codes: Vec<String>,
}

impl Named {
    fn from_entries(entries: &[ExtraEntry]) -> Vec<Named> {
        entries
            .iter()
            .map(|e| Named {
                name: e.name.clone(),
                codes: e.codes.codes(),
            })
            .collect()
    }
}

fn lookup<'a>(table: &'a [Named], code: &str) -> Option<&'a str> {
    let key = code.trim().to_lowercase();
    table
        .iter()
        .find(|entry| entry.codes.contains(&key))
        .map(|entry| entry.name.as_str())
}

#[derive(Debug, Clone)]
pub struct ExtraFamily {
    name: String,
    items: Vec<Named>,
    locations: Vec<Named>,
}

impl ExtraFamily {
    pub fn from_config(config: &ExtraFamilyConfig) -> Self {
        Self {
            name: config.name.clone(),
            items: Named::from_entries(&config.items),
            locations: Named::from_entries(&config.locations),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of slots a complete guess or final answer covers.
    pub fn slot_count(&self) -> usize {
        self.items.len()
    }

    pub fn resolve_item(&self, code: &str) -> Option<&str> {
        let found = lookup(&self.items, code);
        if let Some(name) = found {
            debug!("{} item {} found", self.name, name);
        }
        found
    }

    pub fn resolve_location(&self, code: &str) -> Option<&str> {
        let found = lookup(&self.locations, code);
        if let Some(name) = found {
            debug!("{} location {} found", self.name, name);
        }
        found
    }

    /// Turn a viewer's ordered location codes into an assignment.
    ///
    /// With a `freebie` item the viewer may leave that slot out; the codes then
    /// map onto the remaining items in order. Nothing is recorded on error.
    pub fn parse_guess(
        &self,
        codes: &[String],
        freebie: Option<&str>,
    ) -> Result<Assignment, GameError> {
        let full = self.slot_count();
        let freebie = freebie.filter(|f| self.items.iter().any(|i| i.name == *f));
        let skip_freebie = match (codes.len(), freebie) {
            (n, _) if n == full => false,
            (n, Some(_)) if n + 1 == full => true,
            (n, _) if n > full => {
                return Err(GameError::OverlongGuess {
                    family: self.name.clone(),
                    expected: full,
                    got: n,
                })
            }
            (n, _) => {
                return Err(GameError::IncompleteGuess {
                    family: self.name.clone(),
                    expected: if freebie.is_some() { full - 1 } else { full },
                    got: n,
                })
            }
        };

        let slots = self
            .items
            .iter()
            .filter(|item| !(skip_freebie && Some(item.name.as_str()) == freebie));
        let mut assignment = Assignment::new();
        for (item, code) in slots.zip(codes) {
            let location = self
                .resolve_location(code)
                .ok_or_else(|| GameError::UnknownLocation {
                    family: self.name.clone(),
                    code: code.clone(),
                })?;
            assignment.insert(item.name.clone(), location.to_string());
        }
        Ok(assignment)
    }

    /// Render an assignment in slot order, one `Item: Location` per line.
    pub fn describe(&self, assignment: &Assignment) -> String {
        self.items
            .iter()
            .map(|item| match assignment.get(&item.name) {
                Some(location) => format!("{}: {}", item.name, location),
                None => format!("{}: -", item.name),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Every extra family configured for a channel.
#[derive(Debug, Clone, Default)]
pub struct ExtraRegistry {
    families: Vec<ExtraFamily>,
}

impl ExtraRegistry {
    pub fn from_configs(configs: &[ExtraFamilyConfig]) -> Self {
        let families = configs.iter().map(ExtraFamily::from_config).collect();
        debug!("Extra items set");
        Self { families }
    }

    pub fn get(&self, name: &str) -> Option<&ExtraFamily> {
        self.families
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn medals_config() -> ExtraFamilyConfig {
        ExtraFamilyConfig {
            name: "medals".to_string(),
            items: vec![
                ExtraEntry::new("Forest Medallion", &["forest"]),
                ExtraEntry::new("Fire Medallion", &["fire"]),
                ExtraEntry::new("Water Medallion", &["water"]),
                ExtraEntry::new("Spirit Medallion", &["spirit"]),
                ExtraEntry::new("Shadow Medallion", &["shadow"]),
                ExtraEntry::new("Light Medallion", &["light"]),
            ],
            locations: vec![
                ExtraEntry::new("Deku Tree", &["deku"]),
                ExtraEntry::new("Dodongo's Cavern", &["dc", "dodongo"]),
                ExtraEntry::new("Jabu Jabu", &["jabu"]),
                ExtraEntry::new("Forest Temple", &["forest"]),
                ExtraEntry::new("Fire Temple", &["fire"]),
                ExtraEntry::new("Water Temple", &["water"]),
                ExtraEntry::new("Shadow Temple", &["shadow"]),
                ExtraEntry::new("Spirit Temple", &["spirit"]),
                ExtraEntry::new("Free", &["free"]),
            ],
        }
    }

    fn codes(raw: &str) -> Vec<String> {
        raw.split_whitespace().map(|s| s.to_string()).collect()
    }

    #[test]
    fn resolves_items_and_locations_separately() {
        let family = ExtraFamily::from_config(&medals_config());
        assert_eq!(family.slot_count(), 6);
        assert_eq!(family.resolve_item("FOREST"), Some("Forest Medallion"));
        assert_eq!(family.resolve_location("forest"), Some("Forest Temple"));
        assert_eq!(family.resolve_location("dodongo"), Some("Dodongo's Cavern"));
        assert!(family.resolve_item("deku").is_none());
    }

    #[test]
    fn full_guess_maps_in_slot_order() {
        let family = ExtraFamily::from_config(&medals_config());
        let guess = family
            .parse_guess(&codes("deku dc jabu forest fire water"), None)
            .unwrap();
        assert_eq!(guess["Forest Medallion"], "Deku Tree");
        assert_eq!(guess["Light Medallion"], "Water Temple");
        assert!(family
            .describe(&guess)
            .starts_with("Forest Medallion: Deku Tree\nFire Medallion: Dodongo's Cavern"));
    }

    #[test]
    fn short_guess_rejected_without_freebie() {
        let family = ExtraFamily::from_config(&medals_config());
        let err = family
            .parse_guess(&codes("deku dc jabu forest fire"), None)
            .unwrap_err();
        assert!(matches!(
            err,
            GameError::IncompleteGuess { expected: 6, got: 5, .. }
        ));
    }

    #[test]
    fn freebie_slot_may_be_omitted() {
        let family = ExtraFamily::from_config(&medals_config());
        let guess = family
            .parse_guess(&codes("deku dc jabu forest fire"), Some("Fire Medallion"))
            .unwrap();
        assert_eq!(guess.len(), 5);
        assert!(!guess.contains_key("Fire Medallion"));
        assert_eq!(guess["Water Medallion"], "Jabu Jabu");
        assert_eq!(guess["Light Medallion"], "Fire Temple");
    }

    #[test]
    fn overlong_and_unknown_locations_rejected() {
        let family = ExtraFamily::from_config(&medals_config());
        assert!(matches!(
            family.parse_guess(&codes("deku dc jabu forest fire water free"), None),
            Err(GameError::OverlongGuess { .. })
        ));
        assert!(matches!(
            family.parse_guess(&codes("deku dc jabu forest fire moon"), None),
            Err(GameError::UnknownLocation { .. })
        ));
    }

    #[test]
    fn registry_lookup_ignores_case() {
        let registry = ExtraRegistry::from_configs(&[medals_config()]);
        assert!(registry.get("MEDALS").is_some());
        assert!(registry.get("songs").is_none());
        assert_eq!(registry.get("Medals").map(|f| f.name()), Some("medals"));
    }
}
