//! Per-channel game session: the STOPPED -> RUNNING -> STOPPED state machine.
//!
//! [`GameSession`] owns everything that lives only for one game: active modes,
//! the resolvable item set, pending guesses, partial extra-family answers,
//! freebies and the guess log. It never touches storage; methods that need
//! participant data take it as an argument, and scoring methods hand back
//! [`Award`]s for the caller to persist.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::errors::GameError;
use super::extra::{Assignment, ExtraRegistry};
use super::guessables::{Guessables, ItemConfig};
use super::ledger::{GuessKind, GuessLedger, GuessPayload, PendingGuess};
use super::modes::ModeRegistry;
use super::scoring::{self, Award, RevealOutcome};
use crate::logutil::escape_log;
use crate::storage::Participant;

/// One guess attempt, written when the guess is made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLogEntry {
    pub timestamp: DateTime<Utc>,
    pub participant_id: String,
    pub participant_name: String,
    /// "Item" or the extra family name.
    pub guess_type: String,
    pub guess: String,
    pub session_points: u32,
    pub total_points: u32,
}

/// What `finish` hands back for archival and reporting.
#[derive(Debug, Clone)]
pub struct FinishedSession {
    pub message: String,
    pub started_at: Option<DateTime<Utc>>,
    pub entries: Vec<SessionLogEntry>,
}

/// Result of assigning the last open slot of a family.
#[derive(Debug, Clone)]
pub struct FamilyCompletion {
    pub family: String,
    pub final_assignment: Assignment,
    pub awards: Vec<Award>,
}

impl FamilyCompletion {
    pub fn message(&self) -> String {
        format!("{} guesses completed", self.family)
    }
}

#[derive(Debug)]
pub struct GameSession {
    running: bool,
    started_at: Option<DateTime<Utc>>,
    stale_after: Duration,
    modes: ModeRegistry,
    guessables: Guessables,
    extras: ExtraRegistry,
    ledger: GuessLedger,
    assignments: HashMap<String, Assignment>,
    freebies: HashMap<String, String>,
    log: Vec<SessionLogEntry>,
}

impl GameSession {
    pub fn new(
        modes: ModeRegistry,
        extras: ExtraRegistry,
        item_blacklist: Vec<String>,
        stale_after: Duration,
    ) -> Self {
        Self {
            running: false,
            started_at: None,
            stale_after,
            modes,
            guessables: Guessables::new(item_blacklist),
            extras,
            ledger: GuessLedger::new(),
            assignments: HashMap::new(),
            freebies: HashMap::new(),
            log: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn modes(&self) -> &ModeRegistry {
        &self.modes
    }

    pub fn guessables(&self) -> &Guessables {
        &self.guessables
    }

    pub fn extras(&self) -> &ExtraRegistry {
        &self.extras
    }

    pub fn ledger(&self) -> &GuessLedger {
        &self.ledger
    }

    pub fn log(&self) -> &[SessionLogEntry] {
        &self.log
    }

    pub fn freebie(&self, family: &str) -> Option<&str> {
        self.freebies.get(family).map(|s| s.as_str())
    }

    pub fn assignment(&self, family: &str) -> Option<&Assignment> {
        self.assignments.get(family)
    }

    /// Replace channel configuration that only matters between games.
    /// Ignored while running so the session's item set stays stable.
    pub fn reconfigure(&mut self, modes: ModeRegistry, extras: ExtraRegistry, item_blacklist: Vec<String>) {
        if self.running {
            debug!("Ignoring reconfigure while the game is running");
            return;
        }
        let active: Vec<String> = self.modes.active().iter().cloned().collect();
        self.modes = modes;
        self.modes.restore(active);
        self.extras = extras;
        self.guessables = Guessables::new(item_blacklist);
    }

    /// Start a game. `Ok(None)` when one is already running; an error when
    /// the item configuration is unusable, in which case the game stays
    /// stopped.
    pub fn start(
        &mut self,
        items: &[ItemConfig],
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, GameError> {
        if self.running {
            info!("Guessing game already running");
            return Ok(None);
        }
        let count = self.guessables.set_items(items, &self.modes)?;
        debug!("{} items guessable this session", count);
        self.running = true;
        self.started_at = Some(now);
        self.log.clear();
        let message = format!("Guessing game started by {}", username);
        info!("{}", message);
        Ok(Some(message))
    }

    /// Finish the running game. `None` when stopped.
    ///
    /// Clears pending guesses, active modes, partial extra answers and
    /// freebies, and hands the guess log back to the caller.
    pub fn finish(&mut self, username: &str) -> Option<FinishedSession> {
        if !self.running {
            info!("Guessing game not running");
            return None;
        }
        self.running = false;
        self.ledger.clear();
        self.modes.clear();
        self.assignments.clear();
        self.freebies.clear();
        self.guessables.clear();
        let message = format!("Guessing game ended by {}", username);
        info!("{}", message);
        Some(FinishedSession {
            message,
            started_at: self.started_at.take(),
            entries: std::mem::take(&mut self.log),
        })
    }

    pub fn add_mode(&mut self, name: &str, username: &str) -> Option<String> {
        if self.running {
            info!("Guessing game already started");
            return None;
        }
        self.modes.activate(name, username)
    }

    pub fn remove_mode(&mut self, name: &str, username: &str) -> Option<String> {
        if self.running {
            info!("Guessing game already started");
            return None;
        }
        self.modes.deactivate(name, username)
    }

    pub fn reset_modes(&mut self, username: &str) -> Option<String> {
        if self.running {
            info!("Guessing game already started");
            return None;
        }
        Some(self.modes.reset(username))
    }

    /// Exempt one item of `family` from viewers' guesses, or clear the
    /// exemption when `item_code` is `None`. Only while stopped.
    pub fn set_freebie(
        &mut self,
        family: &str,
        item_code: Option<&str>,
        username: &str,
    ) -> Result<Option<String>, GameError> {
        if self.running {
            info!("Guessing game already started");
            return Ok(None);
        }
        let extra = self
            .extras
            .get(family)
            .ok_or_else(|| GameError::UnknownFamily(family.to_string()))?;
        let family_name = extra.name().to_string();
        let message = match item_code {
            Some(code) => {
                let item = extra
                    .resolve_item(code)
                    .ok_or_else(|| GameError::UnknownFamilyItem {
                        family: family_name.clone(),
                        code: code.to_string(),
                    })?
                    .to_string();
                let message = format!("{} freebie set to {} by {}", family_name, item, username);
                self.freebies.insert(family_name, item);
                message
            }
            None => {
                self.freebies.remove(&family_name);
                format!("{} freebie cleared by {}", family_name, username)
            }
        };
        info!("{}", message);
        Ok(Some(message))
    }

    fn log_entry(
        &mut self,
        participant: &Participant,
        guess_type: &str,
        guess: String,
        now: DateTime<Utc>,
    ) {
        self.log.push(SessionLogEntry {
            timestamp: now,
            participant_id: participant.user_id.clone(),
            participant_name: participant.username.clone(),
            guess_type: guess_type.to_string(),
            guess,
            session_points: participant.session_points,
            total_points: participant.total_points,
        });
    }

    /// Queue a single-item guess. `Ok(false)` when the game is stopped.
    pub fn guess_item(
        &mut self,
        participant: &Participant,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, GameError> {
        if !self.running {
            info!("Guessing game not running");
            return Ok(false);
        }
        let item = self
            .guessables
            .resolve(code)
            .ok_or_else(|| GameError::UnknownItem(code.to_string()))?
            .to_string();
        let guess = PendingGuess {
            timestamp: now,
            user_id: participant.user_id.clone(),
            username: participant.username.clone(),
            payload: GuessPayload::Item(item.clone()),
        };
        self.ledger.record(GuessKind::Items, guess, now, self.stale_after);
        self.log_entry(participant, "Item", item.clone(), now);
        info!("Item {} guessed by user {}", item, participant.username);
        Ok(true)
    }

    /// Queue a full extra-family guess. `Ok(false)` when the game is stopped.
    pub fn guess_family(
        &mut self,
        participant: &Participant,
        family: &str,
        location_codes: &[String],
        now: DateTime<Utc>,
    ) -> Result<bool, GameError> {
        if !self.running {
            info!("Guessing game not running");
            return Ok(false);
        }
        let extra = self
            .extras
            .get(family)
            .ok_or_else(|| GameError::UnknownFamily(family.to_string()))?;
        let freebie = self.freebies.get(extra.name()).map(|s| s.as_str());
        let assignment = extra.parse_guess(location_codes, freebie)?;
        let family_name = extra.name().to_string();
        let described = extra.describe(&assignment);

        let guess = PendingGuess {
            timestamp: now,
            user_id: participant.user_id.clone(),
            username: participant.username.clone(),
            payload: GuessPayload::Assignment(assignment),
        };
        self.ledger
            .record(GuessKind::Family(family_name.clone()), guess, now, self.stale_after);
        debug!("Extra item guess by {}: {}", participant.username, escape_log(&described));
        self.log_entry(participant, &family_name, described, now);
        Ok(true)
    }

    /// Score a reveal against the pending item guesses. `Ok(None)` while
    /// stopped. The queue is left as is until [`GameSession::settle_reveal`].
    pub fn reveal_item(
        &self,
        code: &str,
        now: DateTime<Utc>,
        points: u32,
        first_bonus: u32,
    ) -> Result<Option<(String, RevealOutcome)>, GameError> {
        if !self.running {
            info!("Guessing game not running");
            return Ok(None);
        }
        let item = self
            .guessables
            .resolve(code)
            .ok_or_else(|| GameError::UnknownItem(code.to_string()))?
            .to_string();
        let queue = self.ledger.queue(&GuessKind::Items).to_vec();
        let outcome = scoring::reveal_item(queue, &item, now, self.stale_after, points, first_bonus);
        info!("{} guesses completed for {}", outcome.awards.len(), item);
        Ok(Some((item, outcome)))
    }

    /// Drop the scored and expired item guesses once awards are persisted.
    pub fn settle_reveal(&mut self, keep: Vec<PendingGuess>) {
        self.ledger.replace(GuessKind::Items, keep);
    }

    /// Assign one slot of a family's final answer. Scoring runs when the last
    /// open slot is filled; until then `Ok(None)`. The answer and the guesses
    /// stay in place until [`GameSession::settle_family`].
    pub fn complete_family(
        &mut self,
        family: &str,
        item_code: &str,
        location_code: &str,
        points: u32,
        first_bonus: u32,
    ) -> Result<Option<FamilyCompletion>, GameError> {
        if !self.running {
            info!("Guessing game not running");
            return Ok(None);
        }
        let extra = self
            .extras
            .get(family)
            .ok_or_else(|| GameError::UnknownFamily(family.to_string()))?;
        let family_name = extra.name().to_string();
        let item = extra
            .resolve_item(item_code)
            .ok_or_else(|| GameError::UnknownFamilyItem {
                family: family_name.clone(),
                code: item_code.to_string(),
            })?
            .to_string();
        let location = extra
            .resolve_location(location_code)
            .ok_or_else(|| GameError::UnknownLocation {
                family: family_name.clone(),
                code: location_code.to_string(),
            })?
            .to_string();
        let slot_count = extra.slot_count();
        info!("{} is at {}", item, location);

        let assigned = self.assignments.entry(family_name.clone()).or_default();
        assigned.insert(item, location);
        if assigned.len() < slot_count {
            debug!("{} has {}/{} slots assigned", family_name, assigned.len(), slot_count);
            return Ok(None);
        }

        let final_assignment = assigned.clone();
        info!("Completing {} guesses", family_name);
        let queue = self.ledger.queue(&GuessKind::Family(family_name.clone()));
        let freebie = self.freebies.get(&family_name).map(|s| s.as_str());
        let awards = scoring::score_family(
            &family_name,
            queue,
            &final_assignment,
            freebie,
            points,
            first_bonus,
        );
        Ok(Some(FamilyCompletion {
            family: family_name,
            final_assignment,
            awards,
        }))
    }

    /// Clear a completed family's answer and guesses once awards are
    /// persisted. An answer reassigned since completion is kept.
    pub fn settle_family(&mut self, completion: &FamilyCompletion) {
        if self.assignments.get(&completion.family) == Some(&completion.final_assignment) {
            self.assignments.remove(&completion.family);
        }
        self.ledger.take(&GuessKind::Family(completion.family.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::super::extra::tests::medals_config;
    use super::super::ledger::tests::at;
    use super::super::modes::ModeDefinition;
    use super::*;

    fn participant(name: &str) -> Participant {
        Participant {
            username: name.to_string(),
            user_id: format!("id-{}", name),
            session_points: 3,
            total_points: 10,
        }
    }

    fn session() -> GameSession {
        GameSession::new(
            ModeRegistry::new(vec![ModeDefinition::new("egg", &["Child Trade"])]),
            ExtraRegistry::from_configs(&[medals_config()]),
            Vec::new(),
            Duration::minutes(15),
        )
    }

    fn items() -> Vec<ItemConfig> {
        vec![
            ItemConfig::new("Bow", &["bow"]),
            ItemConfig::new("Hookshot", &["hookshot", "hook"]),
            ItemConfig::new("Child Trade", &["egg"]),
        ]
    }

    fn codes(raw: &str) -> Vec<String> {
        raw.split_whitespace().map(|s| s.to_string()).collect()
    }

    #[test]
    fn start_twice_is_a_noop() {
        let mut game = session();
        assert_eq!(
            game.start(&items(), "mod", at(0)).unwrap().as_deref(),
            Some("Guessing game started by mod")
        );
        assert!(game.start(&items(), "mod", at(1)).unwrap().is_none());
        assert!(game.is_running());
    }

    #[test]
    fn duplicate_codes_keep_game_stopped() {
        let mut game = session();
        let clash = vec![ItemConfig::new("Bow", &["bow"]), ItemConfig::new("Slingshot", &["BOW"])];
        assert!(matches!(
            game.start(&clash, "mod", at(0)),
            Err(GameError::Invalid(_))
        ));
        assert!(!game.is_running());
    }

    #[test]
    fn modes_are_frozen_while_running() {
        let mut game = session();
        assert!(game.add_mode("egg", "mod").is_some());
        game.start(&items(), "mod", at(0)).unwrap();
        assert!(game.remove_mode("egg", "mod").is_none());
        assert!(game.reset_modes("mod").is_none());
        assert!(game.modes().is_active("egg"));
        assert_eq!(game.guessables().resolve("egg"), Some("Child Trade"));
    }

    #[test]
    fn guesses_require_a_running_game() {
        let mut game = session();
        let alice = participant("alice");
        assert!(!game.guess_item(&alice, "bow", at(0)).unwrap());
        assert!(game.ledger().is_empty());
        assert!(game.log().is_empty());
        assert!(game.reveal_item("bow", at(0), 1, 1).unwrap().is_none());
    }

    #[test]
    fn unknown_item_is_an_input_error() {
        let mut game = session();
        game.start(&items(), "mod", at(0)).unwrap();
        let err = game.guess_item(&participant("alice"), "sm64", at(1)).unwrap_err();
        assert_eq!(err.chat_message().as_deref(), Some("Item sm64 not found"));
        assert!(game.ledger().is_empty());
    }

    #[test]
    fn guess_is_logged_with_points_snapshot() {
        let mut game = session();
        game.start(&items(), "mod", at(0)).unwrap();
        assert!(game.guess_item(&participant("alice"), "HOOK", at(1)).unwrap());
        let entry = &game.log()[0];
        assert_eq!(entry.guess_type, "Item");
        assert_eq!(entry.guess, "Hookshot");
        assert_eq!((entry.session_points, entry.total_points), (3, 10));
    }

    #[test]
    fn reveal_flushes_matches_only() {
        let mut game = session();
        game.start(&items(), "mod", at(0)).unwrap();
        game.guess_item(&participant("alice"), "bow", at(1)).unwrap();
        game.guess_item(&participant("bob"), "hook", at(2)).unwrap();
        game.guess_item(&participant("carol"), "bow", at(3)).unwrap();

        let (item, outcome) = game.reveal_item("bow", at(4), 1, 1).unwrap().unwrap();
        assert_eq!(item, "Bow");
        assert_eq!(outcome.awards.len(), 2);
        assert_eq!(outcome.awards[0].username, "alice");
        assert_eq!(outcome.awards[0].points, 2);
        // nothing is flushed until the caller settles
        assert_eq!(game.ledger().queue(&GuessKind::Items).len(), 3);
        game.settle_reveal(outcome.keep);
        assert_eq!(game.ledger().queue(&GuessKind::Items).len(), 1);
    }

    #[test]
    fn family_scores_once_every_slot_is_assigned() {
        let mut game = session();
        game.start(&items(), "mod", at(0)).unwrap();
        game.guess_family(
            &participant("alice"),
            "medals",
            &codes("deku dc jabu forest fire water"),
            at(1),
        )
        .unwrap();
        assert!(game.log()[0].guess.contains("Forest Medallion: Deku Tree"));

        let finals = [
            ("forest", "deku"),
            ("fire", "dc"),
            ("water", "jabu"),
            ("spirit", "forest"),
            ("shadow", "shadow"),
        ];
        for (item, location) in finals {
            assert!(game
                .complete_family("medals", item, location, 1, 1)
                .unwrap()
                .is_none());
        }
        // Re-assigning a slot does not complete the family.
        assert!(game
            .complete_family("medals", "shadow", "spirit", 1, 1)
            .unwrap()
            .is_none());
        let done = game
            .complete_family("medals", "light", "free", 1, 1)
            .unwrap()
            .unwrap();
        assert_eq!(done.message(), "medals guesses completed");
        assert_eq!(done.awards[0].correct, 4);
        assert_eq!(done.awards[0].points, 4);
        assert_eq!(game.assignment("medals"), Some(&done.final_assignment));

        // Unsettled, the same completion can be scored again.
        let again = game
            .complete_family("medals", "light", "free", 1, 1)
            .unwrap()
            .unwrap();
        assert_eq!(again.awards, done.awards);

        game.settle_family(&done);
        assert!(game.assignment("medals").is_none());
        assert!(game.ledger().queue(&GuessKind::Family("medals".into())).is_empty());
    }

    #[test]
    fn freebie_only_configurable_while_stopped() {
        let mut game = session();
        assert_eq!(
            game.set_freebie("medals", Some("light"), "mod").unwrap().as_deref(),
            Some("medals freebie set to Light Medallion by mod")
        );
        assert!(matches!(
            game.set_freebie("medals", Some("kokiri"), "mod"),
            Err(GameError::UnknownFamilyItem { .. })
        ));
        game.start(&items(), "mod", at(0)).unwrap();
        assert!(game.set_freebie("medals", None, "mod").unwrap().is_none());
        assert!(game
            .guess_family(
                &participant("alice"),
                "medals",
                &codes("deku dc jabu forest fire"),
                at(1),
            )
            .unwrap());
    }

    #[test]
    fn finish_resets_session_state() {
        let mut game = session();
        game.add_mode("egg", "mod");
        game.start(&items(), "mod", at(0)).unwrap();
        game.guess_item(&participant("alice"), "bow", at(1)).unwrap();
        game.complete_family("medals", "forest", "deku", 1, 1).unwrap();

        let finished = game.finish("mod").unwrap();
        assert_eq!(finished.message, "Guessing game ended by mod");
        assert_eq!(finished.entries.len(), 1);
        assert!(game.ledger().is_empty());
        assert!(game.modes().active().is_empty());
        assert!(game.assignment("medals").is_none());
        assert!(game.finish("mod").is_none());

        game.start(&items(), "mod", at(30)).unwrap();
        assert!(game.log().is_empty());
    }
}
