//! Scoring engine.
//!
//! Pure functions over ledger queues. They compute [`Award`]s and the queue
//! that remains; persisting the awards is the caller's job. The session only
//! drops scored guesses once that has succeeded.

use chrono::{DateTime, Duration, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use super::extra::Assignment;
use super::ledger::{GuessPayload, PendingGuess};

/// Points owed to one participant by a reveal or completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Award {
    pub user_id: String,
    pub username: String,
    pub points: u32,
    /// Correct slots (always 1 for a single-item reveal).
    pub correct: usize,
    /// Whether `points` includes the first-guess or perfect-guess bonus.
    pub bonus: bool,
}

#[derive(Debug, Default)]
pub struct RevealOutcome {
    pub awards: Vec<Award>,
    /// Live guesses for other items, in their original order.
    pub keep: Vec<PendingGuess>,
}

impl RevealOutcome {
    pub fn total_points(&self) -> u32 {
        total(&self.awards)
    }
}

pub fn total(awards: &[Award]) -> u32 {
    awards.iter().fold(0u32, |acc, a| acc.saturating_add(a.points))
}

/// Score a single-item reveal.
///
/// Expired guesses are dropped. Every live guess for `item` is flushed and
/// paid `points`; the earliest of them also gets `first_bonus`.
pub fn reveal_item(
    queue: Vec<PendingGuess>,
    item: &str,
    now: DateTime<Utc>,
    stale_after: Duration,
    points: u32,
    first_bonus: u32,
) -> RevealOutcome {
    let mut outcome = RevealOutcome::default();
    for guess in queue {
        if !guess.is_live(now, stale_after) {
            continue;
        }
        let matches = matches!(&guess.payload, GuessPayload::Item(name) if name == item);
        if !matches {
            outcome.keep.push(guess);
            continue;
        }
        let first = outcome.awards.is_empty();
        if first {
            info!(
                "User {} made the first correct guess earning {} extra points",
                guess.username, first_bonus
            );
        }
        info!("User {} guessed correctly and earned {} points", guess.username, points);
        outcome.awards.push(Award {
            user_id: guess.user_id,
            username: guess.username,
            points: if first { points.saturating_add(first_bonus) } else { points },
            correct: 1,
            bonus: first,
        });
    }
    outcome
}

/// Count slots where `guess` agrees with `final_assignment`. A slot the guess
/// leaves out counts as correct when it is the family's freebie.
pub fn correct_slots(guess: &Assignment, final_assignment: &Assignment, freebie: Option<&str>) -> usize {
    final_assignment
        .iter()
        .filter(|(item, location)| match guess.get(*item) {
            Some(guessed) => guessed == *location,
            None => freebie == Some(item.as_str()),
        })
        .count()
}

/// Score a fully assigned extra family.
///
/// Every guess earns `points` per correct slot; a perfect guess also earns
/// `first_bonus`. Guesses with no correct slot earn nothing.
pub fn score_family(
    family: &str,
    queue: &[PendingGuess],
    final_assignment: &Assignment,
    freebie: Option<&str>,
    points: u32,
    first_bonus: u32,
) -> Vec<Award> {
    let slot_count = final_assignment.len();
    let mut awards = Vec::new();
    for guess in queue {
        let GuessPayload::Assignment(assignment) = &guess.payload else {
            continue;
        };
        let correct = correct_slots(assignment, final_assignment, freebie);
        if correct == 0 {
            continue;
        }
        let mut earned = points.saturating_mul(correct as u32);
        info!(
            "User {} guessed {} {} correctly and earned {} points",
            guess.username, correct, family, earned
        );
        let perfect = correct == slot_count;
        if perfect {
            earned = earned.saturating_add(first_bonus);
            info!(
                "User {} guessed all {} correctly and earned {} bonus points",
                guess.username, family, first_bonus
            );
        }
        awards.push(Award {
            user_id: guess.user_id.clone(),
            username: guess.username.clone(),
            points: earned,
            correct,
            bonus: perfect,
        });
    }
    awards
}

#[cfg(test)]
mod tests {
    use super::super::ledger::tests::{at, item_guess};
    use super::*;

    fn window() -> Duration {
        Duration::minutes(15)
    }

    #[test]
    fn earliest_match_gets_the_bonus() {
        let queue = vec![
            item_guess("g1", "Bow", 1),
            item_guess("g2", "Bow", 2),
            item_guess("g3", "Bow", 3),
        ];
        let outcome = reveal_item(queue, "Bow", at(4), window(), 5, 3);
        let points: Vec<_> = outcome.awards.iter().map(|a| a.points).collect();
        assert_eq!(points, vec![8, 5, 5]);
        assert!(outcome.awards[0].bonus);
        assert_eq!(outcome.total_points(), 5 * 3 + 3);
        assert!(outcome.keep.is_empty());
    }

    #[test]
    fn reveal_keeps_other_items_and_drops_expired() {
        let queue = vec![
            item_guess("old", "Bow", 0),
            item_guess("alice", "Hookshot", 10),
            item_guess("bob", "Bow", 12),
        ];
        let outcome = reveal_item(queue, "Bow", at(20), window(), 1, 1);
        assert_eq!(outcome.awards.len(), 1);
        assert_eq!(outcome.awards[0].username, "bob");
        assert_eq!(outcome.awards[0].points, 2);
        assert_eq!(outcome.keep.len(), 1);
        assert_eq!(outcome.keep[0].username, "alice");
    }

    #[test]
    fn reveal_with_no_match_awards_nothing() {
        let queue = vec![item_guess("alice", "Hookshot", 1)];
        let outcome = reveal_item(queue, "Bow", at(2), window(), 1, 1);
        assert!(outcome.awards.is_empty());
        assert_eq!(outcome.keep.len(), 1);
    }

    fn assignment(pairs: &[(&str, &str)]) -> Assignment {
        pairs
            .iter()
            .map(|(i, l)| (i.to_string(), l.to_string()))
            .collect()
    }

    fn family_guess(user: &str, pairs: &[(&str, &str)]) -> PendingGuess {
        let mut guess = item_guess(user, "", 1);
        guess.payload = GuessPayload::Assignment(assignment(pairs));
        guess
    }

    fn final_medals() -> Assignment {
        assignment(&[
            ("Forest", "Deku"),
            ("Fire", "DC"),
            ("Water", "Jabu"),
            ("Spirit", "Forest"),
            ("Shadow", "Fire"),
            ("Light", "Free"),
        ])
    }

    #[test]
    fn partial_credit_and_perfect_bonus() {
        let queue = vec![
            family_guess(
                "four",
                &[
                    ("Forest", "Deku"),
                    ("Fire", "DC"),
                    ("Water", "Jabu"),
                    ("Spirit", "Forest"),
                    ("Shadow", "Water"),
                    ("Light", "Shadow"),
                ],
            ),
            family_guess(
                "six",
                &[
                    ("Forest", "Deku"),
                    ("Fire", "DC"),
                    ("Water", "Jabu"),
                    ("Spirit", "Forest"),
                    ("Shadow", "Fire"),
                    ("Light", "Free"),
                ],
            ),
            family_guess(
                "zero",
                &[
                    ("Forest", "Free"),
                    ("Fire", "Deku"),
                    ("Water", "DC"),
                    ("Spirit", "Jabu"),
                    ("Shadow", "Forest"),
                    ("Light", "Fire"),
                ],
            ),
        ];
        let awards = score_family("medals", &queue, &final_medals(), None, 2, 5);
        assert_eq!(awards.len(), 2);
        assert_eq!(awards[0].username, "four");
        assert_eq!((awards[0].correct, awards[0].points, awards[0].bonus), (4, 8, false));
        assert_eq!(awards[1].username, "six");
        assert_eq!((awards[1].correct, awards[1].points, awards[1].bonus), (6, 17, true));
    }

    #[test]
    fn omitted_freebie_slot_counts_as_correct() {
        let queue = vec![family_guess(
            "alice",
            &[
                ("Forest", "Deku"),
                ("Fire", "DC"),
                ("Water", "Jabu"),
                ("Spirit", "Forest"),
                ("Shadow", "Fire"),
            ],
        )];
        let awards = score_family("medals", &queue, &final_medals(), Some("Light"), 1, 1);
        assert_eq!(awards[0].correct, 6);
        assert_eq!(awards[0].points, 7);

        let without = score_family("medals", &queue, &final_medals(), None, 1, 1);
        assert_eq!(without[0].correct, 5);
        assert!(!without[0].bonus);
    }
}
