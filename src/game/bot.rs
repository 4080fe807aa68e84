//! Per-channel guessing game bot.
//!
//! A [`GuessingGameBot`] owns one channel's [`GameSession`] and talks to
//! storage for everything that outlives a game (points, roster, access lists,
//! archived sessions). It is driven one command at a time; the router never
//! shares a bot between channels.
//!
//! Failures never escape [`GuessingGameBot::do_command`]: input errors become
//! a single chat reply, storage errors are logged and produce no reply.

use chrono::{DateTime, Utc};
use log::{debug, error, info};

use super::commands::{category_of, custom_command_name, parse, AccessAction, GameCommand};
use super::errors::GameError;
use super::extra::ExtraRegistry;
use super::modes::{ModeRegistry, NORMAL_MODE};
use super::report::ReportWriter;
use super::session::GameSession;
use crate::config::GameConfig;
use crate::logutil::{escape_args, escape_log};
use crate::metrics;
use crate::storage::{AccessList, ArchivedSession, Storage, StreamerDoc};
use crate::validation::parse_points_value;

/// Moderator actions, logged under the "audit" target.
macro_rules! audit_log {
    ($($arg:tt)*) => { log::info!(target: "audit", $($arg)*); };
}

/// Who sent a command, with permissions already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub username: String,
    pub is_mod: bool,
    pub is_whitelisted: bool,
    pub is_blacklisted: bool,
}

impl Caller {
    pub fn viewer(user_id: &str, username: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            username: username.to_string(),
            is_mod: false,
            is_whitelisted: false,
            is_blacklisted: false,
        }
    }

    pub fn moderator(user_id: &str, username: &str) -> Self {
        Self {
            is_mod: true,
            ..Self::viewer(user_id, username)
        }
    }
}

type Reply = Result<Option<String>, GameError>;

const CUSTOM_OUTPUT_REQUIRED: &str = "Custom commands require a message to send to chat when called";

pub struct GuessingGameBot {
    channel_id: String,
    storage: Storage,
    reports: Option<ReportWriter>,
    session: GameSession,
}

fn session_for(doc: &StreamerDoc, game: &GameConfig) -> GameSession {
    GameSession::new(
        ModeRegistry::new(doc.modes.clone()),
        ExtraRegistry::from_configs(&doc.extra),
        doc.item_blacklist.clone(),
        game.stale_after(),
    )
}

impl GuessingGameBot {
    /// Build the bot for a registered channel.
    pub async fn new(
        channel_id: &str,
        storage: Storage,
        game: &GameConfig,
        reports: Option<ReportWriter>,
    ) -> anyhow::Result<Self> {
        let doc = storage.require_streamer(channel_id).await?;
        info!(
            "Loaded channel {} ({}): {} items, {} modes, {} extra types",
            doc.channel_id,
            doc.name,
            doc.guessables.len(),
            doc.modes.len(),
            doc.extra.len()
        );
        Ok(Self {
            channel_id: doc.channel_id.clone(),
            session: session_for(&doc, game),
            storage,
            reports,
        })
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn is_running(&self) -> bool {
        self.session.is_running()
    }

    pub async fn do_command(
        &mut self,
        caller: &Caller,
        name: &str,
        args: &[String],
    ) -> Option<String> {
        self.do_command_at(caller, name, args, Utc::now()).await
    }

    /// Handle one command at a given time. Returns the chat reply, if any.
    pub async fn do_command_at(
        &mut self,
        caller: &Caller,
        name: &str,
        args: &[String],
        now: DateTime<Utc>,
    ) -> Option<String> {
        let category = category_of(name)?;
        if !category.allows(caller.is_mod, caller.is_whitelisted, caller.is_blacklisted) {
            debug!(
                "Channel {}: {} may not use {}",
                self.channel_id,
                caller.username,
                escape_log(name)
            );
            return None;
        }
        debug!(
            "Channel {}: {} -> {} {}",
            self.channel_id,
            caller.username,
            escape_log(name),
            escape_args(args)
        );

        let result = match parse(name, args) {
            Ok(command) => self.execute(caller, command, now).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(reply) => reply,
            Err(GameError::Storage(e)) => {
                error!("Channel {}: {} failed: {:#}", self.channel_id, escape_log(name), e);
                None
            }
            Err(e) => {
                info!("Channel {}: {}", self.channel_id, e);
                e.chat_message()
            }
        }
    }

    async fn execute(&mut self, caller: &Caller, command: GameCommand, now: DateTime<Utc>) -> Reply {
        match command {
            GameCommand::Guess { first, rest } => self.guess(caller, &first, &rest, now).await,
            GameCommand::Points { username, total } => {
                self.points(caller, username.as_deref(), total).await
            }
            GameCommand::GuessPoints(raw) => self.set_points_value(caller, &raw, false).await,
            GameCommand::FirstGuess(raw) => self.set_points_value(caller, &raw, true).await,
            GameCommand::Mode(name) => Ok(self.mode(caller, &name)),
            GameCommand::ModeDel(name) => {
                let message = self.session.remove_mode(&name, &caller.username);
                Ok(self.audited(message))
            }
            GameCommand::Freebie { family, item } => {
                let message = self
                    .session
                    .set_freebie(&family, item.as_deref(), &caller.username)?;
                Ok(self.audited(message))
            }
            GameCommand::HudItem(code) => self.reveal(&code, now).await,
            GameCommand::HudFamily {
                family,
                item,
                location,
            } => self.complete_family(&family, &item, &location).await,
            GameCommand::Access { action, username } => {
                self.access(caller, action, &username).await
            }
            GameCommand::ReportTotals => self.report_totals(caller, now).await,
            GameCommand::AddCustom { name, output } => {
                self.add_custom(caller, &name, &output).await
            }
            GameCommand::DeleteCustom { name, has_output } => {
                self.delete_custom(caller, &name, has_output).await
            }
            GameCommand::EditCustom { name, output } => {
                self.edit_custom(caller, &name, &output).await
            }
            GameCommand::Start => self.start(caller, now).await,
            GameCommand::Finish => self.finish(caller, now).await,
            GameCommand::Unknown => Ok(None),
        }
    }

    fn audited(&self, message: Option<String>) -> Option<String> {
        if let Some(text) = &message {
            audit_log!("Channel {}: {}", self.channel_id, text);
        }
        message
    }

    async fn guess(
        &mut self,
        caller: &Caller,
        first: &str,
        rest: &[String],
        now: DateTime<Utc>,
    ) -> Reply {
        if !self.session.is_running() {
            info!("Guessing game not running");
            return Ok(None);
        }
        let participant = self
            .storage
            .find_or_create_participant(&self.channel_id, &caller.user_id, &caller.username)
            .await?
            .into_participant();

        let is_family = !rest.is_empty() && self.session.extras().get(first).is_some();
        let recorded = if is_family {
            self.session.guess_family(&participant, first, rest, now)
        } else {
            self.session.guess_item(&participant, first, now)
        };
        match recorded {
            Ok(true) => {
                metrics::record_guess(&self.channel_id);
                Ok(None)
            }
            Ok(false) => Ok(None),
            Err(e) => {
                metrics::record_rejected_guess();
                Err(e)
            }
        }
    }

    async fn points(&mut self, caller: &Caller, username: Option<&str>, total: bool) -> Reply {
        let participant = match username {
            None => self
                .storage
                .find_or_create_participant(&self.channel_id, &caller.user_id, &caller.username)
                .await?
                .into_participant(),
            Some(name) => {
                let doc = self.storage.require_streamer(&self.channel_id).await?;
                match doc.participant_by_name(name) {
                    Some(found) => found.clone(),
                    None => {
                        info!(
                            "Participant with username {} does not exist in the database",
                            escape_log(name)
                        );
                        return Ok(None);
                    }
                }
            }
        };
        let points = if total {
            participant.total_points
        } else {
            participant.session_points
        };
        Ok(Some(format!("{} has {} points", participant.username, points)))
    }

    async fn set_points_value(&mut self, caller: &Caller, raw: &str, first_bonus: bool) -> Reply {
        let what = if first_bonus { "first guess bonus" } else { "points value" };
        let value = parse_points_value(raw, what)?;
        if first_bonus {
            self.storage.set_first_bonus(&self.channel_id, value).await?;
        } else {
            self.storage.set_points(&self.channel_id, value).await?;
        }
        let message = if first_bonus {
            format!("{} set first guess bonus value to {}", caller.username, value)
        } else {
            format!("{} set points value to {}", caller.username, value)
        };
        Ok(self.audited(Some(message)))
    }

    fn mode(&mut self, caller: &Caller, name: &str) -> Option<String> {
        let message = if name.eq_ignore_ascii_case(NORMAL_MODE) {
            self.session.reset_modes(&caller.username)
        } else {
            self.session.add_mode(name, &caller.username)
        };
        self.audited(message)
    }

    async fn reveal(&mut self, code: &str, now: DateTime<Utc>) -> Reply {
        if !self.session.is_running() {
            info!("Guessing game not running");
            return Ok(None);
        }
        let doc = self.storage.require_streamer(&self.channel_id).await?;
        let Some((item, mut outcome)) = self
            .session
            .reveal_item(code, now, doc.points, doc.first_bonus)?
        else {
            return Ok(None);
        };
        if outcome.awards.is_empty() {
            debug!("Nobody guessed {}", item);
            self.session.settle_reveal(outcome.keep);
            return Ok(None);
        }
        // Guesses stay queued until the awards are persisted.
        self.storage
            .award_points(&self.channel_id, &outcome.awards)
            .await?;
        self.session.settle_reveal(std::mem::take(&mut outcome.keep));
        metrics::record_scoring(&self.channel_id, false, outcome.total_points());
        let winners = outcome
            .awards
            .iter()
            .map(|a| format!("{} (+{})", a.username, a.points))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(Some(format!("{} guessed correctly by {}", item, winners)))
    }

    async fn complete_family(&mut self, family: &str, item: &str, location: &str) -> Reply {
        if !self.session.is_running() {
            info!("Guessing game not running");
            return Ok(None);
        }
        let doc = self.storage.require_streamer(&self.channel_id).await?;
        let Some(completion) =
            self.session
                .complete_family(family, item, location, doc.points, doc.first_bonus)?
        else {
            return Ok(None);
        };
        self.storage
            .award_points(&self.channel_id, &completion.awards)
            .await?;
        self.session.settle_family(&completion);
        if let Some(extra) = self.session.extras().get(&completion.family) {
            debug!(
                "{} final answer: {}",
                completion.family,
                escape_log(&extra.describe(&completion.final_assignment))
            );
        }
        let paid = super::scoring::total(&completion.awards);
        metrics::record_scoring(&self.channel_id, true, paid);
        let message = completion.message();
        info!("{}", message);
        Ok(Some(message))
    }

    async fn access(&mut self, caller: &Caller, action: AccessAction, username: &str) -> Reply {
        let (list, adding) = match action {
            AccessAction::Add => (AccessList::Whitelist, true),
            AccessAction::Remove => (AccessList::Whitelist, false),
            AccessAction::Ban => (AccessList::Blacklist, true),
            AccessAction::Unban => (AccessList::Blacklist, false),
        };
        let changed = if adding {
            self.storage
                .add_to_access_list(&self.channel_id, list, username)
                .await?
        } else {
            self.storage
                .remove_from_access_list(&self.channel_id, list, username)
                .await?
        };
        let message = match (changed, adding) {
            (true, true) => format!("User {} added to {}", username, list),
            (true, false) => format!("User {} removed from {}", username, list),
            (false, true) => format!("Unable to add user to {}", list),
            (false, false) => format!("Unable to remove user from {}", list),
        };
        if changed {
            audit_log!("Channel {}: {} (by {})", self.channel_id, message, caller.username);
        } else {
            info!("{}", message);
        }
        Ok(Some(message))
    }

    fn custom_refused(&self, message: String) -> Reply {
        info!("Channel {}: {}", self.channel_id, message);
        Ok(Some(message))
    }

    async fn add_custom(&mut self, caller: &Caller, name: &str, output: &str) -> Reply {
        if category_of(name).is_some() {
            return self.custom_refused(format!("Command {} already exists", name));
        }
        if output.is_empty() {
            return self.custom_refused(CUSTOM_OUTPUT_REQUIRED.to_string());
        }
        if !self
            .storage
            .add_custom_command(&self.channel_id, name, output)
            .await?
        {
            return self.custom_refused(format!("Command {} already exists", name));
        }
        audit_log!(
            "Channel {}: {} added custom command {} with output {}",
            self.channel_id,
            caller.username,
            name,
            escape_log(output)
        );
        Ok(Some(format!("Added custom command {}", name)))
    }

    async fn delete_custom(&mut self, caller: &Caller, name: &str, has_output: bool) -> Reply {
        if has_output {
            return self.custom_refused("Delete command does not take an output".to_string());
        }
        if category_of(name).is_some() {
            return self.custom_refused(format!("Command {} cannot be removed", name));
        }
        if !self
            .storage
            .remove_custom_command(&self.channel_id, name)
            .await?
        {
            return self.custom_refused(format!("Command {} does not exist", name));
        }
        let message = format!("Removed custom command {}", name);
        audit_log!("Channel {}: {} (by {})", self.channel_id, message, caller.username);
        Ok(Some(message))
    }

    async fn edit_custom(&mut self, caller: &Caller, name: &str, output: &str) -> Reply {
        if category_of(name).is_some() {
            return self.custom_refused(format!("Command {} cannot be edited", name));
        }
        if output.is_empty() {
            let doc = self.storage.require_streamer(&self.channel_id).await?;
            if doc.custom_command(name).is_none() {
                return self.custom_refused(format!("Command {} does not exist", name));
            }
            return self.custom_refused(CUSTOM_OUTPUT_REQUIRED.to_string());
        }
        if !self
            .storage
            .edit_custom_command(&self.channel_id, name, output)
            .await?
        {
            return self.custom_refused(format!("Command {} does not exist", name));
        }
        audit_log!(
            "Channel {}: {} edited custom command {} to {}",
            self.channel_id,
            caller.username,
            name,
            escape_log(output)
        );
        Ok(Some(format!("Edited custom command {}", name)))
    }

    /// Output of a channel's custom command, for names no built-in command
    /// claims.
    pub async fn custom_reply(&self, name: &str) -> Option<String> {
        let name = custom_command_name(name);
        if name.is_empty() || category_of(&name).is_some() {
            return None;
        }
        match self.storage.load_streamer(&self.channel_id).await {
            Ok(Some(doc)) => {
                let command = doc.custom_command(&name)?;
                info!("Channel {}: custom command {} received", self.channel_id, name);
                Some(command.output.clone())
            }
            Ok(None) => None,
            Err(e) => {
                error!("Channel {}: custom command lookup failed: {:#}", self.channel_id, e);
                None
            }
        }
    }

    async fn report_totals(&mut self, caller: &Caller, now: DateTime<Utc>) -> Reply {
        let Some(reports) = &self.reports else {
            info!("Reports are disabled");
            return Ok(None);
        };
        let doc = self.storage.require_streamer(&self.channel_id).await?;
        let path = reports
            .write_totals_report(&self.channel_id, &doc.participants, now)
            .await?;
        audit_log!(
            "Channel {}: totals report {} written for {}",
            self.channel_id,
            path.display(),
            caller.username
        );
        Ok(None)
    }

    async fn start(&mut self, caller: &Caller, now: DateTime<Utc>) -> Reply {
        if self.session.is_running() {
            info!("Guessing game already running");
            return Ok(None);
        }
        // Pick up dashboard edits made since the last game.
        let doc = self.storage.require_streamer(&self.channel_id).await?;
        self.session.reconfigure(
            ModeRegistry::new(doc.modes.clone()),
            ExtraRegistry::from_configs(&doc.extra),
            doc.item_blacklist.clone(),
        );
        let message = self.session.start(&doc.guessables, &caller.username, now)?;
        if message.is_some() {
            // Points left over from a game that never finished.
            match self.storage.reset_session_points(&self.channel_id).await {
                Ok(0) => {}
                Ok(n) => info!("Cleared leftover session points for {} participants", n),
                Err(e) => error!("Channel {}: session point reset failed: {:#}", self.channel_id, e),
            }
        }
        Ok(self.audited(message))
    }

    async fn finish(&mut self, caller: &Caller, now: DateTime<Utc>) -> Reply {
        if !self.session.is_running() {
            info!("Guessing game not running");
            return Ok(None);
        }
        // Points are zeroed before the session stops.
        let reset = self.storage.reset_session_points(&self.channel_id).await?;
        debug!("Reset session points for {} participants", reset);
        let Some(finished) = self.session.finish(&caller.username) else {
            return Ok(None);
        };

        if let Some(reports) = &self.reports {
            if let Err(e) = reports
                .write_guess_report(&self.channel_id, &finished.entries, now)
                .await
            {
                error!("Channel {}: guess report failed: {:#}", self.channel_id, e);
            }
        }
        let archived = ArchivedSession::new(finished.started_at, &caller.username, finished.entries);
        if let Err(e) = self.storage.archive_session(&self.channel_id, archived).await {
            error!("Channel {}: archiving session failed: {:#}", self.channel_id, e);
        }
        metrics::record_session_finished(&self.channel_id);
        Ok(self.audited(Some(finished.message)))
    }
}
