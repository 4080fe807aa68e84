//! # Game Server - Channel Router
//!
//! Owns one [`GuessingGameBot`] per registered channel and routes chat lines
//! to them. Bots share nothing but the storage handle, and each channel's
//! lines are handled one at a time. Names no built-in command claims fall
//! through to the channel's custom commands.
//!
//! ```text
//! transport ──→ GameServer ──→ GuessingGameBot (per channel) ──→ Storage
//!                    │
//!                    └── prefix parsing, permission flags
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use guessbot::config::Config;
//! use guessbot::game::{ChatMessage, GameServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let mut server = GameServer::new(config).await?;
//!     let reply = server
//!         .handle_message(&ChatMessage::new("12345", "777", "alice", "!points"))
//!         .await;
//!     println!("{:?}", reply);
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use super::bot::{Caller, GuessingGameBot};
use super::commands::{category_of, CommandCategory};
use super::report::ReportWriter;
use crate::config::Config;
use crate::logutil::escape_log;
use crate::storage::Storage;

/// A chat line as delivered by the transport.
///
/// Transports that know the access lists (or a moderator badge) fill the
/// flags; otherwise the router derives them from the channel document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub channel_id: String,
    pub user_id: String,
    pub username: String,
    pub text: String,
    pub is_mod: bool,
    pub is_whitelisted: Option<bool>,
    pub is_blacklisted: Option<bool>,
}

impl ChatMessage {
    pub fn new(channel_id: &str, user_id: &str, username: &str, text: &str) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            user_id: user_id.to_string(),
            username: username.to_string(),
            text: text.to_string(),
            is_mod: false,
            is_whitelisted: None,
            is_blacklisted: None,
        }
    }

    pub fn as_mod(mut self) -> Self {
        self.is_mod = true;
        self
    }
}

/// Chat router over every registered channel.
pub struct GameServer {
    config: Config,
    storage: Storage,
    bots: HashMap<String, GuessingGameBot>,
}

impl GameServer {
    /// Open storage and load a bot for every registered channel.
    pub async fn new(config: Config) -> Result<Self> {
        let storage = Storage::new(&config.storage.data_dir)
            .await?
            .with_max_document_bytes(config.storage.max_document_bytes);
        let mut server = Self {
            config,
            storage,
            bots: HashMap::new(),
        };
        for channel_id in server.storage.list_channels().await? {
            if let Err(e) = server.add_channel(&channel_id).await {
                warn!("Skipping channel {}: {}", channel_id, e);
            }
        }
        info!("Game server ready with {} channels", server.bots.len());
        Ok(server)
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    fn report_writer(&self) -> Option<ReportWriter> {
        self.config
            .reports
            .enabled
            .then(|| ReportWriter::new(&self.config.reports.dir))
    }

    /// Load (or reload) the bot for one channel.
    pub async fn add_channel(&mut self, channel_id: &str) -> Result<()> {
        let bot = GuessingGameBot::new(
            channel_id,
            self.storage.clone(),
            &self.config.game,
            self.report_writer(),
        )
        .await?;
        if let Some(previous) = self.bots.get(bot.channel_id()) {
            if previous.is_running() {
                return Err(anyhow!("Channel {} has a game running", channel_id));
            }
        }
        self.bots.insert(bot.channel_id().to_string(), bot);
        Ok(())
    }

    pub fn channels(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.bots.keys().map(|k| k.as_str()).collect();
        ids.sort();
        ids
    }

    pub fn bot(&self, channel_id: &str) -> Option<&GuessingGameBot> {
        self.bots.get(channel_id)
    }

    /// Split a chat line into a command name and arguments. `None` when the
    /// line does not start with the command prefix.
    pub fn parse_command(&self, text: &str) -> Option<(String, Vec<String>)> {
        let body = text.trim().strip_prefix(self.config.bot.command_prefix.as_str())?;
        let mut parts = body.split_whitespace();
        let name = parts.next()?.to_ascii_lowercase();
        Some((name, parts.map(|s| s.to_string()).collect()))
    }

    pub async fn handle_message(&mut self, message: &ChatMessage) -> Option<String> {
        self.handle_message_at(message, Utc::now()).await
    }

    /// Route one chat line. Returns the reply to send to the channel, if any.
    pub async fn handle_message_at(
        &mut self,
        message: &ChatMessage,
        now: DateTime<Utc>,
    ) -> Option<String> {
        if !self.config.bot.user_id.is_empty() && message.user_id == self.config.bot.user_id {
            return None;
        }
        let (name, args) = self.parse_command(&message.text)?;
        if !self.bots.contains_key(&message.channel_id) {
            debug!("No bot for channel {}", escape_log(&message.channel_id));
            return None;
        }
        let Some(category) = category_of(&name) else {
            let bot = self.bots.get(&message.channel_id)?;
            return bot.custom_reply(&name).await;
        };

        let mut caller = Caller {
            user_id: message.user_id.clone(),
            username: message.username.clone(),
            is_mod: message.is_mod || message.user_id == message.channel_id,
            is_whitelisted: message.is_whitelisted.unwrap_or(false),
            is_blacklisted: message.is_blacklisted.unwrap_or(false),
        };
        let needs_lists = category != CommandCategory::Game
            && (message.is_whitelisted.is_none() || message.is_blacklisted.is_none());
        if needs_lists {
            match self.storage.load_streamer(&message.channel_id).await {
                Ok(Some(doc)) => {
                    if message.is_whitelisted.is_none() {
                        caller.is_whitelisted = doc.is_whitelisted(&caller.user_id);
                    }
                    if message.is_blacklisted.is_none() {
                        caller.is_blacklisted = doc.is_blacklisted(&caller.user_id);
                    }
                }
                Ok(None) => return None,
                Err(e) => {
                    warn!("Channel {}: access lists unavailable: {}", message.channel_id, e);
                }
            }
        }

        let bot = self.bots.get_mut(&message.channel_id)?;
        bot.do_command_at(&caller, &name, &args, now).await
    }

    /// Drive one channel from a line-oriented stream:
    /// `<user_id> <username> [mod] <message>` per line.
    pub async fn run_console<R, W>(&mut self, channel_id: &str, input: R, mut output: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        if !self.bots.contains_key(channel_id) {
            return Err(anyhow!("Channel {} is not registered", channel_id));
        }
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            let Some(message) = parse_console_line(channel_id, &line) else {
                if !line.trim().is_empty() {
                    warn!("Ignoring console line: {}", escape_log(&line));
                }
                continue;
            };
            if let Some(reply) = self.handle_message(&message).await {
                output.write_all(reply.as_bytes()).await?;
                output.write_all(b"\n").await?;
                output.flush().await?;
            }
        }
        Ok(())
    }
}

/// Parse `<user_id> <username> [mod] <message>`.
pub fn parse_console_line(channel_id: &str, line: &str) -> Option<ChatMessage> {
    let mut parts = line.trim().splitn(3, char::is_whitespace);
    let user_id = parts.next().filter(|s| !s.is_empty())?;
    let username = parts.next()?;
    let rest = parts.next()?.trim_start();
    let (is_mod, text) = match rest.split_once(char::is_whitespace) {
        Some(("mod", text)) => (true, text),
        _ => (false, rest),
    };
    let mut message = ChatMessage::new(channel_id, user_id, username, text);
    message.is_mod = is_mod;
    Some(message)
}
