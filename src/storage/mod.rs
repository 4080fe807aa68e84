//! # Storage Module - Channel Document Persistence
//!
//! Every channel the bot plays in has one JSON document holding its points
//! settings, participant roster, access lists, archived sessions and the game
//! configuration edited by the dashboard (items, modes, extra families).
//!
//! ## Layout
//!
//! ```text
//! data/
//! └── streamers/
//!     ├── 12345.json     ← one StreamerDoc per channel id
//!     └── .12345.json.lock
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use guessbot::storage::Storage;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let storage = Storage::new("./data").await?;
//!     storage.register_streamer("12345", "speedrunner", 1, 1).await?;
//!     let lookup = storage.find_or_create_participant("12345", "777", "alice").await?;
//!     println!("alice has {} points", lookup.participant().total_points);
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency
//!
//! Writes go through an exclusive `fs2` lock on a sidecar lock file, a
//! temp file in the same directory and an atomic rename. Read-modify-write
//! operations hold the lock across the read, so concurrent point awards on
//! the same channel never lose an increment.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use crate::game::extra::ExtraFamilyConfig;
use crate::game::guessables::ItemConfig;
use crate::game::modes::ModeDefinition;
use crate::game::scoring::Award;
use crate::game::session::SessionLogEntry;
use crate::validation::{safe_filename, secure_json_parse, validate_channel_id};

const STREAMERS_DIR: &str = "streamers";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub username: String,
    pub user_id: String,
    #[serde(default)]
    pub session_points: u32,
    #[serde(default)]
    pub total_points: u32,
}

impl Participant {
    pub fn new(user_id: &str, username: &str) -> Self {
        Self {
            username: username.to_string(),
            user_id: user_id.to_string(),
            session_points: 0,
            total_points: 0,
        }
    }
}

/// Result of [`Storage::find_or_create_participant`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticipantLookup {
    Found(Participant),
    Created(Participant),
}

impl ParticipantLookup {
    pub fn participant(&self) -> &Participant {
        match self {
            ParticipantLookup::Found(p) | ParticipantLookup::Created(p) => p,
        }
    }

    pub fn into_participant(self) -> Participant {
        match self {
            ParticipantLookup::Found(p) | ParticipantLookup::Created(p) => p,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, ParticipantLookup::Created(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessUser {
    pub username: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessList {
    Whitelist,
    Blacklist,
}

impl fmt::Display for AccessList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessList::Whitelist => write!(f, "whitelist"),
            AccessList::Blacklist => write!(f, "blacklist"),
        }
    }
}

/// A channel-defined chat command that replies with fixed text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomCommand {
    /// Lowercase, without the command prefix.
    pub name: String,
    pub output: String,
}

/// A finished game's guess log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedSession {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: DateTime<Utc>,
    pub finished_by: String,
    #[serde(default)]
    pub guesses: Vec<SessionLogEntry>,
}

impl ArchivedSession {
    pub fn new(
        started_at: Option<DateTime<Utc>>,
        finished_by: &str,
        guesses: Vec<SessionLogEntry>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            finished_by: finished_by.to_string(),
            guesses,
        }
    }
}

fn default_points() -> u32 {
    1
}

/// One channel's persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamerDoc {
    pub name: String,
    pub channel_id: String,
    #[serde(default = "default_points")]
    pub points: u32,
    #[serde(default = "default_points")]
    pub first_bonus: u32,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub whitelist: Vec<AccessUser>,
    #[serde(default)]
    pub blacklist: Vec<AccessUser>,
    #[serde(default)]
    pub sessions: Vec<ArchivedSession>,
    #[serde(default)]
    pub guessables: Vec<ItemConfig>,
    /// Item names containing any of these substrings are never guessable.
    #[serde(default)]
    pub item_blacklist: Vec<String>,
    #[serde(default)]
    pub modes: Vec<ModeDefinition>,
    #[serde(default)]
    pub extra: Vec<ExtraFamilyConfig>,
    #[serde(default)]
    pub commands: Vec<CustomCommand>,
}

impl StreamerDoc {
    pub fn new(channel_id: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            channel_id: channel_id.to_string(),
            points: default_points(),
            first_bonus: default_points(),
            participants: Vec::new(),
            whitelist: Vec::new(),
            blacklist: Vec::new(),
            sessions: Vec::new(),
            guessables: Vec::new(),
            item_blacklist: Vec::new(),
            modes: Vec::new(),
            extra: Vec::new(),
            commands: Vec::new(),
        }
    }

    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    pub fn participant_by_name(&self, username: &str) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.username.eq_ignore_ascii_case(username))
    }

    pub fn is_whitelisted(&self, user_id: &str) -> bool {
        self.whitelist.iter().any(|u| u.user_id == user_id)
    }

    pub fn is_blacklisted(&self, user_id: &str) -> bool {
        self.blacklist.iter().any(|u| u.user_id == user_id)
    }

    pub fn custom_command(&self, name: &str) -> Option<&CustomCommand> {
        self.commands.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    fn access_list_mut(&mut self, list: AccessList) -> &mut Vec<AccessUser> {
        match list {
            AccessList::Whitelist => &mut self.whitelist,
            AccessList::Blacklist => &mut self.blacklist,
        }
    }

    fn participant_entry(&mut self, user_id: &str, username: &str) -> &mut Participant {
        match self.participants.iter().position(|p| p.user_id == user_id) {
            Some(pos) => &mut self.participants[pos],
            None => {
                info!(
                    "Participant {} does not exist in the database. Creating participant.",
                    user_id
                );
                self.participants.push(Participant::new(user_id, username));
                let last = self.participants.len() - 1;
                &mut self.participants[last]
            }
        }
    }
}

/// Main storage interface
#[derive(Debug, Clone)]
pub struct Storage {
    data_dir: String,
    max_document_bytes: usize,
}

impl Storage {
    /// Initialize storage with the given data directory
    pub async fn new(data_dir: &str) -> Result<Self> {
        let streamers = Path::new(data_dir).join(STREAMERS_DIR);
        fs::create_dir_all(&streamers)
            .await
            .map_err(|e| anyhow!("Failed to create data directory {}: {}", data_dir, e))?;
        Ok(Storage {
            data_dir: data_dir.to_string(),
            max_document_bytes: 8 * 1024 * 1024,
        })
    }

    pub fn with_max_document_bytes(mut self, max: usize) -> Self {
        self.max_document_bytes = max;
        self
    }

    /// Return the base data directory path used by this storage instance
    pub fn base_dir(&self) -> &str {
        &self.data_dir
    }

    fn streamer_path(&self, channel_id: &str) -> Result<PathBuf> {
        let channel_id =
            validate_channel_id(channel_id).map_err(|e| anyhow!("Invalid channel id: {}", e))?;
        Ok(Path::new(&self.data_dir)
            .join(STREAMERS_DIR)
            .join(format!("{}.json", safe_filename(&channel_id))))
    }

    fn parse_doc(&self, content: &str, path: &Path) -> Result<StreamerDoc> {
        secure_json_parse(content, self.max_document_bytes)
            .map_err(|e| anyhow!("Failed to parse {}: {}", path.display(), e))
    }

    /// Load a channel document. `Ok(None)` when the channel is not registered.
    pub async fn load_streamer(&self, channel_id: &str) -> Result<Option<StreamerDoc>> {
        let path = self.streamer_path(channel_id)?;
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(self.parse_doc(&content, &path)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow!("Failed reading {}: {}", path.display(), e)),
        }
    }

    /// Load a channel document that must exist.
    pub async fn require_streamer(&self, channel_id: &str) -> Result<StreamerDoc> {
        self.load_streamer(channel_id)
            .await?
            .ok_or_else(|| anyhow!("Channel {} is not registered", channel_id))
    }

    pub async fn save_streamer(&self, doc: &StreamerDoc) -> Result<()> {
        let path = self.streamer_path(&doc.channel_id)?;
        let content = serde_json::to_string_pretty(doc)
            .map_err(|e| anyhow!("Failed to serialize channel {}: {}", doc.channel_id, e))?;
        Self::write_file_locked(&path, &content).await
    }

    /// Create a channel document; fails if the channel already exists.
    pub async fn register_streamer(
        &self,
        channel_id: &str,
        name: &str,
        points: u32,
        first_bonus: u32,
    ) -> Result<StreamerDoc> {
        let channel_id =
            validate_channel_id(channel_id).map_err(|e| anyhow!("Invalid channel id: {}", e))?;
        if self.load_streamer(&channel_id).await?.is_some() {
            return Err(anyhow!("Channel {} is already registered", channel_id));
        }
        let mut doc = StreamerDoc::new(&channel_id, name);
        doc.points = points;
        doc.first_bonus = first_bonus;
        self.save_streamer(&doc).await?;
        info!("Registered channel {} ({})", channel_id, name);
        Ok(doc)
    }

    /// Every registered channel id, sorted.
    pub async fn list_channels(&self) -> Result<Vec<String>> {
        let dir = Path::new(&self.data_dir).join(STREAMERS_DIR);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(anyhow!("Failed reading {}: {}", dir.display(), e)),
        };
        let mut channels = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = match fs::read_to_string(&path).await {
                Ok(c) => c,
                Err(e) => {
                    warn!("Skipping unreadable channel document {}: {}", path.display(), e);
                    continue;
                }
            };
            match self.parse_doc(&content, &path) {
                Ok(doc) => channels.push(doc.channel_id),
                Err(e) => warn!("Skipping channel document: {}", e),
            }
        }
        channels.sort();
        Ok(channels)
    }

    /// Look a participant up by user id, creating them if absent. A changed
    /// display name is updated in place.
    pub async fn find_or_create_participant(
        &self,
        channel_id: &str,
        user_id: &str,
        username: &str,
    ) -> Result<ParticipantLookup> {
        self.modify_streamer(channel_id, |doc| {
            match doc.participants.iter().position(|p| p.user_id == user_id) {
                Some(pos) => {
                    let existing = &mut doc.participants[pos];
                    if existing.username != username {
                        debug!("Participant {} renamed to {}", existing.username, username);
                        existing.username = username.to_string();
                    }
                    ParticipantLookup::Found(existing.clone())
                }
                None => {
                    let created = doc.participant_entry(user_id, username).clone();
                    ParticipantLookup::Created(created)
                }
            }
        })
        .await
    }

    /// Apply awards to session and lifetime totals in one write. Missing
    /// participants are created. Returns the updated participants in award
    /// order.
    pub async fn award_points(&self, channel_id: &str, awards: &[Award]) -> Result<Vec<Participant>> {
        if awards.is_empty() {
            return Ok(Vec::new());
        }
        self.modify_streamer(channel_id, |doc| {
            awards
                .iter()
                .map(|award| {
                    let participant = doc.participant_entry(&award.user_id, &award.username);
                    participant.session_points = participant.session_points.saturating_add(award.points);
                    participant.total_points = participant.total_points.saturating_add(award.points);
                    participant.clone()
                })
                .collect()
        })
        .await
    }

    /// Zero every participant's session points. Returns how many were reset.
    pub async fn reset_session_points(&self, channel_id: &str) -> Result<usize> {
        self.modify_streamer(channel_id, |doc| {
            let mut reset = 0;
            for participant in doc.participants.iter_mut() {
                if participant.session_points != 0 {
                    participant.session_points = 0;
                    reset += 1;
                }
            }
            reset
        })
        .await
    }

    pub async fn archive_session(&self, channel_id: &str, session: ArchivedSession) -> Result<Uuid> {
        let id = session.id;
        self.modify_streamer(channel_id, move |doc| doc.sessions.push(session))
            .await?;
        debug!("Archived session {} for channel {}", id, channel_id);
        Ok(id)
    }

    pub async fn set_points(&self, channel_id: &str, points: u32) -> Result<()> {
        self.modify_streamer(channel_id, |doc| doc.points = points).await
    }

    pub async fn set_first_bonus(&self, channel_id: &str, first_bonus: u32) -> Result<()> {
        self.modify_streamer(channel_id, |doc| doc.first_bonus = first_bonus)
            .await
    }

    /// Add a known participant to an access list. `Ok(false)` when the
    /// username is not in the roster or is already listed.
    pub async fn add_to_access_list(
        &self,
        channel_id: &str,
        list: AccessList,
        username: &str,
    ) -> Result<bool> {
        self.modify_streamer(channel_id, |doc| {
            let Some(user) = doc.participant_by_name(username).map(|p| AccessUser {
                username: p.username.clone(),
                user_id: p.user_id.clone(),
            }) else {
                return false;
            };
            let entries = doc.access_list_mut(list);
            if entries.iter().any(|u| u.user_id == user.user_id) {
                return false;
            }
            entries.push(user);
            true
        })
        .await
    }

    /// Remove a user from an access list by username. `Ok(false)` when absent.
    pub async fn remove_from_access_list(
        &self,
        channel_id: &str,
        list: AccessList,
        username: &str,
    ) -> Result<bool> {
        self.modify_streamer(channel_id, |doc| {
            let entries = doc.access_list_mut(list);
            let before = entries.len();
            entries.retain(|u| !u.username.eq_ignore_ascii_case(username));
            entries.len() != before
        })
        .await
    }

    /// Store a new custom command. `Ok(false)` when the name is taken.
    pub async fn add_custom_command(&self, channel_id: &str, name: &str, output: &str) -> Result<bool> {
        self.modify_streamer(channel_id, |doc| {
            if doc.custom_command(name).is_some() {
                return false;
            }
            doc.commands.push(CustomCommand {
                name: name.to_lowercase(),
                output: output.to_string(),
            });
            true
        })
        .await
    }

    /// Replace a custom command's output. `Ok(false)` when it does not exist.
    pub async fn edit_custom_command(&self, channel_id: &str, name: &str, output: &str) -> Result<bool> {
        self.modify_streamer(channel_id, |doc| {
            match doc
                .commands
                .iter_mut()
                .find(|c| c.name.eq_ignore_ascii_case(name))
            {
                Some(command) => {
                    command.output = output.to_string();
                    true
                }
                None => false,
            }
        })
        .await
    }

    /// `Ok(false)` when no custom command has that name.
    pub async fn remove_custom_command(&self, channel_id: &str, name: &str) -> Result<bool> {
        self.modify_streamer(channel_id, |doc| {
            let before = doc.commands.len();
            doc.commands.retain(|c| !c.name.eq_ignore_ascii_case(name));
            doc.commands.len() != before
        })
        .await
    }

    /// Read-modify-write a channel document under its lock.
    pub async fn modify_streamer<F, R>(&self, channel_id: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut StreamerDoc) -> R,
    {
        use std::io::Read;

        let path = self.streamer_path(channel_id)?;
        let lock = Self::lock_document(&path)?;
        let mut content = String::new();
        File::open(&path)
            .and_then(|mut file| file.read_to_string(&mut content))
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => anyhow!("Channel {} is not registered", channel_id),
                _ => anyhow!("Failed reading {}: {}", path.display(), e),
            })?;
        let mut doc = self.parse_doc(&content, &path)?;
        let result = f(&mut doc);
        let content = serde_json::to_string_pretty(&doc)
            .map_err(|e| anyhow!("Failed to serialize channel {}: {}", channel_id, e))?;
        Self::replace_file(&path, &content)?;
        drop(lock);
        Ok(result)
    }

    fn lock_document(path: &Path) -> Result<File> {
        use std::fs::OpenOptions;

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let base = path.file_name().and_then(|s| s.to_str()).unwrap_or("data.json");
        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(dir.join(format!(".{}.lock", base)))?;
        lock_file.lock_exclusive()?;
        Ok(lock_file)
    }

    /// Write `content` to `path` through a temp file and an atomic rename.
    /// Callers hold the document lock.
    fn replace_file(path: &Path, content: &str) -> Result<()> {
        use std::fs::{self, OpenOptions};
        use std::io::Write;

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let base = path.file_name().and_then(|s| s.to_str()).unwrap_or("data.json");
        let mut counter = 0u32;
        let tmp_path = loop {
            let candidate = dir.join(format!(".{}.tmp-{}-{}", base, std::process::id(), counter));
            match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(mut tmp) => {
                    tmp.write_all(content.as_bytes())?;
                    tmp.flush()?;
                    let _ = tmp.sync_all();
                    break candidate;
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    counter = counter.saturating_add(1);
                    continue;
                }
                Err(e) => return Err(anyhow!("Failed to create temp file for atomic write: {}", e)),
            }
        };

        fs::rename(&tmp_path, path)?;

        // Persist the rename (best-effort)
        if let Ok(dir_file) = File::open(dir) {
            let _ = dir_file.sync_all();
        }
        Ok(())
    }

    /// Helper function to write content to a file with exclusive locking
    async fn write_file_locked(path: &Path, content: &str) -> Result<()> {
        // fs2 has no async API
        let lock = Self::lock_document(path)?;
        Self::replace_file(path, content)?;
        drop(lock);
        Ok(())
    }
}
