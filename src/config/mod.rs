//! # Configuration Management Module
//!
//! Process-level configuration for guessbot. Per-channel settings (points
//! values, guessable items, modes, access lists) live in the channel documents
//! managed by [`crate::storage`]; this file only covers how the bot itself runs.
//!
//! ## Configuration Structure
//!
//! - [`BotConfig`] - Bot identity, command prefix and defaults for new channels
//! - [`GameConfig`] - Guess staleness window
//! - [`StorageConfig`] - Where channel documents are kept
//! - [`ReportsConfig`] - Where session reports are written
//! - [`LoggingConfig`] - Logging and audit settings
//!
//! ## Usage
//!
//! ```rust,no_run
//! use guessbot::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Prefix: {}", config.bot.command_prefix);
//!
//!     Config::create_default("config.toml").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [bot]
//! name = "guessbot"
//! user_id = "100000"
//! command_prefix = "!"
//! default_points = 1
//! default_first_bonus = 1
//!
//! [game]
//! stale_guess_minutes = 15
//!
//! [storage]
//! data_dir = "./data"
//!
//! [reports]
//! enabled = true
//! dir = "./reports"
//!
//! [logging]
//! level = "info"
//! file = "guessbot.log"
//! ```

use anyhow::{anyhow, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Chat login of the bot account.
    pub name: String,
    /// User id of the bot account; messages from it are ignored.
    #[serde(default)]
    pub user_id: String,
    /// Prefix that marks a chat line as a command.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Points per correct guess for channels registered by this bot.
    #[serde(default = "default_points")]
    pub default_points: u32,
    /// First-guess bonus for channels registered by this bot.
    #[serde(default = "default_points")]
    pub default_first_bonus: u32,
}

fn default_command_prefix() -> String {
    "!".to_string()
}

fn default_points() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Guesses older than this are dropped the next time their queue is touched.
    #[serde(default = "default_stale_guess_minutes")]
    pub stale_guess_minutes: u32,
}

fn default_stale_guess_minutes() -> u32 {
    15
}

impl GameConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::minutes(i64::from(self.stale_guess_minutes))
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            stale_guess_minutes: default_stale_guess_minutes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    /// Channel documents larger than this are refused on load.
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: usize,
}

fn default_max_document_bytes() -> usize {
    8 * 1024 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    #[serde(default = "default_reports_enabled")]
    pub enabled: bool,
    pub dir: String,
}

fn default_reports_enabled() -> bool {
    true
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: "./reports".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    /// Moderator actions logged with target "audit" are also appended here.
    #[serde(default)]
    pub audit_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bot: BotConfig,
    #[serde(default)]
    pub game: GameConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        if config.bot.command_prefix.is_empty() {
            return Err(anyhow!("Config file {}: bot.command_prefix must not be empty", path));
        }

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bot: BotConfig {
                name: "guessbot".to_string(),
                user_id: String::new(),
                command_prefix: default_command_prefix(),
                default_points: 1,
                default_first_bonus: 1,
            },
            game: GameConfig::default(),
            storage: StorageConfig {
                data_dir: "./data".to_string(),
                max_document_bytes: default_max_document_bytes(),
            },
            reports: ReportsConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("guessbot.log".to_string()),
                audit_file: Some("guessbot-audit.log".to_string()),
            },
        }
    }
}
