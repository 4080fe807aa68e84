//! Test utilities & fixtures.
//! Every test gets its own temp data dir with one registered channel.
#![allow(dead_code)]

use std::path::Path;

use chrono::{DateTime, Duration, TimeZone, Utc};
use guessbot::config::GameConfig;
use guessbot::game::extra::{ExtraEntry, ExtraFamilyConfig};
use guessbot::game::guessables::ItemConfig;
use guessbot::game::modes::ModeDefinition;
use guessbot::game::report::ReportWriter;
use guessbot::game::{Caller, GuessingGameBot};
use guessbot::storage::Storage;

pub const CHANNEL: &str = "12345";

/// 2024-03-01 20:00 UTC plus `minutes`.
pub fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap() + Duration::minutes(minutes)
}

pub fn args(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(|s| s.to_string()).collect()
}

pub fn medals() -> ExtraFamilyConfig {
    ExtraFamilyConfig {
        name: "medals".into(),
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

/// Storage under `root/data` with [`CHANNEL`] registered (1 point, 1 bonus)
/// and a small item set, one gated mode and the medals family.
pub async fn seeded_storage(root: &Path) -> Storage {
    let data_dir = root.join("data");
    let storage = Storage::new(data_dir.to_str().unwrap()).await.unwrap();
    storage
        .register_streamer(CHANNEL, "speedrunner", 1, 1)
        .await
        .unwrap();
    storage
        .modify_streamer(CHANNEL, |doc| {
            doc.guessables = vec![
                ItemConfig::new("Bow", &["bow"]),
                ItemConfig::new("Hookshot", &["hookshot", "hs"]),
                ItemConfig::new("Megaton Hammer", &["hammer"]),
                ItemConfig::new("Boss Key", &["bk"]),
                ItemConfig::new("Ice Trap", &["trap"]),
            ];
            doc.item_blacklist = vec!["Trap".into()];
            doc.modes = vec![ModeDefinition::new("keysanity", &["Boss Key"])];
            doc.extra = vec![medals()];
        })
        .await
        .unwrap();
    storage
}

pub async fn channel_bot(root: &Path, storage: &Storage) -> GuessingGameBot {
    GuessingGameBot::new(
        CHANNEL,
        storage.clone(),
        &GameConfig::default(),
        Some(ReportWriter::new(root.join("reports"))),
    )
    .await
    .unwrap()
}

pub fn streamer() -> Caller {
    Caller::moderator(CHANNEL, "speedrunner")
}

pub fn viewer(name: &str) -> Caller {
    Caller::viewer(&format!("id-{}", name), name)
}

/// Send `!name args...` at a fixed time.
pub async fn send(
    bot: &mut GuessingGameBot,
    caller: &Caller,
    line: &str,
    minute: i64,
) -> Option<String> {
    let mut parts = args(line);
    let name = parts.remove(0);
    bot.do_command_at(caller, &name, &parts, at(minute)).await
}
