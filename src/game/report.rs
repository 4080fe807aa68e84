//! Session reports: the guess log and the lifetime totals, as CSV files.
//!
//! Files land in the configured reports directory as
//! `<channel>-<stamp>.csv` and `<channel>-<stamp> totals.csv`.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use log::info;
use tokio::fs;

use super::session::SessionLogEntry;
use crate::storage::Participant;
use crate::validation::safe_filename;

const GUESS_LOG_HEADER: [&str; 7] = [
    "Timestamp",
    "Participant ID",
    "Participant Username",
    "Guess Type",
    "Item",
    "Current Session Points",
    "Total Session Points",
];

const TOTALS_HEADER: [&str; 3] = ["Participant ID", "Participant Username", "Total Points"];

/// Quote a CSV field when it contains a separator, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_row<S: AsRef<str>>(fields: &[S]) -> String {
    let mut row = fields
        .iter()
        .map(|f| csv_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    row.push_str("\r\n");
    row
}

pub fn guess_log_csv(entries: &[SessionLogEntry]) -> String {
    let mut out = csv_row(&GUESS_LOG_HEADER);
    for entry in entries {
        out.push_str(&csv_row(&[
            entry.timestamp.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            entry.participant_id.clone(),
            entry.participant_name.clone(),
            entry.guess_type.clone(),
            entry.guess.clone(),
            entry.session_points.to_string(),
            entry.total_points.to_string(),
        ]));
    }
    out
}

pub fn totals_csv(participants: &[Participant]) -> String {
    let mut out = csv_row(&TOTALS_HEADER);
    for participant in participants {
        out.push_str(&csv_row(&[
            participant.user_id.clone(),
            participant.username.clone(),
            participant.total_points.to_string(),
        ]));
    }
    out
}

#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn stamp(channel_id: &str, at: DateTime<Utc>) -> String {
        format!(
            "{}-{}",
            safe_filename(channel_id),
            at.format("%Y-%m-%d %H_%M_%S%.6f")
        )
    }

    async fn write(&self, file_name: String, content: String) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| anyhow!("Failed to create reports directory {}: {}", self.dir.display(), e))?;
        let path = self.dir.join(file_name);
        fs::write(&path, content)
            .await
            .map_err(|e| anyhow!("Failed to write report {}: {}", path.display(), e))?;
        info!("Wrote report {}", path.display());
        Ok(path)
    }

    pub async fn write_guess_report(
        &self,
        channel_id: &str,
        entries: &[SessionLogEntry],
        at: DateTime<Utc>,
    ) -> Result<PathBuf> {
        let name = format!("{}.csv", Self::stamp(channel_id, at));
        self.write(name, guess_log_csv(entries)).await
    }

    pub async fn write_totals_report(
        &self,
        channel_id: &str,
        participants: &[Participant],
        at: DateTime<Utc>,
    ) -> Result<PathBuf> {
        let name = format!("{} totals.csv", Self::stamp(channel_id, at));
        self.write(name, totals_csv(participants)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(guess: &str) -> SessionLogEntry {
        SessionLogEntry {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 20, 5, 0).unwrap(),
            participant_id: "777".into(),
            participant_name: "alice".into(),
            guess_type: "medals".into(),
            guess: guess.into(),
            session_points: 2,
            total_points: 40,
        }
    }

    #[test]
    fn multi_line_guesses_are_quoted() {
        let csv = guess_log_csv(&[entry("Forest Medallion: Deku Tree\nFire Medallion: Dodongo's Cavern")]);
        let mut lines = csv.split("\r\n");
        assert_eq!(
            lines.next(),
            Some("Timestamp,Participant ID,Participant Username,Guess Type,Item,Current Session Points,Total Session Points")
        );
        assert!(csv.contains(
            "\"Forest Medallion: Deku Tree\nFire Medallion: Dodongo's Cavern\",2,40\r\n"
        ));
    }

    #[test]
    fn quotes_are_doubled() {
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("plain"), "plain");
    }

    #[tokio::test]
    async fn writes_totals_file() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(tmp.path().join("reports"));
        let mut alice = Participant::new("777", "alice");
        alice.total_points = 12;
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 22, 0, 0).unwrap();
        let path = writer.write_totals_report("12345", &[alice], at).await.unwrap();
        assert!(path.file_name().unwrap().to_str().unwrap().ends_with(" totals.csv"));
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(
            content,
            "Participant ID,Participant Username,Total Points\r\n777,alice,12\r\n"
        );
    }
}
