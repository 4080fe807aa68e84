mod common;

use std::path::{Path, PathBuf};

use common::{channel_bot, seeded_storage, send, streamer, viewer, CHANNEL};
use guessbot::game::ledger::GuessKind;

fn lock_path(root: &Path) -> PathBuf {
    root.join("data")
        .join("streamers")
        .join(format!(".{}.json.lock", CHANNEL))
}

/// Writes fail while a directory sits where the document lock file goes.
fn break_writes(root: &Path) {
    let lock = lock_path(root);
    let _ = std::fs::remove_file(&lock);
    std::fs::create_dir(&lock).unwrap();
}

fn restore_writes(root: &Path) {
    std::fs::remove_dir(lock_path(root)).unwrap();
}

#[tokio::test]
async fn failed_reveal_keeps_guesses_for_a_retry() {
    let tmp = tempfile::tempdir().unwrap();
    let storage = seeded_storage(tmp.path()).await;
    let mut bot = channel_bot(tmp.path(), &storage).await;
    let mod_ = streamer();

    send(&mut bot, &mod_, "start", 0).await;
    send(&mut bot, &viewer("alice"), "guess bow", 1).await;

    break_writes(tmp.path());
    assert_eq!(send(&mut bot, &mod_, "hud bow", 2).await, None);
    assert_eq!(bot.session().ledger().queue(&GuessKind::Items).len(), 1);

    restore_writes(tmp.path());
    assert_eq!(
        send(&mut bot, &mod_, "hud bow", 3).await.as_deref(),
        Some("Bow guessed correctly by alice (+2)")
    );
    assert!(bot.session().ledger().queue(&GuessKind::Items).is_empty());
    let doc = storage.require_streamer(CHANNEL).await.unwrap();
    assert_eq!(doc.participant("id-alice").unwrap().total_points, 2);
}

#[tokio::test]
async fn failed_family_completion_can_be_repeated() {
    let tmp = tempfile::tempdir().unwrap();
    let storage = seeded_storage(tmp.path()).await;
    let mut bot = channel_bot(tmp.path(), &storage).await;
    let mod_ = streamer();

    send(&mut bot, &mod_, "start", 0).await;
    send(
        &mut bot,
        &viewer("alice"),
        "guess medals deku dc jabu forest fire water",
        1,
    )
    .await;
    for (minute, slot) in ["forest deku", "fire dc", "water jabu", "spirit forest", "shadow fire"]
        .iter()
        .enumerate()
    {
        let line = format!("hud medals {}", slot);
        assert_eq!(send(&mut bot, &mod_, &line, 2 + minute as i64).await, None);
    }

    break_writes(tmp.path());
    assert_eq!(send(&mut bot, &mod_, "hud medals light water", 8).await, None);
    assert_eq!(bot.session().assignment("medals").map(|a| a.len()), Some(6));
    let family = GuessKind::Family("medals".into());
    assert_eq!(bot.session().ledger().queue(&family).len(), 1);

    restore_writes(tmp.path());
    assert_eq!(
        send(&mut bot, &mod_, "hud medals light water", 9).await.as_deref(),
        Some("medals guesses completed")
    );
    assert!(bot.session().assignment("medals").is_none());
    assert!(bot.session().ledger().queue(&family).is_empty());
    let doc = storage.require_streamer(CHANNEL).await.unwrap();
    assert_eq!(doc.participant("id-alice").unwrap().total_points, 7);
}

#[tokio::test]
async fn failed_finish_leaves_the_game_running() {
    let tmp = tempfile::tempdir().unwrap();
    let storage = seeded_storage(tmp.path()).await;
    let mut bot = channel_bot(tmp.path(), &storage).await;
    let mod_ = streamer();

    send(&mut bot, &mod_, "start", 0).await;
    send(&mut bot, &viewer("alice"), "guess bow", 1).await;
    send(&mut bot, &mod_, "hud bow", 2).await;

    break_writes(tmp.path());
    assert_eq!(send(&mut bot, &mod_, "finish", 3).await, None);
    assert!(bot.is_running());
    assert_eq!(bot.session().log().len(), 1);

    restore_writes(tmp.path());
    assert_eq!(
        send(&mut bot, &mod_, "finish", 4).await.as_deref(),
        Some("Guessing game ended by speedrunner")
    );
    let doc = storage.require_streamer(CHANNEL).await.unwrap();
    assert_eq!(doc.participant("id-alice").unwrap().session_points, 0);
    assert_eq!(doc.sessions.len(), 1);
    assert_eq!(doc.sessions[0].guesses.len(), 1);
    assert_eq!(std::fs::read_dir(tmp.path().join("reports")).unwrap().count(), 1);
}
