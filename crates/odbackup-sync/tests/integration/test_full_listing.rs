//! Full-listing mode: the remote snapshot is ground truth on every run

use std::time::Duration;

use odbackup_core::config::SyncMode;
use odbackup_core::domain::{BackupError, JobState, CHECKPOINT_FILE_NAME};

use crate::common::*;

#[tokio::test]
async fn test_first_run_mirrors_tree_and_second_run_downloads_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let drive = FakeDrive::new();
    drive.set_snapshot(
        vec![file("F1", "/a.txt", "E1"), file("F2", "/sub/b.txt", "E2")],
        vec![folder("D1", "/sub")],
    );
    let runner = runner(FakeAuth::ok(), drive.clone());
    let job = job("personal", dir.path(), SyncMode::FullListing);

    let run = runner.run(&job).await;
    assert_eq!(run.state(), JobState::Persisted);
    assert_eq!(run.stats().files_downloaded, 2);
    assert_eq!(read_local(dir.path(), "/a.txt").unwrap(), "F1@c-E1");
    assert_eq!(read_local(dir.path(), "/sub/b.txt").unwrap(), "F2@c-E2");

    let checkpoint = load_checkpoint(dir.path()).await;
    assert_eq!(checkpoint.file("/a.txt").unwrap().e_tag, "E1");
    assert_eq!(checkpoint.file("/sub/b.txt").unwrap().e_tag, "E2");
    assert!(checkpoint.last_backup_time().is_some());

    let run = runner.run(&job).await;
    assert_eq!(run.state(), JobState::Persisted);
    assert_eq!(run.stats().files_downloaded, 0);
    assert_eq!(run.stats().files_skipped, 2);
    assert_eq!(run.stats().mutations(), 0);
    assert_eq!(drive.download_count(), 2);
}

#[tokio::test]
async fn test_changed_etag_is_downloaded_again() {
    let dir = tempfile::tempdir().unwrap();
    let drive = FakeDrive::new();
    drive.set_snapshot(
        vec![file("F1", "/a.txt", "E1"), file("F2", "/b.txt", "E2")],
        vec![],
    );
    let runner = runner(FakeAuth::ok(), drive.clone());
    let job = job("personal", dir.path(), SyncMode::FullListing);
    runner.run(&job).await;

    drive.set_snapshot(
        vec![file("F1", "/a.txt", "E9"), file("F2", "/b.txt", "E2")],
        vec![],
    );
    let run = runner.run(&job).await;

    assert_eq!(run.stats().files_downloaded, 1);
    assert_eq!(read_local(dir.path(), "/a.txt").unwrap(), "F1@c-E9");
    assert_eq!(load_checkpoint(dir.path()).await.file("/a.txt").unwrap().e_tag, "E9");
}

#[tokio::test]
async fn test_missing_local_copy_is_restored() {
    let dir = tempfile::tempdir().unwrap();
    let drive = FakeDrive::new();
    drive.set_snapshot(vec![file("F1", "/a.txt", "E1")], vec![]);
    let runner = runner(FakeAuth::ok(), drive.clone());
    let job = job("personal", dir.path(), SyncMode::FullListing);
    runner.run(&job).await;

    std::fs::remove_file(dir.path().join("a.txt")).unwrap();
    let run = runner.run(&job).await;

    assert_eq!(run.stats().files_downloaded, 1);
    assert!(local_exists(dir.path(), "/a.txt"));
}

#[tokio::test]
async fn test_remote_deletion_removes_local_file_and_entry() {
    let dir = tempfile::tempdir().unwrap();
    let drive = FakeDrive::new();
    drive.set_snapshot(vec![file("F1", "/x.txt", "E1")], vec![]);
    let runner = runner(FakeAuth::ok(), drive.clone());
    let job = job("personal", dir.path(), SyncMode::FullListing);
    runner.run(&job).await;
    assert!(local_exists(dir.path(), "/x.txt"));

    drive.set_snapshot(vec![], vec![]);
    let run = runner.run(&job).await;

    assert_eq!(run.state(), JobState::Persisted);
    assert_eq!(run.stats().files_deleted, 1);
    assert!(!local_exists(dir.path(), "/x.txt"));
    assert!(dir.path().join(CHECKPOINT_FILE_NAME).exists());
    assert!(load_checkpoint(dir.path()).await.files().is_empty());
}

#[tokio::test]
async fn test_local_orphans_are_removed() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("stale/deeper")).unwrap();
    std::fs::write(dir.path().join("stale/deeper/old.txt"), b"old").unwrap();
    std::fs::write(dir.path().join("stray.txt"), b"stray").unwrap();

    let drive = FakeDrive::new();
    drive.set_snapshot(vec![file("F1", "/keep/a.txt", "E1")], vec![folder("D1", "/keep")]);
    let runner = runner(FakeAuth::ok(), drive);
    let run = runner
        .run(&job("personal", dir.path(), SyncMode::FullListing))
        .await;

    assert_eq!(run.state(), JobState::Persisted);
    assert!(!local_exists(dir.path(), "/stray.txt"));
    assert!(!local_exists(dir.path(), "/stale"));
    assert!(local_exists(dir.path(), "/keep/a.txt"));
    assert!(dir.path().join(CHECKPOINT_FILE_NAME).exists());
}

#[tokio::test]
async fn test_rename_is_delete_plus_download() {
    let dir = tempfile::tempdir().unwrap();
    let drive = FakeDrive::new();
    drive.set_snapshot(vec![file("F1", "/old.txt", "E1")], vec![]);
    let runner = runner(FakeAuth::ok(), drive.clone());
    let job = job("personal", dir.path(), SyncMode::FullListing);
    runner.run(&job).await;

    drive.set_snapshot(vec![file("F1", "/new.txt", "E1")], vec![]);
    let run = runner.run(&job).await;

    assert_eq!(run.stats().files_deleted, 1);
    assert_eq!(run.stats().files_downloaded, 1);
    assert!(!local_exists(dir.path(), "/old.txt"));
    assert!(local_exists(dir.path(), "/new.txt"));
    let checkpoint = load_checkpoint(dir.path()).await;
    assert!(checkpoint.file("/old.txt").is_none());
    assert!(checkpoint.file("/new.txt").is_some());
}

#[tokio::test]
async fn test_excluded_paths_are_not_mirrored_and_existing_copies_removed() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("Private")).unwrap();
    std::fs::write(dir.path().join("Private/diary.txt"), b"old").unwrap();

    let drive = FakeDrive::new();
    drive.set_snapshot(
        vec![
            file("F1", "/a.txt", "E1"),
            file("F2", "/Private/diary.txt", "E2"),
            file("F3", "/notes.tmp", "E3"),
        ],
        vec![folder("D1", "/Private")],
    );
    let runner = runner(FakeAuth::ok(), drive.clone());
    let mut job = job("personal", dir.path(), SyncMode::FullListing);
    job.excluded = vec!["private".to_string(), ".TMP".to_string()];

    let run = runner.run(&job).await;

    assert_eq!(run.state(), JobState::Persisted);
    assert_eq!(drive.downloaded(), vec!["/a.txt".to_string()]);
    assert!(!local_exists(dir.path(), "/Private"));
    assert!(!local_exists(dir.path(), "/notes.tmp"));
    let checkpoint = load_checkpoint(dir.path()).await;
    assert_eq!(checkpoint.files().len(), 1);
    assert!(checkpoint.folders().is_empty());
}

#[tokio::test]
async fn test_downloads_respect_concurrency_limit() {
    let dir = tempfile::tempdir().unwrap();
    let drive = FakeDrive::with_download_delay(Duration::from_millis(20));
    let files = (0..12)
        .map(|i| file(&format!("F{i}"), &format!("/f{i}.bin"), "E1"))
        .collect();
    drive.set_snapshot(files, vec![]);
    let runner = runner(FakeAuth::ok(), drive.clone());
    let mut job = job("personal", dir.path(), SyncMode::FullListing);
    job.max_concurrency = 3;

    let run = runner.run(&job).await;

    assert_eq!(run.state(), JobState::Persisted);
    assert_eq!(drive.download_count(), 12);
    assert!(drive.max_in_flight() <= 3);
    assert!(drive.max_in_flight() >= 1);
}

#[tokio::test]
async fn test_failed_download_is_retried_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let drive = FakeDrive::new();
    drive.set_snapshot(
        vec![file("F1", "/a.txt", "E1"), file("F2", "/b.txt", "E2")],
        vec![],
    );
    drive.fail_download("F2");
    let runner = runner(FakeAuth::ok(), drive.clone());
    let job = job("personal", dir.path(), SyncMode::FullListing);

    let run = runner.run(&job).await;
    assert_eq!(run.state(), JobState::Persisted);
    assert_eq!(run.stats().download_failures, 1);
    assert!(load_checkpoint(dir.path()).await.file("/b.txt").is_none());
    assert!(!local_exists(dir.path(), "/b.txt"));

    drive.clear_failures();
    let run = runner.run(&job).await;
    assert_eq!(run.stats().files_downloaded, 1);
    assert_eq!(run.stats().files_skipped, 1);
    assert!(local_exists(dir.path(), "/b.txt"));
}

#[tokio::test]
async fn test_fatal_download_error_fails_run_without_saving() {
    let dir = tempfile::tempdir().unwrap();
    let drive = FakeDrive::new();
    drive.set_snapshot(vec![file("F1", "/a.txt", "E1")], vec![]);
    drive.fail_download_with("F1", BackupError::Auth("token expired".to_string()));
    let runner = runner(FakeAuth::ok(), drive.clone());

    let run = runner
        .run(&job("personal", dir.path(), SyncMode::FullListing))
        .await;

    assert_eq!(run.state(), JobState::Failed);
    assert_eq!(run.stats().download_failures, 0);
    assert!(!dir.path().join(CHECKPOINT_FILE_NAME).exists());
}

#[tokio::test]
async fn test_auth_failure_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("mirror");
    let drive = FakeDrive::new();
    drive.set_snapshot(vec![file("F1", "/a.txt", "E1")], vec![]);
    let runner = runner(FakeAuth::failing(), drive.clone());

    let run = runner
        .run(&job("personal", &target, SyncMode::FullListing))
        .await;

    assert_eq!(run.state(), JobState::Failed);
    assert!(run.error().unwrap().contains("invalid_grant"));
    assert!(!target.exists());
    assert_eq!(drive.download_count(), 0);
}

#[tokio::test]
async fn test_listing_failure_keeps_previous_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let drive = FakeDrive::new();
    drive.set_snapshot(vec![file("F1", "/a.txt", "E1")], vec![]);
    let runner = runner(FakeAuth::ok(), drive.clone());
    let job = job("personal", dir.path(), SyncMode::FullListing);
    runner.run(&job).await;
    let before = load_checkpoint(dir.path()).await;

    drive.fail_listing(BackupError::Transport("HTTP 503".to_string()));
    let run = runner.run(&job).await;

    assert_eq!(run.state(), JobState::Failed);
    assert_eq!(load_checkpoint(dir.path()).await, before);
    assert!(local_exists(dir.path(), "/a.txt"));
}
