//! Scheduler: concurrent jobs, overlap suppression, config checks

use std::sync::Arc;
use std::time::Duration;

use odbackup_core::config::SyncMode;
use odbackup_core::domain::{BackupError, JobState};
use odbackup_sync::{JobOutcome, JobScheduler};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::common::*;

#[tokio::test]
async fn test_new_rejects_empty_job_list() {
    let runner = runner(FakeAuth::ok(), FakeDrive::new());
    let err = JobScheduler::new(runner, Vec::new()).unwrap_err();
    assert!(matches!(err, BackupError::Config(_)));
}

#[tokio::test]
async fn test_new_rejects_zero_interval() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = job("personal", dir.path(), SyncMode::FullListing);
    job.interval_minutes = 0;
    let err = JobScheduler::new(runner(FakeAuth::ok(), FakeDrive::new()), vec![job]).unwrap_err();
    assert!(matches!(err, BackupError::Config(_)));
}

#[tokio::test]
async fn test_run_once_runs_every_job() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    let drive = FakeDrive::new();
    drive.set_snapshot(vec![file("F1", "/a.txt", "E1")], vec![]);
    let scheduler = JobScheduler::new(
        runner(FakeAuth::ok(), drive.clone()),
        vec![
            job("personal", a.path(), SyncMode::FullListing),
            job("work", b.path(), SyncMode::FullListing),
        ],
    )
    .unwrap();

    let outcomes = scheduler.run_once().await;

    let names: Vec<_> = outcomes.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["personal", "work"]);
    for (_, outcome) in &outcomes {
        match outcome {
            JobOutcome::Completed(run) => assert_eq!(run.state(), JobState::Persisted),
            JobOutcome::Skipped => panic!("nothing else was running"),
        }
    }
    assert!(local_exists(a.path(), "/a.txt"));
    assert!(local_exists(b.path(), "/a.txt"));
    assert_eq!(scheduler.guard().active_count(), 0);
}

#[tokio::test]
async fn test_overlapping_run_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let gate = Arc::new(Notify::new());
    let drive = FakeDrive::new();
    let job = job("personal", dir.path(), SyncMode::FullListing);
    let scheduler = Arc::new(
        JobScheduler::new(runner(FakeAuth::gated(gate.clone()), drive), vec![job.clone()]).unwrap(),
    );

    let first = {
        let scheduler = Arc::clone(&scheduler);
        let job = job.clone();
        tokio::spawn(async move { scheduler.run_job(&job).await })
    };
    while !scheduler.guard().is_active(&job.identity()) {
        tokio::task::yield_now().await;
    }

    let second = scheduler.run_job(&job).await;
    assert!(matches!(second, JobOutcome::Skipped));

    gate.notify_one();
    let first = first.await.unwrap();
    assert!(matches!(first, JobOutcome::Completed(ref run) if run.state() == JobState::Persisted));
    assert!(!scheduler.guard().is_active(&job.identity()));
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let auth = FakeAuth::ok();
    let drive = FakeDrive::new();
    let scheduler = Arc::new(
        JobScheduler::new(
            runner(auth.clone(), drive),
            vec![job("personal", dir.path(), SyncMode::FullListing)],
        )
        .unwrap(),
    );
    let shutdown = CancellationToken::new();

    let handle = tokio::spawn(Arc::clone(&scheduler).run(shutdown.clone()));
    tokio::time::timeout(Duration::from_secs(5), async {
        while auth.calls() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}
