//! Sweeper behaviour: single sweeps, folder stats and the background loop.
//!
//! A delete that fails for one file (logged, then the sweep moves on) has no
//! test here: these tests run as root, where no unlink is refused. That path
//! lives in the `remove_file` match of `CleanupService::cleanup_old_files`.

mod common;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use docconvert::services::{retry_backoff, CleanupService, SWEEP_RETRY_BACKOFF};
use tempfile::TempDir;

use common::set_age;

const MINUTE: Duration = Duration::from_secs(60);

#[test]
fn test_sweep_deletes_only_files_past_retention() {
    let dir = TempDir::new().unwrap();
    let old = dir.path().join("20240101_120000_old.pdf");
    let fresh = dir.path().join("20240101_124000_fresh.pdf");
    fs::write(&old, b"old").unwrap();
    fs::write(&fresh, b"fresh").unwrap();
    set_age(&old, 45 * MINUTE);
    set_age(&fresh, 5 * MINUTE);

    let service = CleanupService::new(dir.path(), 30 * MINUTE);
    let deleted = service.cleanup_old_files().unwrap();

    assert_eq!(deleted, 1);
    assert!(!old.exists());
    assert!(fresh.exists());
}

#[test]
fn test_sweep_on_empty_folder_deletes_nothing() {
    let dir = TempDir::new().unwrap();
    let service = CleanupService::new(dir.path(), 30 * MINUTE);
    assert_eq!(service.cleanup_old_files().unwrap(), 0);
}

#[test]
fn test_sweep_on_missing_folder_deletes_nothing() {
    let dir = TempDir::new().unwrap();
    let service = CleanupService::new(dir.path().join("does-not-exist"), 30 * MINUTE);
    assert_eq!(service.cleanup_old_files().unwrap(), 0);
}

#[test]
fn test_sweep_leaves_subdirectories_alone() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("nested");
    fs::create_dir(&nested).unwrap();
    let inside = nested.join("inner.pdf");
    fs::write(&inside, b"x").unwrap();
    set_age(&inside, 120 * MINUTE);

    let service = CleanupService::new(dir.path(), 30 * MINUTE);

    assert_eq!(service.cleanup_old_files().unwrap(), 0);
    assert!(nested.is_dir());
    assert!(inside.exists());
}

#[test]
fn test_sweep_counts_every_expired_file() {
    let dir = TempDir::new().unwrap();
    for i in 0..4 {
        let path = dir.path().join(format!("expired_{}.pdf", i));
        fs::write(&path, b"x").unwrap();
        set_age(&path, 31 * MINUTE);
    }
    fs::write(dir.path().join("new.pdf"), b"x").unwrap();

    let service = CleanupService::new(dir.path(), 30 * MINUTE);

    assert_eq!(service.cleanup_old_files().unwrap(), 4);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_folder_stats_counts_files_and_size() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.pdf"), vec![0u8; 1024 * 1024]).unwrap();
    fs::write(dir.path().join("b.pdf"), vec![0u8; 512 * 1024]).unwrap();
    fs::create_dir(dir.path().join("ignored")).unwrap();

    let stats = CleanupService::new(dir.path(), 30 * MINUTE).folder_stats();

    assert!(stats.exists);
    assert_eq!(stats.file_count, 2);
    assert_eq!(stats.total_size_mb, 1.5);
    assert_eq!(stats.folder_path, dir.path().display().to_string());
}

#[test]
fn test_folder_stats_for_missing_folder() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("gone");

    let stats = CleanupService::new(&missing, 30 * MINUTE).folder_stats();

    assert!(!stats.exists);
    assert_eq!(stats.file_count, 0);
    assert_eq!(stats.total_size_mb, 0.0);
}

#[tokio::test]
async fn test_background_loop_sweeps_until_stopped() {
    let dir = TempDir::new().unwrap();
    let service = Arc::new(CleanupService::new(dir.path(), 30 * MINUTE));
    let handle = service.start(Duration::from_millis(20));
    assert!(handle.is_running());

    let expired = dir.path().join("expired.pdf");
    fs::write(&expired, b"x").unwrap();
    set_age(&expired, 60 * MINUTE);

    let mut removed = false;
    for _ in 0..100 {
        if !expired.exists() {
            removed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(removed, "expired file should be swept by the background loop");

    handle.shutdown().await;
}

#[tokio::test]
async fn test_stopped_loop_no_longer_sweeps() {
    let dir = TempDir::new().unwrap();
    let service = Arc::new(CleanupService::new(dir.path(), 30 * MINUTE));
    let handle = service.start(Duration::from_millis(20));

    handle.stop();
    handle.stop();
    for _ in 0..100 {
        if !handle.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!handle.is_running());

    let expired = dir.path().join("late.pdf");
    fs::write(&expired, b"x").unwrap();
    set_age(&expired, 60 * MINUTE);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(expired.exists());
    handle.shutdown().await;
}

#[tokio::test]
async fn test_loop_survives_unreadable_folder() {
    let dir = TempDir::new().unwrap();
    // A regular file where the folder should be makes every sweep fail.
    let not_a_dir = dir.path().join("storage");
    fs::write(&not_a_dir, b"x").unwrap();

    let service = Arc::new(CleanupService::new(&not_a_dir, 30 * MINUTE));
    assert!(service.cleanup_old_files().is_err());

    let handle = service.start(Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(handle.is_running());

    handle.shutdown().await;
}

#[test]
fn test_retry_backoff_is_shorter_than_interval() {
    assert_eq!(retry_backoff(10 * MINUTE), SWEEP_RETRY_BACKOFF);
    assert_eq!(retry_backoff(2 * MINUTE), SWEEP_RETRY_BACKOFF);
    assert_eq!(retry_backoff(MINUTE), Duration::from_secs(30));
    assert_eq!(retry_backoff(Duration::from_millis(20)), Duration::from_millis(10));

    for interval in [Duration::from_millis(1), Duration::from_secs(1), MINUTE, 90 * MINUTE] {
        assert!(retry_backoff(interval) < interval);
    }
}
