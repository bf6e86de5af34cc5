//! End-to-end pipeline scenarios against a local feed.

use crate::common::{PACKAGE_ID, TestEnv};
use semver::Version;
use updraft::core::UpdraftError;
use updraft::manifest::ReleaseKind;
use updraft::pipeline::update_app;
use updraft::utils::ProgressHandle;

/// Feed: v1.0 full, v1.0→v1.1 delta, v1.1 full; installed v1.0. The delta
/// chain is planned, downloaded, verified and applied, and the launch list
/// stays empty because this is not a bootstrap.
#[tokio::test]
async fn delta_chain_end_to_end() {
    let mut env = TestEnv::new();
    env.install_current("1.0.0", &[("app.txt", b"v1.0")]);
    env.publish("1.0.0", ReleaseKind::Full, &[("app.txt", b"v1.0")]);
    env.publish("1.1.0", ReleaseKind::Delta, &[("app.txt", b"v1.1")]);
    env.publish("1.1.0", ReleaseKind::Full, &[("app.txt", b"v1.1")]);
    env.commit();

    let manager = env.manager();

    let update = manager
        .check_for_update(false, &ProgressHandle::none())
        .await
        .unwrap();
    assert_eq!(update.releases_to_apply.len(), 1);
    assert!(update.releases_to_apply[0].is_delta);
    assert!(!update.is_bootstrapping);

    let download_progress = ProgressHandle::none();
    manager
        .download_releases(&update.releases_to_apply, &download_progress)
        .await
        .unwrap();
    assert_eq!(download_progress.current(), 100);

    let launched = manager
        .apply_releases(&update, &ProgressHandle::none())
        .await
        .unwrap();
    assert!(launched.is_empty());
    assert_eq!(env.current_version(), Some(Version::new(1, 1, 0)));
    assert_eq!(env.current_file("app.txt"), b"v1.1");
}

/// Bootstrap: no prior install, feed has only v1.1 full. The plan marks
/// bootstrapping and apply returns the entry-point executables.
#[tokio::test]
async fn bootstrap_end_to_end() {
    let mut env = TestEnv::new();
    env.publish_executable("1.1.0", &[("bin/acme-notes", b"#!launcher")]);
    env.commit();

    let manager = env.manager();

    let update = manager
        .check_for_update(false, &ProgressHandle::none())
        .await
        .unwrap();
    assert!(update.is_bootstrapping);
    assert_eq!(update.releases_to_apply.len(), 1);

    manager
        .download_releases(&update.releases_to_apply, &ProgressHandle::none())
        .await
        .unwrap();
    let launched = manager
        .apply_releases(&update, &ProgressHandle::none())
        .await
        .unwrap();

    assert_eq!(launched.len(), 1);
    assert!(launched[0].ends_with("bin/acme-notes"));
    assert_eq!(env.current_version(), Some(Version::new(1, 1, 0)));
}

/// A verified staged artifact survives the feed disappearing: download
/// resumes from the staging directory without refetching.
#[tokio::test]
async fn download_resumes_from_staging() {
    let mut env = TestEnv::new();
    env.publish("1.1.0", ReleaseKind::Full, &[("app.txt", b"v1.1")]);
    env.commit();

    let manager = env.manager();
    let update = manager
        .check_for_update(false, &ProgressHandle::none())
        .await
        .unwrap();

    manager
        .download_releases(&update.releases_to_apply, &ProgressHandle::none())
        .await
        .unwrap();

    // Remove the package from the feed; only the staged copy remains.
    std::fs::remove_file(env.feed_dir.join(&update.releases_to_apply[0].filename)).unwrap();

    let progress = ProgressHandle::none();
    manager
        .download_releases(&update.releases_to_apply, &progress)
        .await
        .unwrap();
    assert_eq!(progress.current(), 100);
}

/// A feed whose delta chain skips an intermediate version still updates: the
/// planner falls back to the latest full release as a normal outcome.
#[tokio::test]
async fn broken_chain_falls_back_to_full() {
    let mut env = TestEnv::new();
    env.install_current("1.0.0", &[("app.txt", b"v1.0")]);
    env.publish("1.0.0", ReleaseKind::Full, &[("app.txt", b"v1.0")]);
    // 1.1.0 has no delta, breaking the chain to 1.2.0.
    env.publish("1.1.0", ReleaseKind::Full, &[("app.txt", b"v1.1")]);
    env.publish("1.2.0", ReleaseKind::Delta, &[("app.txt", b"v1.2")]);
    env.publish("1.2.0", ReleaseKind::Full, &[("app.txt", b"v1.2")]);
    env.commit();

    let manager = env.manager();
    let applied = update_app(&manager).await.unwrap().unwrap();

    assert!(!applied.is_delta);
    assert_eq!(applied.version, Version::new(1, 2, 0));
    assert_eq!(env.current_file("app.txt"), b"v1.2");
}

/// Cancelling mid-apply, before the pointer swap, leaves the previous
/// version selected and its files intact.
#[tokio::test]
async fn cancellation_before_swap_is_atomic() {
    let mut env = TestEnv::new();
    env.install_current("1.0.0", &[("app.txt", b"v1.0")]);
    env.publish("1.1.0", ReleaseKind::Full, &[("app.txt", b"v1.1")]);
    env.commit();

    let manager = env.manager();
    let update = manager
        .check_for_update(false, &ProgressHandle::none())
        .await
        .unwrap();
    manager
        .download_releases(&update.releases_to_apply, &ProgressHandle::none())
        .await
        .unwrap();

    // Cancel as soon as apply reports progress, which happens during
    // extraction and therefore before the swap.
    let cancel = manager.cancel_token();
    let progress = ProgressHandle::new(move |_| cancel.cancel());

    let err = manager.apply_releases(&update, &progress).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<UpdraftError>(),
        Some(UpdraftError::Cancelled)
    ));

    assert_eq!(env.current_version(), Some(Version::new(1, 0, 0)));
    assert_eq!(env.current_file("app.txt"), b"v1.0");
    assert!(!env.root().version_dir(&Version::new(1, 1, 0)).exists());
}

/// A feed serving bytes that do not match the manifest hash fails the whole
/// download with an integrity error naming the entry.
#[tokio::test]
async fn tampered_artifact_fails_download() {
    let mut env = TestEnv::new();
    env.publish("1.1.0", ReleaseKind::Full, &[("app.txt", b"v1.1")]);
    env.commit();

    // Tamper after the manifest was committed.
    let filename = env.entries[0].filename.clone();
    std::fs::write(env.feed_dir.join(&filename), b"not the promised bytes").unwrap();

    let manager = env.manager();
    let update = manager
        .check_for_update(false, &ProgressHandle::none())
        .await
        .unwrap();

    let err = manager
        .download_releases(&update.releases_to_apply, &ProgressHandle::none())
        .await
        .unwrap_err();
    match err.downcast_ref::<UpdraftError>() {
        Some(UpdraftError::ArtifactIntegrity { filename: failing, .. }) => {
            assert_eq!(*failing, filename);
        }
        other => panic!("expected integrity error, got {other:?}"),
    }
}

/// Checking twice against an unchanged feed plans the same update.
#[tokio::test]
async fn check_is_idempotent() {
    let mut env = TestEnv::new();
    env.install_current("1.0.0", &[("app.txt", b"v1.0")]);
    env.publish("1.0.0", ReleaseKind::Full, &[("app.txt", b"v1.0")]);
    env.publish("1.1.0", ReleaseKind::Full, &[("app.txt", b"v1.1")]);
    env.commit();

    let manager = env.manager();
    let first = manager
        .check_for_update(false, &ProgressHandle::none())
        .await
        .unwrap();
    let second = manager
        .check_for_update(false, &ProgressHandle::none())
        .await
        .unwrap();
    assert_eq!(first, second);
}

/// A feed with no entries for this package id is a named planning error.
#[tokio::test]
async fn foreign_feed_yields_no_releases_found() {
    let mut env = TestEnv::new();
    env.publish("1.0.0", ReleaseKind::Full, &[("app.txt", b"x")]);
    env.commit();

    // Rewrite the manifest for a different package id.
    let content = std::fs::read_to_string(env.feed_dir.join("RELEASES")).unwrap();
    let foreign = content.replace(PACKAGE_ID, "someone-else");
    std::fs::write(env.feed_dir.join("RELEASES"), foreign).unwrap();

    let manager = env.manager();
    let err = manager
        .check_for_update(false, &ProgressHandle::none())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<UpdraftError>(),
        Some(UpdraftError::NoReleasesFound { .. })
    ));
}
