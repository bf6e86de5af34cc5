//! Mutual exclusion between concurrent updaters on one installation.

use crate::common::{PACKAGE_ID, TestEnv};
use semver::Version;
use std::time::Duration;
use updraft::core::UpdraftError;
use updraft::lock::UpdateLock;
use updraft::manifest::ReleaseKind;
use updraft::pipeline::update_app;
use updraft::utils::ProgressHandle;

/// While another updater holds the installation's lock, every pipeline
/// operation times out with `LockWaitTimeout` instead of mutating anything.
#[tokio::test]
async fn held_lock_times_out_apply() {
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

    // Simulate a second updater instance holding the lock.
    let other = UpdateLock::acquire(
        &env.root().locks_dir(),
        PACKAGE_ID,
        Duration::from_secs(1),
    )
    .await
    .unwrap();

    let err = manager
        .apply_releases(&update, &ProgressHandle::none())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<UpdraftError>(),
        Some(UpdraftError::LockWaitTimeout { .. })
    ));

    // Nothing moved while the lock was contested.
    assert_eq!(env.current_version(), Some(Version::new(1, 0, 0)));
    drop(other);

    // Once released, the same apply goes through.
    manager
        .apply_releases(&update, &ProgressHandle::none())
        .await
        .unwrap();
    assert_eq!(env.current_version(), Some(Version::new(1, 1, 0)));
}

/// Two one-shot updates racing on the same installation never both apply:
/// the loser either waits and finds itself up to date or times out.
#[tokio::test]
async fn racing_updates_apply_once() {
    let mut env = TestEnv::new();
    env.install_current("1.0.0", &[("app.txt", b"v1.0")]);
    env.publish("1.1.0", ReleaseKind::Full, &[("app.txt", b"v1.1")]);
    env.commit();

    let first = env.manager();
    let second = env.manager();

    let (a, b) = tokio::join!(update_app(&first), update_app(&second));

    let applied = [a.unwrap(), b.unwrap()];
    let updates = applied.iter().flatten().count();
    assert_eq!(updates, 1, "exactly one racer applies the release");
    assert_eq!(env.current_version(), Some(Version::new(1, 1, 0)));
    assert_eq!(env.current_file("app.txt"), b"v1.1");
}

/// Lock scopes are per installation id: different ids never contend.
#[tokio::test]
async fn different_installations_do_not_contend() {
    let env = TestEnv::new();
    let locks_dir = env.root().locks_dir();

    let _a = UpdateLock::acquire(&locks_dir, "acme-notes", Duration::from_secs(1))
        .await
        .unwrap();
    let _b = UpdateLock::acquire(&locks_dir, "acme-player", Duration::from_secs(1))
        .await
        .unwrap();
}
