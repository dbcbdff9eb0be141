use schemashift::changelog::RunFilter;
use schemashift::errors::ErrorKind;
use schemashift::lock::LockCoordinator;
use schemashift::store::Database;
use schemashift_int_test::test_util::{
    cleanup, create_test_context, open_database, open_shift, run_test, users_changelog,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[ctor::ctor]
fn init() {
    colog::init();
}

fn coordinator(path: &str, holder: &str) -> LockCoordinator {
    let database = open_database(path).unwrap();
    LockCoordinator::new(Database::new(database), holder)
}

#[test]
fn test_exactly_one_concurrent_waiter_wins() {
    run_test(
        create_test_context,
        |ctx| {
            let barrier = Arc::new(Barrier::new(2));
            let winners = Arc::new(AtomicUsize::new(0));
            let release = Arc::new(AtomicBool::new(false));
            let waiter_done = Arc::new(AtomicBool::new(false));

            let handles: Vec<_> = ["first", "second"]
                .into_iter()
                .map(|holder| {
                    let path = ctx.path().to_string();
                    let barrier = barrier.clone();
                    let winners = winners.clone();
                    let release = release.clone();
                    let waiter_done = waiter_done.clone();
                    thread::spawn(move || {
                        let lock = coordinator(&path, holder);
                        barrier.wait();

                        if lock.acquire_lock().unwrap() {
                            winners.fetch_add(1, Ordering::SeqCst);
                            awaitility::at_most(Duration::from_secs(10))
                                .until(|| release.load(Ordering::SeqCst));
                            lock.release_lock().unwrap();
                        } else {
                            let acquired = lock
                                .wait_for_lock(Duration::from_secs(10), Duration::from_millis(20))
                                .unwrap();
                            assert!(acquired);
                            waiter_done.store(true, Ordering::SeqCst);
                            lock.release_lock().unwrap();
                        }
                    })
                })
                .collect();

            awaitility::at_most(Duration::from_secs(5))
                .until(|| winners.load(Ordering::SeqCst) == 1);
            thread::sleep(Duration::from_millis(200));
            assert_eq!(winners.load(Ordering::SeqCst), 1);
            assert!(!waiter_done.load(Ordering::SeqCst));

            release.store(true, Ordering::SeqCst);
            awaitility::at_most(Duration::from_secs(5))
                .until(|| waiter_done.load(Ordering::SeqCst));

            for handle in handles {
                handle.join().unwrap();
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_update_waits_for_held_lock() {
    run_test(
        create_test_context,
        |ctx| {
            let other = coordinator(ctx.path(), "other process");
            assert!(other.acquire_lock()?);

            let shift = ctx.shift();
            let finished = Arc::new(AtomicBool::new(false));
            let handle = {
                let finished = finished.clone();
                thread::spawn(move || {
                    let report = shift.update(&users_changelog(), &RunFilter::none()).unwrap();
                    finished.store(true, Ordering::SeqCst);
                    report.applied().len()
                })
            };

            thread::sleep(Duration::from_millis(300));
            assert!(!finished.load(Ordering::SeqCst));
            let holder = ctx.shift().list_locks()?.unwrap();
            assert_eq!(holder.locked_by(), Some("other process"));

            other.release_lock()?;
            awaitility::at_most(Duration::from_secs(5)).until(|| finished.load(Ordering::SeqCst));
            assert_eq!(handle.join().unwrap(), 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_lock_timeout_names_holder() {
    run_test(
        create_test_context,
        |ctx| {
            let other = coordinator(ctx.path(), "stuck deployer");
            assert!(other.acquire_lock()?);

            let impatient = schemashift::shift::Shift::builder()
                .load_module(
                    schemashift_sqlite_adapter::SqliteModule::with_config()
                        .db_path(ctx.path())
                        .build(),
                )
                .lock_wait_timeout(Duration::from_millis(200))
                .lock_poll_interval(Duration::from_millis(50))
                .open()?;

            let err = impatient
                .update(&users_changelog(), &RunFilter::none())
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::LockTimeout);
            assert!(err.message().contains("stuck deployer"));
            assert!(!ctx.table_exists("users")?);

            // the lock is left behind until someone forces it open
            impatient.release_locks()?;
            assert!(impatient.list_locks()?.is_none());
            impatient.update(&users_changelog(), &RunFilter::none())?;
            assert!(ctx.table_exists("users")?);
            impatient.close()?;
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_concurrent_updates_apply_once() {
    run_test(
        create_test_context,
        |ctx| {
            let barrier = Arc::new(Barrier::new(3));
            let handles: Vec<_> = (0..3)
                .map(|_| {
                    let path = ctx.path().to_string();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        let shift = open_shift(&path).unwrap();
                        barrier.wait();
                        let report = shift.update(&users_changelog(), &RunFilter::none()).unwrap();
                        shift.close().unwrap();
                        report.applied().len()
                    })
                })
                .collect();

            let applied: usize = handles.into_iter().map(|it| it.join().unwrap()).sum();
            assert_eq!(applied, 2);
            assert_eq!(ctx.shift().history()?.len(), 2);
            Ok(())
        },
        cleanup,
    )
}
