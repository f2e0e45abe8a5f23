//! End-to-end scenarios for `Pool`: real worker threads, concurrent submission, and the
//! two shutdown paths.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chanpool::Pool;
use futures::executor::block_on;

#[test]
fn four_workers_compute_squares() {
    let pool = Pool::new(4);
    let handles: Vec<_> = (0..100)
        .map(|i| pool.add_task(move || i * i).unwrap())
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| block_on(h).unwrap()).collect();
    let expected: Vec<_> = (0..100).map(|i| i * i).collect();
    assert_eq!(results, expected);
    pool.join();
}

#[test]
fn failures_in_one_task_dont_affect_siblings() {
    let pool = Pool::new(2);
    let outcomes: Vec<_> = [false, true, false, true, false]
        .into_iter()
        .map(|should_fail| {
            pool.add_task(move || {
                if should_fail {
                    panic!("task asked to fail");
                }
                1
            })
            .unwrap()
        })
        .collect();

    let results: Vec<_> = outcomes.into_iter().map(block_on).collect();
    assert_eq!(
        results.iter().filter(|r| r.is_ok()).count(),
        3,
        "the three non-failing tasks should have succeeded"
    );
    assert_eq!(
        results.iter().filter(|r| r.is_err()).count(),
        2,
        "the two panicking tasks should have failed without taking the pool down"
    );
    pool.join();
}

#[test]
fn join_waits_for_outstanding_work_then_closes_the_pool() {
    let pool = Pool::new(3);
    let counter = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..50)
        .map(|_| {
            let counter = counter.clone();
            pool.add_task(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap()
        })
        .collect();

    pool.join();
    for h in handles {
        block_on(h).unwrap();
    }
    assert_eq!(counter.load(Ordering::SeqCst), 50);
    assert!(!pool.joinable());
    assert!(pool.add_task(|| ()).is_err());
}

#[test]
fn kill_stops_accepting_work_immediately() {
    let pool = Pool::new(2);
    pool.kill();
    assert!(!pool.joinable());
    assert!(pool.add_task(|| ()).is_err());
}
