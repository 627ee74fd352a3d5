//! Integration tests for deferred results.
//!
//! Tests cover:
//! - Cold results re-running per derivation
//! - Staged results running exactly once
//! - Recovery with catching
//! - Callbacks and the async bridge

use dbaction::core::executor::{Inline, WorkerPool};
use dbaction::{Deferred, Error};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

fn counting(counter: &Arc<AtomicUsize>, value: i32) -> Deferred<i32> {
    let counter = Arc::clone(counter);
    Deferred::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    })
}

// ========== COLD vs STAGED ==========

#[test]
fn test_cold_result_reruns_for_each_derivation() {
    let counter = Arc::new(AtomicUsize::new(0));
    let deferred = counting(&counter, 4);

    let plus = deferred.map(|v| v + 1);
    let times = deferred.map(|v| v * 2);
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    assert_eq!(plus.wait().unwrap(), 5);
    assert_eq!(times.wait().unwrap(), 8);
    assert_eq!(deferred.wait().unwrap(), 4);
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[test]
fn test_staged_result_runs_once() {
    let counter = Arc::new(AtomicUsize::new(0));
    let staged = counting(&counter, 4).stage().unwrap();
    assert!(staged.is_staged());

    let plus = staged.map(|v| v + 1);
    let times = staged.map(|v| v * 2);
    let (tx, rx) = mpsc::channel();
    staged
        .on_complete(move |result| tx.send(result.unwrap()).unwrap())
        .unwrap();
    staged.detach().unwrap();

    assert_eq!(plus.wait().unwrap(), 5);
    assert_eq!(times.wait().unwrap(), 8);
    assert_eq!(staged.wait().unwrap(), 4);
    assert_eq!(staged.wait().unwrap(), 4);
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 4);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_staging_twice_fails_fast() {
    let staged = Deferred::new(|| Ok(1)).stage().unwrap();
    assert!(matches!(staged.stage(), Err(Error::AlreadyStaged)));
}

#[test]
fn test_staged_on_worker_pool() {
    let pool = Arc::new(WorkerPool::fixed(2).unwrap());
    let results: Vec<Deferred<usize>> = (0..4)
        .map(|i| {
            Deferred::with_executor(
                move || {
                    std::thread::sleep(Duration::from_millis(10 * (4 - i) as u64));
                    Ok(i)
                },
                pool.clone(),
            )
            .stage()
            .unwrap()
        })
        .collect();

    let values: Vec<usize> = results.iter().map(|r| r.wait().unwrap()).collect();
    assert_eq!(values, vec![0, 1, 2, 3]);
    pool.shutdown();
}

// ========== FAILURES ==========

#[test]
fn test_wait_returns_original_failure() {
    let deferred: Deferred<i32> = Deferred::new(|| Err(Error::Mapping("bad shape".to_string())));
    let err = deferred.map(|v| v + 1).wait().unwrap_err();
    assert!(matches!(err, Error::Mapping(ref m) if m == "bad shape"));
}

#[test]
fn test_catching_substitutes_fallback() {
    let failing: Deferred<i32> = Deferred::with_executor(
        || Err(Error::other("boom")),
        Arc::new(Inline),
    );
    assert_eq!(failing.catching(|_| 7).wait().unwrap(), 7);

    let staged = failing.stage().unwrap();
    assert_eq!(staged.catching(|_| 9).wait().unwrap(), 9);
    assert!(staged.wait().is_err());
}

#[test]
fn test_catching_passes_values_through() {
    let deferred = Deferred::new(|| Ok(3));
    assert_eq!(deferred.catching(|_| 0).wait().unwrap(), 3);
}

#[test]
fn test_staged_panic_becomes_error() {
    let staged: Deferred<i32> = Deferred::new(|| panic!("worker exploded"))
        .stage()
        .unwrap();
    assert!(matches!(staged.wait(), Err(Error::Panicked(ref m)) if m == "worker exploded"));
}

// ========== CALLBACKS ==========

#[test]
fn test_on_complete_runs_on_another_thread() {
    let caller = std::thread::current().id();
    let (tx, rx) = mpsc::channel();

    Deferred::new(|| Ok("done".to_string()))
        .on_complete(move |result| {
            tx.send((std::thread::current().id(), result)).unwrap();
        })
        .unwrap();

    let (thread, result) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_ne!(thread, caller);
    assert_eq!(result.unwrap(), "done");
}

#[test]
fn test_panicking_callback_does_not_block_derived_results() {
    let pool = Arc::new(WorkerPool::fixed(1).unwrap());
    let gate = Arc::new(Mutex::new(()));
    let held = gate.lock();

    let release = Arc::clone(&gate);
    let staged = Deferred::with_executor(
        move || {
            let _open = release.lock();
            Ok(1)
        },
        pool.clone(),
    )
    .stage()
    .unwrap();

    staged.on_complete(|_| panic!("consumer bug")).unwrap();
    let derived = staged.map(|v| v + 1);
    let (tx, rx) = mpsc::channel();
    staged
        .on_complete(move |result| tx.send(result.unwrap()).unwrap())
        .unwrap();
    drop(held);

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 1);

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || tx.send(derived.wait()).unwrap());
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap(), 2);
    pool.shutdown();
}

#[test]
fn test_consume_runs_side_effect() {
    let seen = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&seen);

    Deferred::new(|| Ok(42usize))
        .consume(move |v| {
            sink.store(v, Ordering::SeqCst);
        })
        .wait()
        .unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 42);
}

#[tokio::test]
async fn test_into_future() {
    let value = Deferred::new(|| Ok(21)).map(|v| v * 2).into_future().await;
    assert_eq!(value.unwrap(), 42);
}

#[tokio::test]
async fn test_into_future_after_pool_shutdown() {
    let pool = Arc::new(WorkerPool::fixed(1).unwrap());
    pool.shutdown();

    let deferred = Deferred::with_executor(|| Ok(1), pool);
    assert!(matches!(deferred.into_future().await, Err(Error::PoolShutdown)));
}
