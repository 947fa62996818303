//! Tests for tokio spawner utilities

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use request_spawner::core::{Spawn, TimerHandle};
use request_spawner::runtime::tokio_spawner::TokioSpawner;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(Box::pin(async move {
        tx.send(123).unwrap();
    }));

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[tokio::test]
async fn test_tokio_spawner_current() {
    assert!(TokioSpawner::current().is_ok());
}

#[test]
fn test_tokio_spawner_current_outside_runtime() {
    assert!(TokioSpawner::current().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_timer_fires_after_delay() {
    let spawner = TokioSpawner::current().expect("runtime");
    let fired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&fired);

    let _timer = TimerHandle::after(&spawner, Duration::from_millis(100), move || {
        flag.store(true, Ordering::SeqCst);
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!fired.load(Ordering::SeqCst));
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(fired.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_timer_never_fires() {
    let spawner = TokioSpawner::current().expect("runtime");
    let fired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&fired);

    let timer = TimerHandle::after(&spawner, Duration::from_millis(100), move || {
        flag.store(true, Ordering::SeqCst);
    });
    timer.cancel();
    timer.cancel();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(timer.is_cancelled());
    assert!(!fired.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_fired_timer_runs_callback_once() {
    let spawner = TokioSpawner::current().expect("runtime");
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);

    let timer = TimerHandle::after(&spawner, Duration::from_millis(100), move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    timer.fire_now();
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    timer.fire_now();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}
