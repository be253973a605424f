//! Cross-thread transaction behavior.

#![cfg(feature = "threadsafe")]
#![allow(unsafe_code)]

use kiln_core::{
    object_count, Database, DatabaseHandle, Document, EngineConfig, KilnError, Retained,
};
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

static SERIAL: Mutex<()> = parking_lot::const_mutex(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock()
}

fn open_handle(dir: &TempDir, name: &str) -> DatabaseHandle {
    Database::open(dir.path().join(name), &EngineConfig::new().create(true))
        .unwrap()
        .into_handle()
}

/// A second handle on the same database, as another thread would hold.
fn share(handle: &DatabaseHandle) -> DatabaseHandle {
    unsafe { Retained::new(Retained::as_ptr(handle)) }
}

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn handles_are_send_and_sync() {
    assert_send_sync::<Database>();
    assert_send_sync::<DatabaseHandle>();
}

#[test]
fn second_thread_blocks_until_first_commits() {
    let _serial = serial();
    let dir = TempDir::new().unwrap();
    let baseline = object_count();
    let handle = open_handle(&dir, "blocking.kiln");

    handle.begin_transaction().unwrap();

    let began = Arc::new(AtomicBool::new(false));
    let (done_tx, done_rx) = mpsc::channel();
    let other = {
        let handle = share(&handle);
        let began = Arc::clone(&began);
        thread::spawn(move || {
            handle.begin_transaction().unwrap();
            began.store(true, Ordering::SeqCst);
            handle.put(Document::new("second", "t", vec![2])).unwrap();
            handle.end_transaction(true).unwrap();
            done_tx.send(()).unwrap();
        })
    };

    thread::sleep(Duration::from_millis(100));
    assert!(!began.load(Ordering::SeqCst), "second begin must block");

    handle.put(Document::new("first", "t", vec![1])).unwrap();
    handle.end_transaction(true).unwrap();

    done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    other.join().unwrap();
    assert!(began.load(Ordering::SeqCst));

    assert!(handle.get("first").unwrap().is_some());
    assert!(handle.get("second").unwrap().is_some());
    assert_eq!(handle.transaction_stats().committed(), 2);
    assert_eq!(Retained::ref_count(&handle), 1);

    drop(handle);
    assert_eq!(object_count(), baseline);
}

#[test]
fn transactions_never_interleave() {
    let _serial = serial();
    let dir = TempDir::new().unwrap();
    let handle = open_handle(&dir, "exclusive.kiln");
    let inside = Arc::new(AtomicUsize::new(0));
    let threads = 3;
    let rounds = 20;
    let start = Arc::new(Barrier::new(threads));

    let workers: Vec<_> = (0..threads)
        .map(|t| {
            let handle = share(&handle);
            let inside = Arc::clone(&inside);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for round in 0..rounds {
                    handle.begin_transaction().unwrap();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);

                    handle.begin_transaction().unwrap();
                    handle
                        .put(Document::new(format!("t{t}-r{round}"), "t", vec![]))
                        .unwrap();
                    handle.end_transaction(true).unwrap();
                    thread::yield_now();

                    assert_eq!(inside.fetch_sub(1, Ordering::SeqCst), 1);
                    handle.end_transaction(true).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let expected = (threads * rounds) as u64;
    assert_eq!(handle.document_count().unwrap(), expected);
    let stats = handle.transaction_stats().snapshot();
    assert_eq!(stats.committed, expected);
    assert_eq!(stats.nested, expected);
}

#[test]
fn reads_do_not_wait_for_transactions() {
    let _serial = serial();
    let dir = TempDir::new().unwrap();
    let handle = open_handle(&dir, "reads.kiln");
    handle
        .transaction(|db| db.put(Document::new("a", "t", vec![])))
        .unwrap();

    handle.begin_transaction().unwrap();
    let reader = {
        let handle = share(&handle);
        thread::spawn(move || {
            assert!(handle.in_transaction());
            handle.get("a").unwrap().is_some()
        })
    };
    assert!(reader.join().unwrap());
    handle.end_transaction(true).unwrap();
}

#[test]
fn foreign_end_waits_then_fails() {
    let _serial = serial();
    let dir = TempDir::new().unwrap();
    let handle = open_handle(&dir, "foreign.kiln");
    handle.begin_transaction().unwrap();

    let (tx, rx) = mpsc::channel();
    let other = {
        let handle = share(&handle);
        thread::spawn(move || {
            let result = handle.end_transaction(true);
            tx.send(matches!(result, Err(KilnError::NotInTransaction)))
                .unwrap();
        })
    };

    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    handle.end_transaction(true).unwrap();
    assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
    other.join().unwrap();
}
