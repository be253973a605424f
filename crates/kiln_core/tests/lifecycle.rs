//! Live-object accounting and reference-count properties.
//!
//! Every test here reads the process-wide object count, so they serialize
//! on one lock.

#![allow(unsafe_code)]

use kiln_core::{
    object_count, Database, DocEnumerator, Document, EngineConfig, EnumeratorFlags,
    InstanceCounted, RefCounted, Retained,
};
use parking_lot::{Mutex, MutexGuard};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

static SERIAL: Mutex<()> = parking_lot::const_mutex(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock()
}

struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn retained_value_is_counted_until_released() {
    let _serial = serial();
    let baseline = object_count();

    let first = Retained::from_value(String::from("kiln"));
    assert_eq!(object_count(), baseline + 1);

    let second = unsafe { Retained::new(Retained::as_ptr(&first)) };
    assert_eq!(object_count(), baseline + 1);

    drop(first);
    assert_eq!(object_count(), baseline + 1);
    drop(second);
    assert_eq!(object_count(), baseline);
}

#[test]
fn instance_tokens_count_clones() {
    let _serial = serial();
    let baseline = object_count();

    let token = InstanceCounted::new();
    let copy = token.clone();
    assert_eq!(object_count(), baseline + 2);
    drop(token);
    drop(copy);
    assert_eq!(object_count(), baseline);
}

#[test]
fn database_and_enumerator_are_counted() {
    let _serial = serial();
    let dir = TempDir::new().unwrap();
    let baseline = object_count();

    let handle = Database::open(dir.path().join("counted.kiln"), &EngineConfig::new().create(true))
        .unwrap()
        .into_handle();
    assert_eq!(object_count(), baseline + 1);

    handle
        .transaction(|db| db.put(Document::new("a", "t", vec![1])))
        .unwrap();
    let docs: DocEnumerator = handle.enumerate(EnumeratorFlags::default()).unwrap();
    assert_eq!(object_count(), baseline + 2);
    assert_eq!(docs.count(), 1);
    assert_eq!(object_count(), baseline + 1);

    drop(handle);
    assert_eq!(object_count(), baseline);
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Retain,
    Release,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![Just(Op::Retain), Just(Op::Release)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The object survives while the modelled count is positive and is
    /// destroyed exactly once when the last reference goes.
    #[test]
    fn destroyed_once_when_count_reaches_zero(ops in prop::collection::vec(op(), 0..64)) {
        let _serial = serial();
        let baseline = object_count();
        let drops = Arc::new(AtomicUsize::new(0));
        let ptr = RefCounted::create(DropCounter(Arc::clone(&drops)));

        // The harness holds one reference throughout so the object cannot
        // die mid-sequence.
        unsafe { RefCounted::retain(ptr) };
        let mut extra = 0i32;
        for op in ops {
            match op {
                Op::Retain => {
                    unsafe { RefCounted::retain(ptr) };
                    extra += 1;
                }
                Op::Release if extra > 0 => {
                    unsafe { RefCounted::release(ptr) };
                    extra -= 1;
                }
                Op::Release => {}
            }
            prop_assert_eq!(unsafe { ptr.as_ref() }.ref_count(), extra + 1);
            prop_assert_eq!(drops.load(Ordering::SeqCst), 0);
        }

        for _ in 0..extra {
            unsafe { RefCounted::release(ptr) };
        }
        prop_assert_eq!(drops.load(Ordering::SeqCst), 0);
        unsafe { RefCounted::release(ptr) };
        prop_assert_eq!(drops.load(Ordering::SeqCst), 1);
        prop_assert_eq!(object_count(), baseline);
    }
}
