use std::sync::Arc;
use std::thread;

use tempfile::tempdir;

use crate::wal::Wal;

#[test]
fn concurrent_writers_all_succeed() {
    let dir = tempdir().unwrap();
    let wal = Arc::new(Wal::open(dir.path()).unwrap());

    let handles: Vec<_> = (0..50u32)
        .map(|i| {
            let wal = Arc::clone(&wal);
            thread::spawn(move || {
                wal.append(i.to_be_bytes().to_vec(), b"v".to_vec())
                    .expect("append from concurrent writer should succeed")
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // `wal` has no other strong references left; dropping it here runs the
    // same flush-and-close path `Wal::close` would.
}

#[test]
fn single_caller_sequential_appends_preserve_offsets() {
    let dir = tempdir().unwrap();
    let wal = Wal::open(dir.path()).unwrap();

    for i in 0..20u32 {
        wal.append(i.to_be_bytes().to_vec(), i.to_be_bytes().to_vec())
            .unwrap();
    }

    wal.close().unwrap();
}

// Mirrors the original implementation's 100,000-concurrent-caller stress
// scenario. Ignored by default since it is a load test, not a correctness
// check; run explicitly with `cargo test -- --ignored`.
#[test]
#[ignore]
fn stress_one_hundred_thousand_concurrent_writers() {
    let dir = tempdir().unwrap();
    let wal = Arc::new(Wal::open(dir.path()).unwrap());

    let handles: Vec<_> = (0..100_000u32)
        .map(|i| {
            let wal = Arc::clone(&wal);
            thread::spawn(move || {
                wal.append(i.to_be_bytes().to_vec(), b"v".to_vec()).unwrap()
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}
