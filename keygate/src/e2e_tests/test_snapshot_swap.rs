//! Concurrent readers never observe a mix of two keysets.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::auth::verify;
use crate::e2e_tests::helpers::*;
use crate::jwks::{Keyset, KeysetHandle};
use crate::testing::test_key;

#[test]
fn test_each_snapshot_is_one_whole_keyset() {
    // Old keyset trusts key A under both kids, new keyset trusts key B.
    let old = Arc::new(Keyset::from_keys([
        test_key("k1", KEY_A_N),
        test_key("k2", KEY_A_N),
    ]));
    let new = Arc::new(Keyset::from_keys([
        test_key("k1", KEY_B_N),
        test_key("k2", KEY_B_N),
    ]));
    let t1 = token_signed_by_a("k1", "alice");
    let t2 = token_signed_by_b("k2", "bob");

    let handle = KeysetHandle::default();
    handle.replace_arc(Arc::clone(&old));
    let stop = AtomicBool::new(false);
    let checks = AtomicUsize::new(0);

    std::thread::scope(|scope| {
        scope.spawn(|| {
            let mut flip = false;
            while !stop.load(Ordering::Relaxed) {
                let next = if flip { &old } else { &new };
                handle.replace_arc(Arc::clone(next));
                flip = !flip;
            }
        });

        let readers: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    for _ in 0..100 {
                        let snapshot = handle.snapshot();
                        let first = verify(&t1, &snapshot).is_authenticated();
                        let second = verify(&t2, &snapshot).is_authenticated();
                        assert!(first ^ second, "snapshot mixed two keysets");
                        checks.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();

        for reader in readers {
            reader.join().expect("reader does not panic");
        }
        stop.store(true, Ordering::Relaxed);
    });

    assert_eq!(checks.load(Ordering::Relaxed), 400);
}
