//! Integer atomics with every width forced onto the critical-section path.
//!
//! Run with `cargo test --features critical-section-only`.

#![cfg(feature = "critical-section-only")]

use std::sync::Arc;
use std::thread;

use lilos_atomic::{Atomic, Container, MemoryOrder::*, Strategy};

#[test]
fn two_producers_i64_without_native_64_bit_access() {
    assert_eq!(Container::Width64.strategy(), Strategy::Masked);
    let a = Arc::new(Atomic::new(0i64));
    let producers: Vec<_> = (0..2)
        .map(|_| {
            let a = a.clone();
            thread::spawn(move || {
                for _ in 0..1000 {
                    a.fetch_add(1, SeqCst);
                }
            })
        })
        .collect();
    for p in producers {
        p.join().unwrap();
    }
    assert_eq!(a.load(SeqCst), 2000);
}

#[test]
fn masked_pointer_steps() {
    let mut words = [0u32; 4];
    let base = words.as_mut_ptr();
    let p = Atomic::new(base);
    assert!(!p.is_lock_free());
    let end = p.fetch_add(3, SeqCst).wrapping_add(3);
    assert_eq!(p.load(SeqCst), end);
    // SAFETY: three elements into `words`.
    unsafe { *p.decrement(SeqCst) = 7 };
    assert_eq!(words, [0, 0, 7, 0]);
}
