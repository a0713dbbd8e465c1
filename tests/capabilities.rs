use bytemuck::{NoUninit, Zeroable};
use lilos_atomic::{atomic_plain, critical, Atomic, AtomicFlag, Container, MemoryOrder, Strategy};

#[derive(Copy, Clone, Debug, PartialEq, Zeroable, NoUninit)]
#[repr(transparent)]
struct Nine([u8; 9]);

atomic_plain!(Nine);

#[test]
fn lock_freedom_follows_container_strategy() {
    assert_eq!(Atomic::<u8>::IS_LOCK_FREE, Container::Width8.strategy().is_lock_free());
    assert_eq!(Atomic::<i16>::IS_LOCK_FREE, Container::Width16.strategy().is_lock_free());
    assert_eq!(Atomic::<bool>::IS_LOCK_FREE, Atomic::<u8>::IS_LOCK_FREE);
    assert_eq!(Atomic::<i64>::IS_LOCK_FREE, Container::Width64.strategy().is_lock_free());
    assert_eq!(Container::RawBytes(32).strategy(), Strategy::Masked);
}

#[cfg(feature = "critical-section-only")]
#[test]
fn forced_masking_disables_lock_freedom() {
    for c in [Container::Width8, Container::Width16, Container::Width32, Container::Width64] {
        assert_eq!(c.strategy(), Strategy::Masked);
    }
    assert!(!Atomic::<u32>::new(0).is_lock_free());
}

#[test]
fn is_lock_free_is_stable_across_calls() {
    let a = Atomic::new(1u64);
    let b: Atomic<Nine> = Atomic::zeroed();
    let first = (a.is_lock_free(), b.is_lock_free());
    for _ in 0..100 {
        assert_eq!((a.is_lock_free(), b.is_lock_free()), first);
    }
    assert!(!first.1);
}

#[test]
fn operations_compose_inside_an_outer_critical_section() {
    // Masked operations nest their own critical section inside ours.
    let a = Atomic::new(Nine([1; 9]));
    let f = AtomicFlag::new();
    critical::with(|| {
        assert_eq!(a.exchange(Nine([2; 9]), MemoryOrder::SeqCst), Nine([1; 9]));
        assert!(!f.test_and_set(MemoryOrder::SeqCst));
    });
    assert_eq!(a.load(MemoryOrder::SeqCst), Nine([2; 9]));
    assert!(f.test_and_set(MemoryOrder::SeqCst));
}
