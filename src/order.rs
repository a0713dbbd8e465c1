//! Memory ordering.
//!
//! [`MemoryOrder`] is the six-level ordering model familiar from C11. Rust's
//! own [`Ordering`] has no `Consume`, and panics if you hand certain orders
//! to certain operations (a `Release` load, say). The atomic objects in this
//! crate never panic on an ordering argument: every order is first reduced
//! to one the underlying operation can honor, using the functions here.

use core::sync::atomic::{self, Ordering};

/// Ordering constraint attached to an atomic operation.
///
/// The default is [`MemoryOrder::SeqCst`], the strongest order, matching the
/// default of every operation in C and C++.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum MemoryOrder {
    /// Atomicity only. No ordering relative to other memory.
    Relaxed,
    /// Dependency-ordered acquire. Treated as `Acquire` in practice.
    Consume,
    /// Later accesses by this context cannot be observed before this one.
    Acquire,
    /// Earlier accesses by this context cannot be observed after this one.
    Release,
    /// `Acquire` and `Release` together, for read-modify-write operations.
    AcqRel,
    /// Like `AcqRel`, and all `SeqCst` operations form a single total order.
    #[default]
    SeqCst,
}

impl MemoryOrder {
    /// Order used for the failure path of a compare-exchange given only the
    /// success order.
    ///
    /// A failed compare-exchange performs no store, so it cannot carry
    /// release semantics: `AcqRel` becomes `Acquire`, `Release` becomes
    /// `Relaxed`, and everything else is unchanged.
    #[inline(always)]
    pub const fn reduce_for_failure(self) -> Self {
        match self {
            Self::AcqRel => Self::Acquire,
            Self::Release => Self::Relaxed,
            o => o,
        }
    }

    /// Order actually used on the failure path when the caller supplied both
    /// a success and a failure order.
    ///
    /// The failure order is reduced as in [`reduce_for_failure`] and then
    /// clamped so it is never stronger than the (reduced) success order.
    ///
    /// [`reduce_for_failure`]: Self::reduce_for_failure
    #[inline(always)]
    pub const fn failure_for(success: Self, failure: Self) -> Self {
        let ceiling = success.reduce_for_failure();
        let wanted = failure.reduce_for_failure();
        if wanted.load_rank() <= ceiling.load_rank() {
            wanted
        } else {
            ceiling
        }
    }

    /// Order to use for a plain load. Same table as failure reduction, since
    /// a load has no release half.
    #[inline(always)]
    pub const fn for_load(self) -> Self {
        self.reduce_for_failure()
    }

    /// Order to use for a plain store, which has no acquire half.
    #[inline(always)]
    pub const fn for_store(self) -> Self {
        match self {
            Self::Consume | Self::Acquire => Self::Relaxed,
            Self::AcqRel => Self::Release,
            o => o,
        }
    }

    /// Splits a read-modify-write order into the orders for the separate
    /// load and store used to emulate it inside a critical section.
    #[inline(always)]
    pub const fn split(self) -> (Self, Self) {
        match self {
            Self::Relaxed => (Self::Relaxed, Self::Relaxed),
            Self::Consume | Self::Acquire => (Self::Acquire, Self::Relaxed),
            Self::Release => (Self::Relaxed, Self::Release),
            Self::AcqRel => (Self::Acquire, Self::Release),
            Self::SeqCst => (Self::SeqCst, Self::SeqCst),
        }
    }

    /// Strength on the acquire side, for orders already stripped of their
    /// release half.
    const fn load_rank(self) -> u8 {
        match self {
            Self::Relaxed | Self::Release => 0,
            Self::Consume => 1,
            Self::Acquire | Self::AcqRel => 2,
            Self::SeqCst => 3,
        }
    }
}

impl From<MemoryOrder> for Ordering {
    #[inline(always)]
    fn from(o: MemoryOrder) -> Self {
        match o {
            MemoryOrder::Relaxed => Ordering::Relaxed,
            MemoryOrder::Consume | MemoryOrder::Acquire => Ordering::Acquire,
            MemoryOrder::Release => Ordering::Release,
            MemoryOrder::AcqRel => Ordering::AcqRel,
            MemoryOrder::SeqCst => Ordering::SeqCst,
        }
    }
}

/// Memory fence between this context and others.
///
/// `Relaxed` is a no-op (where `core`'s `fence` would panic).
#[inline(always)]
pub fn fence(order: MemoryOrder) {
    if order != MemoryOrder::Relaxed {
        atomic::fence(order.into());
    }
}

/// Compiler-only fence, ordering this context against interrupt handlers
/// that run on the same core.
///
/// `Relaxed` is a no-op.
#[inline(always)]
pub fn compiler_fence(order: MemoryOrder) {
    if order != MemoryOrder::Relaxed {
        atomic::compiler_fence(order.into());
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryOrder::{self, *};
    use core::sync::atomic::Ordering;

    const ALL: [MemoryOrder; 6] = [Relaxed, Consume, Acquire, Release, AcqRel, SeqCst];

    #[test]
    fn failure_reduction_table() {
        assert_eq!(AcqRel.reduce_for_failure(), Acquire);
        assert_eq!(Release.reduce_for_failure(), Relaxed);
        for o in [Relaxed, Consume, Acquire, SeqCst] {
            assert_eq!(o.reduce_for_failure(), o);
        }
    }

    #[test]
    fn reduced_orders_never_release() {
        for o in ALL {
            let r = o.reduce_for_failure();
            assert!(r != Release && r != AcqRel, "{o:?} reduced to {r:?}");
        }
    }

    #[test]
    fn failure_never_stronger_than_success() {
        assert_eq!(MemoryOrder::failure_for(Relaxed, SeqCst), Relaxed);
        assert_eq!(MemoryOrder::failure_for(Release, Acquire), Relaxed);
        assert_eq!(MemoryOrder::failure_for(AcqRel, SeqCst), Acquire);
        assert_eq!(MemoryOrder::failure_for(SeqCst, Relaxed), Relaxed);
        assert_eq!(MemoryOrder::failure_for(SeqCst, AcqRel), Acquire);
        assert_eq!(MemoryOrder::failure_for(Acquire, Consume), Consume);
        for s in ALL {
            for f in ALL {
                let r = MemoryOrder::failure_for(s, f);
                assert!(r != Release && r != AcqRel);
            }
        }
    }

    #[test]
    fn load_and_store_orders() {
        assert_eq!(Release.for_load(), Relaxed);
        assert_eq!(AcqRel.for_load(), Acquire);
        assert_eq!(Acquire.for_store(), Relaxed);
        assert_eq!(Consume.for_store(), Relaxed);
        assert_eq!(AcqRel.for_store(), Release);
        assert_eq!(SeqCst.for_store(), SeqCst);
    }

    #[test]
    fn split_table() {
        assert_eq!(AcqRel.split(), (Acquire, Release));
        assert_eq!(Acquire.split(), (Acquire, Relaxed));
        assert_eq!(Release.split(), (Relaxed, Release));
        assert_eq!(SeqCst.split(), (SeqCst, SeqCst));
        assert_eq!(Relaxed.split(), (Relaxed, Relaxed));
    }

    #[test]
    fn conversion_to_core() {
        assert_eq!(Ordering::from(Consume), Ordering::Acquire);
        assert_eq!(Ordering::from(SeqCst), Ordering::SeqCst);
        assert_eq!(MemoryOrder::default(), SeqCst);
    }

    #[test]
    fn relaxed_fences_do_not_panic() {
        super::fence(Relaxed);
        super::compiler_fence(Relaxed);
        super::fence(SeqCst);
        super::compiler_fence(AcqRel);
    }
}
