//! Primitive atomic operations on containers.
//!
//! This is the layer that actually touches memory. Each container type (the
//! unsigned integers `u8` through `u64`, [`PtrCell`] and [`RawBytes`])
//! implements [`Primitive`]. The integers also implement [`Arithmetic`], and
//! `PtrCell` implements [`PointerArithmetic`]. Which
//! strategy an implementation uses is decided per width, at compile time,
//! from what the target can do:
//!
//! - `exclusive`: the target has compare-and-swap at this width (or we're
//!   using `portable-atomic`). Operations compile to hardware retry loops.
//! - `split`: ARMv6-M and friends. Loads and stores are native, but there's
//!   no swap or read-modify-write, so those happen in a critical section.
//! - `masked`: every access happens in a critical section. Used for widths
//!   the target can't access atomically at all, for `RawBytes`, and for
//!   everything when the `critical-section-only` feature is on.
//!
//! The `order` arguments are honored on the exclusive and split paths. On
//! the masked path the critical section already implies sequential
//! consistency, so they're ignored.

use core::cell::UnsafeCell;

use crate::container::{Container, RawBytes, Strategy};
use crate::order::MemoryOrder;

#[cfg(all(
    not(feature = "critical-section-only"),
    any(
        feature = "portable-atomic",
        target_has_atomic = "8",
        target_has_atomic = "ptr",
    ),
))]
mod exclusive;
mod masked;
#[cfg(all(
    target_arch = "arm",
    any(not(target_has_atomic = "8"), not(target_has_atomic = "ptr")),
    not(feature = "critical-section-only"),
    not(feature = "portable-atomic"),
))]
mod split;

mod sealed {
    pub trait Sealed {}

    impl Sealed for u8 {}
    impl Sealed for u16 {}
    impl Sealed for u32 {}
    impl Sealed for u64 {}
    impl Sealed for super::PtrCell {}
    impl<const N: usize> Sealed for super::RawBytes<N> {}
}

/// Pointer container.
///
/// Pointers are stored as pointers, never as integers, so a pointer read back
/// out of an atomic object carries the provenance of the one stored.
pub type PtrCell = *mut ();

/// Container a pointer is reported as: the integer of the same width.
pub const PTR_CONTAINER: Container = Container::select(core::mem::size_of::<PtrCell>());

/// Storage for one container, aligned for whichever strategy its width
/// uses.
///
/// All access after construction goes through [`Primitive`] operations.
#[repr(C)]
pub struct Slot<P: Primitive> {
    _align: [P::Align; 0],
    bits: UnsafeCell<P>,
}

// SAFETY: every shared access to `bits` goes through a `Primitive`
// operation, each of which is atomic with respect to the others.
unsafe impl<P: Primitive> Sync for Slot<P> {}

impl<P: Primitive> Slot<P> {
    pub const fn new(bits: P) -> Self {
        Self {
            _align: [],
            bits: UnsafeCell::new(bits),
        }
    }

    pub fn into_inner(self) -> P {
        self.bits.into_inner()
    }

    pub fn get_mut(&mut self) -> &mut P {
        self.bits.get_mut()
    }

    pub(crate) fn as_ptr(&self) -> *mut P {
        self.bits.get()
    }
}

impl<P: Primitive> core::fmt::Debug for Slot<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Slot")
            .field("container", &P::CONTAINER)
            .finish_non_exhaustive()
    }
}

/// Atomic operations on a container.
///
/// Sealed: implemented for `u8`, `u16`, `u32`, `u64` and `RawBytes<N>`.
pub trait Primitive: sealed::Sealed + Copy + Eq + Sized + 'static {
    /// Zero-length-array element type that gives a [`Slot`] the alignment its
    /// strategy needs.
    type Align;

    /// All-zero container.
    const ZERO: Self;
    const CONTAINER: Container;
    const STRATEGY: Strategy;
    const IS_LOCK_FREE: bool = Self::STRATEGY.is_lock_free();

    fn load(slot: &Slot<Self>, order: MemoryOrder) -> Self;

    fn store(slot: &Slot<Self>, val: Self, order: MemoryOrder);

    /// Replaces the contents with `val`, returning the previous contents.
    fn exchange(slot: &Slot<Self>, val: Self, order: MemoryOrder) -> Self;

    /// If the contents equal `*expected`, replaces them with `desired` and
    /// returns `true`. Otherwise copies the contents into `*expected` and
    /// returns `false`.
    ///
    /// `failure` is passed through [`MemoryOrder::failure_for`] first, so
    /// any combination is accepted.
    fn compare_exchange_strong(
        slot: &Slot<Self>,
        expected: &mut Self,
        desired: Self,
        success: MemoryOrder,
        failure: MemoryOrder,
    ) -> bool;

    /// Like [`compare_exchange_strong`], but may fail even when the contents
    /// match, if that makes the hardware path cheaper. Only the exclusive
    /// strategy ever does.
    ///
    /// [`compare_exchange_strong`]: Primitive::compare_exchange_strong
    fn compare_exchange_weak(
        slot: &Slot<Self>,
        expected: &mut Self,
        desired: Self,
        success: MemoryOrder,
        failure: MemoryOrder,
    ) -> bool;
}

/// Read-modify-write arithmetic on integer containers. All return the
/// previous contents. Addition and subtraction wrap at the container width.
pub trait Arithmetic: Primitive {
    fn fetch_add(slot: &Slot<Self>, val: Self, order: MemoryOrder) -> Self;
    fn fetch_sub(slot: &Slot<Self>, val: Self, order: MemoryOrder) -> Self;
    fn fetch_and(slot: &Slot<Self>, val: Self, order: MemoryOrder) -> Self;
    fn fetch_or(slot: &Slot<Self>, val: Self, order: MemoryOrder) -> Self;
    fn fetch_xor(slot: &Slot<Self>, val: Self, order: MemoryOrder) -> Self;

    /// Non-atomic wrapping addition on plain values.
    fn wrapped_add(self, rhs: Self) -> Self;
    /// Non-atomic wrapping subtraction on plain values.
    fn wrapped_sub(self, rhs: Self) -> Self;
}

/// Read-modify-write on the pointer container.
pub trait PointerArithmetic: Primitive {
    /// Moves the stored pointer by `bytes`, wrapping, and returns the
    /// previous pointer. The result keeps the provenance of the stored
    /// pointer.
    fn fetch_byte_offset(slot: &Slot<Self>, bytes: isize, order: MemoryOrder) -> Self;
}

cfg_if::cfg_if! {
    if #[cfg(feature = "critical-section-only")] {
        masked::impl_masked!(u8, Container::Width8);
        masked::impl_masked!(u16, Container::Width16);
        masked::impl_masked!(u32, Container::Width32);
        masked::impl_masked!(u64, Container::Width64);
        masked::impl_masked!(pointer);
    } else if #[cfg(feature = "portable-atomic")] {
        exclusive::impl_exclusive!(u8, AtomicU8, Container::Width8);
        exclusive::impl_exclusive!(u16, AtomicU16, Container::Width16);
        exclusive::impl_exclusive!(u32, AtomicU32, Container::Width32);
        exclusive::impl_exclusive!(u64, AtomicU64, Container::Width64);
        exclusive::impl_exclusive!(pointer);
    } else {
        cfg_if::cfg_if! {
            if #[cfg(target_has_atomic = "8")] {
                exclusive::impl_exclusive!(u8, AtomicU8, Container::Width8);
            } else if #[cfg(target_arch = "arm")] {
                split::impl_split!(u8, AtomicU8, Container::Width8);
            } else {
                masked::impl_masked!(u8, Container::Width8);
            }
        }
        cfg_if::cfg_if! {
            if #[cfg(target_has_atomic = "16")] {
                exclusive::impl_exclusive!(u16, AtomicU16, Container::Width16);
            } else if #[cfg(target_arch = "arm")] {
                split::impl_split!(u16, AtomicU16, Container::Width16);
            } else {
                masked::impl_masked!(u16, Container::Width16);
            }
        }
        cfg_if::cfg_if! {
            if #[cfg(target_has_atomic = "32")] {
                exclusive::impl_exclusive!(u32, AtomicU32, Container::Width32);
            } else if #[cfg(target_arch = "arm")] {
                split::impl_split!(u32, AtomicU32, Container::Width32);
            } else {
                masked::impl_masked!(u32, Container::Width32);
            }
        }
        // No 32-bit ARM core can load or store 64 bits atomically without
        // exclusive-access instructions, so there's no split case here.
        cfg_if::cfg_if! {
            if #[cfg(target_has_atomic = "64")] {
                exclusive::impl_exclusive!(u64, AtomicU64, Container::Width64);
            } else {
                masked::impl_masked!(u64, Container::Width64);
            }
        }
        cfg_if::cfg_if! {
            if #[cfg(target_has_atomic = "ptr")] {
                exclusive::impl_exclusive!(pointer);
            } else if #[cfg(target_arch = "arm")] {
                split::impl_split!(pointer);
            } else {
                masked::impl_masked!(pointer);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use MemoryOrder::*;

    #[test]
    fn lock_freedom_is_a_constant() {
        assert_eq!(u32::IS_LOCK_FREE, u32::STRATEGY.is_lock_free());
        assert_eq!(u32::IS_LOCK_FREE, <u32 as Primitive>::IS_LOCK_FREE);
        assert!(!<RawBytes<3> as Primitive>::IS_LOCK_FREE);
    }

    #[test]
    fn slot_alignment_covers_container() {
        assert!(core::mem::align_of::<Slot<u64>>() >= core::mem::align_of::<u64>());
        assert_eq!(core::mem::size_of::<Slot<u32>>(), 4);
    }

    #[test]
    fn wide_fetch_ops() {
        let s = Slot::new(u64::MAX);
        assert_eq!(u64::fetch_add(&s, 2, SeqCst), u64::MAX);
        assert_eq!(u64::load(&s, SeqCst), 1);
        assert_eq!(u64::fetch_sub(&s, 2, AcqRel), 1);
        assert_eq!(u64::load(&s, Acquire), u64::MAX);
        assert_eq!(u64::fetch_and(&s, 0xF0, Relaxed), u64::MAX);
        assert_eq!(u64::fetch_or(&s, 0x0F, Release), 0xF0);
        assert_eq!(u64::fetch_xor(&s, 0xFF, Consume), 0xFF);
        assert_eq!(u64::load(&s, Relaxed), 0);
    }

    #[test]
    fn narrow_wraparound() {
        let s = Slot::new(250u8);
        assert_eq!(u8::fetch_add(&s, 10, SeqCst), 250);
        assert_eq!(u8::load(&s, SeqCst), 4);
        let s = Slot::new(0u16);
        assert_eq!(u16::fetch_sub(&s, 1, SeqCst), 0);
        assert_eq!(u16::load(&s, SeqCst), u16::MAX);
    }

    #[test]
    fn strong_cas_refreshes_expected() {
        let s = Slot::new(7u32);
        let mut e = 3;
        assert!(!u32::compare_exchange_strong(&s, &mut e, 9, SeqCst, SeqCst));
        assert_eq!(e, 7);
        assert!(u32::compare_exchange_strong(&s, &mut e, 9, Release, Acquire));
        assert_eq!(u32::load(&s, SeqCst), 9);
    }

    #[test]
    fn any_order_combination_is_accepted() {
        let all = [Relaxed, Consume, Acquire, Release, AcqRel, SeqCst];
        let s = Slot::new(0u32);
        for (i, &a) in all.iter().enumerate() {
            for &b in &all {
                u32::store(&s, i as u32, a);
                assert_eq!(u32::load(&s, b), i as u32);
                let mut e = i as u32;
                assert!(u32::compare_exchange_strong(&s, &mut e, i as u32, a, b));
                let _ = u32::exchange(&s, i as u32, a);
            }
        }
    }

    #[test]
    fn pointer_container_keeps_the_pointer() {
        let mut x = 41u32;
        let p: PtrCell = core::ptr::addr_of_mut!(x).cast();
        let s = Slot::new(PtrCell::ZERO);
        assert!(PtrCell::load(&s, SeqCst).is_null());
        PtrCell::store(&s, p, Release);
        assert_eq!(PtrCell::fetch_byte_offset(&s, 4, AcqRel), p);
        assert_eq!(PtrCell::fetch_byte_offset(&s, -4, SeqCst), p.wrapping_byte_add(4));
        let back = PtrCell::load(&s, Acquire).cast::<u32>();
        // SAFETY: `back` is `p`, which points at `x`.
        unsafe { *back += 1 };
        assert_eq!(x, 42);
        assert_eq!(PTR_CONTAINER.size(), core::mem::size_of::<usize>());
    }

    #[test]
    fn weak_cas_eventually_succeeds() {
        let s = Slot::new(1u16);
        let mut e = 1;
        while !u16::compare_exchange_weak(&s, &mut e, 2, SeqCst, Relaxed) {
            assert_eq!(e, 1);
        }
        assert_eq!(u16::load(&s, SeqCst), 2);
    }
}
