//! Load/store-only implementations, for ARMv6-M.
//!
//! ARMv6-M processors like the Cortex-M0 don't support the fancier atomic
//! operations available on most other ARM processors. They can load and store
//! 8, 16 and 32 bits atomically, but have no swap, compare-and-swap, or
//! read-modify-write instructions. So loads and stores here are native, and
//! everything else disables interrupts around a separate load and store.
//!
//! This hurts interrupt latency/jitter. However, the M0 already has pretty
//! poor interrupt latency/jitter because of uninterruptible instructions and
//! lack of BASEPRI. So, not a big loss.

#[allow(unused_macros)]
macro_rules! impl_split {
    (pointer) => {
        $crate::primitive::split::impl_split!(
            @primitive $crate::primitive::PtrCell,
            core::sync::atomic::AtomicPtr<()>,
            ::core::ptr::null_mut(),
            $crate::primitive::PTR_CONTAINER
        );

        impl $crate::primitive::PointerArithmetic for $crate::primitive::PtrCell {
            #[inline(always)]
            fn fetch_byte_offset(
                slot: &$crate::primitive::Slot<Self>,
                bytes: isize,
                order: $crate::MemoryOrder,
            ) -> Self {
                $crate::primitive::split::rmw::<Self, core::sync::atomic::AtomicPtr<()>>(
                    slot,
                    order,
                    |p| p.wrapping_byte_offset(bytes),
                )
            }
        }
    };
    (@primitive $t:ty, $atomic:ty, $zero:expr, $container:expr) => {
        impl $crate::primitive::Primitive for $t {
            type Align = $atomic;
            const ZERO: Self = $zero;
            const CONTAINER: $crate::container::Container = $container;
            const STRATEGY: $crate::container::Strategy =
                $crate::container::Strategy::Split;

            #[inline(always)]
            fn load(
                slot: &$crate::primitive::Slot<Self>,
                order: $crate::MemoryOrder,
            ) -> Self {
                $crate::primitive::split::cell::<$t, $atomic>(slot)
                    .load(order.for_load().into())
            }

            #[inline(always)]
            fn store(
                slot: &$crate::primitive::Slot<Self>,
                val: Self,
                order: $crate::MemoryOrder,
            ) {
                $crate::primitive::split::cell::<$t, $atomic>(slot)
                    .store(val, order.for_store().into())
            }

            #[inline(always)]
            fn exchange(
                slot: &$crate::primitive::Slot<Self>,
                val: Self,
                order: $crate::MemoryOrder,
            ) -> Self {
                let a = $crate::primitive::split::cell::<$t, $atomic>(slot);
                let (lo, so) = order.split();
                $crate::critical::with(|| {
                    let x = a.load(lo.into());
                    a.store(val, so.into());
                    x
                })
            }

            #[inline(always)]
            fn compare_exchange_strong(
                slot: &$crate::primitive::Slot<Self>,
                expected: &mut Self,
                desired: Self,
                success: $crate::MemoryOrder,
                failure: $crate::MemoryOrder,
            ) -> bool {
                let a = $crate::primitive::split::cell::<$t, $atomic>(slot);
                let (lo, so) = success.split();
                let fo = $crate::MemoryOrder::failure_for(success, failure);
                $crate::critical::with(|| {
                    let x = a.load(lo.into());
                    if x == *expected {
                        a.store(desired, so.into());
                        true
                    } else {
                        $crate::order::compiler_fence(fo);
                        *expected = x;
                        false
                    }
                })
            }

            #[inline(always)]
            fn compare_exchange_weak(
                slot: &$crate::primitive::Slot<Self>,
                expected: &mut Self,
                desired: Self,
                success: $crate::MemoryOrder,
                failure: $crate::MemoryOrder,
            ) -> bool {
                <Self as $crate::primitive::Primitive>::compare_exchange_strong(
                    slot, expected, desired, success, failure,
                )
            }
        }

        impl $crate::primitive::split::LoadStore<$t> for $atomic {
            #[inline(always)]
            fn load(&self, order: core::sync::atomic::Ordering) -> $t {
                <$atomic>::load(self, order)
            }

            #[inline(always)]
            fn store(&self, val: $t, order: core::sync::atomic::Ordering) {
                <$atomic>::store(self, val, order)
            }
        }
    };
    ($t:ty, $atomic:ident, $container:expr) => {
        $crate::primitive::split::impl_split!(
            @primitive $t,
            core::sync::atomic::$atomic,
            0,
            $container
        );

        impl $crate::primitive::Arithmetic for $t {
            #[inline(always)]
            fn fetch_add(
                slot: &$crate::primitive::Slot<Self>,
                val: Self,
                order: $crate::MemoryOrder,
            ) -> Self {
                $crate::primitive::split::rmw::<$t, core::sync::atomic::$atomic>(
                    slot,
                    order,
                    |x| x.wrapping_add(val),
                )
            }

            #[inline(always)]
            fn fetch_sub(
                slot: &$crate::primitive::Slot<Self>,
                val: Self,
                order: $crate::MemoryOrder,
            ) -> Self {
                $crate::primitive::split::rmw::<$t, core::sync::atomic::$atomic>(
                    slot,
                    order,
                    |x| x.wrapping_sub(val),
                )
            }

            #[inline(always)]
            fn fetch_and(
                slot: &$crate::primitive::Slot<Self>,
                val: Self,
                order: $crate::MemoryOrder,
            ) -> Self {
                $crate::primitive::split::rmw::<$t, core::sync::atomic::$atomic>(
                    slot,
                    order,
                    |x| x & val,
                )
            }

            #[inline(always)]
            fn fetch_or(
                slot: &$crate::primitive::Slot<Self>,
                val: Self,
                order: $crate::MemoryOrder,
            ) -> Self {
                $crate::primitive::split::rmw::<$t, core::sync::atomic::$atomic>(
                    slot,
                    order,
                    |x| x | val,
                )
            }

            #[inline(always)]
            fn fetch_xor(
                slot: &$crate::primitive::Slot<Self>,
                val: Self,
                order: $crate::MemoryOrder,
            ) -> Self {
                $crate::primitive::split::rmw::<$t, core::sync::atomic::$atomic>(
                    slot,
                    order,
                    |x| x ^ val,
                )
            }

            #[inline(always)]
            fn wrapped_add(self, rhs: Self) -> Self {
                <$t>::wrapping_add(self, rhs)
            }

            #[inline(always)]
            fn wrapped_sub(self, rhs: Self) -> Self {
                <$t>::wrapping_sub(self, rhs)
            }
        }
    };
}

pub(crate) use impl_split;

use core::sync::atomic::Ordering;

use super::{Primitive, Slot};
use crate::critical;

/// The load and store half of a native atomic type, which is all ARMv6-M
/// gives us.
pub(crate) trait LoadStore<T> {
    fn load(&self, order: Ordering) -> T;
    fn store(&self, val: T, order: Ordering);
}

/// Views a slot as the native atomic type `A`.
#[inline(always)]
pub(crate) fn cell<P: Primitive<Align = A>, A: LoadStore<P>>(slot: &Slot<P>) -> &A {
    // SAFETY: `A` is the native atomic type for `P`: same size and bit
    // validity, and `Slot` aligns for it because it's `P::Align`. All shared
    // access goes through `A`'s loads and stores, or through critical
    // sections that use them.
    unsafe { &*slot.as_ptr().cast::<A>() }
}

/// Read-modify-write with interrupts disabled, returning the original value.
#[inline(always)]
pub(crate) fn rmw<P, A>(slot: &Slot<P>, order: crate::MemoryOrder, f: impl FnOnce(P) -> P) -> P
where
    P: Primitive<Align = A>,
    A: LoadStore<P>,
{
    let a = cell(slot);
    let (lo, so) = order.split();
    critical::with(|| {
        let x = a.load(lo.into());
        a.store(f(x), so.into());
        x
    })
}
