//! Hardware exclusive-access implementations.
//!
//! On targets with compare-and-swap at a given width, the compiler lowers
//! these to exclusive load / conditional store retry loops (`LDREX`/`STREX`
//! on ARMv7-M, `LR`/`SC` on RISC-V). A failed conditional store only means
//! some other context made progress, so the loops always terminate.
//!
//! With the `portable-atomic` feature the atomic types come from that crate
//! instead of `core`, which covers targets like `riscv32imc` that lack the
//! instructions but are single-core.

cfg_if::cfg_if! {
    if #[cfg(feature = "portable-atomic")] {
        pub(crate) use portable_atomic as backend;
    } else {
        pub(crate) use core::sync::atomic as backend;
    }
}

#[allow(unused_macros)]
macro_rules! impl_exclusive {
    (pointer) => {
        $crate::primitive::exclusive::impl_exclusive!(
            @primitive $crate::primitive::PtrCell,
            $crate::primitive::exclusive::backend::AtomicPtr<()>,
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
                let cell = <Self as $crate::primitive::exclusive::AsAtomic>::cell(slot);
                let step = |p: Self| Some(p.wrapping_byte_offset(bytes));
                match cell.fetch_update(order.into(), order.reduce_for_failure().into(), step) {
                    Ok(prev) | Err(prev) => prev,
                }
            }
        }
    };
    (@primitive $t:ty, $atomic:ty, $zero:expr, $container:expr) => {
        impl $crate::primitive::Primitive for $t {
            type Align = $atomic;
            const ZERO: Self = $zero;
            const CONTAINER: $crate::container::Container = $container;
            const STRATEGY: $crate::container::Strategy =
                $crate::container::Strategy::Exclusive;

            #[inline(always)]
            fn load(
                slot: &$crate::primitive::Slot<Self>,
                order: $crate::MemoryOrder,
            ) -> Self {
                <Self as $crate::primitive::exclusive::AsAtomic>::cell(slot).load(order.for_load().into())
            }

            #[inline(always)]
            fn store(
                slot: &$crate::primitive::Slot<Self>,
                val: Self,
                order: $crate::MemoryOrder,
            ) {
                <Self as $crate::primitive::exclusive::AsAtomic>::cell(slot).store(val, order.for_store().into())
            }

            #[inline(always)]
            fn exchange(
                slot: &$crate::primitive::Slot<Self>,
                val: Self,
                order: $crate::MemoryOrder,
            ) -> Self {
                <Self as $crate::primitive::exclusive::AsAtomic>::cell(slot).swap(val, order.into())
            }

            #[inline(always)]
            fn compare_exchange_strong(
                slot: &$crate::primitive::Slot<Self>,
                expected: &mut Self,
                desired: Self,
                success: $crate::MemoryOrder,
                failure: $crate::MemoryOrder,
            ) -> bool {
                let failure = $crate::MemoryOrder::failure_for(success, failure);
                match <Self as $crate::primitive::exclusive::AsAtomic>::cell(slot).compare_exchange(
                    *expected,
                    desired,
                    success.into(),
                    failure.into(),
                ) {
                    Ok(_) => true,
                    Err(actual) => {
                        *expected = actual;
                        false
                    }
                }
            }

            #[inline(always)]
            fn compare_exchange_weak(
                slot: &$crate::primitive::Slot<Self>,
                expected: &mut Self,
                desired: Self,
                success: $crate::MemoryOrder,
                failure: $crate::MemoryOrder,
            ) -> bool {
                let failure = $crate::MemoryOrder::failure_for(success, failure);
                match <Self as $crate::primitive::exclusive::AsAtomic>::cell(slot).compare_exchange_weak(
                    *expected,
                    desired,
                    success.into(),
                    failure.into(),
                ) {
                    Ok(_) => true,
                    Err(actual) => {
                        *expected = actual;
                        false
                    }
                }
            }
        }

        impl $crate::primitive::exclusive::AsAtomic for $t {
            type Atomic = $atomic;

            #[inline(always)]
            fn cell(
                slot: &$crate::primitive::Slot<Self>,
            ) -> &$atomic {
                // SAFETY: the atomic type has the same size and bit validity
                // as the container, `Slot` aligns it for the atomic type, and
                // all shared access goes through atomic operations.
                unsafe { &*slot.as_ptr().cast() }
            }
        }
    };
    ($t:ty, $atomic:ident, $container:expr) => {
        $crate::primitive::exclusive::impl_exclusive!(
            @primitive $t,
            $crate::primitive::exclusive::backend::$atomic,
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
                <Self as $crate::primitive::exclusive::AsAtomic>::cell(slot).fetch_add(val, order.into())
            }

            #[inline(always)]
            fn fetch_sub(
                slot: &$crate::primitive::Slot<Self>,
                val: Self,
                order: $crate::MemoryOrder,
            ) -> Self {
                <Self as $crate::primitive::exclusive::AsAtomic>::cell(slot).fetch_sub(val, order.into())
            }

            #[inline(always)]
            fn fetch_and(
                slot: &$crate::primitive::Slot<Self>,
                val: Self,
                order: $crate::MemoryOrder,
            ) -> Self {
                <Self as $crate::primitive::exclusive::AsAtomic>::cell(slot).fetch_and(val, order.into())
            }

            #[inline(always)]
            fn fetch_or(
                slot: &$crate::primitive::Slot<Self>,
                val: Self,
                order: $crate::MemoryOrder,
            ) -> Self {
                <Self as $crate::primitive::exclusive::AsAtomic>::cell(slot).fetch_or(val, order.into())
            }

            #[inline(always)]
            fn fetch_xor(
                slot: &$crate::primitive::Slot<Self>,
                val: Self,
                order: $crate::MemoryOrder,
            ) -> Self {
                <Self as $crate::primitive::exclusive::AsAtomic>::cell(slot).fetch_xor(val, order.into())
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

#[allow(unused_imports)]
pub(crate) use impl_exclusive;

/// Views a slot as the native atomic type of its width.
pub(crate) trait AsAtomic: super::Primitive {
    type Atomic;

    fn cell(slot: &super::Slot<Self>) -> &Self::Atomic;
}
