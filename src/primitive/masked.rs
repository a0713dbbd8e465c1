//! Critical-section implementations.
//!
//! Every access, including plain loads and stores, happens with interrupts
//! masked. That makes this path correct for any width and any payload, at
//! the cost of interrupt latency. It doesn't work in unprivileged mode, but
//! neither does most of anything else an OS kernel does.

use super::{Primitive, Slot};
use crate::container::{Container, RawBytes, Strategy};
use crate::critical;
use crate::order::MemoryOrder;

#[inline(always)]
pub(crate) fn load<P: Primitive>(slot: &Slot<P>) -> P {
    // SAFETY: every masked access to the slot happens in a critical section,
    // so nothing writes concurrently.
    critical::with(|| unsafe { slot.as_ptr().read() })
}

#[inline(always)]
pub(crate) fn store<P: Primitive>(slot: &Slot<P>, val: P) {
    // SAFETY: as for `load`.
    critical::with(|| unsafe { slot.as_ptr().write(val) })
}

/// Applies `f` to the contents and stores the result, returning the
/// original contents.
#[inline(always)]
pub(crate) fn update<P: Primitive>(slot: &Slot<P>, f: impl FnOnce(P) -> P) -> P {
    critical::with(|| {
        let p = slot.as_ptr();
        // SAFETY: as for `load`; we have exclusive access for the duration.
        unsafe {
            let x = p.read();
            p.write(f(x));
            x
        }
    })
}

#[inline(always)]
pub(crate) fn compare_exchange<P: Primitive>(
    slot: &Slot<P>,
    expected: &mut P,
    desired: P,
) -> bool {
    critical::with(|| {
        let p = slot.as_ptr();
        // SAFETY: as for `update`.
        let current = unsafe { p.read() };
        if current == *expected {
            unsafe { p.write(desired) }
            true
        } else {
            *expected = current;
            false
        }
    })
}

#[allow(unused_macros)]
macro_rules! impl_masked {
    (pointer) => {
        $crate::primitive::masked::impl_masked!(
            @primitive $crate::primitive::PtrCell,
            ::core::ptr::null_mut(),
            $crate::primitive::PTR_CONTAINER
        );

        impl $crate::primitive::PointerArithmetic for $crate::primitive::PtrCell {
            #[inline(always)]
            fn fetch_byte_offset(
                slot: &$crate::primitive::Slot<Self>,
                bytes: isize,
                _order: $crate::MemoryOrder,
            ) -> Self {
                $crate::primitive::masked::update(slot, |p| p.wrapping_byte_offset(bytes))
            }
        }
    };
    (@primitive $t:ty, $zero:expr, $container:expr) => {
        impl $crate::primitive::Primitive for $t {
            type Align = $t;
            const ZERO: Self = $zero;
            const CONTAINER: $crate::container::Container = $container;
            const STRATEGY: $crate::container::Strategy =
                $crate::container::Strategy::Masked;

            #[inline(always)]
            fn load(
                slot: &$crate::primitive::Slot<Self>,
                _order: $crate::MemoryOrder,
            ) -> Self {
                $crate::primitive::masked::load(slot)
            }

            #[inline(always)]
            fn store(
                slot: &$crate::primitive::Slot<Self>,
                val: Self,
                _order: $crate::MemoryOrder,
            ) {
                $crate::primitive::masked::store(slot, val)
            }

            #[inline(always)]
            fn exchange(
                slot: &$crate::primitive::Slot<Self>,
                val: Self,
                _order: $crate::MemoryOrder,
            ) -> Self {
                $crate::primitive::masked::update(slot, |_| val)
            }

            #[inline(always)]
            fn compare_exchange_strong(
                slot: &$crate::primitive::Slot<Self>,
                expected: &mut Self,
                desired: Self,
                _success: $crate::MemoryOrder,
                _failure: $crate::MemoryOrder,
            ) -> bool {
                $crate::primitive::masked::compare_exchange(slot, expected, desired)
            }

            #[inline(always)]
            fn compare_exchange_weak(
                slot: &$crate::primitive::Slot<Self>,
                expected: &mut Self,
                desired: Self,
                _success: $crate::MemoryOrder,
                _failure: $crate::MemoryOrder,
            ) -> bool {
                $crate::primitive::masked::compare_exchange(slot, expected, desired)
            }
        }
    };
    ($t:ty, $container:expr) => {
        $crate::primitive::masked::impl_masked!(@primitive $t, 0, $container);

        impl $crate::primitive::Arithmetic for $t {
            #[inline(always)]
            fn fetch_add(
                slot: &$crate::primitive::Slot<Self>,
                val: Self,
                _order: $crate::MemoryOrder,
            ) -> Self {
                $crate::primitive::masked::update(slot, |x| x.wrapping_add(val))
            }

            #[inline(always)]
            fn fetch_sub(
                slot: &$crate::primitive::Slot<Self>,
                val: Self,
                _order: $crate::MemoryOrder,
            ) -> Self {
                $crate::primitive::masked::update(slot, |x| x.wrapping_sub(val))
            }

            #[inline(always)]
            fn fetch_and(
                slot: &$crate::primitive::Slot<Self>,
                val: Self,
                _order: $crate::MemoryOrder,
            ) -> Self {
                $crate::primitive::masked::update(slot, |x| x & val)
            }

            #[inline(always)]
            fn fetch_or(
                slot: &$crate::primitive::Slot<Self>,
                val: Self,
                _order: $crate::MemoryOrder,
            ) -> Self {
                $crate::primitive::masked::update(slot, |x| x | val)
            }

            #[inline(always)]
            fn fetch_xor(
                slot: &$crate::primitive::Slot<Self>,
                val: Self,
                _order: $crate::MemoryOrder,
            ) -> Self {
                $crate::primitive::masked::update(slot, |x| x ^ val)
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
pub(crate) use impl_masked;

impl<const N: usize> Primitive for RawBytes<N> {
    type Align = u8;
    const ZERO: Self = RawBytes::ZERO;
    const CONTAINER: Container = Container::RawBytes(N);
    const STRATEGY: Strategy = Strategy::Masked;

    fn load(slot: &Slot<Self>, _order: MemoryOrder) -> Self {
        load(slot)
    }

    fn store(slot: &Slot<Self>, val: Self, _order: MemoryOrder) {
        store(slot, val)
    }

    fn exchange(slot: &Slot<Self>, val: Self, _order: MemoryOrder) -> Self {
        update(slot, |_| val)
    }

    fn compare_exchange_strong(
        slot: &Slot<Self>,
        expected: &mut Self,
        desired: Self,
        _success: MemoryOrder,
        _failure: MemoryOrder,
    ) -> bool {
        compare_exchange(slot, expected, desired)
    }

    fn compare_exchange_weak(
        slot: &Slot<Self>,
        expected: &mut Self,
        desired: Self,
        _success: MemoryOrder,
        _failure: MemoryOrder,
    ) -> bool {
        compare_exchange(slot, expected, desired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::vec::Vec;

    // These exercise the masked path directly, whatever strategy the
    // integer widths got on the host.

    // A container no target handles natively, so `Atomic` over it always
    // runs the code `impl_masked!` generates for the integer widths.
    impl crate::primitive::sealed::Sealed for u128 {}
    impl_masked!(u128, Container::RawBytes(16));

    // SAFETY: same size as the container, no padding, zero is valid.
    unsafe impl crate::value::AtomicValue for i128 {
        type Repr = u128;
        const CATEGORY: crate::value::Category = crate::value::Category::Integral;
    }
    // SAFETY: every bit pattern is a valid integer.
    unsafe impl crate::value::Bitwise for i128 {}
    // SAFETY: as above.
    unsafe impl crate::value::Integral for i128 {
        const ONE: Self = 1;
    }

    #[test]
    fn masked_integer_through_atomic() {
        let a = Arc::new(crate::Atomic::new(-1000i128));
        assert!(!a.is_lock_free());
        let producers: Vec<_> = (0..2)
            .map(|_| {
                let a = a.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        a.fetch_add(1, MemoryOrder::SeqCst);
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }
        assert_eq!(a.load(MemoryOrder::SeqCst), 1000);
        assert_eq!(a.fetch_sub(1001, MemoryOrder::AcqRel), 1000);
        assert_eq!(a.fetch_xor(-1, MemoryOrder::SeqCst), -1);
        assert_eq!(a.increment(MemoryOrder::SeqCst), 1);
        let mut expected = 0;
        assert!(!a.compare_exchange_strong(&mut expected, 5, MemoryOrder::SeqCst));
        assert_eq!(expected, 1);
    }

    #[test]
    fn masked_pointer_offsets() {
        let mut buf = [0u16; 4];
        let base: crate::primitive::PtrCell = buf.as_mut_ptr().cast();
        let s = Slot::new(base);
        update(&s, |p| p.wrapping_byte_offset(6));
        let last = load(&s).cast::<u16>();
        // SAFETY: six bytes into a four-element `u16` array is its last
        // element, derived from `buf`.
        unsafe { *last = 9 };
        assert_eq!(buf, [0, 0, 0, 9]);
    }

    #[test]
    fn weak_never_fails_spuriously() {
        let s = Slot::new(RawBytes([1u8, 2, 3]));
        for _ in 0..1000 {
            let mut e = RawBytes([1, 2, 3]);
            assert!(compare_exchange(&s, &mut e, RawBytes([1, 2, 3])));
        }
    }

    #[test]
    fn failed_cas_reports_current() {
        let s = Slot::new(RawBytes([9u8; 12]));
        let mut e = RawBytes([0u8; 12]);
        assert!(!RawBytes::compare_exchange_strong(
            &s,
            &mut e,
            RawBytes([1; 12]),
            MemoryOrder::SeqCst,
            MemoryOrder::SeqCst,
        ));
        assert_eq!(e, RawBytes([9; 12]));
        assert_eq!(load(&s), RawBytes([9; 12]));
    }

    #[test]
    fn two_producers_no_lost_updates_64() {
        let s = Arc::new(Slot::new(0u64));
        let producers: Vec<_> = (0..2)
            .map(|_| {
                let s = s.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        update(&s, |x| x.wrapping_add(1));
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }
        assert_eq!(load(&s), 2000);
    }

    #[test]
    fn masked_cas_loop_counts() {
        let s = Arc::new(Slot::new(RawBytes([0u8; 16])));
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let s = s.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        let mut cur = load(&s);
                        loop {
                            let n = u128::from_le_bytes(cur.0) + 1;
                            if compare_exchange(&s, &mut cur, RawBytes(n.to_le_bytes())) {
                                break;
                            }
                        }
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        assert_eq!(u128::from_le_bytes(load(&s).0), 1000);
    }
}
