//! Generic atomic objects.

use core::fmt;
use core::marker::PhantomData;
use core::mem::size_of;

use crate::container::Container;
use crate::order::MemoryOrder;
use crate::primitive::{Arithmetic, PointerArithmetic, Primitive, PtrCell, Slot};
use crate::value::{decode, encode, AtomicValue, Bitwise, Category, Integral};

/// A `T` that can be shared between threads and interrupt handlers, and
/// accessed only through indivisible operations.
///
/// The operations available depend on `T`'s [`Category`]: everything gets
/// load, store, exchange and compare-exchange; integers and `bool` get
/// bitwise operations; integers and pointers get arithmetic.
///
/// Whether operations are lock-free depends on `T`'s container and the
/// target, and is fixed at compile time; see [`Atomic::IS_LOCK_FREE`].
///
/// `Atomic` can't be cloned or copied, since that would read it and then
/// write a new one as two separate steps:
///
/// ```compile_fail
/// use lilos_atomic::Atomic;
///
/// let a = Atomic::new(1u32);
/// let b = a.clone();
/// ```
#[repr(transparent)]
pub struct Atomic<T: AtomicValue> {
    slot: Slot<T::Repr>,
    _marker: PhantomData<T>,
}

// SAFETY: the payload is only reachable through atomic operations, and
// `AtomicValue` types are plain bytes with no ownership of their own.
unsafe impl<T: AtomicValue> Send for Atomic<T> {}
// SAFETY: as above.
unsafe impl<T: AtomicValue> Sync for Atomic<T> {}

impl<T: AtomicValue> Atomic<T> {
    /// Container `T` is stored in.
    pub const CONTAINER: Container = <T::Repr as Primitive>::CONTAINER;

    pub const CATEGORY: Category = T::CATEGORY;

    /// Whether read-modify-write operations on this type are lock-free
    /// (hardware retry) rather than critical-section-backed.
    pub const IS_LOCK_FREE: bool = <T::Repr as Primitive>::IS_LOCK_FREE;

    /// Creates an atomic object holding `value`.
    ///
    /// This is a single non-atomic write, which is fine since nobody else can
    /// see the object yet.
    pub const fn new(value: T) -> Self {
        Self {
            slot: Slot::new(encode(value)),
            _marker: PhantomData,
        }
    }

    /// Creates an atomic object holding the all-zero value of `T` (zero,
    /// `false`, null, ...). Suitable for `static`s.
    pub const fn zeroed() -> Self {
        Self {
            slot: Slot::new(<T::Repr as Primitive>::ZERO),
            _marker: PhantomData,
        }
    }

    /// Consumes the object and returns the value it held.
    pub fn into_inner(self) -> T {
        decode(self.slot.into_inner())
    }

    /// Reads the value through an exclusive reference. No atomic operation
    /// is needed, since nobody else can be looking.
    pub fn get_mut_value(&mut self) -> T {
        decode(*self.slot.get_mut())
    }

    /// Checks whether read-modify-write operations on this object are
    /// lock-free. Always returns [`Self::IS_LOCK_FREE`].
    #[inline(always)]
    pub fn is_lock_free(&self) -> bool {
        Self::IS_LOCK_FREE
    }

    #[inline(always)]
    pub fn load(&self, order: MemoryOrder) -> T {
        decode(T::Repr::load(&self.slot, order))
    }

    #[inline(always)]
    pub fn store(&self, value: T, order: MemoryOrder) {
        T::Repr::store(&self.slot, encode(value), order)
    }

    /// Stores `value`, returning the value held immediately before.
    #[inline(always)]
    pub fn exchange(&self, value: T, order: MemoryOrder) -> T {
        decode(T::Repr::exchange(&self.slot, encode(value), order))
    }

    /// If the object's bytes equal `*expected`'s, replaces them with
    /// `desired` and returns `true`. Otherwise, writes the current value to
    /// `*expected` and returns `false`, so the caller can retry.
    ///
    /// The failure path uses `order` reduced by
    /// [`MemoryOrder::reduce_for_failure`].
    #[inline(always)]
    pub fn compare_exchange_strong(&self, expected: &mut T, desired: T, order: MemoryOrder) -> bool {
        self.compare_exchange_strong_with(expected, desired, order, order.reduce_for_failure())
    }

    /// Like [`compare_exchange_strong`](Self::compare_exchange_strong) with
    /// separate success and failure orders.
    ///
    /// `failure` is reduced with [`MemoryOrder::failure_for`], so any
    /// combination is accepted.
    #[inline(always)]
    pub fn compare_exchange_strong_with(
        &self,
        expected: &mut T,
        desired: T,
        success: MemoryOrder,
        failure: MemoryOrder,
    ) -> bool {
        let mut e = encode(*expected);
        let ok = T::Repr::compare_exchange_strong(&self.slot, &mut e, encode(desired), success, failure);
        if !ok {
            *expected = decode(e);
        }
        ok
    }

    /// Like [`compare_exchange_strong`](Self::compare_exchange_strong), but
    /// may fail even when the bytes match if the object is lock-free. Use it
    /// in a retry loop.
    #[inline(always)]
    pub fn compare_exchange_weak(&self, expected: &mut T, desired: T, order: MemoryOrder) -> bool {
        self.compare_exchange_weak_with(expected, desired, order, order.reduce_for_failure())
    }

    /// Like [`compare_exchange_weak`](Self::compare_exchange_weak) with
    /// separate success and failure orders.
    #[inline(always)]
    pub fn compare_exchange_weak_with(
        &self,
        expected: &mut T,
        desired: T,
        success: MemoryOrder,
        failure: MemoryOrder,
    ) -> bool {
        let mut e = encode(*expected);
        let ok = T::Repr::compare_exchange_weak(&self.slot, &mut e, encode(desired), success, failure);
        if !ok {
            *expected = decode(e);
        }
        ok
    }

    /// Fetches the value using `fetch_order` and applies `f` to it. If `f`
    /// produces `Some(new)`, attempts to swap the value that was read for
    /// `new` using `set_order`. If that fails because the value changed, `f`
    /// is called again with the new value.
    ///
    /// Returns `Ok(previous)` once a swap lands, or `Err(current)` as soon as
    /// `f` returns `None`.
    pub fn fetch_update(
        &self,
        set_order: MemoryOrder,
        fetch_order: MemoryOrder,
        mut f: impl FnMut(T) -> Option<T>,
    ) -> Result<T, T> {
        let mut prev = self.load(fetch_order);
        while let Some(next) = f(prev) {
            if self.compare_exchange_weak_with(&mut prev, next, set_order, fetch_order) {
                return Ok(prev);
            }
        }
        Err(prev)
    }
}

impl<T> Atomic<T>
where
    T: Bitwise,
    T::Repr: Arithmetic,
{
    /// Bitwise AND with `val`, returning the previous value.
    #[inline(always)]
    pub fn fetch_and(&self, val: T, order: MemoryOrder) -> T {
        decode(T::Repr::fetch_and(&self.slot, encode(val), order))
    }

    /// Bitwise OR with `val`, returning the previous value.
    #[inline(always)]
    pub fn fetch_or(&self, val: T, order: MemoryOrder) -> T {
        decode(T::Repr::fetch_or(&self.slot, encode(val), order))
    }

    /// Bitwise XOR with `val`, returning the previous value.
    #[inline(always)]
    pub fn fetch_xor(&self, val: T, order: MemoryOrder) -> T {
        decode(T::Repr::fetch_xor(&self.slot, encode(val), order))
    }
}

impl<T> Atomic<T>
where
    T: Integral,
    T::Repr: Arithmetic,
{
    /// Adds `val`, wrapping at the container width, and returns the previous
    /// value.
    #[inline(always)]
    pub fn fetch_add(&self, val: T, order: MemoryOrder) -> T {
        decode(T::Repr::fetch_add(&self.slot, encode(val), order))
    }

    /// Subtracts `val`, wrapping at the container width, and returns the
    /// previous value.
    #[inline(always)]
    pub fn fetch_sub(&self, val: T, order: MemoryOrder) -> T {
        decode(T::Repr::fetch_sub(&self.slot, encode(val), order))
    }

    /// Adds `val` and returns the *new* value.
    #[inline(always)]
    pub fn add_fetch(&self, val: T, order: MemoryOrder) -> T {
        let old = T::Repr::fetch_add(&self.slot, encode(val), order);
        decode(old.wrapped_add(encode(val)))
    }

    /// Subtracts `val` and returns the *new* value.
    #[inline(always)]
    pub fn sub_fetch(&self, val: T, order: MemoryOrder) -> T {
        let old = T::Repr::fetch_sub(&self.slot, encode(val), order);
        decode(old.wrapped_sub(encode(val)))
    }

    /// Pre-increment: adds one and returns the new value.
    #[inline(always)]
    pub fn increment(&self, order: MemoryOrder) -> T {
        self.add_fetch(T::ONE, order)
    }

    /// Pre-decrement: subtracts one and returns the new value.
    #[inline(always)]
    pub fn decrement(&self, order: MemoryOrder) -> T {
        self.sub_fetch(T::ONE, order)
    }
}

macro_rules! impl_pointer_ops {
    ($ptr:ty) => {
        impl<E> Atomic<$ptr> {
            /// Advances the pointer by `delta` elements (`delta *
            /// size_of::<E>()` bytes), returning the previous pointer.
            #[inline(always)]
            pub fn fetch_add(&self, delta: isize, order: MemoryOrder) -> $ptr {
                decode(offset(&self.slot, scale::<E>(delta), order))
            }

            /// Moves the pointer back by `delta` elements, returning the
            /// previous pointer.
            #[inline(always)]
            pub fn fetch_sub(&self, delta: isize, order: MemoryOrder) -> $ptr {
                decode(offset(&self.slot, scale::<E>(delta).wrapping_neg(), order))
            }

            /// Advances the pointer by one element and returns the new
            /// pointer.
            #[inline(always)]
            pub fn increment(&self, order: MemoryOrder) -> $ptr {
                let step = scale::<E>(1);
                decode(offset(&self.slot, step, order).wrapping_byte_offset(step))
            }

            /// Moves the pointer back by one element and returns the new
            /// pointer.
            #[inline(always)]
            pub fn decrement(&self, order: MemoryOrder) -> $ptr {
                let step = scale::<E>(1).wrapping_neg();
                decode(offset(&self.slot, step, order).wrapping_byte_offset(step))
            }
        }
    };
}

impl_pointer_ops!(*mut E);
impl_pointer_ops!(*const E);

/// Converts an element count into a byte offset.
#[inline(always)]
fn scale<E>(delta: isize) -> isize {
    delta.wrapping_mul(size_of::<E>() as isize)
}

#[inline(always)]
fn offset(slot: &Slot<PtrCell>, bytes: isize, order: MemoryOrder) -> PtrCell {
    <PtrCell as PointerArithmetic>::fetch_byte_offset(slot, bytes, order)
}

impl<T: AtomicValue> Default for Atomic<T> {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl<T: AtomicValue> From<T> for Atomic<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: AtomicValue + fmt::Debug> fmt::Debug for Atomic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.load(MemoryOrder::Relaxed), f)
    }
}
