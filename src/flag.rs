//! The minimal atomic flag.
//!
//! [`AtomicFlag`] is a single bit with test-and-set and clear. It's available
//! on every target, whatever its atomic support, and doesn't go through
//! container selection: where the target has a native byte-sized swap it uses
//! that, and otherwise it flips a `bool` inside a critical section.

use crate::order::MemoryOrder;

cfg_if::cfg_if! {
    if #[cfg(all(target_has_atomic = "8", not(feature = "critical-section-only")))] {
        use core::sync::atomic::AtomicBool;

        /// A boolean flag supporting only test-and-set and clear.
        ///
        /// The flag starts clear (`false`).
        #[derive(Default)]
        pub struct AtomicFlag(AtomicBool);

        impl AtomicFlag {
            /// Creates a clear flag.
            pub const fn new() -> Self {
                Self(AtomicBool::new(false))
            }

            /// Sets the flag, returning whether it was already set.
            #[inline(always)]
            pub fn test_and_set(&self, order: MemoryOrder) -> bool {
                self.0.swap(true, order.into())
            }

            #[inline(always)]
            pub fn clear(&self, order: MemoryOrder) {
                self.0.store(false, order.for_store().into())
            }

            /// Reads the flag without changing it.
            #[inline(always)]
            pub fn is_set(&self, order: MemoryOrder) -> bool {
                self.0.load(order.for_load().into())
            }
        }
    } else {
        use core::cell::UnsafeCell;

        use crate::critical;

        /// A boolean flag supporting only test-and-set and clear.
        ///
        /// The flag starts clear (`false`).
        #[derive(Default)]
        pub struct AtomicFlag(UnsafeCell<bool>);

        // SAFETY: all access to the cell happens in critical sections.
        unsafe impl Sync for AtomicFlag {}

        impl AtomicFlag {
            /// Creates a clear flag.
            pub const fn new() -> Self {
                Self(UnsafeCell::new(false))
            }

            /// Sets the flag, returning whether it was already set.
            #[inline(always)]
            pub fn test_and_set(&self, _order: MemoryOrder) -> bool {
                // SAFETY: exclusive access inside the critical section.
                critical::with(|| unsafe { core::ptr::replace(self.0.get(), true) })
            }

            #[inline(always)]
            pub fn clear(&self, _order: MemoryOrder) {
                // SAFETY: as above.
                critical::with(|| unsafe { self.0.get().write(false) })
            }

            /// Reads the flag without changing it.
            #[inline(always)]
            pub fn is_set(&self, _order: MemoryOrder) -> bool {
                // SAFETY: as above.
                critical::with(|| unsafe { self.0.get().read() })
            }
        }
    }
}

impl core::fmt::Debug for AtomicFlag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("AtomicFlag")
            .field(&self.is_set(MemoryOrder::Relaxed))
            .finish()
    }
}
