//! Payload types and how they map onto containers.
//!
//! A type can live in an [`Atomic`](crate::Atomic) if it implements
//! [`AtomicValue`], which names its container and its [`Category`]. The
//! category decides which operations the atomic object offers:
//!
//! - `bool` and the integer types are [`Bitwise`]; the integers are also
//!   [`Integral`] and get arithmetic.
//! - Raw pointers get pointer arithmetic scaled by the element size.
//! - Anything else that is plain bytes can opt in with [`atomic_plain!`] and
//!   gets load, store, exchange and compare-exchange only.
//!
//! Values move into and out of containers by byte copy. Containers are
//! zero-filled before a value is copied in, so any bytes past the end of the
//! payload are always zero, and compare-exchange (which compares the whole
//! container) behaves the same as comparing payload bytes. Pointers are
//! copied into a pointer container, never an integer one, so they keep their
//! provenance, and can be stored in an atomic object at compile time.
//!
//! [`atomic_plain!`]: crate::atomic_plain

use core::mem::{size_of, MaybeUninit};
use core::ptr;

use crate::primitive::{Primitive, PtrCell};

/// Which family of operations a payload supports.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    /// `bool` and integers.
    Integral,
    /// Raw pointers.
    Pointer,
    /// Plain bytes: no arithmetic.
    Plain,
}

/// A type that can be stored in an atomic object.
///
/// # Safety
///
/// Implementors promise that:
///
/// - `size_of::<Self>() <= size_of::<Self::Repr>()`;
/// - `Self` contains no uninitialized (padding) bytes, so copying its bytes
///   into the container is defined;
/// - the all-zero bit pattern is a valid `Self`.
///
/// Use [`atomic_plain!`](crate::atomic_plain) rather than implementing this
/// by hand; it checks all of the above.
pub unsafe trait AtomicValue: Copy {
    /// Container the value is stored in.
    type Repr: Primitive;

    const CATEGORY: Category;
}

/// Payloads supporting `fetch_and`, `fetch_or` and `fetch_xor`.
///
/// # Safety
///
/// Bitwise AND, OR and XOR of the container bits of two valid values must
/// produce the container bits of a valid value.
pub unsafe trait Bitwise: AtomicValue {}

/// Payloads supporting wrapping addition and subtraction on their container.
///
/// # Safety
///
/// Every bit pattern of the container must be a valid value.
pub unsafe trait Integral: Bitwise {
    const ONE: Self;
}

/// Copies `value` into a zero-filled container.
#[inline(always)]
pub const fn encode<T: AtomicValue>(value: T) -> T::Repr {
    const {
        assert!(size_of::<T>() <= size_of::<T::Repr>());
    }
    let mut repr = <T::Repr as Primitive>::ZERO;
    // SAFETY: the container is at least as large as `T` (checked above),
    // and `AtomicValue` promises `T` has no uninitialized bytes. Copying
    // bytes imposes no alignment requirement.
    unsafe {
        ptr::copy_nonoverlapping(
            ptr::addr_of!(value).cast::<u8>(),
            ptr::addr_of_mut!(repr).cast::<u8>(),
            size_of::<T>(),
        );
    }
    repr
}

/// Copies a value back out of its container.
///
/// Every container this crate hands out was produced by [`encode`] (or is
/// all zeros), so its leading bytes are always a valid `T`.
#[inline(always)]
pub fn decode<T: AtomicValue>(repr: T::Repr) -> T {
    let mut value = MaybeUninit::<T>::uninit();
    // SAFETY: as in `encode`; the bytes came from a valid `T`, or are zero,
    // which `AtomicValue` promises is valid.
    unsafe {
        ptr::copy_nonoverlapping(
            ptr::addr_of!(repr).cast::<u8>(),
            value.as_mut_ptr().cast::<u8>(),
            size_of::<T>(),
        );
        value.assume_init()
    }
}

macro_rules! impl_integral {
    ($($t:ty => $repr:ty),* $(,)?) => {
        $(
            // SAFETY: same size as the container, no padding, zero is valid.
            unsafe impl AtomicValue for $t {
                type Repr = $repr;
                const CATEGORY: Category = Category::Integral;
            }
            // SAFETY: every bit pattern is a valid integer.
            unsafe impl Bitwise for $t {}
            // SAFETY: as for `Bitwise`, so wrapping arithmetic on the
            // container always yields a valid integer.
            unsafe impl Integral for $t {
                const ONE: Self = 1;
            }
        )*
    };
}

impl_integral! {
    u8 => u8,
    i8 => u8,
    u16 => u16,
    i16 => u16,
    u32 => u32,
    i32 => u32,
    u64 => u64,
    i64 => u64,
}

/// Integer container the same width as a pointer.
#[cfg(target_pointer_width = "16")]
pub type PtrBits = u16;
/// Integer container the same width as a pointer.
#[cfg(target_pointer_width = "32")]
pub type PtrBits = u32;
/// Integer container the same width as a pointer.
#[cfg(target_pointer_width = "64")]
pub type PtrBits = u64;

impl_integral! {
    usize => PtrBits,
    isize => PtrBits,
}

// SAFETY: one byte, no padding, zero is `false`.
unsafe impl AtomicValue for bool {
    type Repr = u8;
    const CATEGORY: Category = Category::Integral;
}

// SAFETY: AND, OR and XOR of 0 and 1 stay within 0 and 1.
unsafe impl Bitwise for bool {}

// SAFETY: same size as the pointer container, no padding, zero is null.
unsafe impl<E> AtomicValue for *mut E {
    type Repr = PtrCell;
    const CATEGORY: Category = Category::Pointer;
}

// SAFETY: as above.
unsafe impl<E> AtomicValue for *const E {
    type Repr = PtrCell;
    const CATEGORY: Category = Category::Pointer;
}

/// Declares plain-bytes types as atomic payloads.
///
/// Each type must be `Copy`, `bytemuck::NoUninit` (no padding bytes) and
/// `bytemuck::Zeroable` (so a zeroed atomic holds a valid value), and must
/// not be zero-sized. The container is picked from the type's size: the
/// smallest integer that fits, or a byte buffer over eight bytes.
///
/// ```
/// use bytemuck::{NoUninit, Zeroable};
/// use lilos_atomic::{atomic_plain, Atomic, MemoryOrder};
///
/// #[derive(Copy, Clone, Debug, PartialEq, Zeroable, NoUninit)]
/// #[repr(C)]
/// struct Rgb { r: u8, g: u8, b: u8 }
///
/// atomic_plain!(Rgb);
///
/// let color = Atomic::new(Rgb { r: 1, g: 2, b: 3 });
/// assert_eq!(color.load(MemoryOrder::SeqCst).g, 2);
/// ```
#[macro_export]
macro_rules! atomic_plain {
    ($($t:ty),+ $(,)?) => {
        $(
            const _: () = {
                fn plain_bytes<T: $crate::__private::bytemuck::NoUninit
                    + $crate::__private::bytemuck::Zeroable>() {}
                let _ = plain_bytes::<$t>;
            };

            // SAFETY: no padding and zero-valid are checked just above; the
            // container is chosen by size so it's large enough.
            unsafe impl $crate::value::AtomicValue for $t {
                type Repr = <$crate::container::Fit<
                    { ::core::mem::size_of::<$t>() <= 8 },
                    { ::core::mem::size_of::<$t>() },
                > as $crate::container::Select>::Container;
                const CATEGORY: $crate::value::Category = $crate::value::Category::Plain;
            }
        )+
    };
}
