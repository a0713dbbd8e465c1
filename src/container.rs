//! Container selection.
//!
//! Every atomic object stores its payload in a *container*: the smallest
//! unsigned integer (8, 16, 32 or 64 bits) that's at least as large as the
//! payload, or, for payloads over eight bytes, an opaque byte buffer of
//! exactly the payload's size. Integer containers support every primitive
//! operation; byte buffers support load, store, exchange and compare-exchange
//! only, and are always protected by a critical section. Pointers are the
//! exception: they're stored as pointers, in
//! [`PtrCell`](crate::primitive::PtrCell), but report the integer container
//! of the same width.
//!
//! Selection happens at compile time, once per payload type. [`Container`]
//! describes the choice at runtime; [`Fit`] and [`Select`] make it at the
//! type level.

use crate::primitive::Primitive;

/// Storage representation chosen for a payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Container {
    Width8,
    Width16,
    Width32,
    Width64,
    /// Byte buffer of exactly this many bytes.
    RawBytes(usize),
}

impl Container {
    /// Picks the container for a payload of `size` bytes.
    ///
    /// Never fails: anything that doesn't fit in an integer gets a byte
    /// buffer. A zero-sized payload gets the 8-bit container here, but has no
    /// type-level container at all (see [`Fit`]).
    pub const fn select(size: usize) -> Self {
        match size {
            0 | 1 => Self::Width8,
            2 => Self::Width16,
            3 | 4 => Self::Width32,
            5..=8 => Self::Width64,
            n => Self::RawBytes(n),
        }
    }

    /// Size of the container in bytes.
    pub const fn size(self) -> usize {
        match self {
            Self::Width8 => 1,
            Self::Width16 => 2,
            Self::Width32 => 4,
            Self::Width64 => 8,
            Self::RawBytes(n) => n,
        }
    }

    /// Checks whether this is an integer container, and thus supports
    /// arithmetic.
    pub const fn is_integer(self) -> bool {
        !matches!(self, Self::RawBytes(_))
    }

    /// Strategy used for operations on this container on the current target.
    pub const fn strategy(self) -> Strategy {
        match self {
            Self::Width8 => <u8 as Primitive>::STRATEGY,
            Self::Width16 => <u16 as Primitive>::STRATEGY,
            Self::Width32 => <u32 as Primitive>::STRATEGY,
            Self::Width64 => <u64 as Primitive>::STRATEGY,
            Self::RawBytes(_) => Strategy::Masked,
        }
    }
}

/// How a container's operations are carried out on this target.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Hardware exclusive-access retry loops. Lock-free.
    Exclusive,
    /// Native atomic loads and stores; read-modify-write operations in a
    /// critical section. This is what ARMv6-M gets.
    Split,
    /// Everything in a critical section.
    Masked,
}

impl Strategy {
    /// Checks whether read-modify-write operations are lock-free.
    pub const fn is_lock_free(self) -> bool {
        matches!(self, Self::Exclusive)
    }
}

/// Logs the strategy chosen for each integer width.
///
/// Intended to be called once during boot, outside any critical section.
pub fn report() {
    for c in [
        Container::Width8,
        Container::Width16,
        Container::Width32,
        Container::Width64,
    ] {
        log::debug!("atomic {:?}: {:?}", c, c.strategy());
    }
}

/// Opaque byte-buffer container for payloads too large for any integer.
///
/// Supports no arithmetic. Compare-exchange compares all `N` bytes.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct RawBytes<const N: usize>(pub [u8; N]);

impl<const N: usize> RawBytes<N> {
    pub const ZERO: Self = Self([0; N]);
}

impl<const N: usize> core::fmt::Debug for RawBytes<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("RawBytes").field(&&self.0[..]).finish()
    }
}

/// Type-level container selector for a payload of `N` bytes. `SMALL` must be
/// `N <= 8`.
///
/// Use it as `<Fit<{ size <= 8 }, { size }> as Select>::Container`, which is
/// what [`atomic_plain!`](crate::atomic_plain) expands to.
#[derive(Debug)]
pub struct Fit<const SMALL: bool, const N: usize>;

/// Maps a [`Fit`] to its container type.
pub trait Select {
    type Container: Primitive;
}

macro_rules! select_table {
    ($($n:literal => $c:ty),* $(,)?) => {
        $(
            impl Select for Fit<true, $n> {
                type Container = $c;
            }
        )*
    };
}

select_table! {
    1 => u8,
    2 => u16,
    3 => u32,
    4 => u32,
    5 => u64,
    6 => u64,
    7 => u64,
    8 => u64,
}

impl<const N: usize> Select for Fit<false, N> {
    type Container = RawBytes<N>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::size_of;

    #[test]
    fn selection_table() {
        let expected = [
            (1, Container::Width8),
            (2, Container::Width16),
            (3, Container::Width32),
            (4, Container::Width32),
            (5, Container::Width64),
            (6, Container::Width64),
            (7, Container::Width64),
            (8, Container::Width64),
            (9, Container::RawBytes(9)),
            (12, Container::RawBytes(12)),
            (16, Container::RawBytes(16)),
        ];
        for (size, c) in expected {
            assert_eq!(Container::select(size), c, "size {size}");
            assert!(c.size() >= size);
        }
    }

    #[test]
    fn type_level_matches_runtime() {
        fn check<S: Select>(size: usize) {
            assert_eq!(
                <S::Container as Primitive>::CONTAINER,
                Container::select(size)
            );
            assert!(size_of::<S::Container>() >= size);
        }
        check::<Fit<true, 1>>(1);
        check::<Fit<true, 3>>(3);
        check::<Fit<true, 7>>(7);
        check::<Fit<false, 12>>(12);
        check::<Fit<false, 40>>(40);
    }

    #[test]
    fn raw_bytes_never_lock_free() {
        assert_eq!(Container::RawBytes(12).strategy(), Strategy::Masked);
        assert!(!Container::RawBytes(12).is_integer());
        assert!(!<RawBytes<12> as Primitive>::IS_LOCK_FREE);
    }

    #[test]
    fn report_runs() {
        report();
    }
}
