//! Typed atomic objects for single-core embedded systems.
//!
//! Kernel and driver code needs to share memory between threads and
//! interrupt handlers, and change it with indivisible read-modify-write
//! operations. Some targets can do this in hardware, using exclusive-access
//! retry loops. Others (ARMv6-M, RV32 without the A extension) can't, and no
//! 32-bit microcontroller can do it for 64-bit values. The only option there
//! is to disable interrupts around the operation.
//!
//! This crate puts both behind one generic type, [`Atomic<T>`], which works
//! for any integer, `bool`, raw pointer, or plain-bytes type declared with
//! [`atomic_plain!`]. Each payload type is assigned a *container* (the
//! smallest unsigned integer that fits, or a byte buffer if none does) at
//! compile time, and each container width gets the best strategy the target
//! supports. There's also [`AtomicFlag`], a test-and-set bit that works
//! everywhere.
//!
//! ```
//! use lilos_atomic::{Atomic, MemoryOrder::SeqCst};
//!
//! static TICKS: Atomic<u64> = Atomic::zeroed();
//!
//! // In an interrupt handler:
//! TICKS.fetch_add(1, SeqCst);
//!
//! // In a thread:
//! let now = TICKS.load(SeqCst);
//! # assert_eq!(now, 1);
//! ```
//!
//! # Features
//!
//! - `portable-atomic`: use the `portable-atomic` crate for every integer
//!   width. Handy on single-core targets without hardware atomics.
//! - `critical-section-only`: put every operation in a critical section,
//!   even where hardware support exists.
//! - `std`: provide the `critical-section` implementation for hosted
//!   targets.
//!
//! On non-ARM targets, critical sections come from the `critical-section`
//! crate, and something in your program must provide its implementation.

#![no_std]
#![warn(missing_debug_implementations)]

#[cfg(test)]
extern crate std;

pub mod container;
pub mod critical;
pub mod flag;
mod object;
pub mod order;
pub mod primitive;
pub mod value;

pub use container::{Container, RawBytes, Strategy};
pub use flag::AtomicFlag;
pub use object::Atomic;
pub use order::{compiler_fence, fence, MemoryOrder};
pub use value::{AtomicValue, Bitwise, Category, Integral};

#[doc(hidden)]
pub mod __private {
    pub use bytemuck;
}
