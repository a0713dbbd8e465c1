//! Interrupt-masking critical sections.
//!
//! This is the universal fallback for atomic operations the hardware can't
//! do on its own. Entering a critical section prevents every other context on
//! this core (threads and interrupt handlers alike) from running until the
//! matching exit.
//!
//! Critical sections nest. Each entry records whether interrupts were
//! enabled beforehand, and each exit restores exactly that state, so only the
//! exit matching the outermost entry actually re-enables interrupts.
//!
//! Anything run inside a critical section delays every interrupt in the
//! system. Keep the bodies short, and never block inside one.
//!
//! On ARM this drives PRIMASK directly through `cortex-m`. Elsewhere it
//! defers to the `critical-section` crate, and the platform (or, on a host,
//! the `std` feature) must provide the implementation.

use scopeguard::guard;

cfg_if::cfg_if! {
    if #[cfg(target_arch = "arm")] {
        /// Interrupt state captured on entry to a critical section.
        #[derive(Copy, Clone, Debug)]
        #[must_use = "the restore state must be passed to `exit`"]
        pub struct RestoreState(bool);

        /// Enters a critical section, returning the prior interrupt state.
        ///
        /// # Safety
        ///
        /// The result must be passed to [`exit`] exactly once, and nested
        /// sections must be exited in the reverse order they were entered.
        #[inline(always)]
        pub unsafe fn enter() -> RestoreState {
            let was_active = cortex_m::register::primask::read().is_active();
            cortex_m::interrupt::disable();
            RestoreState(was_active)
        }

        /// Leaves a critical section, re-enabling interrupts only if they
        /// were enabled when the matching [`enter`] ran.
        ///
        /// # Safety
        ///
        /// `state` must come from the most recent unmatched [`enter`].
        #[inline(always)]
        pub unsafe fn exit(state: RestoreState) {
            if state.0 {
                // SAFETY: interrupts were on before the matching enter, so
                // turning them back on restores the caller's state.
                unsafe { cortex_m::interrupt::enable() }
            }
        }
    } else {
        /// Interrupt state captured on entry to a critical section.
        #[derive(Copy, Clone, Debug)]
        #[must_use = "the restore state must be passed to `exit`"]
        pub struct RestoreState(critical_section::RestoreState);

        /// Enters a critical section, returning the prior interrupt state.
        ///
        /// # Safety
        ///
        /// The result must be passed to [`exit`] exactly once, and nested
        /// sections must be exited in the reverse order they were entered.
        #[inline(always)]
        pub unsafe fn enter() -> RestoreState {
            // SAFETY: our caller takes on the pairing obligation.
            RestoreState(unsafe { critical_section::acquire() })
        }

        /// Leaves a critical section, restoring the state captured by the
        /// matching [`enter`].
        ///
        /// # Safety
        ///
        /// `state` must come from the most recent unmatched [`enter`].
        #[inline(always)]
        pub unsafe fn exit(state: RestoreState) {
            // SAFETY: our caller takes on the pairing obligation.
            unsafe { critical_section::release(state.0) }
        }
    }
}

/// Runs `body` inside a critical section and returns its result.
///
/// The prior interrupt state is restored when `body` returns, or if it
/// unwinds.
#[inline(always)]
pub fn with<R>(body: impl FnOnce() -> R) -> R {
    // SAFETY: the guard passes the state back to `exit` exactly once, and
    // it's dropped before any enclosing section's guard.
    let _restore = guard(unsafe { enter() }, |state| unsafe { exit(state) });
    body()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_returns_body_result() {
        assert_eq!(with(|| 6 * 7), 42);
    }

    #[test]
    fn sections_nest() {
        let r = with(|| with(|| with(|| "deep")));
        assert_eq!(r, "deep");
    }

    #[test]
    fn manual_enter_exit_nest() {
        unsafe {
            let outer = enter();
            let inner = enter();
            exit(inner);
            exit(outer);
        }
        // Still usable afterwards.
        assert_eq!(with(|| 1), 1);
    }

    #[test]
    fn sections_exclude_other_threads() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let inside = Arc::new(AtomicBool::new(false));
        let threads: std::vec::Vec<_> = (0..4)
            .map(|_| {
                let inside = inside.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        with(|| {
                            assert!(!inside.swap(true, Ordering::Relaxed));
                            inside.store(false, Ordering::Relaxed);
                        });
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
    }
}
