//! # Kernel synchronization primitives
//!
//! The boot path is single-threaded with interrupts disabled, so these
//! exist to give `static` state a sound shape rather than to arbitrate
//! real contention:
//!
//! * [`SpinLock`] guards state reached from several places, such as the
//!   console behind the logger.
//! * [`TakeOnce`] hands out exclusive `&'static mut` access to a static
//!   exactly once, e.g. the frame pool or the page-table pages.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod spin_lock;
mod take_once;

pub use spin_lock::{SpinLock, SpinLockGuard};
pub use take_once::TakeOnce;
