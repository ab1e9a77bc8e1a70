//! # Typed i386 Control Registers
//!
//! Bitfield models of the control registers touched while bringing up
//! paging. Register access itself is only compiled for `target_arch = "x86"`
//! with the `asm` feature; the bit layouts are usable (and tested) anywhere.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(feature = "cr0")]
pub mod cr0;

#[cfg(feature = "cr3")]
pub mod cr3;

pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// Control register access is privileged and requires ring 0.
    unsafe fn load_unsafe() -> Self;
}

pub trait StoreRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// Control register access is privileged and requires ring 0.
    unsafe fn store_unsafe(self);
}
