//! Buddy Arena Allocator
//!
//! This crate implements a fixed-arena buddy page allocator for constrained
//! environments where a general-purpose heap is unavailable, featuring:
//! - One power-of-two arena split into `2^MIN_ORDER` byte pages
//! - Index-linked per-order free lists with O(1) insert/remove
//! - Split on allocation, buddy coalescing on free
//! - A spin-locked wrapper for shared use

#![no_std]

extern crate alloc;

use core::fmt;

// Logging support - conditionally import log crate
#[cfg(feature = "log")]
extern crate log;

// Stub macros when log is disabled - these become no-ops
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! error {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! warn {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! info {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! debug {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

/// Default page size exponent (4 KiB pages)
pub const DEFAULT_MIN_ORDER: usize = 12;

/// Default arena size exponent (1 MiB arena)
pub const DEFAULT_MAX_ORDER: usize = 20;

/// The largest arena order any instance may be configured with.
pub const MAX_SUPPORTED_ORDER: usize = usize::BITS as usize - 1;

/// The error type used for allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// No free block of sufficient order exists. The caller may free and retry.
    OutOfMemory,
    /// The rounded request order exceeds the arena order.
    RequestTooLarge,
    /// Free of an address that does not head a live allocation.
    InvalidFree,
    /// Address outside the arena, misaligned, or an order without a buddy.
    OutOfRange,
    /// Invalid arena parameters (e.g. the arena would wrap the address space).
    InvalidParam,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            AllocError::OutOfMemory => "out of memory",
            AllocError::RequestTooLarge => "request larger than the arena",
            AllocError::InvalidFree => "address is not a live allocation",
            AllocError::OutOfRange => "address or order out of range",
            AllocError::InvalidParam => "invalid arena parameters",
        };
        f.write_str(msg)
    }
}

/// A [`Result`] type with [`AllocError`] as the error type.
pub type AllocResult<T = ()> = Result<T, AllocError>;

/// Checks whether the address has the demanded alignment.
///
/// Equivalent to `addr % align == 0`, but the alignment must be a power of two.
#[inline]
const fn is_aligned(base_addr: usize, align: usize) -> bool {
    base_addr & (align - 1) == 0
}

pub mod buddy;
#[cfg(feature = "tracking")]
pub use buddy::BuddyStats;
pub use buddy::{
    ArenaLayout, BuddyArena, FreeAreaDump, FreeListRegistry, OrderCount, PageDescriptor,
    PageState, PageTable,
};

pub mod locked_arena;
pub use locked_arena::LockedBuddyArena;
