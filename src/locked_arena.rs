//! Spin-locked buddy arena for shared use.
//!
//! A single lock covers the page table and every free list together, so a
//! deep split or a multi-level merge is observed as one step.

use kspin::SpinNoIrq;

#[cfg(feature = "log")]
use log::warn;

#[cfg(feature = "tracking")]
use crate::buddy::BuddyStats;
use crate::buddy::{BuddyArena, FreeAreaDump};
use crate::{AllocError, AllocResult};

/// Buddy arena behind a `SpinNoIrq` lock
///
/// Can be placed in a `static` and initialized later. Until [`init`] has
/// succeeded, allocation fails with `OutOfMemory` and free with
/// `InvalidFree`.
///
/// [`init`]: LockedBuddyArena::init
pub struct LockedBuddyArena<
    const MIN_ORDER: usize = { crate::DEFAULT_MIN_ORDER },
    const MAX_ORDER: usize = { crate::DEFAULT_MAX_ORDER },
> {
    inner: SpinNoIrq<BuddyArena<MIN_ORDER, MAX_ORDER>>,
}

impl<const MIN_ORDER: usize, const MAX_ORDER: usize> LockedBuddyArena<MIN_ORDER, MAX_ORDER> {
    pub const fn new() -> Self {
        Self {
            inner: SpinNoIrq::new(BuddyArena::new()),
        }
    }

    /// Initialize the arena at `base_addr`, discarding any previous state
    pub fn init(&self, base_addr: usize) -> AllocResult {
        self.inner.lock().init(base_addr)
    }

    /// Whether the arena has been initialized, through [`init`] or
    /// [`with_arena`]
    ///
    /// [`init`]: LockedBuddyArena::init
    /// [`with_arena`]: LockedBuddyArena::with_arena
    pub fn is_initialized(&self) -> bool {
        self.inner.lock().is_initialized()
    }

    /// Allocate a block of at least `size` bytes
    pub fn alloc(&self, size: usize) -> AllocResult<usize> {
        let mut arena = self.inner.lock();
        if !arena.is_initialized() {
            warn!("locked arena: allocation before initialization");
            return Err(AllocError::OutOfMemory);
        }
        arena.alloc(size)
    }

    /// Release the block starting at `addr`
    pub fn free(&self, addr: usize) -> AllocResult {
        let mut arena = self.inner.lock();
        if !arena.is_initialized() {
            warn!("locked arena: free of {:#x} before initialization", addr);
            return Err(AllocError::InvalidFree);
        }
        arena.free(addr)
    }

    pub fn dump(&self) -> FreeAreaDump {
        self.inner.lock().dump()
    }

    pub fn allocation_size(&self, addr: usize) -> AllocResult<usize> {
        self.inner.lock().allocation_size(addr)
    }

    pub fn free_bytes(&self) -> usize {
        self.inner.lock().free_bytes()
    }

    pub fn used_bytes(&self) -> usize {
        self.inner.lock().used_bytes()
    }

    #[cfg(feature = "tracking")]
    pub fn get_stats(&self) -> BuddyStats {
        self.inner.lock().get_stats()
    }

    /// Run `f` with exclusive access to the arena
    ///
    /// Several operations issued inside `f` are atomic as a group.
    pub fn with_arena<R>(&self, f: impl FnOnce(&mut BuddyArena<MIN_ORDER, MAX_ORDER>) -> R) -> R {
        f(&mut *self.inner.lock())
    }
}

impl<const MIN_ORDER: usize, const MAX_ORDER: usize> Default
    for LockedBuddyArena<MIN_ORDER, MAX_ORDER>
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: usize = 0x1000_0000;

    #[test]
    fn test_uninitialized() {
        let arena = LockedBuddyArena::<12, 16>::new();
        assert!(!arena.is_initialized());
        assert_eq!(arena.alloc(1), Err(AllocError::OutOfMemory));
        assert_eq!(arena.free(BASE), Err(AllocError::InvalidFree));
    }

    #[test]
    fn test_static_arena() {
        static ARENA: LockedBuddyArena<12, 16> = LockedBuddyArena::new();
        ARENA.init(BASE).unwrap();

        let a = ARENA.alloc(0x1000).unwrap();
        let b = ARENA.alloc(0x2000).unwrap();
        assert_ne!(a, b);
        assert_eq!(ARENA.allocation_size(a), Ok(0x1000));
        assert_eq!(ARENA.allocation_size(b), Ok(0x2000));
        assert_eq!(ARENA.used_bytes(), 0x3000);

        ARENA.free(a).unwrap();
        ARENA.free(b).unwrap();
        assert_eq!(ARENA.dump().count(16), 1);
        assert_eq!(ARENA.free_bytes(), 1 << 16);
    }

    #[test]
    fn test_with_arena_groups_operations() {
        let arena = LockedBuddyArena::<12, 16>::new();
        arena.init(BASE).unwrap();

        let (a, b) = arena.with_arena(|inner| {
            let a = inner.alloc(1).unwrap();
            let b = inner.alloc(1).unwrap();
            inner.check_invariants().unwrap();
            (a, b)
        });
        assert_eq!(b, a + 0x1000);
        arena.free(a).unwrap();
        arena.free(b).unwrap();
        arena.with_arena(|inner| inner.check_invariants()).unwrap();
    }

    #[test]
    fn test_init_through_with_arena() {
        let arena = LockedBuddyArena::<12, 16>::new();
        arena.with_arena(|inner| inner.init(BASE)).unwrap();

        assert!(arena.is_initialized());
        let addr = arena.alloc(1).unwrap();
        assert_eq!(addr, BASE);
        arena.free(addr).unwrap();
        assert_eq!(arena.dump().count(16), 1);
    }
}
