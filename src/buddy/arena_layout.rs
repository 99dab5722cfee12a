//! Arena geometry and address translation
//!
//! Stateless conversions between byte addresses, page indices and buddy
//! addresses for one arena.

use crate::{AllocError, AllocResult};

/// Geometry of a single arena: where it starts and how it is divided.
///
/// A block of order `o` at arena offset `k * 2^o` has its buddy at
/// offset `(k * 2^o) ^ 2^o`. The arena itself (order `max_order`) has none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaLayout {
    base_addr: usize,
    min_order: usize,
    max_order: usize,
}

impl ArenaLayout {
    /// Create a layout for an arena at `base_addr`.
    ///
    /// The caller guarantees `min_order <= max_order` and that
    /// `base_addr + 2^max_order` does not overflow.
    pub const fn new(base_addr: usize, min_order: usize, max_order: usize) -> Self {
        Self {
            base_addr,
            min_order,
            max_order,
        }
    }

    pub const fn base_addr(&self) -> usize {
        self.base_addr
    }

    /// One past the last arena byte.
    pub const fn end_addr(&self) -> usize {
        self.base_addr + self.arena_size()
    }

    pub const fn min_order(&self) -> usize {
        self.min_order
    }

    pub const fn max_order(&self) -> usize {
        self.max_order
    }

    pub const fn page_size(&self) -> usize {
        1 << self.min_order
    }

    pub const fn arena_size(&self) -> usize {
        1 << self.max_order
    }

    pub const fn page_count(&self) -> usize {
        1 << (self.max_order - self.min_order)
    }

    /// Number of pages in a block of `order`.
    pub const fn order_pages(&self, order: usize) -> usize {
        1 << (order - self.min_order)
    }

    /// Check if an address lies inside the arena
    pub const fn contains(&self, addr: usize) -> bool {
        addr >= self.base_addr && addr < self.end_addr()
    }

    /// Translate an address into the index of the page starting there.
    pub fn page_index(&self, addr: usize) -> AllocResult<usize> {
        if !self.contains(addr) {
            return Err(AllocError::OutOfRange);
        }
        let offset = addr - self.base_addr;
        if !crate::is_aligned(offset, self.page_size()) {
            return Err(AllocError::OutOfRange);
        }
        Ok(offset >> self.min_order)
    }

    /// Address of the first byte of page `index`.
    pub const fn page_addr(&self, index: usize) -> usize {
        self.base_addr + (index << self.min_order)
    }

    /// Address of the buddy of the `order` block at `addr`.
    pub fn buddy_addr(&self, addr: usize, order: usize) -> AllocResult<usize> {
        if order < self.min_order || order >= self.max_order || !self.contains(addr) {
            return Err(AllocError::OutOfRange);
        }
        Ok(self.base_addr + ((addr - self.base_addr) ^ (1 << order)))
    }

    /// Page-index form of [`buddy_addr`](Self::buddy_addr).
    ///
    /// `index` must head an `order` block and `order` must be below
    /// `max_order`.
    #[inline]
    pub const fn buddy_index(&self, index: usize, order: usize) -> usize {
        index ^ self.order_pages(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: usize = 0x8000_0000;

    fn layout() -> ArenaLayout {
        ArenaLayout::new(BASE, 12, 20)
    }

    #[test]
    fn test_geometry() {
        let layout = layout();
        assert_eq!(layout.page_size(), 0x1000);
        assert_eq!(layout.arena_size(), 0x10_0000);
        assert_eq!(layout.page_count(), 256);
        assert_eq!(layout.end_addr(), BASE + 0x10_0000);
        assert_eq!(layout.order_pages(12), 1);
        assert_eq!(layout.order_pages(15), 8);
    }

    #[test]
    fn test_page_index_round_trip() {
        let layout = layout();
        assert_eq!(layout.page_index(BASE), Ok(0));
        assert_eq!(layout.page_index(BASE + 0x5000), Ok(5));
        assert_eq!(layout.page_addr(255), BASE + 0xff000);
        assert_eq!(layout.page_index(layout.page_addr(37)), Ok(37));
    }

    #[test]
    fn test_page_index_rejects_bad_addresses() {
        let layout = layout();
        assert_eq!(layout.page_index(BASE - 0x1000), Err(AllocError::OutOfRange));
        assert_eq!(layout.page_index(layout.end_addr()), Err(AllocError::OutOfRange));
        assert_eq!(layout.page_index(BASE + 0x1001), Err(AllocError::OutOfRange));
    }

    #[test]
    fn test_buddy_addr() {
        let layout = layout();
        assert_eq!(layout.buddy_addr(BASE, 12), Ok(BASE + 0x1000));
        assert_eq!(layout.buddy_addr(BASE + 0x1000, 12), Ok(BASE));
        assert_eq!(layout.buddy_addr(BASE + 0x8_0000, 19), Ok(BASE));
        assert_eq!(layout.buddy_addr(BASE + 0x4000, 14), Ok(BASE));
        assert_eq!(layout.buddy_addr(BASE, 20), Err(AllocError::OutOfRange));
        assert_eq!(layout.buddy_addr(BASE, 11), Err(AllocError::OutOfRange));
        assert_eq!(layout.buddy_addr(BASE - 1, 12), Err(AllocError::OutOfRange));
    }

    #[test]
    fn test_buddy_symmetry() {
        let layout = layout();
        for order in 12..20 {
            let step = 1usize << order;
            let mut addr = BASE;
            while addr < layout.end_addr() {
                let buddy = layout.buddy_addr(addr, order).unwrap();
                assert_ne!(buddy, addr);
                assert_eq!(layout.buddy_addr(buddy, order), Ok(addr));

                let index = layout.page_index(addr).unwrap();
                assert_eq!(layout.page_addr(layout.buddy_index(index, order)), buddy);
                addr += step;
            }
        }
    }

    #[test]
    fn test_unaligned_base() {
        // Buddies are computed on offsets, so the base needs no alignment.
        let layout = ArenaLayout::new(0x1234_5000, 12, 16);
        assert_eq!(layout.buddy_addr(0x1234_5000, 15), Ok(0x1234_d000));
        assert_eq!(layout.page_index(0x1234_6000), Ok(1));
    }
}
