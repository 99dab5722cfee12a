//! Fixed-arena buddy allocator
//!
//! Serves power-of-two blocks between `2^MIN_ORDER` and `2^MAX_ORDER` bytes
//! from a single arena. Allocation splits the smallest sufficient free block,
//! keeping the lower half and registering the upper half one order down;
//! free merges a block with its buddy for as long as the buddy is free at
//! exactly the same order.

use alloc::vec;

use crate::{AllocError, AllocResult, MAX_SUPPORTED_ORDER};

#[cfg(feature = "log")]
use log::{debug, error, info, trace, warn};

use super::{
    arena_layout::ArenaLayout,
    free_list::FreeListRegistry,
    page_table::{PageState, PageTable},
    stats::{FreeAreaDump, OrderCount},
};

#[cfg(feature = "tracking")]
use super::stats::{BuddyStats, MemoryStatsReporter};

/// Buddy allocator over one arena of `2^MAX_ORDER` bytes
///
/// All bookkeeping lives in the page table and the free-list registry; the
/// arena bytes themselves are never read or written, so the base address
/// may point at any memory the caller owns.
pub struct BuddyArena<
    const MIN_ORDER: usize = { crate::DEFAULT_MIN_ORDER },
    const MAX_ORDER: usize = { crate::DEFAULT_MAX_ORDER },
> {
    layout: ArenaLayout,
    pages: PageTable,
    free_lists: FreeListRegistry,
}

impl<const MIN_ORDER: usize, const MAX_ORDER: usize> BuddyArena<MIN_ORDER, MAX_ORDER> {
    const ORDERS_VALID: () = assert!(
        MIN_ORDER <= MAX_ORDER && MAX_ORDER <= MAX_SUPPORTED_ORDER,
        "buddy arena: orders must satisfy MIN_ORDER <= MAX_ORDER <= MAX_SUPPORTED_ORDER"
    );

    /// Size of a page, the smallest allocatable unit
    pub const PAGE_SIZE: usize = 1 << MIN_ORDER;

    /// Size of the whole arena
    pub const ARENA_SIZE: usize = 1 << MAX_ORDER;

    /// Create an allocator with no arena (uninitialized, must call init())
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::ORDERS_VALID;
        Self {
            layout: ArenaLayout::new(0, MIN_ORDER, MAX_ORDER),
            pages: PageTable::new(),
            free_lists: FreeListRegistry::new(),
        }
    }

    /// Take over the arena starting at `base_addr`
    ///
    /// The whole arena becomes a single free block of `MAX_ORDER`. Calling
    /// this again discards every allocation and starts over.
    pub fn init(&mut self, base_addr: usize) -> AllocResult {
        if base_addr.checked_add(Self::ARENA_SIZE).is_none() {
            error!(
                "buddy arena: arena at {:#x} with size {:#x} wraps the address space",
                base_addr,
                Self::ARENA_SIZE
            );
            return Err(AllocError::InvalidParam);
        }

        // The descriptor table is the only fallible step; nothing changes
        // until it has been rebuilt.
        let layout = ArenaLayout::new(base_addr, MIN_ORDER, MAX_ORDER);
        self.pages.init(layout.page_count())?;
        self.layout = layout;
        self.free_lists.clear();

        if !self.free_lists.insert_head(&mut self.pages, MAX_ORDER, 0) {
            return Err(AllocError::InvalidParam);
        }

        info!(
            "buddy arena: [{:#x}, {:#x}), {} pages of {:#x} bytes",
            self.layout.base_addr(),
            self.layout.end_addr(),
            self.layout.page_count(),
            Self::PAGE_SIZE
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        !self.pages.is_empty()
    }

    /// Geometry of the managed arena
    pub fn layout(&self) -> &ArenaLayout {
        &self.layout
    }

    pub fn page_table(&self) -> &PageTable {
        &self.pages
    }

    /// Smallest order whose block holds `size` bytes
    ///
    /// Zero-byte requests get one page. Requests beyond the arena fail with
    /// `RequestTooLarge` instead of being clamped.
    pub fn round_to_order(size: usize) -> AllocResult<usize> {
        let order = match size.max(1).checked_next_power_of_two() {
            Some(block_size) => (block_size.trailing_zeros() as usize).max(MIN_ORDER),
            None => return Err(AllocError::RequestTooLarge),
        };
        if order > MAX_ORDER {
            return Err(AllocError::RequestTooLarge);
        }
        Ok(order)
    }

    /// Allocate a block of at least `size` bytes
    ///
    /// Returns the address of a block of `2^round_to_order(size)` bytes.
    pub fn alloc(&mut self, size: usize) -> AllocResult<usize> {
        let order = match Self::round_to_order(size) {
            Ok(order) => order,
            Err(e) => {
                warn!(
                    "buddy arena: request of {} bytes exceeds arena size {:#x}",
                    size,
                    Self::ARENA_SIZE
                );
                return Err(e);
            }
        };

        let Some(mut free_order) = (order..=MAX_ORDER).find(|&o| !self.free_lists.is_empty(o))
        else {
            debug!(
                "buddy arena: allocation failure: {} bytes (order {})",
                size, order
            );
            #[cfg(feature = "tracking")]
            MemoryStatsReporter::print_alloc_failure_stats(
                MIN_ORDER,
                MAX_ORDER,
                &self.get_stats(),
                size,
                order,
            );
            return Err(AllocError::OutOfMemory);
        };

        let Some(index) = self.free_lists.pop_front(&mut self.pages, free_order) else {
            return Err(AllocError::OutOfMemory);
        };

        // Split down to the requested order, keeping the lower half
        while free_order > order {
            free_order -= 1;
            let upper = index + self.layout.order_pages(free_order);
            let inserted = self.free_lists.insert_head(&mut self.pages, free_order, upper);
            debug_assert!(inserted, "upper half page {} was already tracked", upper);
            trace!(
                "buddy arena: split order {}: keep page {}, free page {}",
                free_order + 1,
                index,
                upper
            );
        }

        if let Some(page) = self.pages.get_mut(index) {
            page.mark_allocated(order);
        }
        Ok(self.layout.page_addr(index))
    }

    /// Release the block starting at `addr`
    ///
    /// Fails with `InvalidFree` without touching any state if `addr` does
    /// not head a live allocation (misaligned, outside the arena, interior
    /// page, or already freed).
    pub fn free(&mut self, addr: usize) -> AllocResult {
        let Ok(mut index) = self.layout.page_index(addr) else {
            warn!(
                "buddy arena: free of {:#x} outside arena [{:#x}, {:#x}) or not page aligned",
                addr,
                self.layout.base_addr(),
                self.layout.end_addr()
            );
            return Err(AllocError::InvalidFree);
        };

        let mut order = match self.pages.get_mut(index) {
            Some(page) if page.is_allocated() => {
                let order = page.order();
                page.mark_untracked();
                order
            }
            _ => {
                warn!(
                    "buddy arena: free of {:#x} which is not an allocated block (double free?)",
                    addr
                );
                return Err(AllocError::InvalidFree);
            }
        };

        while order < MAX_ORDER {
            let buddy = self.layout.buddy_index(index, order);
            let mergeable = self
                .pages
                .get(buddy)
                .is_some_and(|page| page.is_free_at(order));
            if !mergeable || !self.free_lists.remove(&mut self.pages, order, buddy) {
                break;
            }
            trace!(
                "buddy arena: merge pages {} and {} at order {}",
                index,
                buddy,
                order
            );
            index = index.min(buddy);
            order += 1;
        }

        let inserted = self.free_lists.insert_head(&mut self.pages, order, index);
        debug_assert!(inserted, "merged head page {} was already tracked", index);
        Ok(())
    }

    /// Free block census per order, from `MIN_ORDER` to `MAX_ORDER`
    pub fn dump(&self) -> FreeAreaDump {
        FreeAreaDump::new(
            (MIN_ORDER..=MAX_ORDER)
                .map(|order| OrderCount {
                    order,
                    free_blocks: self.free_lists.len(order),
                })
                .collect(),
        )
    }

    /// Addresses of the free blocks registered at `order`
    pub fn free_blocks(&self, order: usize) -> impl Iterator<Item = usize> + '_ {
        self.free_lists
            .iter(&self.pages, order)
            .map(|index| self.layout.page_addr(index))
    }

    /// Size of the live allocation starting at `addr`
    pub fn allocation_size(&self, addr: usize) -> AllocResult<usize> {
        let index = self.layout.page_index(addr)?;
        match self.pages.get(index) {
            Some(page) if page.is_allocated() => Ok(1 << page.order()),
            _ => Err(AllocError::InvalidFree),
        }
    }

    /// Whether `addr` is the start of a live allocation
    pub fn is_allocated(&self, addr: usize) -> bool {
        self.allocation_size(addr).is_ok()
    }

    pub fn total_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn total_bytes(&self) -> usize {
        self.pages.len() << MIN_ORDER
    }

    pub fn free_bytes(&self) -> usize {
        (MIN_ORDER..=MAX_ORDER)
            .map(|order| self.free_lists.len(order) << order)
            .sum()
    }

    pub fn used_bytes(&self) -> usize {
        self.total_bytes() - self.free_bytes()
    }

    /// Get statistics for this arena
    #[cfg(feature = "tracking")]
    pub fn get_stats(&self) -> BuddyStats {
        let mut stats = BuddyStats::new();
        stats.total_pages = self.pages.len();
        for order in MIN_ORDER..=MAX_ORDER {
            let block_count = self.free_lists.len(order);
            stats.free_blocks_by_order[order] = block_count;
            stats.free_pages += block_count * self.layout.order_pages(order);
        }
        stats.used_pages = stats.total_pages.saturating_sub(stats.free_pages);
        stats.allocations = self.pages.allocated_heads();
        stats
    }

    /// Walk the page table and every free list and verify their agreement
    ///
    /// Checks that each free list holds only aligned heads marked free at
    /// its order, that every tracked page heads exactly one block, and that
    /// free and allocated blocks tile the arena with no overlap.
    pub fn check_invariants(&self) -> Result<(), &'static str> {
        let page_count = self.pages.len();
        let mut covered = vec![false; page_count];
        let mut listed_heads = 0;

        for order in MIN_ORDER..=MAX_ORDER {
            let mut walked = 0;
            for index in self.free_lists.iter(&self.pages, order) {
                walked += 1;
                if walked > page_count {
                    return Err("free list cycle");
                }
                match self.pages.get(index) {
                    Some(page) if page.is_free_at(order) => {}
                    _ => return Err("listed page is not free at its list order"),
                }
                self.cover_block(&mut covered, index, order)?;
            }
            if walked != self.free_lists.len(order) {
                return Err("free list length mismatch");
            }
            listed_heads += walked;
        }

        let mut free_heads = 0;
        for page in self.pages.iter() {
            match page.state() {
                PageState::Free => free_heads += 1,
                PageState::Allocated => self.cover_block(&mut covered, page.index(), page.order())?,
                PageState::Untracked => {}
            }
        }
        if free_heads != listed_heads {
            return Err("free page missing from its free list");
        }
        if covered.iter().any(|&c| !c) {
            return Err("page covered by neither a free nor an allocated block");
        }
        Ok(())
    }

    fn cover_block(
        &self,
        covered: &mut [bool],
        index: usize,
        order: usize,
    ) -> Result<(), &'static str> {
        if !(MIN_ORDER..=MAX_ORDER).contains(&order) {
            return Err("block order out of range");
        }
        let block_pages = self.layout.order_pages(order);
        if index % block_pages != 0 || index + block_pages > covered.len() {
            return Err("misaligned block");
        }
        for (i, slot) in covered[index..index + block_pages].iter_mut().enumerate() {
            if *slot {
                return Err("overlapping blocks");
            }
            *slot = true;
            if i > 0
                && self
                    .pages
                    .get(index + i)
                    .is_some_and(|page| page.state() != PageState::Untracked)
            {
                return Err("tracked page inside a block");
            }
        }
        Ok(())
    }
}

impl<const MIN_ORDER: usize, const MAX_ORDER: usize> Default for BuddyArena<MIN_ORDER, MAX_ORDER> {
    fn default() -> Self {
        Self::new()
    }
}
