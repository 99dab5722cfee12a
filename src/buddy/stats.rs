//! Statistics and debugging for buddy allocator
//!
//! Provides the per-order free block census, detailed statistics tracking
//! and failure reporting.

use alloc::vec::Vec;
use core::fmt;

#[cfg(feature = "tracking")]
use crate::MAX_SUPPORTED_ORDER;

/// Number of free blocks registered at one order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderCount {
    pub order: usize,
    pub free_blocks: usize,
}

impl OrderCount {
    /// Block size in bytes for this order
    pub const fn block_size(&self) -> usize {
        1 << self.order
    }
}

/// Snapshot of every free list, ordered from the smallest order up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeAreaDump {
    entries: Vec<OrderCount>,
}

impl FreeAreaDump {
    pub(crate) fn new(entries: Vec<OrderCount>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[OrderCount] {
        &self.entries
    }

    /// Free block count at `order`, zero for orders outside the arena
    pub fn count(&self, order: usize) -> usize {
        self.entries
            .iter()
            .find(|entry| entry.order == order)
            .map_or(0, |entry| entry.free_blocks)
    }

    /// Total free bytes across all orders
    pub fn free_bytes(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| entry.free_blocks * entry.block_size())
            .sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.entries
            .iter()
            .map(|entry| (entry.order, entry.free_blocks))
    }
}

/// Renders `"<count>:<size>K "` per order, or `"<count>:<size>B "` for
/// blocks smaller than 1 KiB.
impl fmt::Display for FreeAreaDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            let size = entry.block_size();
            if size < 1024 {
                write!(f, "{}:{}B ", entry.free_blocks, size)?;
            } else {
                write!(f, "{}:{}K ", entry.free_blocks, size / 1024)?;
            }
        }
        Ok(())
    }
}

/// Buddy system statistics
#[cfg(feature = "tracking")]
#[derive(Debug, Clone, Copy)]
pub struct BuddyStats {
    pub total_pages: usize,
    pub free_pages: usize,
    pub used_pages: usize,
    /// Live allocations (allocated block heads)
    pub allocations: usize,
    pub free_blocks_by_order: [usize; MAX_SUPPORTED_ORDER + 1],
}

#[cfg(feature = "tracking")]
impl Default for BuddyStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "tracking")]
impl BuddyStats {
    pub const fn new() -> Self {
        Self {
            total_pages: 0,
            free_pages: 0,
            used_pages: 0,
            allocations: 0,
            free_blocks_by_order: [0; MAX_SUPPORTED_ORDER + 1],
        }
    }
}

/// Detailed memory statistics reporter
#[cfg(feature = "tracking")]
pub struct MemoryStatsReporter;

#[cfg(feature = "tracking")]
impl MemoryStatsReporter {
    /// Print detailed allocation failure statistics
    #[allow(unused_variables)]
    pub fn print_alloc_failure_stats(
        min_order: usize,
        max_order: usize,
        stats: &BuddyStats,
        request_bytes: usize,
        request_order: usize,
    ) {
        #[cfg(feature = "log")]
        use log::error;

        let page_size = 1usize << min_order;
        error!("========================================");
        error!(
            "Request: {} bytes (order {}, {} KB block)",
            request_bytes,
            request_order,
            (1usize << request_order) / 1024
        );
        error!("Arena State:");
        error!(
            "  Total pages: {} ({} KB)",
            stats.total_pages,
            (stats.total_pages * page_size) / 1024
        );
        error!(
            "  Free pages: {} ({} KB)",
            stats.free_pages,
            (stats.free_pages * page_size) / 1024
        );
        error!(
            "  Used pages: {} ({} KB) in {} allocations",
            stats.used_pages,
            (stats.used_pages * page_size) / 1024,
            stats.allocations
        );
        error!("  Free blocks by order:");
        for order in (min_order..=max_order).rev() {
            let count = stats.free_blocks_by_order[order];
            if count > 0 {
                let block_size = 1usize << order;
                error!(
                    "    Order {}: {} blocks ({} KB each, {} KB total)",
                    order,
                    count,
                    block_size / 1024,
                    (count * block_size) / 1024
                );
            }
        }
        error!("========================================");
    }
}
