//! Buddy arena allocator module
//!
//! This module provides a single-arena buddy system with:
//! - Address translation between bytes, pages and buddies
//! - A page descriptor table carrying block state and list links
//! - Index-linked per-order free lists
//! - Free block census and detailed statistics

pub mod arena_layout;
pub mod buddy_allocator;
pub mod free_list;
pub mod page_table;
pub mod stats;

pub use arena_layout::ArenaLayout;
pub use buddy_allocator::BuddyArena;
pub use free_list::{FreeListIter, FreeListRegistry};
pub use page_table::{PageDescriptor, PageState, PageTable};
#[cfg(feature = "tracking")]
pub use stats::BuddyStats;
pub use stats::{FreeAreaDump, OrderCount};
