//! Page descriptor table
//!
//! Holds one descriptor per arena page. Descriptors carry the block state,
//! the block order and the free-list linkage, so list membership and buddy
//! state can be checked without scanning any list.

use alloc::vec::Vec;

#[cfg(feature = "log")]
use log::error;

use crate::{AllocError, AllocResult};

/// Role of a page in the buddy system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// Non-head member of a larger block, or a head in transit.
    Untracked,
    /// Head of a free block registered in the free list of its order.
    Free,
    /// Head of a live allocation.
    Allocated,
}

/// Per-page metadata
#[derive(Debug, Clone, Copy)]
pub struct PageDescriptor {
    index: usize,
    order: usize,
    state: PageState,
    pub(crate) prev: Option<usize>,
    pub(crate) next: Option<usize>,
}

impl PageDescriptor {
    const fn new(index: usize) -> Self {
        Self {
            index,
            order: 0,
            state: PageState::Untracked,
            prev: None,
            next: None,
        }
    }

    /// Stable page index assigned at init.
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Block order. Only meaningful while the page heads a block.
    pub const fn order(&self) -> usize {
        self.order
    }

    pub const fn state(&self) -> PageState {
        self.state
    }

    /// Whether the page heads a free block of exactly `order`.
    pub fn is_free_at(&self, order: usize) -> bool {
        self.state == PageState::Free && self.order == order
    }

    pub fn is_allocated(&self) -> bool {
        self.state == PageState::Allocated
    }

    pub(crate) fn mark_free(&mut self, order: usize) {
        self.state = PageState::Free;
        self.order = order;
    }

    pub(crate) fn mark_allocated(&mut self, order: usize) {
        self.state = PageState::Allocated;
        self.order = order;
    }

    pub(crate) fn mark_untracked(&mut self) {
        self.state = PageState::Untracked;
        self.prev = None;
        self.next = None;
    }
}

/// Descriptor table covering the whole arena
pub struct PageTable {
    pages: Vec<PageDescriptor>,
}

impl PageTable {
    /// Create an empty table (no pages, must call init())
    pub const fn new() -> Self {
        Self { pages: Vec::new() }
    }

    /// (Re)build the table with `page_count` untracked pages.
    ///
    /// Fails with `InvalidParam` if the descriptors cannot be allocated,
    /// in which case the current table is left untouched.
    pub fn init(&mut self, page_count: usize) -> AllocResult {
        let mut pages = Vec::new();
        if pages.try_reserve_exact(page_count).is_err() {
            error!(
                "page table: cannot allocate {} page descriptors",
                page_count
            );
            return Err(AllocError::InvalidParam);
        }
        pages.extend((0..page_count).map(PageDescriptor::new));
        self.pages = pages;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Get a descriptor by page index
    pub fn get(&self, index: usize) -> Option<&PageDescriptor> {
        self.pages.get(index)
    }

    /// Get a mutable descriptor by page index
    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut PageDescriptor> {
        self.pages.get_mut(index)
    }

    pub fn iter(&self) -> core::slice::Iter<'_, PageDescriptor> {
        self.pages.iter()
    }

    /// Count of pages heading live allocations
    pub fn allocated_heads(&self) -> usize {
        self.pages.iter().filter(|p| p.is_allocated()).count()
    }
}

impl Default for PageTable {
    fn default() -> Self {
        Self::new()
    }
}
