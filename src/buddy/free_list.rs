//! Per-order free lists linked through the page table
//!
//! Each list only keeps its head and length; the `prev`/`next` links live in
//! the page descriptors, so insertion, removal by identity and pop-front are
//! all O(1) and need no node storage of their own.

#[cfg(feature = "log")]
use log::{error, warn};

use super::page_table::{PageState, PageTable};
use crate::MAX_SUPPORTED_ORDER;

/// Number of list slots, one per representable order.
const ORDER_SLOTS: usize = MAX_SUPPORTED_ORDER + 1;

/// Head of one index-linked free list
#[derive(Debug, Clone, Copy)]
struct FreeList {
    head: Option<usize>,
    len: usize,
}

impl FreeList {
    const fn new() -> Self {
        Self { head: None, len: 0 }
    }
}

/// One free list per order
///
/// Entry `o` holds the page indices heading free blocks of `2^o` bytes.
/// Every operation keeps the descriptor state in step with list membership:
/// a page is `Free` at `o` exactly while it is linked into list `o`.
pub struct FreeListRegistry {
    lists: [FreeList; ORDER_SLOTS],
}

impl FreeListRegistry {
    /// Create a registry with all lists empty
    pub const fn new() -> Self {
        Self {
            lists: [const { FreeList::new() }; ORDER_SLOTS],
        }
    }

    /// Forget every list. Descriptors are not touched.
    pub fn clear(&mut self) {
        for list in &mut self.lists {
            *list = FreeList::new();
        }
    }

    /// Push page `index` onto the front of the list for `order`
    pub fn insert_head(&mut self, pages: &mut PageTable, order: usize, index: usize) -> bool {
        let Some(list) = self.lists.get_mut(order) else {
            error!(
                "free list: order {} exceeds maximum order {}",
                order, MAX_SUPPORTED_ORDER
            );
            return false;
        };
        let old_head = list.head;

        match pages.get_mut(index) {
            Some(page) if page.state() == PageState::Untracked => {
                page.prev = None;
                page.next = old_head;
                page.mark_free(order);
            }
            Some(page) => {
                error!(
                    "free list: page {} is already tracked as {:?} at order {}",
                    index,
                    page.state(),
                    page.order()
                );
                return false;
            }
            None => {
                error!("free list: invalid page index {}", index);
                return false;
            }
        }

        if let Some(head) = old_head {
            if let Some(head_page) = pages.get_mut(head) {
                head_page.prev = Some(index);
            }
        }
        list.head = Some(index);
        list.len += 1;
        true
    }

    /// Unlink page `index` from the list for `order`
    ///
    /// Refuses pages that are not registered free at exactly `order`.
    pub fn remove(&mut self, pages: &mut PageTable, order: usize, index: usize) -> bool {
        let Some(list) = self.lists.get_mut(order) else {
            return false;
        };

        let (prev, next) = match pages.get(index) {
            Some(page) if page.is_free_at(order) => (page.prev, page.next),
            _ => {
                warn!(
                    "free list: page {} is not registered at order {}",
                    index, order
                );
                return false;
            }
        };

        match prev {
            Some(prev) => {
                if let Some(prev_page) = pages.get_mut(prev) {
                    prev_page.next = next;
                }
            }
            None => list.head = next,
        }
        if let Some(next) = next {
            if let Some(next_page) = pages.get_mut(next) {
                next_page.prev = prev;
            }
        }
        if let Some(page) = pages.get_mut(index) {
            page.mark_untracked();
        }
        list.len -= 1;
        true
    }

    /// Pop the first page of the list for `order`
    pub fn pop_front(&mut self, pages: &mut PageTable, order: usize) -> Option<usize> {
        let head = self.lists.get(order)?.head?;
        if self.remove(pages, order, head) {
            Some(head)
        } else {
            error!("free list: head page {} of order {} is corrupted", head, order);
            None
        }
    }

    /// Check if the list for `order` is empty
    pub fn is_empty(&self, order: usize) -> bool {
        self.len(order) == 0
    }

    /// Number of free blocks registered at `order`
    pub fn len(&self, order: usize) -> usize {
        self.lists.get(order).map_or(0, |list| list.len)
    }

    /// Iterate over the page indices registered at `order`
    pub fn iter<'a>(&self, pages: &'a PageTable, order: usize) -> FreeListIter<'a> {
        FreeListIter {
            pages,
            current: self.lists.get(order).and_then(|list| list.head),
        }
    }
}

impl Default for FreeListRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over one free list
pub struct FreeListIter<'a> {
    pages: &'a PageTable,
    current: Option<usize>,
}

impl Iterator for FreeListIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.current?;
        self.current = self.pages.get(index).and_then(|page| page.next);
        Some(index)
    }
}
