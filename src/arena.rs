//! In-memory page source for unit tests.
//!
//! Hands out pages from one pre-allocated, page aligned buffer so tests
//! control exactly where regions land and when mapping fails.

use std::{
    alloc::{self, Layout},
    ptr::NonNull,
};

use crate::{error::MapError, kernel::PageSource};

pub(crate) const PAGE_SIZE: usize = 4096;

/// Total bytes an arena can hand out.
pub(crate) const ARENA_SIZE: usize = 64 * PAGE_SIZE;

pub(crate) struct Arena {
    base: NonNull<u8>,
    /// Offset of the first byte never handed out.
    cursor: usize,
    refuse_exact: bool,
    /// Number of upcoming `map` calls that fail outright.
    failures: usize,
    /// Successful mappings so far.
    pub mapped: usize,
}

impl Arena {
    fn layout() -> Layout {
        Layout::from_size_align(ARENA_SIZE, PAGE_SIZE).unwrap()
    }

    pub fn new() -> Self {
        let base = NonNull::new(unsafe { alloc::alloc_zeroed(Self::layout()) })
            .unwrap_or_else(|| alloc::handle_alloc_error(Self::layout()));

        Self {
            base,
            cursor: 0,
            refuse_exact: false,
            failures: 0,
            mapped: 0,
        }
    }

    pub fn base(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    /// Address the next exact mapping must ask for to succeed.
    pub fn end(&self) -> *mut u8 {
        self.base.as_ptr().wrapping_add(self.cursor)
    }

    /// Every exact placement fails, as if the next pages were taken.
    pub fn refuse_exact(&mut self, refuse: bool) {
        self.refuse_exact = refuse;
    }

    pub fn fail_next(&mut self, calls: usize) {
        self.failures = calls;
    }

    pub fn fail_all(&mut self) {
        self.failures = usize::MAX;
    }

    fn take(&mut self, offset: usize, len: usize) -> Option<NonNull<u8>> {
        let end = offset.checked_add(len)?;
        if end > ARENA_SIZE {
            return None;
        }

        self.cursor = end;
        self.mapped += 1;

        Some(unsafe { self.base.add(offset) })
    }
}

unsafe impl PageSource for Arena {
    fn map(&mut self, hint: *mut u8, len: usize, exact: bool) -> Result<NonNull<u8>, MapError> {
        let refused = MapError::Refused { hint: hint as usize, len };

        if self.failures > 0 {
            self.failures -= 1;
            return Err(refused);
        }

        if exact {
            if self.refuse_exact || hint != self.end() {
                return Err(refused);
            }
            return self.take(self.cursor, len).ok_or(refused);
        }

        // Relocated mappings never touch the previous one.
        let offset = if self.cursor == 0 { 0 } else { self.cursor + PAGE_SIZE };
        self.take(offset, len).ok_or(refused)
    }

    fn page_size(&self) -> usize {
        PAGE_SIZE
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        unsafe { alloc::dealloc(self.base.as_ptr(), Self::layout()) }
    }
}
