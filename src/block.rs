use std::{cmp, mem, ptr::NonNull};

use log::{debug, trace};

/// Header size of a block. Content starts right after it.
pub(crate) const BLOCK_HEADER_SIZE: usize = mem::size_of::<Header>();

/// The minimun capacity we hand out or leave behind after a split. Smaller
/// fragments could barely hold anything useful past their header.
pub(crate) const BLOCK_MIN_CAPACITY: usize = 24;

/// This is the metadata written in front of every block. Content is placed
/// immediately after it.
///
/// ```text
/// +---------------------+ <------+
/// |        next         |        |
/// +---------------------+        |
/// |      capacity       |        | -> Header
/// +---------------------+        |
/// |    is_free (1b)     |        |
/// +---------------------+ <------+
/// |       Content       |        |
/// |         ...         |        | -> `capacity` addressable bytes
/// |         ...         |        |
/// +---------------------+ <------+
/// |     next Header     |
/// ```
///
/// Blocks of the same region follow each other without gaps, so the header
/// of a block's successor normally sits at `content + capacity`. The only
/// exception is the first block of a region that could not be placed right
/// after the previous one.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct Header {
    /// Next block in address order, `None` for the last one.
    pub next: Option<Block>,
    /// Usable bytes, header excluded.
    pub capacity: usize,
    /// Flag to tell whether the block is free or not.
    pub is_free: bool,
}

/// Handle to a block header living inside a mapped region.
///
/// A `Block` is only ever built from a header written by [`Block::init`], so
/// every accessor below reads initialized memory. Headers may sit at any
/// byte offset, which is why they are always copied in and out unaligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Block(NonNull<Header>);

impl Block {
    /// Writes a free block spanning `size` bytes (header included) at `addr`.
    ///
    /// **SAFETY**: `addr..addr + size` must be mapped, writable and owned by
    /// the heap, and `size` must be at least [`BLOCK_HEADER_SIZE`].
    pub unsafe fn init(addr: NonNull<u8>, size: usize, next: Option<Block>) -> Block {
        debug_assert!(size >= BLOCK_HEADER_SIZE);

        let header = addr.cast::<Header>();
        unsafe {
            header.as_ptr().write_unaligned(Header {
                next,
                capacity: size - BLOCK_HEADER_SIZE,
                is_free: true,
            });
        }

        Block(header)
    }

    /// Recovers the block that owns `contents`.
    ///
    /// **SAFETY**: `contents` must have been produced by [`Block::contents`].
    pub unsafe fn from_contents(contents: NonNull<u8>) -> Block {
        unsafe { Block(contents.sub(BLOCK_HEADER_SIZE).cast()) }
    }

    #[inline]
    pub fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }

    #[inline]
    pub fn as_ptr(self) -> *mut u8 {
        self.0.as_ptr().cast()
    }

    /// First usable byte of the block.
    #[inline]
    pub fn contents(self) -> NonNull<u8> {
        unsafe { self.0.cast::<u8>().add(BLOCK_HEADER_SIZE) }
    }

    /// Address right past the usable bytes, where a contiguous successor starts.
    #[inline]
    pub fn after(self) -> *mut u8 {
        self.contents().as_ptr().wrapping_add(self.capacity())
    }

    #[inline]
    fn header(self) -> Header {
        unsafe { self.0.as_ptr().read_unaligned() }
    }

    #[inline]
    fn update(self, f: impl FnOnce(&mut Header)) {
        let mut header = self.header();
        f(&mut header);
        unsafe { self.0.as_ptr().write_unaligned(header) }
    }

    #[inline]
    pub fn next(self) -> Option<Block> {
        self.header().next
    }

    #[inline]
    pub fn capacity(self) -> usize {
        self.header().capacity
    }

    #[inline]
    pub fn is_free(self) -> bool {
        self.header().is_free
    }

    #[inline]
    pub fn set_free(self, is_free: bool) {
        self.update(|header| header.is_free = is_free);
    }

    #[inline]
    pub fn set_next(self, next: Option<Block>) {
        self.update(|header| header.next = next);
    }

    /// Tells whether `other` starts exactly where this block's content ends.
    #[inline]
    pub fn is_followed_by(self, other: Block) -> bool {
        self.after() == other.as_ptr()
    }

    /// A free block can be split for `query` bytes when the leftover still
    /// fits a header plus a minimum capacity block.
    fn splittable(header: &Header, query: usize) -> bool {
        header.is_free
            && query
                .checked_add(BLOCK_HEADER_SIZE + BLOCK_MIN_CAPACITY)
                .is_some_and(|needed| needed <= header.capacity)
    }

    /// Shrinks this block to `query` bytes (at least [`BLOCK_MIN_CAPACITY`])
    /// and turns the unused tail into a new free block.
    ///
    /// ```text
    /// before: | H | ............... capacity ............... | next ...
    /// after:  | H | .. query .. | H | .. capacity - query - H .. | next ...
    ///                            ^ tail, free
    /// ```
    ///
    /// Returns whether a split took place. The block is usable either way.
    pub fn split_if_too_big(self, query: usize) -> bool {
        let wanted = cmp::max(query, BLOCK_MIN_CAPACITY);
        let header = self.header();

        if !Self::splittable(&header, wanted) {
            return false;
        }

        let tail = unsafe {
            let tail_addr = self.contents().add(wanted);
            Block::init(tail_addr, header.capacity - wanted, header.next)
        };

        self.update(|header| {
            header.capacity = wanted;
            header.next = Some(tail);
        });

        trace!(
            "split block {:#x}: kept {} bytes, free tail {:#x} with {} bytes",
            self.addr(),
            wanted,
            tail.addr(),
            tail.capacity()
        );

        true
    }

    /// Absorbs the next block when both are free and contiguous.
    ///
    /// The successor's header and content become part of this block's
    /// capacity. Blocks from regions that are not adjacent are never merged.
    pub fn try_merge_with_next(self) -> bool {
        let header = self.header();

        let Some(next) = header.next else {
            return false;
        };

        let absorbed = next.header();

        if !(header.is_free && absorbed.is_free && self.is_followed_by(next)) {
            return false;
        }

        self.update(|header| {
            header.capacity += BLOCK_HEADER_SIZE + absorbed.capacity;
            header.next = absorbed.next;
        });

        debug!(
            "merged block {:#x} into {:#x}, capacity is now {}",
            next.addr(),
            self.addr(),
            self.capacity()
        );

        true
    }
}
