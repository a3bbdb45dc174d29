use std::{cmp, fmt, ptr::NonNull};

use log::{debug, trace};

use crate::{
    block::{BLOCK_HEADER_SIZE, BLOCK_MIN_CAPACITY, Block},
    chain::{self, Search},
    config::HeapConfig,
    error::{HeapError, Result},
    kernel::{Kernel, PageSource},
    region::{self, Region},
    utils::{WORD, align},
};

/// A first-fit heap carved out of pages from a [`PageSource`].
///
/// The heap keeps one address ordered chain of blocks. Allocation walks it
/// from the origin and takes the first free block that is big enough,
/// splitting off whatever is left. When nothing fits, a new region is
/// mapped right after the last block and merged with it when possible.
/// Releasing a block merges it with every free block that follows it.
///
/// ```text
///  origin
///    |
/// +--v--------+-----------+---------------------------+     +----------------+
/// | H | taken | H | free  | H |         free          | --> | H |   free     |
/// +-----------+-----------+---------------------------+     +----------------+
///                  region 1                                     region 2
/// ```
///
/// Memory is never given back to the page source. A `Heap` is meant to be
/// used from a single thread and is neither `Send` nor `Sync`.
pub struct Heap<P: PageSource = Kernel> {
    source: P,
    config: HeapConfig,
    /// First block of the chain, set once by a successful [`Heap::init`].
    origin: Option<Block>,
}

/// Snapshot of one block of the chain. See [`Heap::blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Address of the block header.
    pub addr: usize,
    /// First usable byte, the pointer [`Heap::allocate`] hands out.
    pub contents: NonNull<u8>,
    /// Usable bytes, header excluded.
    pub capacity: usize,
    pub is_free: bool,
}

impl BlockInfo {
    fn of(block: Block) -> Self {
        Self {
            addr: block.addr(),
            contents: block.contents(),
            capacity: block.capacity(),
            is_free: block.is_free(),
        }
    }
}

/// Iterator returned by [`Heap::blocks`].
pub struct Blocks<'a> {
    iter: chain::Iter<'a>,
}

impl Iterator for Blocks<'_> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(BlockInfo::of)
    }
}

impl Heap<Kernel> {
    /// Heap backed by the operating system with the default configuration.
    pub fn os() -> Self {
        Self::new(Kernel::new(), HeapConfig::default())
    }
}

impl Default for Heap<Kernel> {
    fn default() -> Self {
        Self::os()
    }
}

impl<P: PageSource> Heap<P> {
    /// Creates an empty heap. Nothing is mapped until [`Heap::init`].
    pub const fn new(source: P, config: HeapConfig) -> Self {
        Self {
            source,
            config,
            origin: None,
        }
    }

    #[inline]
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Address of the first region, once the heap is initialized.
    #[inline]
    pub fn origin(&self) -> Option<NonNull<u8>> {
        self.origin.and_then(|block| NonNull::new(block.as_ptr()))
    }

    /// Maps the first region at [`HeapConfig::start`] (or wherever the page
    /// source puts it) and returns its base address.
    ///
    /// Calling it again on an initialized heap returns the same address.
    /// After a failure the heap stays empty and `init` can be retried.
    pub fn try_init(&mut self, initial: usize) -> Result<NonNull<u8>> {
        if let Some(origin) = self.origin() {
            return Ok(origin);
        }

        let hint = self.config.start as *mut u8;
        let region = Region::alloc(&mut self.source, hint, initial, self.config.min_region_size)?;

        self.origin = Some(region.block);

        debug!("heap initialized at {:p} with {} bytes", region.addr, region.size);

        Ok(region.addr)
    }

    /// Same as [`Heap::try_init`], `None` on failure.
    pub fn init(&mut self, initial: usize) -> Option<NonNull<u8>> {
        self.try_init(initial).ok()
    }

    /// Capacity actually reserved for a request of `size` bytes.
    fn request_size(size: usize) -> Result<usize> {
        align(cmp::max(size, BLOCK_MIN_CAPACITY), WORD)
            .filter(|query| *query <= isize::MAX as usize)
            .ok_or(HeapError::TooLarge { size })
    }

    /// Allocates at least `size` bytes and returns a word aligned pointer to
    /// them.
    ///
    /// Fails with [`HeapError::Uninitialized`] before [`Heap::init`], and with
    /// [`HeapError::Map`] when the heap has to grow but no pages are left. A
    /// failed growth leaves the heap exactly as it was.
    pub fn try_allocate(&mut self, size: usize) -> Result<NonNull<u8>> {
        let query = Self::request_size(size)?;

        let block = match chain::find_good_or_last(self.origin, query) {
            Search::Found(block) => block,
            Search::NotFound(last) => {
                // The new region needs room for its own header too.
                let needed = query
                    .checked_add(BLOCK_HEADER_SIZE)
                    .ok_or(HeapError::TooLarge { size })?;

                region::grow_heap(&mut self.source, last, needed, self.config.min_region_size)?
            }
            Search::Corrupted => return Err(HeapError::Uninitialized),
        };

        block.split_if_too_big(query);
        block.set_free(false);

        trace!("allocated {} bytes at {:#x}", block.capacity(), block.addr());

        Ok(block.contents())
    }

    /// Same as [`Heap::try_allocate`], `None` on failure.
    pub fn allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        self.try_allocate(size)
            .inspect_err(|err| debug!("allocation of {} bytes failed: {}", size, err))
            .ok()
    }

    /// Gives the block owning `ptr` back to the heap and merges it with the
    /// free blocks that follow it. A null pointer is ignored.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a pointer returned by [`Heap::allocate`] on this
    /// heap that has not been released yet.
    pub unsafe fn release(&mut self, ptr: *mut u8) {
        let Some(contents) = NonNull::new(ptr) else {
            return;
        };

        let block = unsafe { Block::from_contents(contents) };
        block.set_free(true);

        while block.try_merge_with_next() {}

        trace!("released block {:#x}, {} bytes free", block.addr(), block.capacity());
    }

    /// Usable bytes behind `ptr`, which may exceed what was requested.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live pointer returned by [`Heap::allocate`] on this heap.
    pub unsafe fn usable_size(&self, ptr: NonNull<u8>) -> usize {
        unsafe { Block::from_contents(ptr) }.capacity()
    }

    /// Walks every block of the heap in chain order.
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks {
            iter: chain::Iter::new(self.origin),
        }
    }

    /// Checks that no block is below the capacity floor and that no block
    /// runs into the one that follows it.
    pub fn validate(&self) -> Result<()> {
        for block in chain::Iter::new(self.origin) {
            if block.capacity() < BLOCK_MIN_CAPACITY {
                return Err(HeapError::Undersized {
                    addr: block.addr(),
                    capacity: block.capacity(),
                });
            }

            if let Some(next) = block.next() {
                let end = block.after() as usize;

                if next.addr() > block.addr() && next.addr() < end {
                    return Err(HeapError::Overlap {
                        addr: block.addr(),
                        next: next.addr(),
                    });
                }
            }
        }

        Ok(())
    }
}

impl<P: PageSource> fmt::Display for Heap<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>18} {:>12} {:>8}", "start", "capacity", "status")?;

        for block in self.blocks() {
            let status = if block.is_free { "free" } else { "taken" };
            writeln!(f, "{:>#18x} {:>12} {:>8}", block.addr, block.capacity, status)?;
        }

        Ok(())
    }
}
