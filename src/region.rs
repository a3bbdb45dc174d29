use std::{cmp, ptr::NonNull};

use log::{debug, warn};

use crate::{
    block::Block,
    error::MapError,
    kernel::PageSource,
    utils::round_pages,
};

/// Result of one mapping call, already holding one free block that spans
/// the whole region.
///
/// A page source gives us memory in whole pages and we cannot assume two
/// regions are adjacent. When they happen to be, their blocks can merge and
/// the heap behaves as one contiguous span.
///
/// ```text
/// +-----------------------------------+-----------------------------------+      +---------------------------+
/// | +-------+    +-------+    +-----+ | +-------------------------------+ |      | +-------+    +-------+    |
/// | | Block | -> | Block | -> | ... |-|>|          Block (free)         |-|----->| | Block | -> | Block |    |
/// | +-------+    +-------+    +-----+ | +-------------------------------+ |      | +-------+    +-------+    |
/// +-----------------------------------+-----------------------------------+      +---------------------------+
///              region                      region (extends)                          region (relocated)
/// ```
#[derive(Debug, Clone, Copy)]
pub(crate) struct Region {
    /// Start of the mapping.
    pub addr: NonNull<u8>,
    /// Mapped bytes, a whole number of pages.
    pub size: usize,
    /// Whether the region landed exactly at the requested hint.
    pub extends: bool,
    /// The free block spanning the whole region.
    pub block: Block,
}

impl Region {
    /// Bytes actually mapped for a request of `query` bytes, always a whole
    /// number of pages.
    pub fn actual_size(query: usize, page_size: usize, min_size: usize) -> Option<usize> {
        round_pages(cmp::max(query, cmp::max(min_size, page_size)), page_size)
    }

    /// Maps a new region at `hint`, falling back to any address, and
    /// initializes it as one free block.
    pub fn alloc<P: PageSource>(
        source: &mut P,
        hint: *mut u8,
        query: usize,
        min_size: usize,
    ) -> Result<Region, MapError> {
        let size = Self::actual_size(query, source.page_size(), min_size)
            .ok_or(MapError::Refused { hint: hint as usize, len: query })?;

        let (addr, extends) = match source.map(hint, size, true) {
            Ok(addr) => (addr, true),
            Err(err) => {
                debug!("cannot place {} bytes at {:p} ({}), relocating", size, hint, err);

                let addr = source.map(hint, size, false).inspect_err(|err| {
                    warn!("page source failed to map {} bytes: {}", size, err);
                })?;

                (addr, false)
            }
        };

        // The mapping is ours and at least one minimum region long.
        let block = unsafe { Block::init(addr, size, None) };

        debug!("mapped region {:p} of {} bytes (extends: {})", addr, size, extends);

        Ok(Region { addr, size, extends, block })
    }
}

/// Maps a new region after `last` and links it into the chain.
///
/// If the region is contiguous with a free `last`, both merge and `last` is
/// returned. Otherwise the new region's block is returned as is.
pub(crate) fn grow_heap<P: PageSource>(
    source: &mut P,
    last: Block,
    query: usize,
    min_size: usize,
) -> Result<Block, MapError> {
    let region = Region::alloc(source, last.after(), query, min_size)?;
    let block = region.block;
    last.set_next(Some(block));

    debug!(
        "heap grown by {} bytes after block {:#x} (contiguous: {})",
        region.size,
        last.addr(),
        region.extends
    );

    if last.try_merge_with_next() {
        return Ok(last);
    }

    Ok(block)
}
