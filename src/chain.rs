use std::marker::PhantomData;

use log::trace;

use crate::block::Block;

/// Outcome of walking the chain for a free block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Search {
    /// First free block, in address order, big enough for the request.
    Found(Block),
    /// Nothing fits; carries the last block so the heap can grow after it.
    NotFound(Block),
    /// There is no chain to search at all.
    Corrupted,
}

/// Iterator over a chain of blocks in address order, following `next`.
pub(crate) struct Iter<'a> {
    current: Option<Block>,
    marker: PhantomData<&'a Block>,
}

impl Iter<'_> {
    pub fn new(first: Option<Block>) -> Self {
        Self {
            current: first,
            marker: PhantomData,
        }
    }
}

impl Iterator for Iter<'_> {
    type Item = Block;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.current?;
        self.current = block.next();

        Some(block)
    }
}

/// First-fit search starting at `start`.
pub(crate) fn find_good_or_last(start: Option<Block>, size: usize) -> Search {
    let Some(first) = start else {
        return Search::Corrupted;
    };

    let mut last = first;

    for block in Iter::new(Some(first)) {
        if block.is_free() && block.capacity() >= size {
            trace!("block {:#x} fits {} bytes", block.addr(), size);
            return Search::Found(block);
        }
        last = block;
    }

    trace!("no block fits {} bytes, last block is {:#x}", size, last.addr());
    Search::NotFound(last)
}
