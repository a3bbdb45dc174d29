//! A first-fit heap allocator that manages its own pages.
//!
//! The heap asks a [`PageSource`] (normally the OS through [`Kernel`]) for
//! whole pages and carves them into blocks. Every block starts with a small
//! header and all blocks form one chain in address order:
//!
//! ```text
//! +----------------------+------------------------+----------------------------+
//! | next | cap | is_free | content ...            | next | cap | is_free | ... |
//! +----------------------+------------------------+----------------------------+
//!   header                ^ pointer handed out      next block header
//! ```
//!
//! * Allocation walks the chain and takes the first free block that is big
//!   enough, splitting off the unused tail as a new free block.
//! * When no block fits, a region is mapped right after the end of the heap.
//!   If it lands there it merges with a free last block, otherwise it lives
//!   as a separate region linked at the end of the chain.
//! * Releasing a block merges it with the free blocks that follow it. There
//!   is no backward merge.
//!
//! Pages are never given back. The heap is single threaded.
//!
//! ```rust,no_run
//! use firstfit::Heap;
//!
//! let mut heap = Heap::os();
//! heap.init(4096).expect("no pages for the heap");
//!
//! let ptr = heap.allocate(64).expect("out of memory");
//! unsafe {
//!     ptr.as_ptr().write_bytes(0, 64);
//!     heap.release(ptr.as_ptr());
//! }
//! ```

#[cfg(test)]
mod arena;
mod block;
mod chain;
mod config;
mod error;
mod heap;
mod kernel;
mod region;
mod utils;

pub use config::{HEAP_START, HeapConfig, REGION_MIN_SIZE};
pub use error::{HeapError, MapError, Result};
pub use heap::{BlockInfo, Blocks, Heap};
pub use kernel::{Kernel, PageSource};

/// Size of the metadata in front of every block, in bytes.
pub const HEADER_SIZE: usize = block::BLOCK_HEADER_SIZE;

/// No block ever holds fewer usable bytes than this.
pub const MIN_CAPACITY: usize = block::BLOCK_MIN_CAPACITY;
