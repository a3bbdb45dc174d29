use thiserror::Error;

/// Failure reported by a [`crate::PageSource`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// The source could not provide `len` bytes at all.
    #[error("page source refused to map {len} bytes near {hint:#x}")]
    Refused { hint: usize, len: usize },

    /// An exact placement was demanded but the mapping would land elsewhere.
    #[error("mapping requested at {hint:#x} landed at {actual:#x}")]
    Misplaced { hint: usize, actual: usize },
}

/// Everything that can go wrong inside a [`crate::Heap`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
    #[error(transparent)]
    Map(#[from] MapError),

    /// The heap was searched before [`crate::Heap::init`] succeeded.
    #[error("heap has not been initialized")]
    Uninitialized,

    #[error("request of {size} bytes does not fit in the address space")]
    TooLarge { size: usize },

    #[error("block at {addr:#x} holds {capacity} bytes, below the block floor")]
    Undersized { addr: usize, capacity: usize },

    #[error("block at {addr:#x} runs past its successor at {next:#x}")]
    Overlap { addr: usize, next: usize },
}

pub type Result<T> = std::result::Result<T, HeapError>;
