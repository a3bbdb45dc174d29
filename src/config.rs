/// Address where the heap tries to place its first region.
pub const HEAP_START: usize = 0x0404_0000;

/// Smallest region ever requested from the page source, in bytes.
pub const REGION_MIN_SIZE: usize = 2 * 4096;

/// Placement and sizing knobs of a [`crate::Heap`].
///
/// ```
/// use firstfit::HeapConfig;
///
/// let config = HeapConfig::new()
///     .with_start(0x1000_0000)
///     .with_min_region_size(64 * 1024);
///
/// assert_eq!(config.start, 0x1000_0000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
    /// Address hint for the very first region.
    pub start: usize,
    /// Every region is at least this big, even for tiny requests.
    pub min_region_size: usize,
}

impl HeapConfig {
    pub const fn new() -> Self {
        Self {
            start: HEAP_START,
            min_region_size: REGION_MIN_SIZE,
        }
    }

    pub const fn with_start(mut self, start: usize) -> Self {
        self.start = start;
        self
    }

    pub const fn with_min_region_size(mut self, min_region_size: usize) -> Self {
        self.min_region_size = min_region_size;
        self
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::new()
    }
}
