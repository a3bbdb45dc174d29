//! Size arithmetic shared by the region and block code.

/// Machine word size. Every capacity handed to a caller is a multiple of it.
pub(crate) const WORD: usize = std::mem::size_of::<usize>();

/// It aligns `to_be_aligned` using `aligment`, which must be a power of two.
///
/// Returns `None` when the result would not fit in a `usize`.
pub(crate) fn align(to_be_aligned: usize, aligment: usize) -> Option<usize> {
    debug_assert!(aligment.is_power_of_two());

    to_be_aligned
        .checked_add(aligment - 1)
        .map(|padded| padded & !(aligment - 1))
}

/// Number of pages of size `page_size` needed to hold `bytes`.
pub(crate) fn pages_count(bytes: usize, page_size: usize) -> usize {
    bytes / page_size + usize::from(bytes % page_size > 0)
}

/// `bytes` rounded up to a whole number of pages.
pub(crate) fn round_pages(bytes: usize, page_size: usize) -> Option<usize> {
    pages_count(bytes, page_size).checked_mul(page_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_pointer_size() {
        let aligments = vec![(1..=8, 8), (9..=16, 16), (17..=24, 24), (25..=32, 32)];

        for (sizes, expected) in aligments {
            for size in sizes {
                assert_eq!(Some(expected), align(size, 8));
            }
        }
    }

    #[test]
    fn align_overflow_is_reported() {
        assert_eq!(None, align(usize::MAX, 8));
        assert_eq!(Some(0), align(0, 8));
    }

    #[test]
    fn round_to_pages() {
        // For testing purposes we are assuming the page size is 4096
        let aligments = vec![(1..=4096, 4096), (4097..=8192, 8192)];

        for (sizes, expected) in aligments {
            for size in sizes {
                assert_eq!(Some(expected), round_pages(size, 4096));
            }
        }

        assert_eq!(0, pages_count(0, 4096));
        assert_eq!(3, pages_count(8193, 4096));
        assert_eq!(None, round_pages(usize::MAX, 4096));
    }
}
