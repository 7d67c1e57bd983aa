use std::fmt;

/// Largest window most log providers accept in a single `eth_getLogs` call.
pub const MAX_PAGE_SIZE: u64 = 10_000;

/// A half-open block interval `[from_block, to_block)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockWindow {
    pub from_block: u64,
    pub to_block: u64,
}

impl BlockWindow {
    pub fn len(&self) -> u64 {
        self.to_block - self.from_block
    }

    pub fn is_empty(&self) -> bool {
        self.from_block == self.to_block
    }

    /// Inclusive block bounds to put on the wire.
    ///
    /// With `inclusive_end` the upper bound is queried too, so consecutive
    /// windows overlap by one block.
    pub fn rpc_bounds(&self, inclusive_end: bool) -> (u64, u64) {
        if inclusive_end || self.is_empty() {
            (self.from_block, self.to_block)
        } else {
            (self.from_block, self.to_block - 1)
        }
    }
}

impl fmt::Display for BlockWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.from_block, self.to_block)
    }
}

/// Lazily walks `[start, end)` in `page_size` steps.
///
/// A clone continues from the same cursor; call [`paginate`] again to restart.
#[derive(Debug, Clone)]
pub struct Paginator {
    cursor: u64,
    end: u64,
    page_size: u64,
}

/// Splits `[start, end)` into contiguous, ascending windows of `page_size`
/// blocks, the last one clipped to `end`.
///
/// Callers must keep `page_size` within `1..=MAX_PAGE_SIZE`; a zero page
/// size yields nothing.
pub fn paginate(start: u64, end: u64, page_size: u64) -> Paginator {
    Paginator {
        cursor: start,
        end,
        page_size,
    }
}

impl Paginator {
    pub fn remaining_blocks(&self) -> u64 {
        self.end.saturating_sub(self.cursor)
    }
}

impl Iterator for Paginator {
    type Item = BlockWindow;

    fn next(&mut self) -> Option<BlockWindow> {
        if self.page_size == 0 || self.cursor >= self.end {
            return None;
        }

        let to_block = self.cursor.saturating_add(self.page_size).min(self.end);
        let window = BlockWindow {
            from_block: self.cursor,
            to_block,
        };
        self.cursor = to_block;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.page_size == 0 {
            return (0, Some(0));
        }
        let n = self.remaining_blocks().div_ceil(self.page_size);
        let n = usize::try_from(n).unwrap_or(usize::MAX);
        (n, Some(n))
    }
}
