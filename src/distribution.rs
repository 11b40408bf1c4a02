//! Row ownership across ranks and flat-range chunking across threads.
//!
//! Rows are split as evenly as possible: every rank gets `rows / size` rows
//! and the first `rows % size` ranks get one more. Offsets are prefix sums
//! of those counts, so partitions taken in rank order tile `[0, rows)`.

use std::ops::Range;

/// Number of rows owned by `rank` when `rows` are split across `size` ranks.
pub fn rows_for(rank: usize, rows: usize, size: usize) -> usize {
    let base = rows / size;
    if rank < rows % size {
        base + 1
    } else {
        base
    }
}

/// First global row owned by `rank`. `offset_for(size, rows, size) == rows`.
pub fn offset_for(rank: usize, rows: usize, size: usize) -> usize {
    let base = rows / size;
    let extra = rows % size;
    rank * base + rank.min(extra)
}

/// The contiguous block of rows one rank owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowPartition {
    pub rank: usize,
    pub offset: usize,
    pub rows: usize,
}

impl RowPartition {
    pub fn new(rank: usize, total_rows: usize, size: usize) -> Self {
        RowPartition {
            rank,
            offset: offset_for(rank, total_rows, size),
            rows: rows_for(rank, total_rows, size),
        }
    }

    /// Global row indices covered by this partition.
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

/// Partitions for every rank, in rank order.
pub fn partitions(rows: usize, size: usize) -> Vec<RowPartition> {
    (0..size).map(|rank| RowPartition::new(rank, rows, size)).collect()
}

/// Per-rank receive counts and displacements for a variable-count gather.
pub fn counts_and_displacements(rows: usize, size: usize) -> (Vec<usize>, Vec<usize>) {
    partitions(rows, size)
        .into_iter()
        .map(|p| (p.rows, p.offset))
        .unzip()
}

/// Split `[0, len)` into `parts` contiguous ranges of `ceil(len / parts)`
/// elements each. The last non-empty range takes whatever remains, and any
/// ranges past the end are empty.
pub fn chunk_ranges(len: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.max(1);
    let chunk = len.div_ceil(parts);
    (0..parts)
        .map(|t| {
            let start = (t * chunk).min(len);
            let end = (start + chunk).min(len);
            start..end
        })
        .collect()
}

/// Carve `data` into disjoint mutable pieces, one per range. The ranges must
/// be contiguous and start at zero, as produced by [`chunk_ranges`].
pub fn split_mut<'a, T>(mut data: &'a mut [T], ranges: &[Range<usize>]) -> Vec<&'a mut [T]> {
    let mut pieces = Vec::with_capacity(ranges.len());
    let mut consumed = 0;
    for range in ranges {
        debug_assert_eq!(range.start, consumed, "ranges must be contiguous");
        let (head, tail) = std::mem::take(&mut data).split_at_mut(range.len());
        pieces.push(head);
        data = tail;
        consumed = range.end;
    }
    pieces
}
