// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ops::Range;

/// Per-algorithm minimum chunk sizes. Below the minimum the algorithms run
/// serially; above it the chunk size is `len / parts`, clamped up to the
/// minimum, so tiny inputs never fan out into per-element tasks.
pub(crate) const MIN_CHUNK_FOR_EACH: usize = 1;
pub(crate) const MIN_CHUNK_REDUCE: usize = 2;
pub(crate) const MIN_CHUNK_TRANSFORM: usize = 512;
pub(crate) const MIN_CHUNK_SORT: usize = 512;
pub(crate) const MIN_CHUNK_SCAN: usize = 1024;
pub(crate) const MIN_CHUNK_BITONIC: usize = 65535;

/// Splits `0..len` into contiguous chunks targeting `max_parts` pieces with
/// at least `min_chunk` elements each (except possibly the last). An empty
/// range yields no chunks.
pub(crate) fn split_range(len: usize, max_parts: usize, min_chunk: usize) -> Vec<Range<usize>> {
    debug_assert!(min_chunk > 0, "minimum chunk size must be positive");
    if len == 0 {
        return Vec::new();
    }

    let mut size = len / max_parts.max(1);
    if size < min_chunk {
        size = min_chunk;
    }

    let mut count = len / size;
    if count == 0 {
        count = 1;
    }
    if len > count * size {
        count += 1;
    }

    (0..count)
        .map(|part| part * size..((part + 1) * size).min(len))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_cover_the_range_exactly() {
        for len in [1_usize, 2, 7, 100, 1000, 1001] {
            for parts in [1_usize, 2, 4, 9] {
                for min_chunk in [1_usize, 2, 16] {
                    let chunks = split_range(len, parts, min_chunk);
                    assert_eq!(chunks.first().map(|chunk| chunk.start), Some(0));
                    assert_eq!(chunks.last().map(|chunk| chunk.end), Some(len));
                    for pair in chunks.windows(2) {
                        assert_eq!(pair[0].end, pair[1].start, "chunks must be contiguous");
                    }
                }
            }
        }
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(split_range(0, 4, 1).is_empty());
    }

    #[test]
    fn minimum_chunk_size_is_respected() {
        let chunks = split_range(100, 64, 16);
        // All but the last chunk hold at least the minimum.
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.len() >= 16);
        }
    }

    #[test]
    fn small_input_collapses_to_one_chunk() {
        let chunks = split_range(10, 4, 512);
        assert_eq!(chunks, vec![0..10]);
    }

    #[test]
    fn parts_target_is_roughly_honored() {
        let chunks = split_range(1000, 4, 1);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0], 0..250);
        assert_eq!(chunks[3], 750..1000);
    }
}
