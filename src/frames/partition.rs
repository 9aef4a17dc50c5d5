//! Static, contiguous work partitioning
//!
//! `n` items over `parts` partitions: every partition gets `n / parts` items and
//! the first `n % parts` partitions get one extra. Concatenating the
//! partitions in index order reproduces the input.

use std::ops::Range;

/// Index range owned by partition `index` out of `parts`.
///
/// `parts == 0` is treated as a single partition.
pub fn partition_bounds(n: usize, parts: usize, index: usize) -> Range<usize> {
    let parts = parts.max(1);
    if index >= parts {
        return n..n;
    }

    let chunk = n / parts;
    let remainder = n % parts;

    if index < remainder {
        let start = index * (chunk + 1);
        start..start + chunk + 1
    } else {
        let start = index * chunk + remainder;
        start..start + chunk
    }
}

/// Split `items` into `parts` contiguous slices (some may be empty)
pub fn partition<T>(items: &[T], parts: usize) -> Vec<&[T]> {
    let parts = parts.max(1);
    (0..parts)
        .map(|index| &items[partition_bounds(items.len(), parts, index)])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_properties(n: usize, parts: usize) {
        let items: Vec<usize> = (0..n).collect();
        let chunks = partition(&items, parts);

        assert_eq!(chunks.len(), parts.max(1));

        let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(sizes.iter().sum::<usize>(), n, "n={n} parts={parts}");

        let max = sizes.iter().copied().max().unwrap_or(0);
        let min = sizes.iter().copied().min().unwrap_or(0);
        assert!(max - min <= 1, "unbalanced sizes {sizes:?}");

        // larger partitions come first
        assert!(sizes.windows(2).all(|w| w[0] >= w[1]), "{sizes:?}");

        // concatenation reproduces the input, so partitions are disjoint too
        let joined: Vec<usize> = chunks.concat();
        assert_eq!(joined, items);
    }

    #[test]
    fn test_partition_properties() {
        for n in 0..40 {
            for parts in 1..10 {
                check_properties(n, parts);
            }
        }
    }

    #[test]
    fn test_remainder_goes_to_first_partitions() {
        assert_eq!(partition_bounds(10, 3, 0), 0..4);
        assert_eq!(partition_bounds(10, 3, 1), 4..7);
        assert_eq!(partition_bounds(10, 3, 2), 7..10);
    }

    #[test]
    fn test_more_parts_than_items() {
        let items = ["a", "b"];
        let chunks = partition(&items, 4);
        assert_eq!(chunks, vec![&["a"][..], &["b"][..], &[][..], &[][..]]);
    }

    #[test]
    fn test_zero_parts_is_one_partition() {
        let items = [1, 2, 3];
        assert_eq!(partition(&items, 0), vec![&items[..]]);
        assert_eq!(partition_bounds(3, 0, 0), 0..3);
    }

    #[test]
    fn test_out_of_range_index_is_empty() {
        assert!(partition_bounds(5, 2, 7).is_empty());
    }
}
