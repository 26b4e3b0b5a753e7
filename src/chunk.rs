//! Splitting oversized tables into transport-sized chunks.
//!
//! Outbound writes are bounded two ways: a caller-supplied row cap per
//! message, and a byte ceiling derived from the transport's message size
//! limit. Chunks are contiguous row ranges in original order, so the store
//! can append them to reconstruct the table.

use polars::prelude::DataFrame;

/// Per-message byte ceiling for the wire. Matches the message size limit
/// configured on frames servers.
pub const MAX_MESSAGE_SIZE: usize = 128 * 1024 * 1024;

/// The wire frame can run slightly larger than the columnar memory
/// footprint (field tags, string length prefixes), so size estimates are
/// padded before comparing against the ceiling.
const SIZE_SAFETY_MARGIN: f64 = 1.2;

/// Split by row count. `max_rows == 0` yields the whole table as a single
/// chunk; otherwise chunks hold `max_rows` rows each, the final one may be
/// shorter.
pub fn chunk_rows(df: &DataFrame, max_rows: usize) -> Vec<DataFrame> {
    let height = df.height();
    if max_rows == 0 || height <= max_rows {
        return vec![df.clone()];
    }

    let mut chunks = Vec::with_capacity(height.div_ceil(max_rows));
    let mut offset = 0usize;
    while offset < height {
        let len = max_rows.min(height - offset);
        chunks.push(df.slice(offset as i64, len));
        offset += len;
    }
    chunks
}

/// Split into the minimum number of equal-length chunks whose estimated
/// serialized size stays under `ceiling` bytes. `ceiling == 0` disables
/// byte-based chunking, mirroring the zero row cap of [`chunk_rows`].
pub fn chunk_bytes(df: &DataFrame, ceiling: usize) -> Vec<DataFrame> {
    if ceiling == 0 {
        return vec![df.clone()];
    }
    let estimated = estimated_wire_size(df);
    if estimated <= ceiling || df.height() == 0 {
        return vec![df.clone()];
    }

    let parts = estimated.div_ceil(ceiling);
    let rows_per_chunk = df.height().div_ceil(parts).max(1);
    chunk_rows(df, rows_per_chunk)
}

/// Estimated serialized size: in-memory footprint with a safety margin.
pub fn estimated_wire_size(df: &DataFrame) -> usize {
    (df.estimated_size() as f64 * SIZE_SAFETY_MARGIN) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn tall_df(rows: usize) -> DataFrame {
        let values: Vec<i64> = (0..rows as i64).collect();
        df!("n" => &values).unwrap()
    }

    #[test]
    fn zero_cap_yields_single_chunk() {
        let df = tall_df(10);
        let chunks = chunk_rows(&df, 0);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].equals(&df));
    }

    #[test]
    fn row_chunks_reassemble_in_order() {
        let df = tall_df(10);
        for cap in 1..=10 {
            let chunks = chunk_rows(&df, cap);
            assert!(chunks.iter().all(|c| c.height() <= cap));

            let mut whole = chunks[0].clone();
            for chunk in &chunks[1..] {
                whole.vstack_mut(chunk).unwrap();
            }
            assert!(whole.equals(&df), "cap {cap}");
        }
    }

    #[test]
    fn last_chunk_may_be_short() {
        let chunks = chunk_rows(&tall_df(10), 4);
        let heights: Vec<usize> = chunks.iter().map(|c| c.height()).collect();
        assert_eq!(heights, vec![4, 4, 2]);
    }

    #[test]
    fn byte_ceiling_splits_until_each_chunk_fits() {
        let df = tall_df(4096); // 32 KiB of i64 payload
        let ceiling = 8 * 1024;

        let chunks = chunk_bytes(&df, ceiling);
        // ~39 KiB padded estimate over an 8 KiB ceiling needs at least 3.
        assert!(chunks.len() >= 3, "got {} chunks", chunks.len());
        for chunk in &chunks {
            assert!(estimated_wire_size(chunk) <= ceiling);
        }

        let total: usize = chunks.iter().map(|c| c.height()).sum();
        assert_eq!(total, df.height());
    }

    #[test]
    fn zero_ceiling_disables_byte_chunking() {
        let df = tall_df(256);
        let chunks = chunk_bytes(&df, 0);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].equals(&df));
    }

    #[test]
    fn small_table_is_untouched_by_byte_ceiling() {
        let df = tall_df(4);
        let chunks = chunk_bytes(&df, MAX_MESSAGE_SIZE);
        assert_eq!(chunks.len(), 1);
    }
}
