//! Block interleaver.
//!
//! The receiver writes each block of `ROWS * COLS` bytes column by column
//! and reads it out row by row, so a burst of corrupted bytes on air lands
//! in different rows of the codeword. A final partial block of `n` bytes
//! fills only its first `n` cells in column order; the empty cells at the
//! end of the last columns are skipped on both sides, which keeps the
//! transform length-preserving.

/// Rows of one interleaver block.
pub const INTERLEAVER_ROWS: usize = 8;
/// Columns of one interleaver block.
pub const INTERLEAVER_COLS: usize = 16;
/// Bytes per full block.
pub const BLOCK_LEN: usize = INTERLEAVER_ROWS * INTERLEAVER_COLS;

/// Column-major cell indices in row-major visiting order, for a block
/// holding `occupied` bytes.
fn row_order(occupied: usize) -> impl Iterator<Item = usize> {
    (0..INTERLEAVER_ROWS)
        .flat_map(|row| (0..INTERLEAVER_COLS).map(move |col| col * INTERLEAVER_ROWS + row))
        .filter(move |&cell| cell < occupied)
}

/// Interleave `data` block by block (row-major write, column-major read).
pub fn interleave(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for block in data.chunks(BLOCK_LEN) {
        let mut columns = vec![0u8; block.len()];
        for (byte, cell) in block.iter().zip(row_order(block.len())) {
            columns[cell] = *byte;
        }
        out.extend_from_slice(&columns);
    }
    out
}

/// Undo [`interleave`] (column-major write, row-major read).
pub fn deinterleave(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for block in data.chunks(BLOCK_LEN) {
        out.extend(row_order(block.len()).map(|cell| block[cell]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_full_block_reads_columns() {
        let data = ramp(BLOCK_LEN);
        let out = interleave(&data);
        // First output bytes are column 0 of each row
        assert_eq!(out[0], 0);
        assert_eq!(out[1], INTERLEAVER_COLS as u8);
        assert_eq!(out[2], 2 * INTERLEAVER_COLS as u8);
        assert_eq!(out[INTERLEAVER_ROWS], 1);
    }

    #[test]
    fn test_deinterleave_inverts_any_length() {
        for len in [0, 1, 7, 16, 17, 127, 128, 129, 200, 255] {
            let data = ramp(len);
            let mixed = interleave(&data);
            assert_eq!(mixed.len(), len);
            assert_eq!(deinterleave(&mixed), data, "length {}", len);
        }
    }

    #[test]
    fn test_partial_block_fills_columns_first() {
        // 20 bytes: columns 0 and 1 full (8 each), column 2 holds 4
        let received = ramp(20);
        let expected = [
            0, 8, 16, 1, 9, 17, 2, 10, 18, 3, 11, 19, 4, 12, 5, 13, 6, 14, 7, 15,
        ];
        assert_eq!(deinterleave(&received), expected);
        assert_eq!(interleave(&expected), received);
    }

    #[test]
    fn test_partial_tail_after_full_block() {
        let data = ramp(BLOCK_LEN + 20);
        let mixed = interleave(&data);
        // Tail column 0 holds tail bytes 0, 3, 6, ...
        assert_eq!(mixed[BLOCK_LEN], data[BLOCK_LEN]);
        assert_eq!(mixed[BLOCK_LEN + 1], data[BLOCK_LEN + 3]);
        assert_eq!(mixed[BLOCK_LEN + 8], data[BLOCK_LEN + 1]);
    }

    #[test]
    fn test_burst_is_spread_across_rows() {
        let data = vec![0u8; BLOCK_LEN];
        let mut mixed = interleave(&data);
        // Corrupt one full column-read run of ROWS consecutive bytes
        for byte in mixed.iter_mut().take(INTERLEAVER_ROWS) {
            *byte = 0xAA;
        }
        let restored = deinterleave(&mixed);
        for row in restored.chunks(INTERLEAVER_COLS) {
            assert_eq!(row.iter().filter(|&&b| b == 0xAA).count(), 1);
        }
    }
}
