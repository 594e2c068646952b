//! Network architecture constants.
//!
//! Perspective-symmetric feature transformer with 16 input buckets
//! selected by king placement (32-entry table folded horizontally),
//! a 2048-wide pair-activated L1, two small float layers, and 8 output
//! buckets selected by material count.

pub const INPUT_SIZE: usize = 768;
pub const INPUT_BUCKETS: usize = 16;

/// Feature-transformer width. The pair activation multiplies the two
/// halves together, so L1 feeds `L1_PAIR_COUNT` products downstream.
pub const L1_SIZE: usize = 2048;
pub const L1_PAIR_COUNT: usize = L1_SIZE / 2;

pub const L2_SIZE: usize = 16;
pub const L3_SIZE: usize = 32;
pub const OUTPUT_BUCKETS: usize = 8;

/// Feature-transformer quantisation scale.
pub const FT_QUANT: i32 = 255;
/// L1 weight quantisation scale.
pub const L1_QUANT: i32 = 64;
/// Right-shift applied to the pair product before packing to u8.
pub const FT_SHIFT: i32 = 10;

pub const OUTPUT_SCALE: i32 = 400;

/// Bytes of i8 feature output grouped per sparse chunk.
pub const L1_CHUNK_PER_32: usize = 4;

/// King-square -> input-bucket table, white's orientation. Values
/// 16..32 are the mirrored (kingside) halves; the feature indexer
/// folds them onto 0..16 by flipping files, while the refresh cache is
/// keyed by the unfolded 32-way value so mirrored kings don't share an
/// entry.
#[rustfmt::skip]
pub const KING_BUCKETS: [usize; 64] = [
     0,  1,  2,  3, 19, 18, 17, 16,
     4,  5,  6,  7, 23, 22, 21, 20,
     8,  9, 10, 11, 27, 26, 25, 24,
     8,  9, 10, 11, 27, 26, 25, 24,
    12, 12, 13, 13, 29, 29, 28, 28,
    12, 12, 13, 13, 29, 29, 28, 28,
    14, 14, 15, 15, 31, 31, 30, 30,
    14, 14, 15, 15, 31, 31, 30, 30,
];

/// Number of distinct refresh-cache slots per perspective.
pub const BUCKET_CACHE_SLOTS: usize = 32;

/// Output bucket from the number of men on the board.
#[inline]
#[must_use]
pub fn output_bucket(occupancy_count: u32) -> usize {
    const DIV: usize = (32 + OUTPUT_BUCKETS - 1) / OUTPUT_BUCKETS;
    ((occupancy_count as usize - 2) / DIV).min(OUTPUT_BUCKETS - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_buckets_cover_all_material_counts() {
        assert_eq!(output_bucket(2), 0);
        assert_eq!(output_bucket(32), 7);
        for n in 2..=32 {
            assert!(output_bucket(n) < OUTPUT_BUCKETS);
        }
    }

    #[test]
    fn king_buckets_fold_to_input_buckets() {
        for sq in 0..64 {
            let b = KING_BUCKETS[sq];
            assert!(b < 2 * INPUT_BUCKETS);
            // Mirrored square maps to the paired bucket half.
            let mirrored = KING_BUCKETS[sq ^ 7];
            assert!((b < 16) != (mirrored < 16) || b == mirrored);
        }
    }
}
