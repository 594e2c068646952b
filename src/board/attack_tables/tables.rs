//! Non-magic precomputed tables: king distance, pseudo-attacks,
//! between/line/ray/xray masks, and the LMR/LMP search tables.

use once_cell::sync::Lazy;

use super::magics::{bishop_attacks, rook_attacks, sliding_attack};
use crate::board::types::{all_squares, square_bb, Color, Piece, Square};
use crate::score::{MAX_DEPTH, MAX_PLY};

#[inline]
fn pair(s1: Square, s2: Square) -> usize {
    s1.index() * 64 + s2.index()
}

/// Chebyshev distance between square pairs.
pub(crate) static SQUARE_DISTANCE: Lazy<Vec<u8>> = Lazy::new(|| {
    let mut table = vec![0u8; 64 * 64];
    for s1 in all_squares() {
        for s2 in all_squares() {
            let file_dist = (s1.file() as i32 - s2.file() as i32).unsigned_abs();
            let rank_dist = (s1.rank() as i32 - s2.rank() as i32).unsigned_abs();
            table[pair(s1, s2)] = file_dist.max(rank_dist) as u8;
        }
    }
    table
});

/// Attacks on an empty board, per piece kind. Pawn entry is unused
/// (pawn attacks are color-dependent, see [`PAWN_ATTACKS`]).
pub(crate) static PSEUDO_ATTACKS: Lazy<[[u64; 64]; 6]> = Lazy::new(|| {
    let mut table = [[0u64; 64]; 6];
    for sq in all_squares() {
        for step in [-9, -8, -7, -1, 1, 7, 8, 9] {
            if let Some(to) = sq.try_offset(step) {
                table[Piece::King.index()][sq.index()] |= square_bb(to);
            }
        }
        for step in [-17, -15, -10, -6, 6, 10, 15, 17] {
            if let Some(to) = sq.try_offset(step) {
                table[Piece::Knight.index()][sq.index()] |= square_bb(to);
            }
        }
        let bishop = sliding_attack(Piece::Bishop, sq, 0);
        let rook = sliding_attack(Piece::Rook, sq, 0);
        table[Piece::Bishop.index()][sq.index()] = bishop;
        table[Piece::Rook.index()][sq.index()] = rook;
        table[Piece::Queen.index()][sq.index()] = bishop | rook;
    }
    table
});

pub(crate) static PAWN_ATTACKS: Lazy<[[u64; 64]; 2]> = Lazy::new(|| {
    let mut table = [[0u64; 64]; 2];
    for sq in all_squares() {
        for (color, steps) in [(Color::White, [7, 9]), (Color::Black, [-9, -7])] {
            for step in steps {
                if let Some(to) = sq.try_offset(step) {
                    table[color.index()][sq.index()] |= square_bb(to);
                }
            }
        }
    }
    table
});

struct MaskTables {
    /// Squares strictly between s1 and s2 (empty if not aligned).
    between: Vec<u64>,
    /// The full line through s1 and s2 restricted past s1, plus s2;
    /// equals just s2 when not aligned.
    line: Vec<u64>,
    /// The complete ray through both squares including endpoints.
    ray: Vec<u64>,
    /// The ray from s1 through s2 continuing past s2 (x-ray direction).
    xray: Vec<u64>,
}

static MASKS: Lazy<MaskTables> = Lazy::new(|| {
    let mut t = MaskTables {
        between: vec![0; 64 * 64],
        line: vec![0; 64 * 64],
        ray: vec![0; 64 * 64],
        xray: vec![0; 64 * 64],
    };

    for s1 in all_squares() {
        let rook_rays = PSEUDO_ATTACKS[Piece::Rook.index()][s1.index()];
        let bishop_rays = PSEUDO_ATTACKS[Piece::Bishop.index()][s1.index()];

        for s2 in all_squares() {
            let i = pair(s1, s2);
            if rook_rays & square_bb(s2) != 0 {
                t.between[i] =
                    rook_attacks(s1, square_bb(s2)) & rook_attacks(s2, square_bb(s1));
                t.line[i] = t.between[i] | square_bb(s2);
                t.ray[i] = (rook_rays & PSEUDO_ATTACKS[Piece::Rook.index()][s2.index()])
                    | square_bb(s1)
                    | square_bb(s2);
                t.xray[i] = (rook_attacks(s2, square_bb(s1)) & rook_rays)
                    | square_bb(s1)
                    | square_bb(s2);
            } else if bishop_rays & square_bb(s2) != 0 {
                t.between[i] =
                    bishop_attacks(s1, square_bb(s2)) & bishop_attacks(s2, square_bb(s1));
                t.line[i] = t.between[i] | square_bb(s2);
                t.ray[i] = (bishop_rays & PSEUDO_ATTACKS[Piece::Bishop.index()][s2.index()])
                    | square_bb(s1)
                    | square_bb(s2);
                t.xray[i] = (bishop_attacks(s2, square_bb(s1)) & bishop_rays)
                    | square_bb(s1)
                    | square_bb(s2);
            } else {
                t.line[i] = square_bb(s2);
            }
        }
    }
    t
});

#[inline]
#[must_use]
pub fn distance(s1: Square, s2: Square) -> u8 {
    SQUARE_DISTANCE[pair(s1, s2)]
}

#[inline]
#[must_use]
pub fn between(s1: Square, s2: Square) -> u64 {
    MASKS.between[pair(s1, s2)]
}

#[inline]
#[must_use]
pub fn line(s1: Square, s2: Square) -> u64 {
    MASKS.line[pair(s1, s2)]
}

#[inline]
#[must_use]
pub fn ray(s1: Square, s2: Square) -> u64 {
    MASKS.ray[pair(s1, s2)]
}

#[inline]
#[must_use]
pub fn xray(s1: Square, s2: Square) -> u64 {
    MASKS.xray[pair(s1, s2)]
}

/// True when s1, s2, s3 share a rank, file, or diagonal.
#[inline]
#[must_use]
pub fn aligned(s1: Square, s2: Square, s3: Square) -> bool {
    line(s1, s2) & square_bb(s3) != 0
}

/// Logarithmic late-move-reduction table, indexed [depth][move number].
static LMR_TABLE: Lazy<Vec<i32>> = Lazy::new(|| {
    let mut table = vec![0i32; MAX_PLY * 256];
    for depth in 1..MAX_PLY {
        for move_num in 1..256 {
            let r = ((depth as f64).ln() * (move_num as f64).ln() / 2.25 + 0.25) as i32;
            table[depth * 256 + move_num] = r.max(0);
        }
    }
    table
});

/// Late-move-pruning move-count thresholds, indexed [improving][depth].
static LMP_TABLE: Lazy<[[i32; MAX_DEPTH as usize]; 2]> = Lazy::new(|| {
    let mut table = [[0i32; MAX_DEPTH as usize]; 2];
    for depth in 0..MAX_DEPTH {
        table[0][depth as usize] = (3 + depth * depth) / 2;
        table[1][depth as usize] = 3 + depth * depth;
    }
    table
});

#[inline]
#[must_use]
pub fn lmr_reduction(depth: i32, move_number: i32) -> i32 {
    let d = (depth.max(0) as usize).min(MAX_PLY - 1);
    let m = (move_number.max(0) as usize).min(255);
    LMR_TABLE[d * 256 + m]
}

#[inline]
#[must_use]
pub fn lmp_threshold(improving: bool, depth: i32) -> i32 {
    let d = (depth.max(0) as usize).min(MAX_DEPTH as usize - 1);
    LMP_TABLE[usize::from(improving)][d]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_chebyshev() {
        assert_eq!(distance(Square::A1, Square::H8), 7);
        assert_eq!(distance(Square::E1, Square::E1), 0);
        assert_eq!(distance(Square::E1, Square::G1), 2);
    }

    #[test]
    fn between_is_empty_for_unaligned() {
        assert_eq!(between(Square::A1, Square::B1.offset(16)), 0);
        // a1..a8 spans the six interior squares
        assert_eq!(between(Square::A1, Square::A8).count_ones(), 6);
    }

    #[test]
    fn line_contains_endpoint() {
        let l = line(Square::A1, Square::H8);
        assert!(l & square_bb(Square::H8) != 0);
        assert!(l & square_bb(Square::from_coords(3, 3)) != 0);
    }

    #[test]
    fn lmr_table_shape() {
        assert_eq!(lmr_reduction(0, 10), 0);
        assert_eq!(lmr_reduction(10, 0), 0);
        assert!(lmr_reduction(30, 30) >= lmr_reduction(5, 5));
    }

    #[test]
    fn lmp_thresholds() {
        assert_eq!(lmp_threshold(false, 2), 3);
        assert_eq!(lmp_threshold(true, 2), 7);
    }
}
