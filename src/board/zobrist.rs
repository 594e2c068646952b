//! Zobrist hashing for positions.
//!
//! Incrementally-updatable 64-bit hashes: one key per (color, piece,
//! square), four castling keys, eight en-passant file keys, and a
//! side-to-move key. Alongside the main hash the position maintains a
//! pawn-only hash and per-color non-pawn hashes for the correction
//! histories.

use once_cell::sync::Lazy;
use rand::prelude::*;

use super::types::{poplsb, CastlingRights, Color, Piece, Square};

pub(crate) struct ZobristKeys {
    /// piece_square[color][piece][square]
    pub piece_square: [[[u64; 64]; 6]; 2],
    /// One key per castling-right bit: WK, WQ, BK, BQ.
    pub castling: [u64; 4],
    pub en_passant_file: [u64; 8],
    pub side_to_move: u64,
}

impl ZobristKeys {
    fn new() -> Self {
        // Fixed seed keeps hashes stable across runs and platforms.
        let mut rng = StdRng::seed_from_u64(0x5EED_0F_C0DE);

        let side_to_move = rng.gen();

        let mut piece_square = [[[0u64; 64]; 6]; 2];
        for color in &mut piece_square {
            for piece in color.iter_mut() {
                for key in piece.iter_mut() {
                    *key = rng.gen();
                }
            }
        }

        let mut castling = [0u64; 4];
        for key in &mut castling {
            *key = rng.gen();
        }

        let mut en_passant_file = [0u64; 8];
        for key in &mut en_passant_file {
            *key = rng.gen();
        }

        ZobristKeys {
            piece_square,
            castling,
            en_passant_file,
            side_to_move,
        }
    }

    #[inline]
    pub fn piece(&self, color: Color, piece: Piece, sq: Square) -> u64 {
        self.piece_square[color.index()][piece.index()][sq.index()]
    }

    /// XOR out the castling keys for every right in `removed` that was
    /// present in `prev`.
    pub fn castle(&self, hash: &mut u64, prev: CastlingRights, removed: CastlingRights) {
        let mut change = u64::from(prev.intersection(removed).bits());
        while change != 0 {
            let bit = poplsb(&mut change);
            *hash ^= self.castling[bit.index()];
        }
    }

    #[inline]
    pub fn en_passant(&self, hash: &mut u64, file: usize) {
        *hash ^= self.en_passant_file[file];
    }

    #[inline]
    pub fn flip_side(&self, hash: &mut u64) {
        *hash ^= self.side_to_move;
    }
}

pub(crate) static ZOBRIST: Lazy<ZobristKeys> = Lazy::new(ZobristKeys::new);

/// Full from-scratch hash set for a piece layout: (main, pawn,
/// non-pawn white, non-pawn black). The caller mixes in castling,
/// en passant, and side-to-move for the main hash.
pub(crate) fn hashes_from_scratch(
    piece_types: &[Option<Piece>; 64],
    white: u64,
    black: u64,
) -> (u64, u64, [u64; 2]) {
    let mut hash = 0u64;
    let mut pawn_hash = 0u64;
    let mut non_pawn = [0u64; 2];

    for (color, mut mask) in [(Color::White, white), (Color::Black, black)] {
        while mask != 0 {
            let sq = poplsb(&mut mask);
            let Some(piece) = piece_types[sq.index()] else {
                continue;
            };
            let key = ZOBRIST.piece(color, piece, sq);
            hash ^= key;
            if piece == Piece::Pawn {
                pawn_hash ^= key;
            } else {
                non_pawn[color.index()] ^= key;
            }
        }
    }

    (hash, pawn_hash, non_pawn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_distinct() {
        // Spot check that the generator didn't hand out duplicates.
        let mut seen = std::collections::HashSet::new();
        for color in [Color::White, Color::Black] {
            for piece in super::super::types::ALL_PIECES {
                for sq in super::super::types::all_squares() {
                    assert!(seen.insert(ZOBRIST.piece(color, piece, sq)));
                }
            }
        }
        assert!(seen.insert(ZOBRIST.side_to_move));
    }
}
