//! Cuckoo tables for upcoming-repetition detection.
//!
//! Every reversible single-piece move (both colors, non-pawn pieces,
//! s1 < s2) is inserted under the Zobrist delta it would apply to a
//! position, using two hash slices and the standard eviction loop. A
//! probe that finds the current hash-difference here has found a move
//! that could walk back into an earlier position.

use once_cell::sync::Lazy;

use super::attack_tables::attacks;
use super::types::{square_bb, Color, Move, Piece, Square};
use super::zobrist::ZOBRIST;

pub(crate) struct CuckooTables {
    pub keys: [u64; 8192],
    pub moves: [Move; 8192],
}

#[inline]
pub(crate) fn cuckoo_h1(key: u64) -> usize {
    (key >> 32) as usize & 0x1FFF
}

#[inline]
pub(crate) fn cuckoo_h2(key: u64) -> usize {
    (key >> 48) as usize & 0x1FFF
}

pub(crate) static CUCKOO: Lazy<Box<CuckooTables>> = Lazy::new(|| {
    let mut tables = Box::new(CuckooTables {
        keys: [0; 8192],
        moves: [Move::NULL; 8192],
    });

    let mut count = 0u32;
    for color in [Color::White, Color::Black] {
        for piece in [
            Piece::Knight,
            Piece::Bishop,
            Piece::Rook,
            Piece::Queen,
            Piece::King,
        ] {
            for s1 in 0..64 {
                for s2 in (s1 + 1)..64 {
                    let sq1 = Square::from_index(s1);
                    let sq2 = Square::from_index(s2);
                    if attacks(piece, sq1, 0) & square_bb(sq2) == 0 {
                        continue;
                    }

                    let mut mv = Move::new(sq1, sq2);
                    let mut key = ZOBRIST.piece(color, piece, sq1)
                        ^ ZOBRIST.piece(color, piece, sq2)
                        ^ ZOBRIST.side_to_move;

                    let mut slot = cuckoo_h1(key);
                    loop {
                        std::mem::swap(&mut tables.keys[slot], &mut key);
                        std::mem::swap(&mut tables.moves[slot], &mut mv);
                        if mv.is_null() {
                            break;
                        }
                        slot = if slot == cuckoo_h1(key) {
                            cuckoo_h2(key)
                        } else {
                            cuckoo_h1(key)
                        };
                    }
                    count += 1;
                }
            }
        }
    }

    debug_assert_eq!(count, 3668);
    tables
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuckoo_holds_reversible_moves() {
        let filled = CUCKOO.keys.iter().filter(|&&k| k != 0).count();
        assert_eq!(filled, 3668);
        // Every stored move must be reachable through one of its two
        // hash slots.
        for slot in 0..8192 {
            let key = CUCKOO.keys[slot];
            if key == 0 {
                continue;
            }
            assert!(slot == cuckoo_h1(key) || slot == cuckoo_h2(key));
        }
    }
}
