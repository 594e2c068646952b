//! Process-wide precomputed attack tables.
//!
//! Magic bitboards for sliders, pseudo-attack masks for leapers,
//! between/line/ray masks for every square pair, and the LMR/LMP
//! search tables. All tables are built once behind lazy statics and
//! never mutated afterwards.

mod magics;
mod tables;

pub use magics::{bishop_attacks, queen_attacks, rook_attacks};
pub use tables::{
    aligned, between, distance, line, lmp_threshold, lmr_reduction, ray, xray,
};

pub(crate) use tables::{PAWN_ATTACKS, PSEUDO_ATTACKS};

use crate::board::types::{Color, Piece, Square};

/// Pawn capture mask for one pawn of `color` on `sq`.
#[inline]
#[must_use]
pub fn pawn_attacks(color: Color, sq: Square) -> u64 {
    PAWN_ATTACKS[color.index()][sq.index()]
}

/// Empty-board attack mask for a non-pawn piece.
#[inline]
#[must_use]
pub fn pseudo_attacks(piece: Piece, sq: Square) -> u64 {
    PSEUDO_ATTACKS[piece.index()][sq.index()]
}

/// Occupancy-aware attack mask for any piece kind.
#[inline]
#[must_use]
pub fn attacks(piece: Piece, sq: Square, occupied: u64) -> u64 {
    match piece {
        Piece::Bishop => bishop_attacks(sq, occupied),
        Piece::Rook => rook_attacks(sq, occupied),
        Piece::Queen => queen_attacks(sq, occupied),
        _ => pseudo_attacks(piece, sq),
    }
}

/// Force every lazy table to build. Called once at startup so the first
/// search doesn't pay initialization cost mid-game.
pub fn init() {
    let _ = distance(Square::A1, Square::H8);
    let _ = rook_attacks(Square::A1, 0);
    let _ = pawn_attacks(Color::White, Square::A1);
    let _ = lmr_reduction(1, 1);
    let _ = lmp_threshold(false, 1);
}
