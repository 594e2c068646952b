//! Per-ply state records.
//!
//! Making a move copies the previous record forward and mutates the
//! copy; unmaking pops. The records live in one contiguous stack owned
//! by `Position`, index 0 holding the root state of the loaded
//! position. Repetition walks are bounded below by `plies_from_null`
//! (never larger than the stack depth), so stepping backwards in twos
//! can never leave the stack.

use super::types::{CastlingRights, Piece, Square};

/// Stack capacity: longest supported game plus full search depth.
pub(crate) const STATE_STACK_SIZE: usize = 1024;

/// Everything that changes per ply and is cheaper to copy than recompute.
#[derive(Clone, Copy)]
pub(crate) struct StateInfo {
    /// Squares from which each piece kind would check the enemy king.
    pub check_squares: [u64; 6],
    /// Pieces (either color) shielding each side's king from a slider.
    pub blockers: [u64; 2],
    /// Enemy sliders pinning something against each side's king.
    pub pinners: [u64; 2],
    /// Zobrist hash of each side's non-pawn material.
    pub non_pawn_hash: [u64; 2],
    pub hash: u64,
    pub pawn_hash: u64,
    /// Pieces currently giving check.
    pub checkers: u64,
    pub king_squares: [Square; 2],
    pub halfmove_clock: i32,
    pub plies_from_null: i32,
    pub ep_square: Option<Square>,
    pub captured: Option<Piece>,
    pub castling: CastlingRights,
}

impl Default for StateInfo {
    fn default() -> Self {
        StateInfo {
            check_squares: [0; 6],
            blockers: [0; 2],
            pinners: [0; 2],
            non_pawn_hash: [0; 2],
            hash: 0,
            pawn_hash: 0,
            checkers: 0,
            king_squares: [Square::A1; 2],
            halfmove_clock: 0,
            plies_from_null: 0,
            ep_square: None,
            captured: None,
            castling: CastlingRights::NONE,
        }
    }
}
