//! Core chess types.
//!
//! The fundamental value types used throughout the engine:
//! - `Piece` and `Color`
//! - `Square` - compact board square (u8 index)
//! - `Bitboard` and `PieceSet` - mask types and the board's piece state
//! - `Move`, `ScoredMove`, `MoveList`
//! - `CastlingRights`

mod bitboard;
mod castling;
mod moves;
mod piece;
mod square;

pub use bitboard::{Bitboard, PieceSet};
pub use castling::CastlingRights;
pub use moves::{Move, MoveList, ScoredMove, MOVE_LIST_SIZE};
pub use piece::{Color, Piece};
pub use square::Square;

pub(crate) use bitboard::{
    forward, lsb, more_than_one, poplsb, shift_up_left, shift_up_right, square_bb, FILE_A, FILE_H,
    RANK_1, RANK_2, RANK_3, RANK_6, RANK_7, RANK_8,
};
pub(crate) use piece::{make_piece_index, ALL_PIECES};
pub(crate) use square::all_squares;
