//! Piece kinds and colors.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Side to move / piece ownership.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Color {
    White = 0,
    Black = 1,
}

impl Color {
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    #[must_use]
    pub const fn flip(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Pawn push direction as a square-index step.
    #[inline]
    #[must_use]
    pub const fn up(self) -> i32 {
        match self {
            Color::White => 8,
            Color::Black => -8,
        }
    }

    #[inline]
    #[must_use]
    pub const fn from_index(idx: usize) -> Color {
        if idx == 0 {
            Color::White
        } else {
            Color::Black
        }
    }
}

/// The six piece kinds.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Piece {
    Pawn = 0,
    Knight = 1,
    Bishop = 2,
    Rook = 3,
    Queen = 4,
    King = 5,
}

pub(crate) const ALL_PIECES: [Piece; 6] = [
    Piece::Pawn,
    Piece::Knight,
    Piece::Bishop,
    Piece::Rook,
    Piece::Queen,
    Piece::King,
];

impl Piece {
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    #[must_use]
    pub const fn from_index(idx: usize) -> Piece {
        match idx {
            0 => Piece::Pawn,
            1 => Piece::Knight,
            2 => Piece::Bishop,
            3 => Piece::Rook,
            4 => Piece::Queen,
            _ => Piece::King,
        }
    }

    /// Parse from a FEN character (either case).
    #[inline]
    #[must_use]
    pub fn from_char(c: char) -> Option<Piece> {
        match c.to_ascii_lowercase() {
            'p' => Some(Piece::Pawn),
            'n' => Some(Piece::Knight),
            'b' => Some(Piece::Bishop),
            'r' => Some(Piece::Rook),
            'q' => Some(Piece::Queen),
            'k' => Some(Piece::King),
            _ => None,
        }
    }

    /// Lowercase FEN character for this piece kind.
    #[inline]
    #[must_use]
    pub const fn to_char(self) -> char {
        match self {
            Piece::Pawn => 'p',
            Piece::Knight => 'n',
            Piece::Bishop => 'b',
            Piece::Rook => 'r',
            Piece::Queen => 'q',
            Piece::King => 'k',
        }
    }
}

/// Combined (color, piece) index 0..12 for continuation-history tables.
#[inline]
#[must_use]
pub(crate) const fn make_piece_index(color: Color, piece: Piece) -> usize {
    color.index() * 6 + piece.index()
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_round_trip() {
        for p in ALL_PIECES {
            assert_eq!(Piece::from_char(p.to_char()), Some(p));
        }
        assert_eq!(Piece::from_char('x'), None);
    }

    #[test]
    fn piece_index_packs_color_and_kind() {
        assert_eq!(make_piece_index(Color::White, Piece::Pawn), 0);
        assert_eq!(make_piece_index(Color::Black, Piece::King), 11);
    }
}
