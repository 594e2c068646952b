//! FEN parsing and serialization.
//!
//! Standard six-field FEN. The castling field accepts K/Q/k/q plus
//! Shredder-FEN file letters (A-H / a-h) for Chess960 rook files; the
//! serializer emits file letters whenever the position is flagged 960.

use std::fmt;

use super::error::FenError;
use super::position::Position;
use super::types::{Color, Piece, Square};

impl Position {
    /// Replace this position with the one described by `fen`.
    ///
    /// A FEN that violates the board invariants (missing kings, pawns
    /// on the back ranks) is rejected and the position is left in an
    /// unspecified but internally consistent state; callers keep their
    /// previous copy if they need rollback.
    pub fn load_fen(&mut self, fen: &str) -> Result<(), FenError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(FenError::TooFewParts {
                found: fields.len(),
            });
        }

        self.bb.reset();
        self.full_moves = 1;
        self.castling_rook_squares = [None; 16];
        self.castling_rook_paths = [0; 16];
        self.reset_stack();
        self.bucket_cache.reset();

        // Field 1: placement, rank 8 first.
        let ranks: Vec<&str> = fields[0].split('/').collect();
        if ranks.len() != 8 {
            return Err(FenError::BadRankCount { found: ranks.len() });
        }
        for (i, rank_str) in ranks.iter().enumerate() {
            let rank = 7 - i;
            let mut file = 0usize;
            for c in rank_str.chars() {
                if let Some(skip) = c.to_digit(10) {
                    file += skip as usize;
                } else {
                    let piece = Piece::from_char(c).ok_or(FenError::InvalidPiece { ch: c })?;
                    if file >= 8 {
                        return Err(FenError::TooManyFiles { rank });
                    }
                    let color = if c.is_uppercase() {
                        Color::White
                    } else {
                        Color::Black
                    };
                    self.bb
                        .add_piece(Square::from_coords(file, rank), color, piece);
                    file += 1;
                }
            }
            if file > 8 {
                return Err(FenError::TooManyFiles { rank });
            }
        }

        for color in [Color::White, Color::Black] {
            let kings = self.bb.pieces_of(color, Piece::King);
            if kings.count_ones() != 1 {
                return Err(FenError::InvariantViolated {
                    what: "each side needs exactly one king",
                });
            }
        }
        if self.bb.pieces[Piece::Pawn.index()] & (super::types::RANK_1 | super::types::RANK_8) != 0
        {
            return Err(FenError::InvariantViolated {
                what: "pawns cannot stand on the back ranks",
            });
        }

        // Field 2: side to move.
        self.to_move = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => {
                return Err(FenError::InvalidSideToMove {
                    found: other.to_string(),
                })
            }
        };

        // Record king squares before castling derivation needs them.
        {
            let kings = [self.bb.king_sq(Color::White), self.bb.king_sq(Color::Black)];
            self.state_mut().king_squares = kings;
        }

        // Field 3: castling rights, including Shredder file letters.
        if fields[2] != "-" {
            for c in fields[2].chars() {
                let color = if c.is_uppercase() {
                    Color::White
                } else {
                    Color::Black
                };
                let back_rank = if color == Color::White { 0 } else { 7 };
                let rook_sq = match c.to_ascii_uppercase() {
                    'K' => self.outermost_rook(color, back_rank, true),
                    'Q' => self.outermost_rook(color, back_rank, false),
                    f @ 'A'..='H' => {
                        self.chess960 = true;
                        Some(Square::from_coords(f as usize - 'A' as usize, back_rank))
                    }
                    _ => None,
                };
                if let Some(rook_sq) = rook_sq {
                    self.set_castling_status(color, rook_sq);
                }
            }
        }

        // Field 4: en-passant target.
        if fields[3] != "-" {
            if let Ok(sq) = fields[3].parse::<Square>() {
                let expected_rank = if self.to_move == Color::White { 5 } else { 2 };
                if sq.rank() == expected_rank {
                    self.state_mut().ep_square = Some(sq);
                }
            }
        }

        // Fields 5-6: clocks, optional.
        if let Some(half) = fields.get(4).and_then(|s| s.parse().ok()) {
            self.state_mut().halfmove_clock = half;
        }
        if let Some(full) = fields.get(5).and_then(|s| s.parse().ok()) {
            self.full_moves = full;
        }

        self.set_state();
        self.state_mut().captured = None;

        Ok(())
    }

    /// Search the back rank from the outer file inward for the rook
    /// carrying a conventional K/Q castling letter.
    fn outermost_rook(&self, color: Color, rank: usize, kingside: bool) -> Option<Square> {
        let files: Box<dyn Iterator<Item = usize>> = if kingside {
            Box::new((0..8).rev())
        } else {
            Box::new(0..8)
        };
        for file in files {
            let sq = Square::from_coords(file, rank);
            if self.bb.pieces_of(color, Piece::Rook) & super::types::square_bb(sq) != 0 {
                return Some(sq);
            }
        }
        None
    }

    /// Serialize back to FEN. Round-trips position identity.
    #[must_use]
    pub fn to_fen(&self) -> String {
        let mut fen = String::new();

        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                let sq = Square::from_coords(file, rank);
                match self.bb.piece_at(sq) {
                    Some(piece) => {
                        if empty > 0 {
                            fen.push_str(&empty.to_string());
                            empty = 0;
                        }
                        let c = piece.to_char();
                        if self.bb.color_at(sq) == Color::White {
                            fen.push(c.to_ascii_uppercase());
                        } else {
                            fen.push(c);
                        }
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                fen.push_str(&empty.to_string());
            }
            if rank != 0 {
                fen.push('/');
            }
        }

        fen.push(' ');
        fen.push(if self.to_move == Color::White { 'w' } else { 'b' });
        fen.push(' ');

        let rights = self.castling_rights();
        if rights.is_empty() {
            fen.push('-');
        } else {
            use super::types::CastlingRights as CR;
            for (cr, std_char) in [
                (CR::WHITE_KING, 'K'),
                (CR::WHITE_QUEEN, 'Q'),
                (CR::BLACK_KING, 'k'),
                (CR::BLACK_QUEEN, 'q'),
            ] {
                if !rights.intersects(cr) {
                    continue;
                }
                if self.chess960 {
                    if let Some(rook) = self.castling_rook_square(cr) {
                        let letter = (b'A' + rook.file() as u8) as char;
                        fen.push(if std_char.is_uppercase() {
                            letter
                        } else {
                            letter.to_ascii_lowercase()
                        });
                    }
                } else {
                    fen.push(std_char);
                }
            }
        }

        fen.push(' ');
        match self.ep_square() {
            Some(sq) => fen.push_str(&sq.to_string()),
            None => fen.push('-'),
        }

        fen.push_str(&format!(
            " {} {}",
            self.state().halfmove_clock,
            self.full_moves
        ));

        fen
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n +---+---+---+---+---+---+---+---+")?;
        for rank in (0..8).rev() {
            write!(f, " |")?;
            for file in 0..8 {
                let sq = Square::from_coords(file, rank);
                match self.bb.piece_at(sq) {
                    Some(piece) => {
                        let c = piece.to_char();
                        let c = if self.bb.color_at(sq) == Color::White {
                            c.to_ascii_uppercase()
                        } else {
                            c
                        };
                        write!(f, " {c} |")?;
                    }
                    None => write!(f, "   |")?,
                }
            }
            writeln!(f, " {}\n +---+---+---+---+---+---+---+---+", rank + 1)?;
        }
        writeln!(f, "   a   b   c   d   e   f   g   h")?;
        writeln!(f, "\nFen: {}", self.to_fen())?;
        writeln!(f, "Hash: {:#018x}", self.hash())
    }
}
