//! Pseudo-legality and full legality filtering.
//!
//! `is_pseudo_legal` validates a move against the board shape only
//! (piece present, ownership, motion rules); it exists to sanitize TT
//! and killer moves before they reach make-move. `is_legal` then
//! settles check, pin, and castling-path questions using the cached
//! check info.

use super::attack_tables::{pawn_attacks, pseudo_attacks, ray};
use super::position::Position;
use super::types::{square_bb, Color, Move, Piece, Square};

impl Position {
    /// Cheap structural validity for moves pulled out of tables.
    #[must_use]
    pub fn is_pseudo_legal(&self, mv: Move) -> bool {
        if mv.is_null() {
            return false;
        }

        let from = mv.from();
        let to = mv.to();

        let Some(piece) = self.bb.piece_at(from) else {
            return false;
        };
        if self.bb.color_at(from) != self.to_move {
            return false;
        }

        // Castling is king-takes-own-rook; everything else may not
        // land on a friendly piece.
        if let Some(_target) = self.bb.piece_at(to) {
            if self.bb.color_at(to) == self.to_move && !mv.is_castle() {
                return false;
            }
        }

        if mv.is_castle() {
            if piece != Piece::King {
                return false;
            }
            return self
                .castling_rights()
                .intersects(mv.relevant_castling_right());
        }

        if piece == Piece::Pawn {
            return self.pawn_move_shape_ok(mv, from, to);
        }

        if mv.is_promotion() || mv.is_en_passant() {
            return false;
        }

        self.bb
            .attack_mask(from, self.to_move, piece, self.bb.occupancy)
            & square_bb(to)
            != 0
    }

    /// Pawn motion rules: pushes need empty squares, diagonals need a
    /// victim (or the en-passant target), and back-rank arrivals must
    /// carry a promotion flag.
    fn pawn_move_shape_ok(&self, mv: Move, from: Square, to: Square) -> bool {
        let us = self.to_move;
        let them = us.flip();
        let empty = !self.bb.occupancy;

        if mv.is_en_passant() {
            return self.ep_square() == Some(to)
                && pawn_attacks(us, from) & square_bb(to) != 0
                && self.bb.pieces_of(them, Piece::Pawn) & square_bb(to.offset(-us.up())) != 0;
        }

        let promo_rank = if us == Color::White { 7 } else { 0 };
        if (to.rank() == promo_rank) != mv.is_promotion() {
            return false;
        }

        if from.index() ^ to.index() == 16 {
            // Double push from the home rank through two empty squares.
            let start_rank = if us == Color::White { 1 } else { 6 };
            return from.rank() == start_rank
                && from.file() == to.file()
                && empty & square_bb(to.offset(-us.up())) != 0
                && empty & square_bb(to) != 0;
        }

        if pawn_attacks(us, from) & square_bb(to) != 0 {
            // Diagonal: must actually capture.
            return self.bb.occupancy & self.bb.colors[them.index()] & square_bb(to) != 0;
        }

        // Single push.
        to.index() as i32 - from.index() as i32 == us.up() && empty & square_bb(to) != 0
    }

    /// Full legality using the current state's check info.
    #[must_use]
    pub fn is_legal(&self, mv: Move) -> bool {
        self.is_legal_with(
            mv,
            self.king_sq(self.to_move),
            self.king_sq(self.to_move.flip()),
            self.blockers(self.to_move),
        )
    }

    /// Legality with the kings and pin set hoisted out, for the legal
    /// generator's filtering loop.
    #[must_use]
    pub(crate) fn is_legal_with(
        &self,
        mv: Move,
        our_king: Square,
        their_king: Square,
        pinned: u64,
    ) -> bool {
        let from = mv.from();
        let to = mv.to();

        let Some(piece) = self.bb.piece_at(from) else {
            return false;
        };

        let us = self.to_move;
        let them = us.flip();

        // Only the king can resolve a double check.
        if self.in_double_check() && piece != Piece::King {
            return false;
        }

        if self.in_check() {
            if piece == Piece::King {
                // The destination must be safe with the king itself
                // lifted off the board, or a rook on the checking ray
                // still reads as blocked.
                return (self.bb.attackers_to(to, self.bb.occupancy ^ square_bb(from))
                    & self.bb.colors[them.index()])
                    | (pseudo_attacks(Piece::King, to) & square_bb(their_king))
                    == 0;
            }

            let checker = super::types::lsb(self.checkers());
            let blocks_or_captures =
                super::attack_tables::line(our_king, checker) & square_bb(to) != 0;
            let ep_removes_checker =
                mv.is_en_passant() && to.file() == checker.file();

            if blocks_or_captures || ep_removes_checker {
                return pinned == 0 || pinned & square_bb(from) == 0;
            }
            return false;
        }

        if piece == Piece::King {
            if mv.is_castle() {
                let cr = mv.relevant_castling_right();
                let Some(rook_sq) = self.castling_rook_square(cr) else {
                    return false;
                };
                if self.bb.pieces_of(us, Piece::Rook) & square_bb(rook_sq) == 0 {
                    return false;
                }

                // A Chess960 rook may be shielding the king; swapping
                // the pair would expose it.
                if self.chess960 && self.blockers(us) & square_bb(to) != 0 {
                    return false;
                }

                let king_to = mv.castling_king_square();
                let enemy = self.bb.colors[them.index()];
                let step: i32 = if from.index() < king_to.index() { -1 } else { 1 };

                // Every square the king crosses must be safe.
                let mut sq = king_to;
                while sq != from {
                    if self.bb.attackers_to(sq, self.bb.occupancy) & enemy != 0 {
                        return false;
                    }
                    sq = sq.offset(step);
                }

                return (self
                    .bb
                    .attackers_to(king_to, self.bb.occupancy ^ square_bb(our_king))
                    & enemy)
                    | (pseudo_attacks(Piece::King, king_to) & square_bb(their_king))
                    == 0;
            }

            // Occupancy without the king, so it can't retreat along
            // the ray it is standing on.
            return (self
                .bb
                .attackers_to(to, self.bb.occupancy ^ square_bb(our_king))
                & self.bb.colors[them.index()])
                | (pseudo_attacks(Piece::King, to) & square_bb(their_king))
                == 0;
        }

        if mv.is_en_passant() {
            // Both pawns leave the rank at once; re-check the king
            // against the surgically updated occupancy.
            let cap_sq = to.offset(-us.up());
            let moved = self.bb.occupancy ^ square_bb(from) ^ square_bb(to) ^ square_bb(cap_sq);
            return self.bb.attackers_to(our_king, moved) & self.bb.colors[them.index()] == 0;
        }

        // Fine unless the piece shields our king, and even then fine
        // if it stays on the pin ray.
        self.blockers(us) & square_bb(from) == 0 || ray(from, to) & square_bb(our_king) != 0
    }
}
