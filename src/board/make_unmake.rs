//! Making and unmaking moves.
//!
//! Make copies the state record forward and mutates the copy: bitboard
//! surgery, incremental hash updates (piece-square, castling rights,
//! side, en-passant file), then a check-info recompute. Unmake restores
//! the board from the move and the captured piece and pops the record;
//! hashes are restored, never recomputed.

use super::nnue;
use super::position::Position;
use super::types::{CastlingRights, Color, Move, Piece, Square};
use super::zobrist::ZOBRIST;

impl Position {
    /// Make a move, queueing NNUE accumulator updates.
    pub fn make_move(&mut self, mv: Move) {
        self.make_move_impl::<true>(mv);
    }

    /// Make a move without touching the accumulators (perft and other
    /// eval-free traversals).
    pub fn make_move_basic(&mut self, mv: Move) {
        self.make_move_impl::<false>(mv);
    }

    fn make_move_impl<const UPDATE_NN: bool>(&mut self, mv: Move) {
        if UPDATE_NN {
            nnue::queue_move_updates(self, mv);
        }

        // Copy the previous record forward, then mutate the copy.
        let prev = *self.state();
        self.advance_ply();
        *self.state_mut() = prev;

        let st = self.state_mut();
        st.halfmove_clock += 1;
        st.plies_from_null += 1;
        st.captured = None;

        let us = self.to_move;
        let them = us.flip();
        if us == Color::Black {
            self.full_moves += 1;
        }

        let from = mv.from();
        let to = mv.to();
        let Some(our_piece) = self.bb.piece_at(from) else {
            debug_assert!(false, "make_move from an empty square");
            return;
        };
        let mut their_piece = self.bb.piece_at(to);
        debug_assert!(their_piece != Some(Piece::King));

        if our_piece == Piece::King {
            if mv.is_castle() {
                their_piece = None;
                self.do_castling(us, from, to, false);
                self.state_mut().king_squares[us.index()] = mv.castling_king_square();
            } else {
                self.state_mut().king_squares[us.index()] = to;
            }
            self.remove_castling(CastlingRights::of_color(us));
        } else if our_piece == Piece::Rook {
            let cr = self.castling_right_for_rook(from);
            self.remove_castling(cr);
        }

        if let Some(captured) = their_piece {
            self.bb.remove_piece(to, them, captured);
            self.update_hash(them, captured, to);

            if captured == Piece::Rook {
                let cr = self.castling_right_for_rook(to);
                self.remove_castling(cr);
            }

            let st = self.state_mut();
            st.captured = Some(captured);
            st.halfmove_clock = 0;
        }

        // The en-passant target never survives a move; hash it out and
        // re-set it below if this is a double push.
        if let Some(ep) = self.state().ep_square {
            let st = self.state_mut();
            ZOBRIST.en_passant(&mut st.hash, ep.file());
            st.ep_square = None;
        }

        if our_piece == Piece::Pawn {
            if mv.is_en_passant() {
                let cap_sq = to.offset(-us.up());
                self.bb.remove_piece(cap_sq, them, Piece::Pawn);
                self.update_hash(them, Piece::Pawn, cap_sq);
                // En passant and the capture flag are mutually
                // exclusive encodings, so record the pawn here.
                self.state_mut().captured = Some(Piece::Pawn);
            } else if from.index() ^ to.index() == 16 {
                // Double push: the target square only counts when an
                // enemy pawn could actually capture en passant.
                let target = to.offset(-us.up());
                if super::attack_tables::pawn_attacks(us, target)
                    & self.bb.pieces_of(them, Piece::Pawn)
                    != 0
                {
                    let st = self.state_mut();
                    st.ep_square = Some(target);
                    ZOBRIST.en_passant(&mut st.hash, target.file());
                }
            }

            self.state_mut().halfmove_clock = 0;
        }

        if !mv.is_castle() {
            self.bb.move_piece(from, to, us, our_piece);
            self.update_hash(us, our_piece, from);
            self.update_hash(us, our_piece, to);
        }

        if mv.is_promotion() {
            let promoted = mv.promotion_piece();
            self.bb.remove_piece(to, us, our_piece);
            self.bb.add_piece(to, us, promoted);
            self.update_hash(us, our_piece, to);
            self.update_hash(us, promoted, to);
        }

        ZOBRIST.flip_side(&mut self.state_mut().hash);
        self.to_move = them;

        let their_king = self.state().king_squares[them.index()];
        self.state_mut().checkers =
            self.bb.attackers_to(their_king, self.bb.occupancy) & self.bb.colors[us.index()];

        self.set_check_info();
    }

    /// Undo the last move. The state stack pops; nothing is recomputed.
    pub fn unmake_move(&mut self, mv: Move) {
        let from = mv.from();
        let to = mv.to();

        // "We" made the move being undone.
        let us = self.to_move.flip();
        let them = self.to_move;

        if us == Color::Black {
            self.full_moves -= 1;
        }

        if mv.is_promotion() {
            let promoted = mv.promotion_piece();
            self.bb.remove_piece(to, us, promoted);
            self.bb.add_piece(to, us, Piece::Pawn);
        }

        if mv.is_castle() {
            self.do_castling(us, from, to, true);
        } else if let Some(piece) = self.bb.piece_at(to) {
            self.bb.move_piece(to, from, us, piece);
        } else {
            debug_assert!(false, "unmake_move with no piece on the target");
        }

        if let Some(captured) = self.state().captured {
            if mv.is_en_passant() {
                let cap_sq = to.offset(them.up());
                self.bb.add_piece(cap_sq, them, Piece::Pawn);
            } else {
                self.bb.add_piece(to, them, captured);
            }
        }

        self.retreat_ply();
        self.to_move = us;
    }

    /// Pass the turn: state copies forward, the hash flips side and
    /// drops any en-passant file, and `plies_from_null` resets so
    /// repetition scans stay on one side of the null move.
    pub fn make_null_move(&mut self) {
        nnue::queue_null_move(self);

        let prev = *self.state();
        self.advance_ply();
        *self.state_mut() = prev;

        let st = self.state_mut();
        if let Some(ep) = st.ep_square {
            ZOBRIST.en_passant(&mut st.hash, ep.file());
            st.ep_square = None;
        }
        ZOBRIST.flip_side(&mut st.hash);
        st.halfmove_clock += 1;
        st.plies_from_null = 0;

        self.to_move = self.to_move.flip();
        self.set_check_info();
    }

    pub fn unmake_null_move(&mut self) {
        self.retreat_ply();
        self.to_move = self.to_move.flip();
    }

    /// Move both castling pieces. Encoded as king-takes-rook, so `to`
    /// is the rook's origin; destinations are the canonical G/C and
    /// F/D squares on the mover's back rank.
    pub(crate) fn do_castling(&mut self, us: Color, from: Square, to: Square, undo: bool) {
        let kingside = to.index() > from.index();
        let rook_from = to;
        let rook_to = Square::from_coords(if kingside { 5 } else { 3 }, 0).relative_to(us.index());
        let king_to = Square::from_coords(if kingside { 6 } else { 2 }, 0).relative_to(us.index());

        if undo {
            self.bb.remove_piece(king_to, us, Piece::King);
            self.bb.remove_piece(rook_to, us, Piece::Rook);
            self.bb.add_piece(from, us, Piece::King);
            self.bb.add_piece(rook_from, us, Piece::Rook);
        } else {
            self.bb.remove_piece(from, us, Piece::King);
            self.bb.remove_piece(rook_from, us, Piece::Rook);
            self.bb.add_piece(king_to, us, Piece::King);
            self.bb.add_piece(rook_to, us, Piece::Rook);

            self.update_hash(us, Piece::King, from);
            self.update_hash(us, Piece::Rook, rook_from);
            self.update_hash(us, Piece::King, king_to);
            self.update_hash(us, Piece::Rook, rook_to);
        }
    }
}
