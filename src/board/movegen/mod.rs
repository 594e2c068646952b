//! Move generation.
//!
//! Generation kinds: pseudo-legal (dispatching to evasions when in
//! check), noisy (captures, promotions, en passant), evasions,
//! non-evasions, and legal (pseudo-legal filtered through the legality
//! check). The kind is a const generic inside this module so the inner
//! loops monomorphise without branching.

mod pawns;

use super::position::Position;
use super::types::{lsb, poplsb, CastlingRights, Move, MoveList, Piece};
use crate::board::attack_tables::{attacks, line, pseudo_attacks};

/// What to generate.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GenKind {
    /// Every pseudo-legal move (evasions when in check).
    PseudoLegal,
    /// Captures, promotions, and en passant (evasions when in check).
    Noisy,
    /// Check evasions only.
    Evasions,
    /// Everything, assuming not in check.
    NonEvasions,
}

pub(crate) const MODE_NOISY: u8 = 0;
pub(crate) const MODE_EVASIONS: u8 = 1;
pub(crate) const MODE_NON_EVASIONS: u8 = 2;

pub(crate) fn generate(pos: &Position, list: &mut MoveList, kind: GenKind) {
    match kind {
        GenKind::PseudoLegal => {
            if pos.in_check() {
                gen_all::<MODE_EVASIONS>(pos, list);
            } else {
                gen_all::<MODE_NON_EVASIONS>(pos, list);
            }
        }
        GenKind::Noisy => {
            if pos.in_check() {
                gen_all::<MODE_EVASIONS>(pos, list);
            } else {
                gen_all::<MODE_NOISY>(pos, list);
            }
        }
        GenKind::Evasions => gen_all::<MODE_EVASIONS>(pos, list),
        GenKind::NonEvasions => gen_all::<MODE_NON_EVASIONS>(pos, list),
    }
}

/// Pseudo-legal generation filtered down to strictly legal moves.
pub fn generate_legal(pos: &Position, list: &mut MoveList) {
    list.clear();
    generate(pos, list, GenKind::PseudoLegal);

    let us = pos.side_to_move();
    let our_king = pos.king_sq(us);
    let their_king = pos.king_sq(us.flip());
    let pinned = pos.blockers(us);

    let mut i = 0;
    let mut end = list.len();
    while i != end {
        if pos.is_legal_with(list[i].mv, our_king, their_king, pinned) {
            i += 1;
        } else {
            end -= 1;
            list.swap(i, end);
        }
    }
    list.truncate(i);
}

fn gen_all<const MODE: u8>(pos: &Position, list: &mut MoveList) {
    let us = pos.side_to_move();
    let our_pieces = pos.bb.colors[us.index()];
    let their_pieces = pos.bb.colors[us.flip().index()];
    let occ = pos.bb.occupancy;
    let our_king = pos.king_sq(us);

    // Double check: only the king may move.
    if !(MODE == MODE_EVASIONS && pos.in_double_check()) {
        let targets = match MODE {
            MODE_EVASIONS => line(our_king, lsb(pos.checkers())),
            MODE_NON_EVASIONS => !our_pieces,
            _ => their_pieces,
        };

        pawns::gen_pawns::<MODE>(pos, list, targets);
        for piece in [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen] {
            gen_piece(pos, list, piece, targets);
        }
    }

    let king_targets = if MODE == MODE_EVASIONS {
        !our_pieces
    } else if MODE == MODE_NOISY {
        their_pieces
    } else {
        !our_pieces
    };
    let mut king_moves = pseudo_attacks(Piece::King, our_king) & king_targets;
    while king_moves != 0 {
        let to = poplsb(&mut king_moves);
        list.push(Move::new(our_king, to));
    }

    if MODE == MODE_NON_EVASIONS {
        let side_rights = CastlingRights::of_color(us);
        if pos.castling_rights().intersects(side_rights) {
            for cr in [
                side_rights.intersection(CastlingRights::KINGSIDE),
                side_rights.intersection(CastlingRights::QUEENSIDE),
            ] {
                if pos.can_castle(occ, our_pieces, cr) {
                    if let Some(rook) = pos.castling_rook_square(cr) {
                        list.push(Move::castle(our_king, rook));
                    }
                }
            }
        }
    }
}

fn gen_piece(pos: &Position, list: &mut MoveList, piece: Piece, targets: u64) {
    let us = pos.side_to_move();
    let occ = pos.bb.occupancy;
    let mut from_set = pos.bb.pieces_of(us, piece);

    while from_set != 0 {
        let from = poplsb(&mut from_set);
        let mut moves = attacks(piece, from, occ) & targets;
        while moves != 0 {
            let to = poplsb(&mut moves);
            list.push(Move::new(from, to));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(pos: &Position, kind: GenKind) -> usize {
        let mut list = MoveList::new();
        generate(pos, &mut list, kind);
        list.len()
    }

    #[test]
    fn startpos_counts() {
        let pos = Position::new();
        assert_eq!(count(&pos, GenKind::PseudoLegal), 20);
        assert_eq!(count(&pos, GenKind::Noisy), 0);
        let mut legal = MoveList::new();
        generate_legal(&pos, &mut legal);
        assert_eq!(legal.len(), 20);
    }

    #[test]
    fn legal_is_subset_of_pseudo_legal() {
        let pos =
            Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
                .unwrap();
        let mut pseudo = MoveList::new();
        generate(&pos, &mut pseudo, GenKind::PseudoLegal);
        let mut legal = MoveList::new();
        generate_legal(&pos, &mut legal);
        assert!(legal.len() <= pseudo.len());
        for mv in legal.iter() {
            assert!(pseudo.contains(mv));
            assert!(pos.is_pseudo_legal(mv), "{mv} not pseudo-legal");
        }
    }

    #[test]
    fn evasions_cover_all_legal_moves_in_check() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/5q2/4K3 w - - 0 1").unwrap();
        assert!(pos.in_check());
        let mut evasions = MoveList::new();
        generate(&pos, &mut evasions, GenKind::Evasions);
        let mut legal = MoveList::new();
        generate_legal(&pos, &mut legal);
        for mv in legal.iter() {
            assert!(evasions.contains(mv), "evasions missing {mv}");
        }
    }

    #[test]
    fn noisy_moves_are_noisy() {
        let pos =
            Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
                .unwrap();
        let mut noisy = MoveList::new();
        generate(&pos, &mut noisy, GenKind::Noisy);
        assert!(!noisy.is_empty());
        for mv in noisy.iter() {
            assert!(
                pos.is_noisy(mv) || mv.is_promotion(),
                "{mv} generated as noisy but is quiet"
            );
        }
    }
}
