//! Pawn move generation: pushes, double pushes, captures, en passant,
//! and promotions, with the noisy/evasion masks applied.

use super::{MODE_EVASIONS, MODE_NOISY};
use crate::board::attack_tables::pawn_attacks;
use crate::board::position::Position;
use crate::board::types::{
    forward, poplsb, shift_up_left, shift_up_right, Color, Move, MoveList, Piece, Square, RANK_2,
    RANK_3, RANK_6, RANK_7,
};

/// Queen promotion always; under-promotions only outside noisy
/// generation or on captures.
fn push_promotions<const MODE: u8>(list: &mut MoveList, from: Square, to: Square, is_capture: bool) {
    list.push(Move::promotion(from, to, Piece::Queen));
    if MODE != MODE_NOISY || is_capture {
        list.push(Move::promotion(from, to, Piece::Knight));
        list.push(Move::promotion(from, to, Piece::Rook));
        list.push(Move::promotion(from, to, Piece::Bishop));
    }
}

pub(super) fn gen_pawns<const MODE: u8>(pos: &Position, list: &mut MoveList, targets: u64) {
    let us = pos.side_to_move();
    let them = us.flip();
    let up = us.up();

    let (rank7, rank3) = match us {
        Color::White => (RANK_7, RANK_3),
        Color::Black => (RANK_2, RANK_6),
    };

    let our_pawns = pos.bb.pieces_of(us, Piece::Pawn);
    let their_pieces = pos.bb.colors[them.index()];
    let empty = !pos.bb.occupancy;

    // When evading, captures must take the checker itself.
    let capture_targets = if MODE == MODE_EVASIONS {
        pos.checkers()
    } else {
        their_pieces
    };

    let promoting = our_pawns & rank7;
    let not_promoting = our_pawns & !rank7;

    if MODE != MODE_NOISY {
        let mut pushes = forward(us, not_promoting) & empty;
        let mut doubles = forward(us, pushes & rank3) & empty;

        if MODE == MODE_EVASIONS {
            // Only pushes that block the check.
            pushes &= targets;
            doubles &= targets;
        }

        while pushes != 0 {
            let to = poplsb(&mut pushes);
            list.push(Move::new(to.offset(-up), to));
        }
        while doubles != 0 {
            let to = poplsb(&mut doubles);
            list.push(Move::new(to.offset(-up - up), to));
        }
    }

    if promoting != 0 {
        let mut quiet_promos = forward(us, promoting) & empty;
        let mut capture_promos_left = shift_up_left(us, promoting) & capture_targets;
        let mut capture_promos_right = shift_up_right(us, promoting) & capture_targets;

        if MODE == MODE_EVASIONS {
            quiet_promos &= targets;
        }

        while quiet_promos != 0 {
            let to = poplsb(&mut quiet_promos);
            push_promotions::<MODE>(list, to.offset(-up), to, false);
        }
        while capture_promos_left != 0 {
            let to = poplsb(&mut capture_promos_left);
            let from = to.offset(-up - if us == Color::White { -1 } else { 1 });
            push_promotions::<MODE>(list, from, to, true);
        }
        while capture_promos_right != 0 {
            let to = poplsb(&mut capture_promos_right);
            let from = to.offset(-up - if us == Color::White { 1 } else { -1 });
            push_promotions::<MODE>(list, from, to, true);
        }
    }

    let mut captures_left = shift_up_left(us, not_promoting) & capture_targets;
    let mut captures_right = shift_up_right(us, not_promoting) & capture_targets;

    while captures_left != 0 {
        let to = poplsb(&mut captures_left);
        let from = to.offset(-up - if us == Color::White { -1 } else { 1 });
        list.push(Move::new(from, to));
    }
    while captures_right != 0 {
        let to = poplsb(&mut captures_right);
        let from = to.offset(-up - if us == Color::White { 1 } else { -1 });
        list.push(Move::new(from, to));
    }

    if let Some(ep) = pos.ep_square() {
        // Legality filtering settles whether the capture resolves a
        // check; generate every pawn that could take.
        let mut from_set = not_promoting & pawn_attacks(them, ep);
        while from_set != 0 {
            let from = poplsb(&mut from_set);
            list.push(Move::en_passant(from, ep));
        }
    }
}
