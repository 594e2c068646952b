//! Make/unmake round-trip integrity.

use rand::prelude::*;

use crate::board::zobrist::hashes_from_scratch;
use crate::board::{Color, Move, MoveList, Position};

fn find_move(pos: &Position, text: &str) -> Move {
    pos.try_find_move(text).expect("move should exist")
}

/// Snapshot of everything §make/unmake must restore exactly.
fn snapshot(pos: &Position) -> (Vec<u64>, bool, u8, Option<crate::board::Square>, i32, u64, u64) {
    let mut boards = Vec::new();
    boards.extend_from_slice(&pos.bb.pieces);
    boards.extend_from_slice(&pos.bb.colors);
    boards.push(pos.bb.occupancy);
    (
        boards,
        pos.side_to_move() == Color::White,
        pos.castling_rights().bits(),
        pos.ep_square(),
        pos.halfmove_clock(),
        pos.hash(),
        pos.pawn_hash(),
    )
}

#[test]
fn every_legal_move_round_trips() {
    let fens = [
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3",
        "n1n5/PPPk4/8/8/8/8/4Kppp/5N1N b - - 0 1",
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
    ];

    for fen in fens {
        let mut pos = Position::from_fen(fen).unwrap();
        let before = snapshot(&pos);
        let before_fen = pos.to_fen();

        let mut list = MoveList::new();
        pos.legal_moves(&mut list);
        let moves: Vec<Move> = list.iter().collect();

        for mv in moves {
            pos.make_move(mv);
            pos.unmake_move(mv);
            assert_eq!(snapshot(&pos), before, "{mv} broke state in {fen}");
            assert_eq!(pos.to_fen(), before_fen);
        }
    }
}

#[test]
fn hash_matches_scratch_after_random_play() {
    let mut rng = StdRng::seed_from_u64(2024);

    for _ in 0..20 {
        let mut pos = Position::new();
        for _ in 0..60 {
            let mut list = MoveList::new();
            pos.legal_moves(&mut list);
            if list.is_empty() || pos.is_draw() {
                break;
            }
            let mv = list[rng.gen_range(0..list.len())].mv;
            pos.make_move(mv);

            let (mut expected, pawn, non_pawn) =
                hashes_from_scratch(&pos.bb.piece_types, pos.bb.colors[0], pos.bb.colors[1]);
            let castling = pos.castling_rights();
            crate::board::zobrist::ZOBRIST.castle(&mut expected, castling, castling);
            if let Some(ep) = pos.ep_square() {
                crate::board::zobrist::ZOBRIST.en_passant(&mut expected, ep.file());
            }
            if pos.side_to_move() == Color::Black {
                crate::board::zobrist::ZOBRIST.flip_side(&mut expected);
            }

            assert_eq!(pos.hash(), expected, "incremental hash diverged");
            assert_eq!(pos.pawn_hash(), pawn);
            assert_eq!(
                [
                    pos.non_pawn_hash(Color::White),
                    pos.non_pawn_hash(Color::Black)
                ],
                non_pawn
            );
        }
    }
}

#[test]
fn en_passant_round_trips() {
    let mut pos =
        Position::from_fen("rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3")
            .unwrap();
    let original_hash = pos.hash();
    let mv = find_move(&pos, "e5f6");
    assert!(mv.is_en_passant());
    pos.make_move(mv);
    assert!(pos.ep_square().is_none());
    pos.unmake_move(mv);
    assert_eq!(pos.hash(), original_hash);
    assert_eq!(pos.ep_square().map(|s| s.to_string()), Some("f6".into()));
}

#[test]
fn castling_both_renderings_round_trip() {
    let mut pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
    let original = pos.to_fen();

    // Internal encoding: king takes rook.
    for text in ["e1g1", "e1h1"] {
        let mv = find_move(&pos, text);
        assert!(mv.is_castle());
        pos.make_move(mv);
        pos.unmake_move(mv);
        assert_eq!(pos.to_fen(), original);
    }
}

#[test]
fn promotion_capture_round_trips() {
    let mut pos = Position::from_fen("rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8")
        .unwrap();
    let original = pos.to_fen();
    let mv = find_move(&pos, "d7c8q");
    assert!(mv.is_promotion());
    pos.make_move(mv);
    pos.unmake_move(mv);
    assert_eq!(pos.to_fen(), original);
}

#[test]
fn null_move_round_trips() {
    let mut pos =
        Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
            .unwrap();
    let hash = pos.hash();
    let stm = pos.side_to_move();

    pos.make_null_move();
    assert_ne!(pos.hash(), hash);
    assert_ne!(pos.side_to_move(), stm);
    pos.unmake_null_move();
    assert_eq!(pos.hash(), hash);
    assert_eq!(pos.side_to_move(), stm);
}

#[test]
fn fen_round_trips_through_play() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut pos = Position::new();

    for _ in 0..40 {
        let mut list = MoveList::new();
        pos.legal_moves(&mut list);
        if list.is_empty() {
            break;
        }
        let mv = list[rng.gen_range(0..list.len())].mv;
        pos.make_move(mv);

        let fen = pos.to_fen();
        let reparsed = Position::from_fen(&fen).unwrap();
        assert_eq!(reparsed.to_fen(), fen);
        assert_eq!(reparsed.hash(), pos.hash());
    }
}
