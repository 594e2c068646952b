//! Public board API integration tests.

use roan::board::{GenKind, Move, MoveList, Position, Square, STARTPOS_FEN};

#[test]
fn startpos_basics() {
    let pos = Position::new();
    assert_eq!(pos.to_fen(), STARTPOS_FEN);

    let mut moves = MoveList::new();
    pos.legal_moves(&mut moves);
    assert_eq!(moves.len(), 20);
    assert!(!pos.in_check());
    assert!(!pos.is_draw());
}

#[test]
fn fen_round_trip_is_idempotent() {
    let fens = [
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3",
        "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
    ];
    for fen in fens {
        let pos = Position::from_fen(fen).unwrap();
        assert_eq!(pos.to_fen(), fen);
    }
}

#[test]
fn malformed_fens_are_rejected() {
    assert!(Position::from_fen("").is_err());
    assert!(Position::from_fen("not a fen").is_err());
    // Two white kings.
    assert!(Position::from_fen("4k3/8/8/8/8/8/8/3KK3 w - - 0 1").is_err());
    // No black king.
    assert!(Position::from_fen("8/8/8/8/8/8/8/4K3 w - - 0 1").is_err());
    // Pawn on the back rank.
    assert!(Position::from_fen("p3k3/8/8/8/8/8/8/4K3 w - - 0 1").is_err());
}

#[test]
fn move_text_parses_both_castling_renderings() {
    let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
    let standard = pos.try_find_move("e1g1").unwrap();
    let internal = pos.try_find_move("e1h1").unwrap();
    assert_eq!(standard, internal);
    assert!(standard.is_castle());

    assert!(pos.try_find_move("e9e4").is_err());
    assert!(pos.try_find_move("a1a5x").is_err());
}

#[test]
fn unknown_move_text_does_not_change_position() {
    let mut pos = Position::new();
    let fen_before = pos.to_fen();
    assert!(pos.try_find_move("zz99").is_err());
    assert_eq!(pos.to_fen(), fen_before);

    // And a real move still applies afterwards.
    let mv = pos.try_find_move("e2e4").unwrap();
    pos.make_move(mv);
    assert_ne!(pos.to_fen(), fen_before);
}

#[test]
fn promotions_parse_with_piece_letter() {
    let pos = Position::from_fen("8/P3k3/8/8/8/8/8/4K3 w - - 0 1").unwrap();
    let queen = pos.try_find_move("a7a8q").unwrap();
    assert!(queen.is_promotion());
    let knight = pos.try_find_move("a7a8n").unwrap();
    assert_ne!(queen, knight);
}

#[test]
fn perft_depth_four_from_start() {
    let mut pos = Position::new();
    assert_eq!(pos.perft(4), 197_281);
}

#[test]
fn generation_kinds_compose() {
    let pos =
        Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
            .unwrap();

    let mut all = MoveList::new();
    pos.generate(&mut all, GenKind::PseudoLegal);
    let mut noisy = MoveList::new();
    pos.generate(&mut noisy, GenKind::Noisy);

    assert!(noisy.len() < all.len());
    for mv in noisy.iter() {
        assert!(all.contains(mv));
    }
}

#[test]
fn square_and_move_display() {
    assert_eq!(Square::from_coords(4, 0).to_string(), "e1");
    let mv = Move::new(Square::from_coords(4, 1), Square::from_coords(4, 3));
    assert_eq!(mv.to_string(), "e2e4");
}

#[test]
fn bitboard_accessors_expose_piece_sets() {
    use roan::board::{Color, Piece};

    let pos = Position::new();
    assert_eq!(pos.occupancy().count(), 32);

    let white_pawns = pos.pieces(Color::White, Piece::Pawn);
    assert_eq!(white_pawns.count(), 8);
    assert!(white_pawns.iter().all(|sq| sq.rank() == 1));

    let kings = pos.pieces(Color::White, Piece::King) | pos.pieces(Color::Black, Piece::King);
    assert_eq!(kings.count(), 2);
}
