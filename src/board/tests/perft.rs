//! Perft move-generation correctness.

use crate::board::Position;

struct PerftCase {
    name: &'static str,
    fen: &'static str,
    depths: &'static [(u32, u64)],
}

const CASES: &[PerftCase] = &[
    PerftCase {
        name: "startpos",
        fen: "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
        depths: &[(1, 20), (2, 400), (3, 8902), (4, 197_281), (5, 4_865_609)],
    },
    PerftCase {
        name: "kiwipete",
        fen: "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        depths: &[(1, 48), (2, 2039), (3, 97_862), (4, 4_085_603)],
    },
    PerftCase {
        name: "position 3",
        fen: "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        depths: &[(1, 14), (2, 191), (3, 2812), (4, 43_238), (5, 674_624)],
    },
    PerftCase {
        name: "position 4 (castling/promotion)",
        fen: "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
        depths: &[(1, 6), (2, 264), (3, 9467), (4, 422_333)],
    },
    PerftCase {
        name: "position 5",
        fen: "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
        depths: &[(1, 44), (2, 1486), (3, 62_379), (4, 2_103_487)],
    },
    PerftCase {
        name: "en passant",
        fen: "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3",
        depths: &[(1, 31), (2, 707), (3, 21_637)],
    },
    PerftCase {
        name: "promotion storm",
        fen: "n1n5/PPPk4/8/8/8/8/4Kppp/5N1N b - - 0 1",
        depths: &[(1, 24), (2, 496), (3, 9483)],
    },
    PerftCase {
        name: "castling rights",
        fen: "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1",
        depths: &[(1, 26), (2, 568), (3, 13_744)],
    },
];

#[test]
fn perft_suite() {
    for case in CASES {
        let mut pos = Position::from_fen(case.fen).unwrap();
        for &(depth, expected) in case.depths {
            let nodes = pos.perft(depth);
            assert_eq!(
                nodes, expected,
                "perft({depth}) mismatch on '{}': expected {expected}, got {nodes}",
                case.name
            );
        }
    }
}

// Around 200M nodes; run explicitly with `--ignored` when touching
// movegen or make/unmake.
#[test]
#[ignore]
fn perft_kiwipete_depth_5() {
    let mut pos =
        Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
            .unwrap();
    assert_eq!(pos.perft(5), 193_690_690);
}

#[test]
fn perft_is_stable_after_unmake() {
    // Running perft twice from the same position must agree; a
    // corrupted unmake would diverge.
    let mut pos =
        Position::from_fen("r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1")
            .unwrap();
    let first = pos.perft(3);
    let second = pos.perft(3);
    assert_eq!(first, second);
}

#[test]
fn chess960_castling_generates() {
    // Shredder-FEN rook files; castling must still be offered.
    let pos = Position::from_fen("rk5r/8/8/8/8/8/8/RK5R w HA ha - 0 1").unwrap();
    assert!(pos.is_chess960());
    let mut list = crate::board::MoveList::new();
    pos.legal_moves(&mut list);
    assert!(list.iter().any(|m| m.is_castle()));
}
