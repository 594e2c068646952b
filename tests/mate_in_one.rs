//! Mate-in-one positions must return a mate score at ply 1.

use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;

use once_cell::sync::Lazy;

use roan::board::nnue::Network;
use roan::board::{Position, SearchLimits, SearchThread};
use roan::score::SCORE_MATE;
use roan::tt::TranspositionTable;

static PROXY_NETWORK: Lazy<Arc<Network>> = Lazy::new(|| Arc::new(Network::material_proxy()));

fn solve(fen: &str, depth: i32) -> (String, i32) {
    let mut thread = SearchThread::new(
        0,
        Arc::new(TranspositionTable::new(8)),
        Arc::clone(&PROXY_NETWORK),
        Arc::new(AtomicBool::new(false)),
        Arc::new(AtomicU64::new(0)),
    );
    thread.set_position(Position::from_fen(fen).unwrap());
    thread.search(SearchLimits::depth(depth));
    let rm = &thread.root_moves[0];
    (rm.mv.smith_notation(false), rm.score)
}

struct MateCase {
    fen: &'static str,
    expected: &'static str,
}

const MATES_IN_ONE: &[MateCase] = &[
    // Back-rank rook mate.
    MateCase {
        fen: "6k1/5ppp/8/8/8/8/8/R3K3 w - - 0 1",
        expected: "a1a8",
    },
    // Queen supported by the king.
    MateCase {
        fen: "6k1/3Q4/6K1/8/8/8/8/8 w - - 0 1",
        expected: "d7g7",
    },
    // Smothered knight mate.
    MateCase {
        fen: "6rk/6pp/8/4N3/8/8/8/6K1 w - - 0 1",
        expected: "e5f7",
    },
    // Rook delivers on the cut-off back rank.
    MateCase {
        fen: "1k6/8/1K6/8/8/8/8/5R2 w - - 0 1",
        expected: "f1f8",
    },
];

#[test]
fn mates_in_one_are_found_at_depth_one_or_more() {
    for case in MATES_IN_ONE {
        for depth in [1, 2, 4] {
            let (best, score) = solve(case.fen, depth);
            assert_eq!(
                best, case.expected,
                "wrong mate at depth {depth} in {}",
                case.fen
            );
            assert_eq!(
                score,
                SCORE_MATE - 1,
                "score should be mate at ply 1 in {}",
                case.fen
            );
        }
    }
}
