//! Search behavior: mates, sanity, limits, and table integration.

use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::board::nnue::Network;
use crate::board::{Position, SearchLimits, SearchThread};
use crate::score::{is_score_mate, SCORE_MATE};
use crate::tt::TranspositionTable;

static PROXY_NETWORK: Lazy<Arc<Network>> = Lazy::new(|| Arc::new(Network::material_proxy()));

fn searcher(tt_mb: usize) -> SearchThread {
    SearchThread::new(
        0,
        Arc::new(TranspositionTable::new(tt_mb)),
        Arc::clone(&PROXY_NETWORK),
        Arc::new(AtomicBool::new(false)),
        Arc::new(AtomicU64::new(0)),
    )
}

fn best_after(fen: &str, depth: i32) -> (String, i32) {
    let mut thread = searcher(16);
    thread.set_position(Position::from_fen(fen).unwrap());
    thread.search(SearchLimits::depth(depth));
    let rm = &thread.root_moves[0];
    (rm.mv.smith_notation(false), rm.score)
}

#[test]
fn startpos_prefers_a_classical_first_move() {
    let (best, score) = best_after("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1", 8);
    assert!(
        ["e2e4", "d2d4", "g1f3", "c2c4"].contains(&best.as_str()),
        "unexpected opening move {best}"
    );
    assert!(score.abs() <= 400, "startpos score {score} out of range");
}

#[test]
fn finds_mate_in_one_for_white() {
    // Back-rank mate: Ra8#.
    let (best, score) = best_after("6k1/5ppp/8/8/8/8/8/R3K3 w - - 0 1", 4);
    assert_eq!(best, "a1a8");
    assert!(is_score_mate(score), "expected mate score, got {score}");
    assert_eq!(score, SCORE_MATE - 1);
}

#[test]
fn finds_mate_in_one_for_black() {
    // Mirror of the back-rank mate.
    let (best, score) = best_after("r3k3/8/8/8/8/8/5PPP/6K1 b - - 0 1", 4);
    assert_eq!(best, "a8a1");
    assert!(is_score_mate(score), "expected mate, got {score}");
    assert_eq!(score, SCORE_MATE - 1);
}

#[test]
fn prefers_winning_a_queen() {
    // The black queen hangs; taking it must dominate every quiet move.
    let (best, score) = best_after("k7/8/3q4/8/8/8/8/3QK3 w - - 0 1", 6);
    assert_eq!(best, "d1d6");
    assert!(score > 0);
}

#[test]
fn finds_mate_in_two() {
    // Classic two-rook ladder.
    let (_, score) = best_after("7k/8/8/8/8/8/R7/1R4K1 w - - 0 1", 6);
    assert!(is_score_mate(score), "expected forced mate, got {score}");
    assert!(score >= SCORE_MATE - 3, "mate too far off: {score}");
}

#[test]
fn node_limit_is_respected() {
    let mut thread = searcher(8);
    thread.set_position(Position::new());
    thread.search(SearchLimits::nodes(20_000));
    assert!(
        thread.nodes <= 40_000,
        "searched {} nodes against a 20k cap",
        thread.nodes
    );
    assert!(!thread.root_moves.is_empty());
}

#[test]
fn deeper_searches_visit_more_nodes() {
    let mut shallow = searcher(8);
    shallow.set_position(Position::new());
    shallow.search(SearchLimits::depth(3));

    let mut deep = searcher(8);
    deep.set_position(Position::new());
    deep.search(SearchLimits::depth(7));

    assert!(deep.nodes > shallow.nodes);
    assert!(deep.completed_depth >= shallow.completed_depth);
}

#[test]
fn tt_reuse_shrinks_the_second_search() {
    let tt = Arc::new(TranspositionTable::new(16));
    let mut thread = SearchThread::new(
        0,
        Arc::clone(&tt),
        Arc::clone(&PROXY_NETWORK),
        Arc::new(AtomicBool::new(false)),
        Arc::new(AtomicU64::new(0)),
    );
    thread.set_position(Position::new());
    thread.search(SearchLimits::depth(7));
    let cold = thread.nodes;

    thread.clear_stop();
    thread.set_position(Position::new());
    thread.search(SearchLimits::depth(7));
    let warm = thread.nodes;

    assert!(
        warm < cold,
        "warm search ({warm}) should reuse TT from cold ({cold})"
    );
}

#[test]
fn stalemate_scores_zero() {
    // Black to move, no moves, not in check.
    let mut thread = searcher(8);
    thread.set_position(Position::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap());
    thread.search(SearchLimits::depth(4));
    // No legal moves: root move list is empty and no best move exists.
    assert!(thread.root_moves.is_empty());
}

#[test]
fn repetition_draw_is_seen_by_search() {
    // KQ vs KQ shuffle: search should never report a decisive score
    // in a dead-drawn shuffle position.
    let (_, score) = best_after("3qk3/8/8/8/8/8/8/3QK3 b - - 0 1", 6);
    assert!(score.abs() < 800);
}
