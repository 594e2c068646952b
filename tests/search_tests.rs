//! Search integration through the thread pool.

use std::sync::Arc;

use once_cell::sync::Lazy;

use roan::board::nnue::Network;
use roan::board::{Position, SearchLimits, ThreadPool};
use roan::tt::TranspositionTable;

static PROXY_NETWORK: Lazy<Arc<Network>> = Lazy::new(|| Arc::new(Network::material_proxy()));

fn pool(threads: usize, tt_mb: usize) -> ThreadPool {
    ThreadPool::new(
        threads,
        Arc::new(TranspositionTable::new(tt_mb)),
        Arc::clone(&PROXY_NETWORK),
    )
}

fn search_best(pool: &ThreadPool, fen: &str, limits: &SearchLimits) -> String {
    let pos = Position::from_fen(fen).unwrap();
    pool.start_search(&pos, &[], limits, 1, 25, false);
    pool.wait_for_main();
    pool.best_move().expect("no best move")
}

#[test]
fn single_thread_depth_search_completes() {
    let pool = pool(1, 16);
    let best = search_best(
        &pool,
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
        &SearchLimits::depth(8),
    );
    assert!(
        ["e2e4", "d2d4", "g1f3", "c2c4"].contains(&best.as_str()),
        "unexpected opening move {best}"
    );
}

#[test]
fn multi_threaded_search_agrees_on_forced_tactics() {
    let pool = pool(4, 32);
    // Mate in one is unambiguous however many helpers run.
    let best = search_best(&pool, "6k1/5ppp/8/8/8/8/8/R3K3 w - - 0 1", &SearchLimits::depth(6));
    assert_eq!(best, "a1a8");
}

#[test]
fn setup_moves_shift_the_root() {
    let pool = pool(1, 16);
    let pos = Position::new();
    // After 1. e4 e5 2. Nf3, black to move; any legal reply is fine,
    // but it must be a BLACK move.
    let moves: Vec<String> = ["e2e4", "e7e5", "g1f3"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    pool.start_search(&pos, &moves, &SearchLimits::depth(5), 1, 25, false);
    pool.wait_for_main();
    let best = pool.best_move().unwrap();

    let mut check = Position::new();
    for text in &moves {
        let mv = check.try_find_move(text).unwrap();
        check.make_move(mv);
    }
    assert!(check.try_find_move(&best).is_ok(), "{best} not legal in the shifted root");
}

#[test]
fn node_limited_search_stops_early() {
    let pool = pool(1, 16);
    let pos = Position::new();
    pool.start_search(&pos, &[], &SearchLimits::nodes(50_000), 1, 25, false);
    pool.wait_for_main();
    assert!(pool.best_move().is_some());
    assert!(
        pool.node_count() < 500_000,
        "node cap ignored: {}",
        pool.node_count()
    );
}

#[test]
fn stop_command_interrupts() {
    let pool = pool(2, 16);
    let pos = Position::new();
    pool.start_search(&pos, &[], &SearchLimits::default(), 1, 25, false);
    std::thread::sleep(std::time::Duration::from_millis(300));
    pool.stop_all();
    pool.wait_for_main();
    assert!(pool.best_move().is_some());
}

#[test]
fn move_time_limit_is_honored() {
    let pool = pool(1, 16);
    let pos = Position::from_fen(
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    )
    .unwrap();

    let start = std::time::Instant::now();
    pool.start_search(&pos, &[], &SearchLimits::move_time(400), 1, 25, false);
    pool.wait_for_main();
    let elapsed = start.elapsed();

    assert!(pool.best_move().is_some());
    assert!(
        elapsed.as_millis() < 5_000,
        "movetime 400 ran for {elapsed:?}"
    );
}

#[test]
fn consecutive_searches_reuse_the_pool() {
    let pool = pool(1, 16);
    for fen in [
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    ] {
        let best = search_best(&pool, fen, &SearchLimits::depth(5));
        let pos = Position::from_fen(fen).unwrap();
        assert!(pos.try_find_move(&best).is_ok(), "{best} illegal in {fen}");
    }
}
