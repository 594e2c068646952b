//! Criterion benchmarks: perft, move generation, evaluation, search.

use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use roan::board::nnue::{evaluate, Network};
use roan::board::{MoveList, Position, SearchLimits, SearchThread};
use roan::tt::TranspositionTable;

const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

fn bench_perft(c: &mut Criterion) {
    let mut group = c.benchmark_group("perft");

    let mut startpos = Position::new();
    for depth in 1..=4 {
        group.bench_with_input(BenchmarkId::new("startpos", depth), &depth, |b, &depth| {
            b.iter(|| startpos.perft(black_box(depth)));
        });
    }

    let mut kiwipete = Position::from_fen(KIWIPETE).unwrap();
    for depth in 1..=3 {
        group.bench_with_input(BenchmarkId::new("kiwipete", depth), &depth, |b, &depth| {
            b.iter(|| kiwipete.perft(black_box(depth)));
        });
    }

    group.finish();
}

fn bench_movegen(c: &mut Criterion) {
    let mut group = c.benchmark_group("movegen");

    for (name, fen) in [
        ("startpos", "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"),
        ("kiwipete", KIWIPETE),
        ("endgame", "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1"),
    ] {
        let pos = Position::from_fen(fen).unwrap();
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut list = MoveList::new();
                pos.legal_moves(black_box(&mut list));
                list.len()
            });
        });
    }

    group.finish();
}

fn bench_make_unmake(c: &mut Criterion) {
    let pos = Position::from_fen(KIWIPETE).unwrap();
    let mut list = MoveList::new();
    pos.legal_moves(&mut list);
    let moves: Vec<_> = list.iter().collect();

    let mut pos = Position::from_fen(KIWIPETE).unwrap();
    c.bench_function("make_unmake/kiwipete_all_moves", |b| {
        b.iter(|| {
            for &mv in &moves {
                pos.make_move(black_box(mv));
                pos.unmake_move(mv);
            }
        });
    });
}

fn bench_eval(c: &mut Criterion) {
    let network = Network::material_proxy();
    let mut pos = Position::from_fen(KIWIPETE).unwrap();

    c.bench_function("nnue/evaluate_kiwipete", |b| {
        b.iter(|| black_box(evaluate(&mut pos, &network)));
    });
}

fn bench_search(c: &mut Criterion) {
    let network = Arc::new(Network::material_proxy());

    let mut group = c.benchmark_group("search");
    group.sample_size(10);

    for depth in [4, 6] {
        group.bench_with_input(BenchmarkId::new("startpos", depth), &depth, |b, &depth| {
            b.iter(|| {
                let mut thread = SearchThread::new(
                    0,
                    Arc::new(TranspositionTable::new(16)),
                    Arc::clone(&network),
                    Arc::new(AtomicBool::new(false)),
                    Arc::new(AtomicU64::new(0)),
                );
                thread.set_position(Position::new());
                thread.search(SearchLimits::depth(depth));
                thread.searched_nodes()
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_perft,
    bench_movegen,
    bench_make_unmake,
    bench_eval,
    bench_search
);
criterion_main!(benches);
