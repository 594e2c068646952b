//! Upcoming-repetition (cuckoo) probing.

use crate::board::Position;

#[test]
fn cycle_detected_when_a_shuffle_can_repeat() {
    let mut pos = Position::new();

    // After Nf3 Nf6 Ng1, black's Ng8 would repeat the start position:
    // the probe must see the cycle coming.
    for text in ["g1f3", "g8f6", "f3g1"] {
        assert!(!pos.has_cycle(2), "no cycle should exist yet");
        let mv = pos.try_find_move(text).unwrap();
        pos.make_move(mv);
    }

    assert!(pos.has_cycle(4));
}

#[test]
fn no_cycle_after_irreversible_moves() {
    let mut pos = Position::new();
    for text in ["e2e4", "e7e5", "g1f3", "b8c6"] {
        let mv = pos.try_find_move(text).unwrap();
        pos.make_move(mv);
        assert!(!pos.has_cycle(6), "pawn pushes are irreversible");
    }
}

#[test]
fn cycle_probe_respects_the_halfmove_window() {
    // A fresh position has no history to repeat into.
    let pos =
        Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
            .unwrap();
    assert!(!pos.has_cycle(10));
}
