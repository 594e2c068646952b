//! Draw detection.

use crate::board::Position;

#[test]
fn fifty_move_rule() {
    let pos = Position::from_fen("4k3/8/8/8/8/8/8/4K2R w - - 100 80").unwrap();
    assert!(pos.is_fifty_move_draw());
    assert!(pos.is_draw());

    let pos = Position::from_fen("4k3/8/8/8/8/8/8/4K2R w - - 99 80").unwrap();
    assert!(!pos.is_fifty_move_draw());
}

#[test]
fn insufficient_material_table() {
    // Bare kings.
    assert!(Position::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1")
        .unwrap()
        .is_insufficient_material());
    // Single minor piece.
    assert!(Position::from_fen("4k3/8/8/8/8/8/8/3NK3 w - - 0 1")
        .unwrap()
        .is_insufficient_material());
    assert!(Position::from_fen("4k3/8/8/8/8/8/8/3BK3 w - - 0 1")
        .unwrap()
        .is_insufficient_material());
    // Two knights still count as drawn here.
    assert!(Position::from_fen("4k3/8/8/8/8/8/8/2NNK3 w - - 0 1")
        .unwrap()
        .is_insufficient_material());
    // Two bishops can mate.
    assert!(!Position::from_fen("4k3/8/8/8/8/8/8/2BBK3 w - - 0 1")
        .unwrap()
        .is_insufficient_material());
    // Any pawn, rook, or queen keeps the game alive.
    assert!(!Position::from_fen("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1")
        .unwrap()
        .is_insufficient_material());
    assert!(!Position::from_fen("4k3/8/8/8/8/8/8/3RK3 w - - 0 1")
        .unwrap()
        .is_insufficient_material());
}

#[test]
fn threefold_on_the_state_stack() {
    let mut pos = Position::new();

    // Shuffle the knights back and forth: the start position recurs
    // after every fourth ply.
    let cycle = ["g1f3", "g8f6", "f3g1", "f6g8"];
    for _ in 0..2 {
        for text in cycle {
            assert!(!pos.is_threefold(), "premature repetition claim");
            let mv = pos.try_find_move(text).unwrap();
            pos.make_move(mv);
        }
    }

    // Start position now seen three times (initial + two returns).
    assert!(pos.is_threefold());
    assert!(pos.is_draw());
}

#[test]
fn unmake_rolls_back_repetition_state() {
    let mut pos = Position::new();
    let cycle = ["g1f3", "g8f6", "f3g1", "f6g8"];
    let mut played = Vec::new();
    for _ in 0..2 {
        for text in cycle {
            let mv = pos.try_find_move(text).unwrap();
            pos.make_move(mv);
            played.push(mv);
        }
    }
    assert!(pos.is_threefold());

    let last = played.pop().unwrap();
    pos.unmake_move(last);
    assert!(!pos.is_threefold());
}
