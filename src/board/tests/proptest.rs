//! Property-based tests over random legal play.

use proptest::prelude::*;
use rand::prelude::*;
use rand::Rng;

use crate::board::{Move, MoveList, Position};

fn seed_strategy() -> impl Strategy<Value = u64> {
    any::<u64>()
}

fn move_count_strategy() -> impl Strategy<Value = usize> {
    1..=24usize
}

fn random_game(seed: u64, plies: usize) -> (Position, Vec<Move>) {
    let mut pos = Position::new();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut played = Vec::new();

    for _ in 0..plies {
        let mut list = MoveList::new();
        pos.legal_moves(&mut list);
        if list.is_empty() {
            break;
        }
        let mv = list[rng.gen_range(0..list.len())].mv;
        pos.make_move(mv);
        played.push(mv);
    }
    (pos, played)
}

proptest! {
    /// make followed by unmake restores board identity byte for byte.
    #[test]
    fn prop_make_unmake_restores_state(seed in seed_strategy(), plies in move_count_strategy()) {
        let (mut pos, mut played) = random_game(seed, plies);
        let reference = Position::new();

        while let Some(mv) = played.pop() {
            pos.unmake_move(mv);
        }

        prop_assert_eq!(pos.hash(), reference.hash());
        prop_assert_eq!(pos.to_fen(), reference.to_fen());
        prop_assert_eq!(pos.bb.pieces, reference.bb.pieces);
        prop_assert_eq!(pos.bb.colors, reference.bb.colors);
        prop_assert_eq!(pos.bb.occupancy, reference.bb.occupancy);
    }

    /// Every legal move is also pseudo-legal, and playing it leaves
    /// the mover out of check.
    #[test]
    fn prop_legal_subset_of_pseudo_legal(seed in seed_strategy(), plies in move_count_strategy()) {
        let (mut pos, _) = random_game(seed, plies);

        let mut legal = MoveList::new();
        pos.legal_moves(&mut legal);
        let moves: Vec<Move> = legal.iter().collect();

        for mv in moves {
            prop_assert!(pos.is_pseudo_legal(mv), "{} not pseudo-legal", mv);
            let mover = pos.side_to_move();
            pos.make_move(mv);
            let king = pos.king_sq(mover);
            let attacked = pos.bb.attackers_to(king, pos.bb.occupancy)
                & pos.bb.colors[mover.flip().index()];
            prop_assert_eq!(attacked, 0, "{} leaves own king attacked", mv);
            pos.unmake_move(mv);
        }
    }

    /// In check, every legal move appears in the evasion list.
    #[test]
    fn prop_evasions_cover_legal(seed in seed_strategy(), plies in move_count_strategy()) {
        let (pos, _) = random_game(seed, plies);
        if !pos.in_check() {
            return Ok(());
        }

        let mut evasions = MoveList::new();
        pos.generate(&mut evasions, crate::board::GenKind::Evasions);
        let mut legal = MoveList::new();
        pos.legal_moves(&mut legal);

        for mv in legal.iter() {
            prop_assert!(evasions.contains(mv), "evasions missing {}", mv);
        }
    }

    /// FEN serialization round-trips for reachable positions.
    #[test]
    fn prop_fen_round_trip(seed in seed_strategy(), plies in move_count_strategy()) {
        let (pos, _) = random_game(seed, plies);
        let fen = pos.to_fen();
        let reparsed = Position::from_fen(&fen).unwrap();
        prop_assert_eq!(reparsed.to_fen(), fen);
        prop_assert_eq!(reparsed.hash(), pos.hash());
    }

    /// SEE with threshold zero agrees with sign stability: raising the
    /// threshold can only turn wins into losses, never the reverse.
    #[test]
    fn prop_see_is_monotone_in_threshold(seed in seed_strategy(), plies in move_count_strategy()) {
        let (pos, _) = random_game(seed, plies);
        let mut list = MoveList::new();
        pos.legal_moves(&mut list);

        for mv in list.iter() {
            if !pos.is_capture(mv) {
                continue;
            }
            let lo = pos.see_ge(mv, -200);
            let mid = pos.see_ge(mv, 0);
            let hi = pos.see_ge(mv, 200);
            prop_assert!(lo || !mid, "{} fails -200 but passes 0", mv);
            prop_assert!(mid || !hi, "{} fails 0 but passes 200", mv);
        }
    }
}
