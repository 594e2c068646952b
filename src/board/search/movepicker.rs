//! Staged move picking.
//!
//! Main-search stages:
//! TT -> GenNoisy -> GoodNoisy -> Killer -> GenQuiet -> PlayQuiet ->
//! StartBadNoisy -> BadNoisy -> End.
//! Quiescence runs a parallel sequence that only reaches quiets when
//! in check. Lists are scored once and consumed with an on-demand
//! selection sort; captures split into good and bad by a SEE test at
//! a quarter of their ordering score.

use super::params::{piece_value, CHECK_BONUS, MVV_MULT};
use crate::board::history::{ContHistIndex, HistoryTable, LOW_PLY_COUNT};
use crate::board::movegen::GenKind;
use crate::board::position::Position;
use crate::board::types::{make_piece_index, Move, MoveList, Piece};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Stage {
    Tt,
    GenNoisy,
    GoodNoisy,
    Killer,
    GenQuiet,
    PlayQuiet,
    StartBadNoisy,
    BadNoisy,
    End,
}

/// Borrowed context for scoring; rebuilt per `next` call so the picker
/// itself holds no references into the search thread.
pub(crate) struct PickContext<'a> {
    pub pos: &'a Position,
    pub history: &'a HistoryTable,
    /// Continuation owners 1, 2, 4, and 6 plies back; `None` where a
    /// null move (or the root boundary) intervenes.
    pub conts: [Option<ContHistIndex>; 4],
    pub ply: usize,
}

pub(crate) struct MovePicker {
    stage: Stage,
    qsearch: bool,
    in_check: bool,
    tt_move: Move,
    killer: Move,
    noisy: MoveList,
    bad_noisy: MoveList,
    quiets: MoveList,
    /// Filled during the noisy stage when in check (evasions come out
    /// of one generator call).
    quiets_ready: bool,
    idx: usize,
    skip_quiets: bool,
}

impl MovePicker {
    pub fn main_search(pos: &Position, tt_move: Move, killer: Move) -> Self {
        Self::new(pos, tt_move, killer, false)
    }

    pub fn qsearch(pos: &Position, tt_move: Move) -> Self {
        Self::new(pos, tt_move, Move::NULL, true)
    }

    fn new(pos: &Position, tt_move: Move, killer: Move, qsearch: bool) -> Self {
        let usable_tt = !tt_move.is_null() && pos.is_pseudo_legal(tt_move);
        MovePicker {
            stage: if usable_tt { Stage::Tt } else { Stage::GenNoisy },
            qsearch,
            in_check: pos.in_check(),
            tt_move: if usable_tt { tt_move } else { Move::NULL },
            killer: if killer != tt_move { killer } else { Move::NULL },
            noisy: MoveList::new(),
            bad_noisy: MoveList::new(),
            quiets: MoveList::new(),
            quiets_ready: false,
            idx: 0,
            skip_quiets: false,
        }
    }

    /// Quiets can no longer beat alpha; jump to the leftovers.
    pub fn start_skipping_quiets(&mut self) {
        self.skip_quiets = true;
    }

    /// True once every noisy move the SEE test liked has been handed
    /// out.
    pub fn finished_good_noisy(&self) -> bool {
        !matches!(self.stage, Stage::Tt | Stage::GenNoisy | Stage::GoodNoisy)
    }

    pub fn next(&mut self, ctx: &PickContext<'_>) -> Option<Move> {
        loop {
            match self.stage {
                Stage::Tt => {
                    self.stage = Stage::GenNoisy;
                    return Some(self.tt_move);
                }

                Stage::GenNoisy => {
                    if self.in_check {
                        // One evasion pass, split into the two lists.
                        let mut evasions = MoveList::new();
                        ctx.pos.generate(&mut evasions, GenKind::Evasions);
                        for i in 0..evasions.len() {
                            let mv = evasions[i].mv;
                            if ctx.pos.is_noisy(mv) || mv.is_promotion() {
                                self.noisy.push(mv);
                            } else {
                                self.quiets.push(mv);
                            }
                        }
                        self.quiets_ready = true;
                    } else {
                        ctx.pos.generate(&mut self.noisy, GenKind::Noisy);
                    }
                    self.score_noisy(ctx);
                    self.idx = 0;
                    self.stage = Stage::GoodNoisy;
                }

                Stage::GoodNoisy => {
                    while self.idx < self.noisy.len() {
                        let sm = order_next(&mut self.noisy, self.idx);
                        self.idx += 1;

                        if self.qsearch {
                            // Quiescence plays them all in order; the
                            // caller does its own SEE pruning.
                            return Some(sm.mv);
                        }

                        let threshold = -sm.score / 4;
                        if ctx.pos.see_ge(sm.mv, threshold) {
                            return Some(sm.mv);
                        }
                        self.bad_noisy.push(sm.mv);
                        let last = self.bad_noisy.len() - 1;
                        self.bad_noisy[last].score = sm.score;
                    }
                    self.stage = Stage::Killer;
                }

                Stage::Killer => {
                    self.stage = Stage::GenQuiet;
                    if self.qsearch && !self.in_check {
                        self.stage = Stage::StartBadNoisy;
                        continue;
                    }
                    if !self.qsearch
                        && !self.skip_quiets
                        && !self.killer.is_null()
                        && !ctx.pos.is_noisy(self.killer)
                        && ctx.pos.is_pseudo_legal(self.killer)
                    {
                        return Some(self.killer);
                    }
                }

                Stage::GenQuiet => {
                    if self.skip_quiets {
                        self.stage = Stage::StartBadNoisy;
                        continue;
                    }
                    if !self.quiets_ready {
                        let mut all = MoveList::new();
                        ctx.pos.generate(&mut all, GenKind::NonEvasions);
                        for i in 0..all.len() {
                            let mv = all[i].mv;
                            if !ctx.pos.is_noisy(mv) && !mv.is_promotion() {
                                self.quiets.push(mv);
                            }
                        }
                        self.quiets_ready = true;
                    }
                    self.score_quiets(ctx);
                    self.idx = 0;
                    self.stage = Stage::PlayQuiet;
                }

                Stage::PlayQuiet => {
                    if self.skip_quiets {
                        self.stage = Stage::StartBadNoisy;
                        continue;
                    }
                    if self.idx < self.quiets.len() {
                        let sm = order_next(&mut self.quiets, self.idx);
                        self.idx += 1;
                        return Some(sm.mv);
                    }
                    self.stage = Stage::StartBadNoisy;
                }

                Stage::StartBadNoisy => {
                    self.idx = 0;
                    self.stage = Stage::BadNoisy;
                }

                Stage::BadNoisy => {
                    if self.qsearch {
                        // Quiescence already consumed the whole noisy
                        // list up front.
                        self.stage = Stage::End;
                        continue;
                    }
                    if self.idx < self.bad_noisy.len() {
                        let mv = self.bad_noisy[self.idx].mv;
                        self.idx += 1;
                        return Some(mv);
                    }
                    self.stage = Stage::End;
                }

                Stage::End => return None,
            }
        }
    }

    /// MVV plus capture history for captures, target value for
    /// promotions. The TT and killer moves are dropped here so they
    /// can't come out twice.
    fn score_noisy(&mut self, ctx: &PickContext<'_>) {
        let us = ctx.pos.side_to_move();
        let mut i = 0;
        while i < self.noisy.len() {
            let mv = self.noisy[i].mv;
            if mv == self.tt_move || mv == self.killer {
                self.noisy.swap_remove(i);
                continue;
            }

            let piece = ctx.pos.piece_at(mv.from()).unwrap_or(Piece::Pawn);
            self.noisy[i].score = if ctx.pos.is_capture(mv) {
                let victim = ctx.pos.piece_at(mv.to()).unwrap_or(Piece::Pawn);
                MVV_MULT * piece_value(victim) + ctx.history.capture(us, piece, mv.to(), victim)
            } else if mv.is_promotion() {
                piece_value(mv.promotion_piece())
            } else {
                // En passant.
                MVV_MULT * piece_value(Piece::Pawn)
            };
            i += 1;
        }
    }

    /// Main + continuation histories, low-ply weighting near the root,
    /// and a bonus for checking moves.
    fn score_quiets(&mut self, ctx: &PickContext<'_>) {
        let us = ctx.pos.side_to_move();
        let mut i = 0;
        while i < self.quiets.len() {
            let mv = self.quiets[i].mv;
            if mv == self.tt_move || mv == self.killer {
                self.quiets.swap_remove(i);
                continue;
            }

            let piece = ctx.pos.piece_at(mv.from()).unwrap_or(Piece::Pawn);
            let cont_piece = make_piece_index(us, piece);
            let to = mv.to();

            let mut score = 2 * ctx.history.main(us, mv);
            let weights = [2, 1, 1, 1];
            for (slot, weight) in ctx.conts.iter().zip(weights) {
                if let Some(owner) = slot {
                    score += weight * ctx.history.continuation(*owner, cont_piece, to);
                }
            }

            if ctx.ply < LOW_PLY_COUNT {
                score += (2 * LOW_PLY_COUNT as i32 + 1) * ctx.history.low_ply(ctx.ply, mv)
                    / (2 * ctx.ply as i32 + 1);
            }

            if ctx.pos.gives_check(piece, to) {
                score += CHECK_BONUS;
            }

            self.quiets[i].score = score;
            i += 1;
        }
    }
}

/// Selection-sort step: move the best remaining entry to `idx` and
/// return it.
fn order_next(list: &mut MoveList, idx: usize) -> crate::board::types::ScoredMove {
    let mut best = idx;
    for i in idx + 1..list.len() {
        if list[i].score > list[best].score {
            best = i;
        }
    }
    list.swap(idx, best);
    list[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(pos: &Position, tt_move: Move, killer: Move) -> Vec<Move> {
        let history = HistoryTable::new();
        let ctx = PickContext {
            pos,
            history: &history,
            conts: [None; 4],
            ply: 0,
        };
        let mut picker = MovePicker::main_search(pos, tt_move, killer);
        let mut out = Vec::new();
        while let Some(mv) = picker.next(&ctx) {
            out.push(mv);
        }
        out
    }

    #[test]
    fn yields_every_pseudo_legal_move_once() {
        let pos =
            Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
                .unwrap();
        let mut expected = MoveList::new();
        pos.generate(&mut expected, GenKind::PseudoLegal);

        let picked = drain(&pos, Move::NULL, Move::NULL);
        assert_eq!(picked.len(), expected.len());

        let mut seen = std::collections::HashSet::new();
        for mv in &picked {
            assert!(seen.insert(*mv), "{mv} yielded twice");
            assert!(expected.contains(*mv));
        }
    }

    #[test]
    fn tt_move_comes_first_and_never_repeats() {
        let pos = Position::new();
        let tt_move = pos.try_find_move("e2e4").unwrap();
        let picked = drain(&pos, tt_move, Move::NULL);
        assert_eq!(picked[0], tt_move);
        assert_eq!(picked.iter().filter(|&&m| m == tt_move).count(), 1);
    }

    #[test]
    fn killer_precedes_other_quiets() {
        let pos = Position::new();
        let killer = pos.try_find_move("g1f3").unwrap();
        let picked = drain(&pos, Move::NULL, killer);
        // No captures at the start position, so the killer leads.
        assert_eq!(picked[0], killer);
        assert_eq!(picked.iter().filter(|&&m| m == killer).count(), 1);
    }

    #[test]
    fn captures_order_by_victim_value() {
        // Queen can take a rook or a pawn; the rook capture must come
        // out first.
        let pos = Position::from_fen("4k3/8/2r3p1/8/8/8/2Q5/4K3 w - - 0 1").unwrap();
        let picked = drain(&pos, Move::NULL, Move::NULL);
        let rook_cap = pos.try_find_move("c2c6").unwrap();
        let pawn_cap = pos.try_find_move("c2g6").unwrap();
        let rook_at = picked.iter().position(|&m| m == rook_cap).unwrap();
        let pawn_at = picked.iter().position(|&m| m == pawn_cap).unwrap();
        assert!(rook_at < pawn_at);
    }

    #[test]
    fn qsearch_without_check_yields_only_noisy() {
        let pos =
            Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
                .unwrap();
        let history = HistoryTable::new();
        let ctx = PickContext {
            pos: &pos,
            history: &history,
            conts: [None; 4],
            ply: 0,
        };
        let mut picker = MovePicker::qsearch(&pos, Move::NULL);
        while let Some(mv) = picker.next(&ctx) {
            assert!(pos.is_noisy(mv) || mv.is_promotion(), "{mv} is quiet");
        }
    }
}
