//! Quiescence search: play out captures (and evasions when in check)
//! until the position is quiet enough to trust the static eval.

use super::movepicker::{MovePicker, PickContext};
use super::params::{piece_value, QS_FUTILE_MARGIN, QS_SEE_MARGIN};
use super::{SearchThread, MAX_SEARCH_PLY, NT_NON_PV};
use crate::board::history::cont_index;
use crate::board::types::{Move, Piece};
use crate::score::{
    make_draw_score, make_mate_score, make_normal_score, make_tt_score, SCORE_DRAW,
    SCORE_INFINITE, SCORE_NONE, SCORE_TT_LOSS, SCORE_TT_WIN, SCORE_WIN,
};
use crate::tt::{Bound, DEPTH_NONE};

impl SearchThread {
    pub(crate) fn qsearch<const NT: u8>(&mut self, ss: usize, mut alpha: i32, beta: i32) -> i32 {
        let is_pv = NT != NT_NON_PV;
        let ply = i32::from(self.stack[ss].ply);

        if alpha < SCORE_DRAW && self.pos.has_cycle(ply) {
            alpha = make_draw_score(self.nodes);
            if alpha >= beta {
                return alpha;
            }
        }

        let us = self.pos.side_to_move();
        let in_check = self.pos.in_check();
        self.stack[ss].in_check = in_check;

        let (tt_hit, tt_slot) = self.tt.probe(self.pos.hash());
        let tte = tt_slot.read();
        self.stack[ss].tt_hit = tt_hit;
        let tt_score = if tt_hit {
            make_normal_score(tte.score(), ply)
        } else {
            SCORE_NONE
        };
        let tt_move = if tt_hit { tte.best_move() } else { Move::NULL };
        let tt_pv = tt_hit && tte.is_pv();

        if is_pv {
            self.stack[ss].pv[0] = Move::NULL;
            self.stack[ss].pv_len = 0;
            self.sel_depth = self.sel_depth.max(ply + 1);
        }

        if self.pos.is_draw() {
            return SCORE_DRAW;
        }

        if ply >= MAX_SEARCH_PLY - 1 {
            return if in_check { SCORE_DRAW } else { self.raw_eval() };
        }

        if !is_pv && tt_score != SCORE_NONE && tte.bound().permits(tt_score >= beta) {
            return tt_score;
        }

        let mut raw_eval = SCORE_NONE;
        let mut best_score = -SCORE_INFINITE;
        let mut futility = -SCORE_INFINITE;

        if in_check {
            self.stack[ss].static_eval = -SCORE_INFINITE;
        } else {
            raw_eval = if tt_hit {
                if i32::from(tte.static_eval()) != SCORE_NONE {
                    i32::from(tte.static_eval())
                } else {
                    self.raw_eval()
                }
            } else if self.stack[ss - 1].current_move.is_null()
                && self.stack[ss - 1].static_eval != SCORE_NONE
                && self.stack[ss - 1].static_eval != -SCORE_INFINITE
            {
                // After a null move the parent's eval is simply ours
                // negated.
                -self.stack[ss - 1].static_eval
            } else {
                self.raw_eval()
            };

            let static_eval = self.adjust_eval(raw_eval);
            self.stack[ss].static_eval = static_eval;

            let mut eval = static_eval;
            if tt_hit && tt_score != SCORE_NONE && tte.bound().permits(tt_score > eval) {
                eval = tt_score;
            }

            if eval >= beta {
                return self.stand_pat_cutoff(eval, beta, raw_eval, tt_hit, &tt_slot, ply);
            }
            if eval > alpha {
                alpha = eval;
            }
            best_score = eval;

            futility = static_eval.min(best_score) + QS_FUTILE_MARGIN;
        }

        let prev_square = if self.stack[ss - 1].current_move.is_null() {
            None
        } else {
            Some(self.stack[ss - 1].current_move.to())
        };

        let mut best_move = Move::NULL;
        let mut legal_moves = 0;
        let mut check_evasions = 0;

        let mut picker = MovePicker::qsearch(&self.pos, tt_move);

        loop {
            let ctx = PickContext {
                pos: &self.pos,
                history: &self.history,
                conts: self.cont_owners(ss),
                ply: ply.max(0) as usize,
            };
            let Some(m) = picker.next(&ctx) else { break };

            if !self.pos.is_legal(m) {
                continue;
            }
            legal_moves += 1;

            let from = m.from();
            let to = m.to();
            let our_piece = self.pos.piece_at(from).unwrap_or(Piece::Pawn);
            let their_piece = self.pos.piece_at(to);
            let is_capture = self.pos.is_capture(m);
            let gives_check = self.pos.gives_check(our_piece, to);

            if best_score > SCORE_TT_LOSS {
                if !(gives_check || m.is_promotion())
                    && prev_square != Some(to)
                    && futility > -SCORE_WIN
                {
                    // Late non-forcing moves aren't going to rescue a
                    // quiet node.
                    if legal_moves > 3 && !in_check {
                        continue;
                    }

                    let futility_value =
                        futility + their_piece.map_or(0, piece_value);
                    if futility_value <= alpha {
                        best_score = best_score.max(futility_value);
                        continue;
                    }

                    if futility <= alpha && !self.pos.see_ge(m, 1) {
                        best_score = best_score.max(futility);
                        continue;
                    }
                }

                if check_evasions >= 2 {
                    break;
                }

                if !in_check && !self.pos.see_ge(m, -QS_SEE_MARGIN) {
                    continue;
                }
            }

            self.tt.prefetch(self.pos.hash_after(m));

            if in_check && !is_capture {
                check_evasions += 1;
            }

            self.stack[ss].current_move = m;
            self.stack[ss].cont_hist = Some(cont_index(in_check, is_capture, us, our_piece, to));
            self.nodes += 1;

            self.pos.make_move(m);
            let score = -self.qsearch::<NT>(ss + 1, -beta, -alpha);
            self.pos.unmake_move(m);

            if score > best_score {
                best_score = score;

                if score > alpha {
                    best_move = m;
                    alpha = score;

                    if is_pv {
                        self.update_pv(ss, m);
                    }

                    if score >= beta {
                        if best_score.abs() < SCORE_TT_WIN {
                            best_score = (4 * best_score + beta) / 5;
                        }
                        break;
                    }
                }
            }
        }

        if in_check && legal_moves == 0 {
            return make_mate_score(ply);
        }

        let bound = if best_score >= beta {
            Bound::Lower
        } else {
            Bound::Upper
        };
        tt_slot.update(
            self.pos.hash(),
            make_tt_score(best_score, ply),
            bound,
            0,
            best_move,
            raw_eval as i16,
            self.tt.age(),
            tt_pv,
        );

        best_score
    }

    /// Stand-pat beta cutoff with the usual smoothing toward beta and
    /// a depth-none TT record when the slot was empty.
    fn stand_pat_cutoff(
        &self,
        eval: i32,
        beta: i32,
        raw_eval: i32,
        tt_hit: bool,
        tt_slot: &crate::tt::TTSlot,
        ply: i32,
    ) -> i32 {
        if !tt_hit {
            tt_slot.update(
                self.pos.hash(),
                make_tt_score(eval, ply),
                Bound::Lower,
                DEPTH_NONE,
                Move::NULL,
                raw_eval as i16,
                self.tt.age(),
                false,
            );
        }

        if eval.abs() < SCORE_TT_WIN {
            (4 * eval + beta) / 5
        } else {
            eval
        }
    }
}
