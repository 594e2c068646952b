//! The main alpha-beta node.

use super::movepicker::{MovePicker, PickContext};
use super::params::*;
use super::{SearchThread, MAX_SEARCH_PLY, NT_NON_PV, NT_PV, NT_ROOT};
use crate::board::attack_tables::{lmp_threshold, lmr_reduction};
use crate::board::history::cont_index;
use crate::board::movegen::GenKind;
use crate::board::see::see_value;
use crate::board::types::{make_piece_index, Color, Move, MoveList, Piece, Square};
use crate::score::{
    make_draw_score, make_mate_score, make_normal_score, make_tt_score, SCORE_ASSURED_WIN,
    SCORE_DRAW, SCORE_INFINITE, SCORE_MATE, SCORE_MATED_MAX, SCORE_NONE, SCORE_TT_WIN, SCORE_WIN,
};
use crate::tt::Bound;

impl SearchThread {
    /// Evaluate the current position through the network.
    pub(crate) fn raw_eval(&mut self) -> i32 {
        crate::board::nnue::evaluate(&mut self.pos, &self.nnue)
    }

    /// Static eval adjusted by the halfmove damper and the correction
    /// histories.
    pub(crate) fn adjust_eval(&self, raw: i32) -> i32 {
        let us = self.pos.side_to_move();
        let damped = raw * (200 - self.pos.halfmove_clock()) / 200;
        damped
            + self.history.correction(
                us,
                self.pos.pawn_hash(),
                [
                    self.pos.non_pawn_hash(Color::White),
                    self.pos.non_pawn_hash(Color::Black),
                ],
            )
    }

    pub(crate) fn negamax<const NT: u8>(
        &mut self,
        ss: usize,
        mut alpha: i32,
        mut beta: i32,
        mut depth: i32,
        cut_node: bool,
    ) -> i32 {
        let is_root = NT == NT_ROOT;
        let is_pv = NT != NT_NON_PV;

        if depth <= 0 {
            return self.qsearch::<NT>(ss, alpha, beta);
        }

        let ply = i32::from(self.stack[ss].ply);

        // A repetition may be reachable before this node is done; raise
        // alpha toward the draw score now and cut if that flips it.
        if !is_root && alpha < SCORE_DRAW && self.pos.has_cycle(ply) {
            alpha = make_draw_score(self.nodes);
            if alpha >= beta {
                return alpha;
            }
        }

        if self.is_main() {
            self.checkup();
        }

        if is_pv {
            self.sel_depth = self.sel_depth.max(ply + 1);
        }

        let us = self.pos.side_to_move();
        let in_check = self.pos.in_check();
        let do_skip = !self.stack[ss].skip.is_null();

        if !is_root {
            if self.pos.is_draw() {
                return make_draw_score(self.nodes);
            }

            if self.should_stop() || ply >= MAX_SEARCH_PLY - 1 {
                return if in_check {
                    SCORE_DRAW
                } else {
                    self.raw_eval()
                };
            }

            // Mate distance pruning.
            alpha = alpha.max(make_mate_score(ply));
            beta = beta.min(SCORE_MATE - (ply + 1));
            if alpha >= beta {
                return alpha;
            }
        }

        self.stack[ss + 1].killer = Move::NULL;
        self.stack[ss].double_extensions = self.stack[ss - 1].double_extensions;
        self.stack[ss].in_check = in_check;

        let (tt_hit, tt_slot) = self.tt.probe(self.pos.hash());
        let tte = tt_slot.read();
        self.stack[ss].tt_hit = tt_hit;
        if !do_skip {
            self.stack[ss].tt_pv = is_pv || (tt_hit && tte.is_pv());
        }

        let tt_score = if tt_hit {
            make_normal_score(tte.score(), ply)
        } else {
            SCORE_NONE
        };
        let tt_move = if is_root {
            self.root_moves[self.pv_index].mv
        } else if tt_hit {
            tte.best_move()
        } else {
            Move::NULL
        };

        if !is_pv
            && !do_skip
            && tte.depth() >= depth
            && tt_score != SCORE_NONE
            && (tt_score < alpha || cut_node)
            && tte.bound().permits(tt_score >= beta)
        {
            return tt_score;
        }

        let mut raw_eval = SCORE_NONE;
        let mut improving = false;

        if in_check {
            // No usable static eval while in check; straight to moves.
            self.stack[ss].static_eval = SCORE_NONE;
        } else {
            let mut eval;
            if do_skip {
                eval = self.stack[ss].static_eval;
            } else if tt_hit {
                raw_eval = if i32::from(tte.static_eval()) != SCORE_NONE {
                    i32::from(tte.static_eval())
                } else {
                    self.raw_eval()
                };

                eval = self.adjust_eval(raw_eval);
                self.stack[ss].static_eval = eval;

                if tt_score != SCORE_NONE && tte.bound().permits(tt_score > eval) {
                    eval = tt_score;
                }
            } else {
                raw_eval = self.raw_eval();
                eval = self.adjust_eval(raw_eval);
                self.stack[ss].static_eval = eval;

                tt_slot.update(
                    self.pos.hash(),
                    SCORE_NONE as i16,
                    Bound::None,
                    crate::tt::DEPTH_NONE,
                    Move::NULL,
                    raw_eval as i16,
                    self.tt.age(),
                    self.stack[ss].tt_pv,
                );
            }

            if ply >= 2 {
                let two_back = self.stack[ss - 2].static_eval;
                let four_back = if ply >= 4 {
                    self.stack[ss - 4].static_eval
                } else {
                    SCORE_NONE
                };
                improving = if two_back != SCORE_NONE {
                    self.stack[ss].static_eval > two_back
                } else if four_back != SCORE_NONE {
                    self.stack[ss].static_eval > four_back
                } else {
                    true
                };
            }

            // Reverse futility: a comfortable static margin over beta
            // at shallow depth is good enough.
            if !self.stack[ss].tt_pv
                && !do_skip
                && depth <= RFP_MAX_DEPTH
                && tt_move.is_null()
                && eval < SCORE_ASSURED_WIN
                && eval >= beta
                && eval - rfp_margin(depth, improving) >= beta
            {
                return (eval + beta) / 2;
            }

            // Razoring: hopeless static eval drops straight into
            // quiescence for verification.
            if !is_pv
                && !do_skip
                && depth <= RAZORING_MAX_DEPTH
                && eval + RAZORING_MULT * depth < alpha
            {
                let value = self.qsearch::<NT_NON_PV>(ss, alpha - 1, alpha);
                if value < alpha && !self.should_stop() {
                    return value;
                }
            }

            // Null move: hand over the turn; if the reduced search
            // still beats beta the position is too good.
            if !is_pv
                && !do_skip
                && depth >= NMP_MIN_DEPTH
                && ply >= self.nmp_ply
                && eval >= beta
                && eval >= self.stack[ss].static_eval
                && !self.stack[ss - 1].current_move.is_null()
                && self.pos.has_non_pawn_material(us)
            {
                let reduction = NMP_BASE_REDUCTION
                    + depth / NMP_DEPTH_DIV
                    + ((eval - beta) / NMP_EVAL_DIV).min(NMP_EVAL_MIN);

                self.stack[ss].current_move = Move::NULL;
                self.stack[ss].cont_hist = None;

                self.pos.make_null_move();
                self.tt.prefetch(self.pos.hash());
                let score = -self.negamax::<NT_NON_PV>(
                    ss + 1,
                    -beta,
                    -beta + 1,
                    depth - reduction,
                    !cut_node,
                );
                self.pos.unmake_null_move();

                if score >= beta {
                    if self.nmp_ply > 0 || depth <= 15 {
                        return if score > SCORE_WIN { beta } else { score };
                    }

                    // Deep fail-high: verify without null moves to
                    // dodge zugzwang.
                    self.nmp_ply = 3 * (depth - reduction) / 4 + ply;
                    let verification =
                        self.negamax::<NT_NON_PV>(ss, beta - 1, beta, depth - reduction, false);
                    self.nmp_ply = 0;

                    if verification >= beta {
                        return score;
                    }
                }
            }

            // Internal iterative reductions.
            if tt_move.is_null() {
                if cut_node && depth >= IIR_MIN_DEPTH + 2 {
                    depth -= 1;
                }
                if is_pv && depth >= IIR_MIN_DEPTH {
                    depth -= 1;
                }
            }

            // ProbCut: a capture that beats a raised beta in a reduced
            // search is very likely to hold at full depth.
            let prob_beta = beta
                + if improving {
                    PROBCUT_BETA_IMPROVING
                } else {
                    PROBCUT_BETA
                };
            if !is_pv
                && !do_skip
                && depth >= PROBCUT_MIN_DEPTH
                && beta.abs() < SCORE_TT_WIN
                && (!tt_hit || tte.depth() < depth - 3 || i32::from(tte.score()) >= prob_beta)
            {
                if let Some(score) = self.probcut(ss, depth, prob_beta, raw_eval, cut_node) {
                    return score;
                }
            }
        }

        // In-check shortcut: a deep TT capture already proving a score
        // far above beta ends the node without a move loop.
        let small_prob_beta = beta + 435;
        if in_check
            && !is_pv
            && !tt_move.is_null()
            && self.pos.is_capture(tt_move)
            && tte.bound().permits(true)
            && tte.depth() >= depth - 6
            && tt_score != SCORE_NONE
            && tt_score >= small_prob_beta
            && tt_score.abs() < SCORE_TT_WIN
            && beta.abs() < SCORE_TT_WIN
        {
            return small_prob_beta;
        }

        let starting_alpha = alpha;
        let mut best_score = -SCORE_INFINITE;
        let mut best_move = Move::NULL;
        let mut legal_moves = 0i32;
        let mut played_moves = 0i32;
        let mut did_skip = false;
        let mut skip_quiets = false;

        let mut quiet_moves: [Move; 16] = [Move::NULL; 16];
        let mut quiet_count = 0usize;
        let mut capture_moves: [Move; 16] = [Move::NULL; 16];
        let mut capture_count = 0usize;

        let killer = self.stack[ss].killer;
        let lmp_limit = lmp_threshold(improving, depth);

        let mut picker = MovePicker::main_search(&self.pos, tt_move, killer);

        loop {
            let ctx = PickContext {
                pos: &self.pos,
                history: &self.history,
                conts: self.cont_owners(ss),
                ply: ply.max(0) as usize,
            };
            let Some(m) = picker.next(&ctx) else { break };

            if m == self.stack[ss].skip {
                did_skip = true;
                continue;
            }

            if !self.pos.is_legal(m) {
                continue;
            }

            let from = m.from();
            let to = m.to();
            let our_piece = self.pos.piece_at(from).unwrap_or(Piece::Pawn);
            let their_piece = self.pos.piece_at(to);
            let is_capture = self.pos.is_capture(m);

            legal_moves += 1;
            let mut extend = 0i32;

            if !is_root && best_score > SCORE_MATED_MAX && self.pos.has_non_pawn_material(us) {
                if !skip_quiets && legal_moves >= lmp_limit {
                    skip_quiets = true;
                    picker.start_skipping_quiets();
                }

                let gives_check = self.pos.gives_check(our_piece, to);

                if skip_quiets && depth <= SHALLOW_MAX_DEPTH && !(gives_check || is_capture) {
                    continue;
                }

                if (gives_check || is_capture || skip_quiets)
                    && !self.pos.see_ge(m, -SHALLOW_SEE_MARGIN * depth)
                {
                    continue;
                }
            }

            // Singular extension: verify the TT move is uniquely best
            // by searching everything else against a lowered beta.
            if !is_root
                && !do_skip
                && ply < self.root_depth * 2
                && depth >= SE_MIN_DEPTH + i32::from(is_pv && tte.is_pv())
                && m == tt_move
                && tt_score.abs() < SCORE_WIN
                && tte.bound().permits(true)
                && tte.depth() >= depth - 3
            {
                let single_beta = tt_score - (SE_NUMERATOR * depth / 10);
                let single_depth = (depth + SE_DEPTH_ADJ) / 2;

                self.stack[ss].skip = m;
                let score = self.negamax::<NT_NON_PV>(
                    ss,
                    single_beta - 1,
                    single_beta,
                    single_depth,
                    cut_node,
                );
                self.stack[ss].skip = Move::NULL;

                if score < single_beta {
                    let double_ext = !is_pv
                        && self.stack[ss].double_extensions <= 8
                        && score < single_beta - SE_DOUBLE_MARGIN;
                    let triple_ext = double_ext
                        && score
                            < single_beta
                                - SE_TRIPLE_MARGIN
                                - i32::from(is_capture) * SE_TRIPLE_CAP_SUB;

                    extend = 1 + i32::from(double_ext) + i32::from(triple_ext);
                } else if single_beta >= beta {
                    // Multi-cut: even without the TT move the node
                    // fails high.
                    return single_beta;
                } else if tt_score >= beta {
                    extend = -2 + i32::from(is_pv);
                } else if cut_node {
                    extend = -2;
                } else if tt_score <= alpha {
                    extend = -1;
                }
            }

            self.tt.prefetch(self.pos.hash_after(m));

            self.stack[ss].double_extensions =
                self.stack[ss - 1].double_extensions + i16::from(extend >= 2);
            self.stack[ss].current_move = m;
            self.stack[ss].cont_hist = Some(cont_index(in_check, is_capture, us, our_piece, to));
            self.nodes += 1;

            self.pos.make_move(m);
            played_moves += 1;
            let prev_nodes = self.nodes;

            if is_pv {
                self.stack[ss + 1].pv_len = 0;
            }

            let mut new_depth = depth + extend - 1;
            let mut score;

            if depth >= 2 && legal_moves >= 2 && !(is_pv && is_capture) {
                let mut r = lmr_reduction(depth, legal_moves);
                r += i32::from(!improving);
                r += i32::from(cut_node) * 2;
                r -= i32::from(self.stack[ss].tt_pv);
                r -= i32::from(is_pv);
                r -= i32::from(m == killer);

                let main_hist = if is_capture {
                    let victim = their_piece.unwrap_or(Piece::Pawn);
                    self.history.capture(us, our_piece, to, victim)
                } else {
                    self.history.main(us, m)
                };
                let cont_piece = make_piece_index(us, our_piece);
                let conts = self.cont_owners(ss);
                let mut hist_score = 2 * main_hist;
                for (slot, weight) in conts.iter().zip([2, 1, 1, 0]) {
                    if weight == 0 {
                        continue;
                    }
                    if let Some(owner) = slot {
                        hist_score += weight * self.history.continuation(*owner, cont_piece, to);
                    }
                }

                r -= hist_score
                    / if is_capture {
                        LMR_CAPTURE_DIV
                    } else {
                        LMR_QUIET_DIV
                    };

                let reduced_depth = (new_depth - r).clamp(0, new_depth.max(0));

                score = -self.negamax::<NT_NON_PV>(ss + 1, -alpha - 1, -alpha, reduced_depth, true);

                if score > alpha && reduced_depth < new_depth {
                    let deeper = score > best_score + LMR_EXTRA_MARGIN + 2 * new_depth;
                    let shallower = score < best_score + new_depth;
                    new_depth += i32::from(deeper) - i32::from(shallower);

                    if new_depth > reduced_depth {
                        score = -self.negamax::<NT_NON_PV>(
                            ss + 1,
                            -alpha - 1,
                            -alpha,
                            new_depth,
                            !cut_node,
                        );
                    }

                    let bonus = if score <= alpha {
                        -stat_bonus(new_depth)
                    } else if score >= beta {
                        stat_bonus(new_depth)
                    } else {
                        0
                    };
                    if bonus != 0 {
                        self.update_continuations(ss, us, our_piece, to, bonus);
                    }
                }
            } else if !is_pv || legal_moves > 1 {
                score = -self.negamax::<NT_NON_PV>(ss + 1, -alpha - 1, -alpha, new_depth, !cut_node);
            } else {
                score = alpha + 1; // Force the PV search below.
            }

            if is_pv && (played_moves == 1 || score > alpha) {
                self.stack[ss + 1].pv[0] = Move::NULL;
                self.stack[ss + 1].pv_len = 0;
                score = -self.negamax::<NT_PV>(ss + 1, -beta, -alpha, new_depth, false);
            }

            self.pos.unmake_move(m);

            if is_root {
                self.node_table[from.index() * 64 + to.index()] += self.nodes - prev_nodes;
            }

            if self.should_stop() {
                return SCORE_DRAW;
            }

            if is_root {
                let raised = played_moves == 1 || score > alpha;
                self.update_root_move(m, score, raised, ss);
            }

            if score > best_score {
                best_score = score;

                if score > alpha {
                    best_move = m;

                    if is_pv && !is_root {
                        self.update_pv(ss, m);
                    }

                    if score >= beta {
                        self.update_stats(
                            ss,
                            best_move,
                            depth,
                            &quiet_moves[..quiet_count],
                            &capture_moves[..capture_count],
                        );
                        break;
                    }

                    alpha = score;
                }
            }

            if m != best_move {
                if is_capture && capture_count < 16 {
                    capture_moves[capture_count] = m;
                    capture_count += 1;
                } else if !is_capture && quiet_count < 16 {
                    quiet_moves[quiet_count] = m;
                    quiet_count += 1;
                }
            }
        }

        if legal_moves == 0 {
            best_score = if in_check {
                make_mate_score(ply)
            } else {
                SCORE_DRAW
            };
            if did_skip {
                best_score = alpha;
            }
        }

        if best_score <= alpha {
            self.stack[ss].tt_pv =
                self.stack[ss].tt_pv || (self.stack[ss - 1].tt_pv && depth > 3);
        }

        if !do_skip && !(is_root && self.pv_index > 0) {
            let bound = if best_score >= beta {
                Bound::Lower
            } else if best_score > starting_alpha {
                Bound::Exact
            } else {
                Bound::Upper
            };

            let move_to_save = if bound == Bound::Upper {
                Move::NULL
            } else {
                best_move
            };

            tt_slot.update(
                self.pos.hash(),
                make_tt_score(best_score, ply),
                bound,
                depth,
                move_to_save,
                raw_eval as i16,
                self.tt.age(),
                self.stack[ss].tt_pv,
            );

            // Teach the correction history how far the static eval
            // missed, unless the bound contradicts the direction.
            let static_eval = self.stack[ss].static_eval;
            if !in_check
                && (best_move.is_null() || !self.pos.is_noisy(best_move))
                && !(bound == Bound::Upper && best_score >= static_eval)
                && !(bound == Bound::Lower && best_score <= static_eval)
            {
                let diff = best_score - static_eval;
                self.history.update_correction(
                    us,
                    self.pos.pawn_hash(),
                    [
                        self.pos.non_pawn_hash(Color::White),
                        self.pos.non_pawn_hash(Color::Black),
                    ],
                    diff,
                    depth,
                );
            }
        }

        best_score
    }

    /// ProbCut: try noisy moves against a raised beta with a SEE gate,
    /// verified at reduced depth. `Some(score)` ends the node.
    fn probcut(
        &mut self,
        ss: usize,
        depth: i32,
        prob_beta: i32,
        raw_eval: i32,
        cut_node: bool,
    ) -> Option<i32> {
        let us = self.pos.side_to_move();
        let ply = i32::from(self.stack[ss].ply);
        let static_eval = self.stack[ss].static_eval;

        let mut list = MoveList::new();
        self.pos.generate(&mut list, GenKind::Noisy);

        // Order by the immediate material swing.
        for i in 0..list.len() {
            let m = list[i].mv;
            let mut score = if m.is_en_passant() {
                see_value(Piece::Pawn)
            } else {
                self.pos.piece_at(m.to()).map_or(0, see_value)
            };
            if m.is_promotion() {
                score += see_value(Piece::Queen) + 1;
            }
            list[i].score = score;
        }

        for i in 0..list.len() {
            let mut best = i;
            for j in i + 1..list.len() {
                if list[j].score > list[best].score {
                    best = j;
                }
            }
            list.swap(i, best);
            let m = list[i].mv;

            let threshold = (prob_beta - static_eval).max(1);
            if !self.pos.is_legal(m) || !self.pos.see_ge(m, threshold) {
                continue;
            }

            self.tt.prefetch(self.pos.hash_after(m));

            let piece = self.pos.piece_at(m.from()).unwrap_or(Piece::Pawn);
            self.stack[ss].current_move = m;
            self.stack[ss].cont_hist = Some(cont_index(false, true, us, piece, m.to()));
            self.nodes += 1;

            self.pos.make_move(m);

            let mut score = -self.qsearch::<NT_NON_PV>(ss + 1, -prob_beta, -prob_beta + 1);
            if score >= prob_beta {
                score = -self.negamax::<NT_NON_PV>(
                    ss + 1,
                    -prob_beta,
                    -prob_beta + 1,
                    depth - 3,
                    !cut_node,
                );
            }

            self.pos.unmake_move(m);

            if score >= prob_beta {
                let (_, slot) = self.tt.probe(self.pos.hash());
                slot.update(
                    self.pos.hash(),
                    make_tt_score(score, ply),
                    Bound::Lower,
                    depth - 2,
                    m,
                    raw_eval as i16,
                    self.tt.age(),
                    self.stack[ss].tt_pv,
                );
                return Some(score);
            }

            if self.should_stop() {
                return Some(SCORE_DRAW);
            }
        }

        None
    }

    /// Root bookkeeping: averaged score, PV capture, sort-ready score.
    fn update_root_move(&mut self, m: Move, score: i32, raised: bool, ss: usize) {
        let Some(idx) = self.root_moves.iter().position(|rm| rm.mv == m) else {
            return;
        };

        let rm = &mut self.root_moves[idx];
        rm.average_score = if rm.average_score == -SCORE_INFINITE {
            score
        } else {
            (rm.average_score + score * 2) / 3
        };

        if raised {
            let sel_depth = self.sel_depth;
            let child_pv: Vec<Move> = {
                let child = &self.stack[ss + 1];
                child.pv[..child.pv_len].to_vec()
            };
            let rm = &mut self.root_moves[idx];
            rm.score = score;
            rm.depth = sel_depth;
            rm.pv.clear();
            rm.pv.push(m);
            for mv in child_pv {
                if mv.is_null() {
                    break;
                }
                rm.pv.push(mv);
            }
        } else {
            self.root_moves[idx].score = -SCORE_INFINITE;
        }
    }

    /// Bonus for the cutoff move, malus for everything searched before
    /// it.
    pub(crate) fn update_stats(
        &mut self,
        ss: usize,
        best_move: Move,
        depth: i32,
        quiets: &[Move],
        captures: &[Move],
    ) {
        let us = self.pos.side_to_move();
        let ply = i32::from(self.stack[ss].ply);
        let bonus = stat_bonus(depth);
        let malus = stat_malus(depth);

        let bm_piece = self.pos.piece_at(best_move.from()).unwrap_or(Piece::Pawn);
        let bm_to = best_move.to();

        if let Some(captured) = self.pos.piece_at(bm_to).filter(|_| !best_move.is_castle()) {
            self.history
                .update_capture(us, bm_piece, bm_to, captured, bonus);
        } else {
            if !best_move.is_en_passant() {
                self.stack[ss].killer = best_move;
            }

            // A trivial low-depth cutoff with no other quiets searched
            // isn't worth reinforcing.
            if quiets.is_empty() && depth <= 3 {
                return;
            }

            self.history.update_main(us, best_move, bonus);
            if (0..crate::board::history::LOW_PLY_COUNT as i32).contains(&ply) {
                self.history.update_low_ply(ply as usize, best_move, bonus);
            }
            self.update_continuations(ss, us, bm_piece, bm_to, bonus);

            for &m in quiets {
                let piece = self.pos.piece_at(m.from()).unwrap_or(Piece::Pawn);
                self.history.update_main(us, m, -malus);
                if (0..crate::board::history::LOW_PLY_COUNT as i32).contains(&ply) {
                    self.history.update_low_ply(ply as usize, m, -malus);
                }
                self.update_continuations(ss, us, piece, m.to(), -malus);
            }
        }

        for &m in captures {
            let piece = self.pos.piece_at(m.from()).unwrap_or(Piece::Pawn);
            if let Some(captured) = self.pos.piece_at(m.to()) {
                self.history
                    .update_capture(us, piece, m.to(), captured, -malus);
            }
        }
    }

    /// Reward/punish (piece, to) in the continuation slices 1, 2, 4,
    /// and 6 plies back; only the near slices while in check.
    pub(crate) fn update_continuations(
        &mut self,
        ss: usize,
        color: Color,
        piece: Piece,
        to: Square,
        bonus: i32,
    ) {
        let cont_piece = make_piece_index(color, piece);
        for back in [1usize, 2, 4, 6] {
            if self.stack[ss].in_check && back > 2 {
                break;
            }
            if self.stack[ss - back].current_move.is_null() {
                continue;
            }
            if let Some(owner) = self.stack[ss - back].cont_hist {
                self.history.update_continuation(owner, cont_piece, to, bonus);
            }
        }
    }
}
