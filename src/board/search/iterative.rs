//! Iterative deepening driver: aspiration windows, multi-PV, root
//! move bookkeeping, and soft-time management.

use super::params::{ASP_MIN_DEPTH, ASP_WINDOW};
use super::timeman::soft_time_multiplier;
use super::{stable_sort_root, RootMove, SearchLimits, SearchThread, NT_ROOT, STACK_OFFSET};
use crate::board::types::Move;
use crate::score::{format_score, ALPHA_START, BETA_START, MAX_PLY, SCORE_INFINITE};
use crate::util::Timepoint;

impl SearchThread {
    /// Run one full search on the current position. Every worker calls
    /// this; only the main thread watches clocks and prints.
    pub fn search(&mut self, limits: SearchLimits) {
        self.limits = limits;
        let (hard, soft) = self.limits.resolve_time();
        self.hard_time_limit = hard;
        self.soft_time_limit = soft;

        self.reset_for_search();

        for i in 0..self.stack.len() {
            let entry = &mut self.stack[i];
            entry.ply = i as i16 - STACK_OFFSET as i16;
            entry.pv_len = 0;
            entry.pv.fill(Move::NULL);
            entry.cont_hist = None;
            entry.double_extensions = 0;
            entry.static_eval = crate::score::SCORE_NONE;
            entry.killer = Move::NULL;
            entry.current_move = Move::NULL;
            entry.skip = Move::NULL;
            entry.in_check = false;
            entry.tt_pv = false;
            entry.tt_hit = false;
        }

        self.pos.bucket_cache.reset();

        let mut list = crate::board::types::MoveList::new();
        self.pos.legal_moves(&mut list);
        self.root_moves = list.iter().map(RootMove::new).collect();

        if self.root_moves.is_empty() {
            return;
        }

        let multi_pv = self.multi_pv.max(1).min(self.root_moves.len());

        let mut search_scores: Vec<i32> = Vec::new();
        let mut last_best = RootMove::new(Move::NULL);
        let mut stability = 0usize;

        // Helpers deepen until told to stop; the main thread honors
        // the depth limit itself.
        let depth_cap = if self.is_main() {
            crate::score::MAX_DEPTH
        } else {
            MAX_PLY as i32
        };

        loop {
            self.root_depth += 1;
            if self.root_depth >= depth_cap {
                break;
            }
            if self.is_main() && self.root_depth > self.limits.max_depth {
                break;
            }
            if self.should_stop() {
                break;
            }

            for rm in &mut self.root_moves {
                rm.previous_score = rm.score;
            }

            let mut used_depth = self.root_depth;

            for pv_index in 0..multi_pv {
                self.pv_index = pv_index;
                if self.should_stop() {
                    break;
                }

                let mut alpha = ALPHA_START;
                let mut beta = BETA_START;
                let mut window = SCORE_INFINITE;
                let mut score = self.root_moves[pv_index].average_score;
                self.sel_depth = 0;

                if self.root_depth >= ASP_MIN_DEPTH {
                    window = ASP_WINDOW;
                    alpha = ALPHA_START.max(score - window);
                    beta = BETA_START.min(score + window);
                }

                loop {
                    score = self.negamax::<NT_ROOT>(
                        STACK_OFFSET,
                        alpha,
                        beta,
                        used_depth.max(1),
                        false,
                    );

                    stable_sort_root(&mut self.root_moves[pv_index..]);

                    if self.should_stop() {
                        break;
                    }

                    if score <= alpha {
                        // Fail low: re-center beta, drop alpha, restore
                        // the full depth.
                        beta = (alpha + beta) / 2;
                        alpha = ALPHA_START.max(alpha - window);
                        used_depth = self.root_depth;
                    } else if score >= beta {
                        beta = BETA_START.min(beta + window);
                        used_depth = (used_depth - 1).max(self.root_depth - 5);
                    } else {
                        break;
                    }

                    window += window / 2;
                }

                stable_sort_root(&mut self.root_moves[..]);

                if self.is_main() && self.report {
                    self.print_depth_info(pv_index);
                }
            }

            if !self.is_main() {
                continue;
            }

            if self.should_stop() {
                // Stopped mid-iteration: fall back to the last fully
                // searched depth's best move.
                if !last_best.mv.is_null() {
                    self.root_moves[0] = last_best;
                }
                return;
            }

            if last_best.mv == self.root_moves[0].mv {
                stability += 1;
            } else {
                stability = 0;
            }
            last_best = self.truncated_best();
            search_scores.push(self.root_moves[0].score);

            if self.soft_time_limit > 0 {
                let mut mult = 1.0;
                if self.root_depth > 7 {
                    let bm = self.root_moves[0].mv;
                    let bm_nodes = self.node_table[bm.from().index() * 64 + bm.to().index()];
                    let n = search_scores.len();
                    let then = if n >= 4 { search_scores[n - 4] } else { 0 };
                    let now = search_scores[n - 1];
                    mult = soft_time_multiplier(bm_nodes, self.nodes, stability, then, now);
                }

                if self.elapsed_ms() as f64 >= self.soft_time_limit as f64 * mult {
                    break;
                }
            }

            if self.nodes >= self.limits.soft_nodes {
                break;
            }

            self.completed_depth = self.root_depth;
        }

        if self.is_main() && self.root_depth >= self.limits.max_depth && !self.should_stop() {
            self.set_stop();
        }
    }

    /// Best root move with its PV cut at the first null entry.
    fn truncated_best(&self) -> RootMove {
        let mut best = self.root_moves[0].clone();
        if let Some(cut) = best.pv.iter().position(|m| m.is_null()) {
            best.pv.truncate(cut);
        }
        best
    }

    /// One UCI info line for the finished (or aborted) iteration.
    fn print_depth_info(&self, pv_index: usize) {
        let rm = &self.root_moves[pv_index];

        let searched = rm.score != -SCORE_INFINITE;
        let depth = if searched {
            self.root_depth
        } else {
            (self.root_depth - 1).max(1)
        };
        let score = if searched { rm.score } else { rm.previous_score };

        let elapsed = self.elapsed_ms().max(1);
        let nps = Timepoint::nps(self.nodes, elapsed);

        let mut line = format!(
            "info depth {depth} seldepth {} multipv {} time {elapsed} score {} nodes {} nps {nps} pv",
            rm.depth,
            pv_index + 1,
            format_score(score),
            self.nodes,
        );
        for mv in &rm.pv {
            if mv.is_null() {
                break;
            }
            line.push(' ');
            line.push_str(&mv.smith_notation(self.pos.is_chess960()));
        }
        println!("{line}");
    }
}
