//! Alpha-beta search.
//!
//! - Iterative deepening with aspiration windows and multi-PV
//! - Negamax with TT cutoffs, RFP, razoring, null-move pruning with
//!   verification, IIR, ProbCut, LMP/SEE shallow pruning, singular
//!   extensions, and LMR with deeper/shallower re-search tests
//! - Quiescence with stand-pat, futility, and SEE pruning
//! - Staged move picking over TT move, killers, and history scores
//! - Lazy-SMP worker pool sharing only the transposition table

mod iterative;
mod movepicker;
mod negamax;
pub mod params;
mod qsearch;
mod threads;
mod timeman;

pub use threads::ThreadPool;
pub use timeman::SearchLimits;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::board::history::{ContHistIndex, HistoryTable};
use crate::board::nnue::Network;
use crate::board::position::Position;
use crate::board::types::Move;
use crate::score::{MAX_PLY, SCORE_INFINITE};
use crate::tt::TranspositionTable;
use crate::util::Timepoint;

/// Plies of headroom below ply 0 so continuation-history lookups can
/// reach six plies back without bounds checks.
pub(crate) const STACK_OFFSET: usize = 10;

/// The search proper never exceeds this ply.
pub(crate) const MAX_SEARCH_PLY: i32 = MAX_PLY as i32 - STACK_OFFSET as i32;

/// Node kinds, monomorphised into the negamax.
pub(crate) const NT_ROOT: u8 = 0;
pub(crate) const NT_PV: u8 = 1;
pub(crate) const NT_NON_PV: u8 = 2;

/// Main thread polls the clock once per this many nodes.
const CHECKUP_FREQUENCY: u32 = 1024;

/// Per-ply search bookkeeping.
#[derive(Clone)]
pub(crate) struct StackEntry {
    pub pv: Vec<Move>,
    pub pv_len: usize,
    /// Continuation slice owned by the move played at this ply.
    pub cont_hist: Option<ContHistIndex>,
    pub double_extensions: i16,
    pub ply: i16,
    pub static_eval: i32,
    pub killer: Move,
    pub current_move: Move,
    /// Excluded move during a singular verification search.
    pub skip: Move,
    pub in_check: bool,
    pub tt_pv: bool,
    pub tt_hit: bool,
}

impl StackEntry {
    fn new(ply: i16) -> Self {
        StackEntry {
            pv: vec![Move::NULL; MAX_PLY],
            pv_len: 0,
            cont_hist: None,
            double_extensions: 0,
            ply,
            static_eval: crate::score::SCORE_NONE,
            killer: Move::NULL,
            current_move: Move::NULL,
            skip: Move::NULL,
            in_check: false,
            tt_pv: false,
            tt_hit: false,
        }
    }
}

/// A root move with its running scores and principal variation.
#[derive(Clone)]
pub struct RootMove {
    pub mv: Move,
    pub score: i32,
    pub previous_score: i32,
    pub average_score: i32,
    /// Selective depth reached under this move.
    pub depth: i32,
    pub pv: Vec<Move>,
}

impl RootMove {
    #[must_use]
    pub fn new(mv: Move) -> Self {
        RootMove {
            mv,
            score: -SCORE_INFINITE,
            previous_score: -SCORE_INFINITE,
            average_score: -SCORE_INFINITE,
            depth: 0,
            pv: vec![mv],
        }
    }
}

/// Stable sort by current score, prior score breaking ties.
pub(crate) fn stable_sort_root(moves: &mut [RootMove]) {
    moves.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(b.previous_score.cmp(&a.previous_score))
    });
}

/// One lazy-SMP worker: its own position, histories, accumulators, and
/// search stack. Only the TT (and the stop/node atomics) are shared.
pub struct SearchThread {
    pub(crate) pos: Position,
    pub(crate) history: HistoryTable,
    pub(crate) stack: Vec<StackEntry>,
    pub root_moves: Vec<RootMove>,
    /// Nodes spent under each (from, to) root move, for soft-time.
    pub(crate) node_table: Vec<u64>,
    pub(crate) tt: Arc<TranspositionTable>,
    pub(crate) nnue: Arc<Network>,

    pub thread_idx: usize,
    /// Ply floor below which null-move pruning is locked out during
    /// zugzwang verification.
    pub(crate) nmp_ply: i32,
    pub(crate) pv_index: usize,
    pub root_depth: i32,
    pub(crate) sel_depth: i32,
    pub completed_depth: i32,

    pub(crate) nodes: u64,
    /// Mirror of `nodes`, refreshed at every checkup for the pool.
    pub(crate) shared_nodes: Arc<AtomicU64>,
    pub(crate) stop: Arc<AtomicBool>,
    /// Every worker's stop flag, for the main thread's shutdown.
    pub(crate) all_stops: Vec<Arc<AtomicBool>>,
    /// Every worker's node mirror, for cross-thread node limits.
    pub(crate) all_nodes: Vec<Arc<AtomicU64>>,

    pub(crate) limits: SearchLimits,
    pub(crate) hard_time_limit: i64,
    pub(crate) soft_time_limit: i64,
    pub(crate) start_time: Timepoint,
    pub(crate) checkup_count: u32,
    pub(crate) move_overhead: i64,
    pub(crate) multi_pv: usize,
    /// Emit info lines after each depth (main thread, UCI mode).
    pub report: bool,
}

impl SearchThread {
    #[must_use]
    pub fn new(
        thread_idx: usize,
        tt: Arc<TranspositionTable>,
        nnue: Arc<Network>,
        stop: Arc<AtomicBool>,
        shared_nodes: Arc<AtomicU64>,
    ) -> Self {
        let mut stack = Vec::with_capacity(MAX_PLY + STACK_OFFSET);
        for i in 0..MAX_PLY + STACK_OFFSET {
            stack.push(StackEntry::new(i as i16 - STACK_OFFSET as i16));
        }

        SearchThread {
            pos: Position::new(),
            history: HistoryTable::new(),
            stack,
            root_moves: Vec::new(),
            node_table: vec![0; 64 * 64],
            tt,
            nnue,
            thread_idx,
            nmp_ply: 0,
            pv_index: 0,
            root_depth: 0,
            sel_depth: 0,
            completed_depth: 0,
            nodes: 0,
            shared_nodes,
            stop,
            all_stops: Vec::new(),
            all_nodes: Vec::new(),
            limits: SearchLimits::default(),
            hard_time_limit: i64::MAX,
            soft_time_limit: 0,
            start_time: Timepoint::now(),
            checkup_count: 0,
            move_overhead: 25,
            multi_pv: 1,
            report: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_main(&self) -> bool {
        self.thread_idx == 0
    }

    /// Install the position to search from.
    pub fn set_position(&mut self, pos: Position) {
        self.pos = pos;
    }

    #[must_use]
    pub fn position(&self) -> &Position {
        &self.pos
    }

    /// Nodes visited by the last search.
    #[must_use]
    pub fn searched_nodes(&self) -> u64 {
        self.nodes
    }

    #[inline]
    pub(crate) fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub(crate) fn set_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Re-arm the stop flag before a fresh search. The pool does this
    /// for its workers; standalone users do it themselves.
    pub fn clear_stop(&self) {
        self.stop.store(false, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn elapsed_ms(&self) -> i64 {
        self.start_time.elapsed_ms()
    }

    #[inline]
    pub(crate) fn hard_time_reached(&self) -> bool {
        self.hard_time_limit != i64::MAX
            && self.elapsed_ms() > self.hard_time_limit - self.move_overhead
    }

    /// Sum of all workers' published node counts.
    pub(crate) fn global_nodes(&self) -> u64 {
        if self.all_nodes.is_empty() {
            self.nodes
        } else {
            self.all_nodes
                .iter()
                .map(|n| n.load(Ordering::Relaxed))
                .sum()
        }
    }

    /// Periodic limit check; main thread only. Other workers only
    /// observe the stop flag.
    pub(crate) fn checkup(&mut self) {
        self.checkup_count += 1;
        if self.checkup_count < CHECKUP_FREQUENCY {
            return;
        }
        self.checkup_count = 0;
        self.shared_nodes.store(self.nodes, Ordering::Relaxed);

        if !self.is_main() {
            return;
        }

        if self.hard_time_reached() {
            self.stop_all();
        }
        if self.limits.max_nodes != u64::MAX && self.global_nodes() >= self.limits.max_nodes {
            self.stop_all();
        }
    }

    pub(crate) fn stop_all(&self) {
        if self.all_stops.is_empty() {
            self.set_stop();
        } else {
            for stop in &self.all_stops {
                stop.store(true, Ordering::Relaxed);
            }
        }
    }

    /// Reset per-search counters. Histories persist between searches.
    pub(crate) fn reset_for_search(&mut self) {
        self.nodes = 0;
        self.shared_nodes.store(0, Ordering::Relaxed);
        self.nmp_ply = 0;
        self.pv_index = 0;
        self.root_depth = 0;
        self.sel_depth = 0;
        self.completed_depth = 0;
        self.checkup_count = 0;
        self.node_table.fill(0);
    }

    /// Continuation owners for plies 1, 2, 4, 6 back from `ss`.
    pub(crate) fn cont_owners(&self, ss: usize) -> [Option<ContHistIndex>; 4] {
        let owner = |back: usize| {
            let entry = &self.stack[ss - back];
            if entry.current_move.is_null() {
                None
            } else {
                entry.cont_hist
            }
        };
        [owner(1), owner(2), owner(4), owner(6)]
    }

    /// Copy the child's PV under `mv` into this ply's buffer.
    pub(crate) fn update_pv(&mut self, ss: usize, mv: Move) {
        let (left, right) = self.stack.split_at_mut(ss + 1);
        let entry = &mut left[ss];
        let child = &right[0];

        entry.pv[0] = mv;
        let child_len = child.pv_len.min(MAX_PLY - 1);
        entry.pv[1..=child_len].copy_from_slice(&child.pv[..child_len]);
        entry.pv_len = child_len + 1;
    }
}
