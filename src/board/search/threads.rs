//! Lazy-SMP worker pool.
//!
//! Persistent OS threads, one per worker, each blocking on its own
//! condition variable between searches. Worker 0 is the main thread:
//! it runs the clocked iterative deepening, and when its loop ends it
//! raises every stop flag, waits for the helpers, and emits the
//! bestmove line. Helpers deepen independently and only observe their
//! stop flag. The TT is the only shared search structure.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

use super::{SearchLimits, SearchThread};
use crate::board::nnue::Network;
use crate::board::position::Position;
use crate::tt::TranspositionTable;
use crate::util::Timepoint;

/// One queued search: the root position as FEN plus the moves played
/// from it, re-applied by every worker on its own position copy.
#[derive(Clone)]
struct Job {
    fen: String,
    moves: Vec<String>,
    limits: SearchLimits,
    chess960: bool,
    multi_pv: usize,
    move_overhead: i64,
    start_time: Timepoint,
    /// Print info/bestmove lines (main worker, UCI mode).
    report: bool,
}

struct WorkerState {
    job: Option<Job>,
    searching: bool,
    quit: bool,
    clear_request: bool,
}

struct WorkerCtrl {
    state: Mutex<WorkerState>,
    cv: Condvar,
    stop: Arc<AtomicBool>,
    nodes: Arc<AtomicU64>,
    /// Last completed search's best move, for callers that don't read
    /// stdout.
    best_move: Mutex<Option<String>>,
}

impl WorkerCtrl {
    fn new() -> Self {
        WorkerCtrl {
            state: Mutex::new(WorkerState {
                job: None,
                searching: false,
                quit: false,
                clear_request: false,
            }),
            cv: Condvar::new(),
            stop: Arc::new(AtomicBool::new(false)),
            nodes: Arc::new(AtomicU64::new(0)),
            best_move: Mutex::new(None),
        }
    }

    fn wait_idle(&self) {
        let mut state = self.state.lock();
        while state.searching || state.job.is_some() {
            self.cv.wait(&mut state);
        }
    }
}

pub struct ThreadPool {
    ctrls: Vec<Arc<WorkerCtrl>>,
    handles: Vec<JoinHandle<()>>,
    pub tt: Arc<TranspositionTable>,
    nnue: Arc<Network>,
}

impl ThreadPool {
    /// Spin up `threads` workers sharing `tt` and the network.
    #[must_use]
    pub fn new(threads: usize, tt: Arc<TranspositionTable>, nnue: Arc<Network>) -> Self {
        let mut pool = ThreadPool {
            ctrls: Vec::new(),
            handles: Vec::new(),
            tt,
            nnue,
        };
        pool.resize(threads);
        pool
    }

    /// Tear down and restart the worker set.
    pub fn resize(&mut self, threads: usize) {
        self.shutdown();

        let threads = threads.max(1);
        log::debug!("resizing search pool to {threads} threads");

        self.ctrls = (0..threads).map(|_| Arc::new(WorkerCtrl::new())).collect();
        let all_stops: Vec<_> = self.ctrls.iter().map(|c| Arc::clone(&c.stop)).collect();
        let all_nodes: Vec<_> = self.ctrls.iter().map(|c| Arc::clone(&c.nodes)).collect();

        // Each search frame carries several fixed-size move lists, and
        // the recursion runs hundreds of plies deep; the default thread
        // stack is not enough.
        const WORKER_STACK_SIZE: usize = 16 * 1024 * 1024;

        self.handles = (0..threads)
            .map(|idx| {
                let ctrls: Vec<Arc<WorkerCtrl>> = self.ctrls.clone();
                let tt = Arc::clone(&self.tt);
                let nnue = Arc::clone(&self.nnue);
                let all_stops = all_stops.clone();
                let all_nodes = all_nodes.clone();

                std::thread::Builder::new()
                    .name(format!("search-{idx}"))
                    .stack_size(WORKER_STACK_SIZE)
                    .spawn(move || {
                        let ctrl = Arc::clone(&ctrls[idx]);
                        let mut worker = SearchThread::new(
                            idx,
                            tt,
                            nnue,
                            Arc::clone(&ctrl.stop),
                            Arc::clone(&ctrl.nodes),
                        );
                        worker.all_stops = all_stops;
                        worker.all_nodes = all_nodes;

                        idle_loop(&mut worker, &ctrl, &ctrls);
                    })
                    .expect("failed to spawn search worker")
            })
            .collect();
    }

    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.ctrls.len()
    }

    /// Queue a search on every worker and wake them. Returns
    /// immediately; the main worker prints bestmove when done.
    pub fn start_search(
        &self,
        pos: &Position,
        moves: &[String],
        limits: &SearchLimits,
        multi_pv: usize,
        move_overhead: i64,
        report: bool,
    ) {
        self.wait_for_main();
        self.tt.new_search();

        let job = Job {
            fen: pos.to_fen(),
            moves: moves.to_vec(),
            limits: limits.clone(),
            chess960: pos.is_chess960(),
            multi_pv,
            move_overhead,
            start_time: Timepoint::now(),
            report,
        };

        for ctrl in &self.ctrls {
            ctrl.stop.store(false, Ordering::Relaxed);
            ctrl.nodes.store(0, Ordering::Relaxed);
        }

        // Wake helpers first so the main thread never waits on them.
        for ctrl in self.ctrls.iter().skip(1) {
            let mut state = ctrl.state.lock();
            state.job = Some(job.clone());
            state.searching = true;
            ctrl.cv.notify_all();
        }
        {
            let ctrl = &self.ctrls[0];
            let mut state = ctrl.state.lock();
            state.job = Some(job);
            state.searching = true;
            ctrl.cv.notify_all();
        }
    }

    /// Raise every stop flag; searches unwind at their next poll.
    pub fn stop_all(&self) {
        for ctrl in &self.ctrls {
            ctrl.stop.store(true, Ordering::Relaxed);
        }
    }

    /// Block until the main worker has gone idle.
    pub fn wait_for_main(&self) {
        if let Some(ctrl) = self.ctrls.first() {
            ctrl.wait_idle();
        }
    }

    /// Sum of node counters across workers.
    #[must_use]
    pub fn node_count(&self) -> u64 {
        self.ctrls
            .iter()
            .map(|c| c.nodes.load(Ordering::Relaxed))
            .sum()
    }

    /// The last finished search's best move, in move text.
    #[must_use]
    pub fn best_move(&self) -> Option<String> {
        self.ctrls.first().and_then(|c| c.best_move.lock().clone())
    }

    /// Ask every worker to clear its history tables before the next
    /// search (ucinewgame).
    pub fn clear(&self) {
        for ctrl in &self.ctrls {
            ctrl.state.lock().clear_request = true;
        }
    }

    fn shutdown(&mut self) {
        if self.ctrls.is_empty() {
            return;
        }
        self.stop_all();
        self.wait_for_main();
        for ctrl in &self.ctrls {
            let mut state = ctrl.state.lock();
            state.quit = true;
            ctrl.cv.notify_all();
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        self.ctrls.clear();
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn idle_loop(worker: &mut SearchThread, ctrl: &WorkerCtrl, ctrls: &[Arc<WorkerCtrl>]) {
    loop {
        let job = {
            let mut state = ctrl.state.lock();
            state.searching = false;
            ctrl.cv.notify_all();
            loop {
                if state.quit {
                    return;
                }
                if let Some(job) = state.job.take() {
                    state.searching = true;
                    break job;
                }
                ctrl.cv.wait(&mut state);
            }
        };

        let clear = {
            let mut state = ctrl.state.lock();
            std::mem::take(&mut state.clear_request)
        };
        if clear {
            worker.history.clear();
        }

        run_job(worker, &job);

        if worker.is_main() {
            finish_main(worker, &job, ctrls);
        }
    }
}

fn run_job(worker: &mut SearchThread, job: &Job) {
    worker.pos.set_chess960(job.chess960);
    if let Err(err) = worker.pos.load_fen(&job.fen) {
        log::warn!("worker {} rejected FEN '{}': {err}", worker.thread_idx, job.fen);
        return;
    }
    for text in &job.moves {
        match worker.pos.try_find_move(text) {
            Ok(mv) => worker.pos.make_move(mv),
            Err(err) => {
                log::warn!("worker {} skipping setup move: {err}", worker.thread_idx);
                break;
            }
        }
    }

    worker.start_time = job.start_time;
    worker.multi_pv = job.multi_pv;
    worker.move_overhead = job.move_overhead;
    worker.report = job.report && worker.is_main();

    worker.search(job.limits.clone());

    worker
        .shared_nodes
        .store(worker.nodes, Ordering::Relaxed);
}

/// Main-thread epilogue: stop the helpers, wait for them, and publish
/// the best move.
fn finish_main(worker: &SearchThread, job: &Job, ctrls: &[Arc<WorkerCtrl>]) {
    for ctrl in ctrls.iter().skip(1) {
        ctrl.stop.store(true, Ordering::Relaxed);
    }
    for ctrl in ctrls.iter().skip(1) {
        ctrl.wait_idle();
    }

    let best = worker
        .root_moves
        .first()
        .map(|rm| rm.mv.smith_notation(job.chess960));

    *ctrls[0].best_move.lock() = best.clone();

    if job.report {
        match best {
            Some(best) => {
                let ponder = worker
                    .root_moves
                    .first()
                    .and_then(|rm| rm.pv.get(1))
                    .filter(|mv| !mv.is_null())
                    .map(|mv| mv.smith_notation(job.chess960));
                match ponder {
                    Some(ponder) => println!("bestmove {best} ponder {ponder}"),
                    None => println!("bestmove {best}"),
                }
            }
            None => println!("bestmove 0000"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;

    static TEST_NET: Lazy<Arc<Network>> = Lazy::new(|| Arc::new(Network::synthetic(0xC0FFEE)));

    fn small_pool(threads: usize) -> ThreadPool {
        let tt = Arc::new(TranspositionTable::new(8));
        ThreadPool::new(threads, tt, Arc::clone(&TEST_NET))
    }

    #[test]
    fn pool_searches_and_reports_a_move() {
        let pool = small_pool(1);
        let pos = Position::new();
        pool.start_search(&pos, &[], &SearchLimits::depth(5), 1, 25, false);
        pool.wait_for_main();
        let best = pool.best_move().expect("search produced no move");
        assert_eq!(best.len(), 4);
        assert!(pool.node_count() > 0);
    }

    #[test]
    fn stop_interrupts_an_infinite_search() {
        let pool = small_pool(2);
        let pos = Position::new();
        pool.start_search(&pos, &[], &SearchLimits::default(), 1, 25, false);
        std::thread::sleep(std::time::Duration::from_millis(200));
        pool.stop_all();
        pool.wait_for_main();
        assert!(pool.best_move().is_some());
    }

    #[test]
    fn workers_replay_setup_moves() {
        let pool = small_pool(1);
        let pos = Position::new();
        let moves = vec!["e2e4".to_string(), "e7e5".to_string()];
        pool.start_search(&pos, &moves, &SearchLimits::depth(3), 1, 25, false);
        pool.wait_for_main();
        assert!(pool.best_move().is_some());
    }
}
