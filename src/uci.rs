//! UCI command loop.
//!
//! Implements the standard surface (`uci`, `isready`, `ucinewgame`,
//! `position`, `go`, `stop`, `setoption`, `quit`) plus the usual debug
//! extensions (`bench`, `perft`, `d`, `eval`). Unknown commands are
//! silently ignored; unknown move text gets a diagnostic line and
//! leaves the position untouched.

use std::io::BufRead;
use std::sync::Arc;

use crate::board::nnue::{self, Network};
use crate::board::{Color, Position, SearchLimits, ThreadPool, STARTPOS_FEN};
use crate::score::MAX_DEPTH;
use crate::tt::TranspositionTable;
use crate::util::Timepoint;

const ENGINE_NAME: &str = "Roan";
const ENGINE_VERSION: &str = "0.1.0";

const DEFAULT_HASH_MB: usize = 32;
const DEFAULT_EVAL_FILE: &str = "roan.nnue";

/// Operational options exposed through `setoption`.
struct Options {
    hash_mb: usize,
    threads: usize,
    multi_pv: usize,
    move_overhead: i64,
    chess960: bool,
    eval_file: String,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            hash_mb: DEFAULT_HASH_MB,
            threads: 1,
            multi_pv: 1,
            move_overhead: 25,
            chess960: false,
            eval_file: DEFAULT_EVAL_FILE.to_string(),
        }
    }
}

struct Engine {
    options: Options,
    tt: Arc<TranspositionTable>,
    network: Option<Arc<Network>>,
    pool: Option<ThreadPool>,
    /// Root position as given by the last `position` command.
    root: Position,
    /// Moves after the root FEN, forwarded verbatim to the workers.
    moves: Vec<String>,
    /// The root with `moves` applied, for d/eval/perft.
    current: Position,
}

impl Engine {
    fn new() -> Self {
        let options = Options::default();
        let network = match Network::load(&options.eval_file) {
            Ok(net) => Some(Arc::new(net)),
            Err(err) => {
                log::warn!("no usable network at '{}': {err}", options.eval_file);
                None
            }
        };

        Engine {
            tt: Arc::new(TranspositionTable::new(options.hash_mb)),
            network,
            pool: None,
            root: Position::new(),
            moves: Vec::new(),
            current: Position::new(),
            options,
        }
    }

    /// The pool is built lazily so option changes before the first
    /// search don't keep tearing threads down.
    fn pool(&mut self) -> Option<&ThreadPool> {
        if self.network.is_none() {
            return None;
        }
        if self.pool.is_none() {
            let net = Arc::clone(self.network.as_ref()?);
            self.pool = Some(ThreadPool::new(
                self.options.threads,
                Arc::clone(&self.tt),
                net,
            ));
        }
        self.pool.as_ref()
    }

    fn drop_pool(&mut self) {
        if let Some(pool) = &self.pool {
            pool.stop_all();
            pool.wait_for_main();
        }
        self.pool = None;
    }

    fn handle_uci(&self) {
        println!("id name {ENGINE_NAME} {ENGINE_VERSION}");
        println!("id author the {ENGINE_NAME} authors");
        println!("option name Hash type spin default {DEFAULT_HASH_MB} min 1 max 1048576");
        println!("option name Threads type spin default 1 min 1 max 512");
        println!("option name MultiPV type spin default 1 min 1 max 256");
        println!("option name MoveOverhead type spin default 25 min 1 max 5000");
        println!("option name UCI_Chess960 type check default false");
        println!("option name EvalFile type string default {DEFAULT_EVAL_FILE}");
        println!("uciok");
    }

    fn handle_setoption(&mut self, tokens: &[&str]) {
        // setoption name <id> [value <x>]
        let Some(name_at) = tokens.iter().position(|&t| t == "name") else {
            return;
        };
        let value_at = tokens.iter().position(|&t| t == "value");
        let name = tokens[name_at + 1..value_at.unwrap_or(tokens.len())]
            .join(" ")
            .to_lowercase();
        let value = value_at
            .map(|i| tokens[i + 1..].join(" "))
            .unwrap_or_default();

        let parse_spin = |range: std::ops::RangeInclusive<i64>| -> Option<i64> {
            match value.parse::<i64>() {
                Ok(v) if range.contains(&v) => Some(v),
                _ => {
                    log::warn!("option '{name}' value '{value}' out of range; keeping previous");
                    None
                }
            }
        };

        match name.as_str() {
            "hash" => {
                if let Some(mb) = parse_spin(1..=1_048_576) {
                    self.options.hash_mb = mb as usize;
                    self.drop_pool();
                    self.tt = Arc::new(TranspositionTable::new(self.options.hash_mb));
                }
            }
            "threads" => {
                if let Some(n) = parse_spin(1..=512) {
                    self.options.threads = n as usize;
                    self.drop_pool();
                }
            }
            "multipv" => {
                if let Some(n) = parse_spin(1..=256) {
                    self.options.multi_pv = n as usize;
                }
            }
            "moveoverhead" => {
                if let Some(ms) = parse_spin(1..=5000) {
                    self.options.move_overhead = ms;
                }
            }
            "uci_chess960" => {
                self.options.chess960 = value.eq_ignore_ascii_case("true");
                self.root.set_chess960(self.options.chess960);
                self.current.set_chess960(self.options.chess960);
            }
            "evalfile" => match Network::load(&value) {
                Ok(net) => {
                    self.options.eval_file = value;
                    self.network = Some(Arc::new(net));
                    self.drop_pool();
                }
                Err(err) => {
                    println!("info string failed to load network '{value}': {err}");
                }
            },
            _ => log::debug!("ignoring unknown option '{name}'"),
        }
    }

    fn handle_position(&mut self, tokens: &[&str]) {
        let mut idx = 1;
        let mut fen = STARTPOS_FEN.to_string();

        match tokens.get(idx) {
            Some(&"startpos") => idx += 1,
            Some(&"fen") => {
                idx += 1;
                let end = tokens[idx..]
                    .iter()
                    .position(|&t| t == "moves")
                    .map_or(tokens.len(), |p| idx + p);
                fen = tokens[idx..end].join(" ");
                idx = end;
            }
            _ => return,
        }

        let mut root = Position::new();
        root.set_chess960(self.options.chess960);
        if let Err(err) = root.load_fen(&fen) {
            println!("info string rejected FEN: {err}");
            return;
        }

        let mut current = Position::new();
        current.set_chess960(root.is_chess960());
        // The FEN just parsed once; it parses again.
        let _ = current.load_fen(&fen);

        let mut moves = Vec::new();
        if tokens.get(idx) == Some(&"moves") {
            for &text in &tokens[idx + 1..] {
                match current.try_find_move(text) {
                    Ok(mv) => {
                        current.make_move(mv);
                        moves.push(text.to_string());
                    }
                    Err(err) => {
                        println!("info string {err}");
                        return;
                    }
                }
            }
        }

        self.root = root;
        self.current = current;
        self.moves = moves;
    }

    fn handle_go(&mut self, tokens: &[&str]) {
        let us = self.current.side_to_move();
        let mut limits = SearchLimits::default();

        let mut i = 1;
        while i < tokens.len() {
            let token = tokens[i];
            let value = || tokens.get(i + 1).and_then(|v| v.parse::<i64>().ok());
            match token {
                "depth" => {
                    if let Some(d) = value() {
                        limits.max_depth = (d as i32).clamp(1, MAX_DEPTH);
                    }
                }
                "nodes" => {
                    if let Some(n) = value() {
                        limits.max_nodes = n.max(1) as u64;
                    }
                }
                "movetime" => {
                    if let Some(ms) = value() {
                        limits.move_time = ms.max(1);
                    }
                }
                "wtime" => {
                    if us == Color::White {
                        if let Some(ms) = value() {
                            limits.player_time = ms.max(1);
                        }
                    }
                }
                "btime" => {
                    if us == Color::Black {
                        if let Some(ms) = value() {
                            limits.player_time = ms.max(1);
                        }
                    }
                }
                "winc" => {
                    if us == Color::White {
                        if let Some(ms) = value() {
                            limits.increment = ms.max(0);
                        }
                    }
                }
                "binc" => {
                    if us == Color::Black {
                        if let Some(ms) = value() {
                            limits.increment = ms.max(0);
                        }
                    }
                }
                "movestogo" => {
                    if let Some(n) = value() {
                        limits.moves_to_go = (n as i32).max(1);
                    }
                }
                "infinite" => {}
                _ => {}
            }
            i += 1;
        }

        let multi_pv = self.options.multi_pv;
        let move_overhead = self.options.move_overhead;
        let chess960 = self.options.chess960;
        let root = self.root.to_fen();
        let moves = self.moves.clone();

        let mut start = Position::new();
        start.set_chess960(chess960);
        if start.load_fen(&root).is_err() {
            return;
        }

        let Some(pool) = self.pool() else {
            println!("info string no network loaded; refusing to search");
            return;
        };
        pool.start_search(&start, &moves, &limits, multi_pv, move_overhead, true);
    }

    fn handle_bench(&mut self, tokens: &[&str]) {
        let depth = tokens
            .get(1)
            .and_then(|t| t.parse::<i32>().ok())
            .unwrap_or(12)
            .clamp(1, MAX_DEPTH);

        let multi_pv = 1;
        let move_overhead = self.options.move_overhead;
        if self.pool().is_none() {
            println!("info string no network loaded; refusing to bench");
            return;
        }

        let mut total_nodes = 0u64;
        let start = Timepoint::now();

        for fen in BENCH_FENS {
            let Ok(pos) = Position::from_fen(fen) else {
                continue;
            };
            let pool = match self.pool() {
                Some(pool) => pool,
                None => return,
            };
            pool.tt.clear();
            pool.clear();
            pool.start_search(
                &pos,
                &[],
                &SearchLimits::depth(depth),
                multi_pv,
                move_overhead,
                false,
            );
            pool.wait_for_main();

            let nodes = pool.node_count();
            total_nodes += nodes;
            println!("{fen:<76}\t{nodes}");
        }

        let elapsed = start.elapsed_ms();
        println!(
            "\nNodes searched: {total_nodes} in {}.{:03} s ({} nps)",
            elapsed / 1000,
            elapsed % 1000,
            Timepoint::nps(total_nodes, elapsed)
        );
    }

    fn handle_eval(&mut self) {
        let Some(net) = self.network.clone() else {
            println!("info string no network loaded");
            return;
        };
        let eval = nnue::evaluate(&mut self.current, &net);
        println!("eval: {eval} (from the side to move)");
    }

    fn dispatch(&mut self, line: &str) -> bool {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = tokens.first() else {
            return true;
        };

        match command {
            "uci" => self.handle_uci(),
            "isready" => println!("readyok"),
            "ucinewgame" => {
                self.tt.clear();
                if let Some(pool) = &self.pool {
                    pool.clear();
                }
            }
            "position" => self.handle_position(&tokens),
            "go" => self.handle_go(&tokens),
            "stop" => {
                if let Some(pool) = &self.pool {
                    pool.stop_all();
                }
            }
            "setoption" => self.handle_setoption(&tokens),
            "bench" => self.handle_bench(&tokens),
            "perft" => {
                let depth = tokens.get(1).and_then(|t| t.parse().ok()).unwrap_or(5);
                let start = Timepoint::now();
                let total = self.current.split_perft(depth);
                let elapsed = start.elapsed_ms();
                println!(
                    "\nTotal: {total} in {elapsed} ms ({} nps)",
                    Timepoint::nps(total, elapsed)
                );
            }
            "d" => print!("{}", self.current),
            "eval" => self.handle_eval(),
            "quit" => {
                if let Some(pool) = &self.pool {
                    pool.stop_all();
                }
                return false;
            }
            _ => log::debug!("ignoring unknown command '{command}'"),
        }

        true
    }
}

/// Run the blocking UCI loop on stdin.
pub fn run() {
    let mut engine = Engine::new();
    let stdin = std::io::stdin();

    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if !engine.dispatch(&line) {
            break;
        }
    }
}

/// Fixed suite for `bench`: a spread of openings, middlegames, and
/// endgames.
const BENCH_FENS: &[&str] = &[
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
    "r3k2r/2pb1ppp/2pp1q2/p7/1nP1B3/1P2P3/P2N1PPP/R2QK2R w KQkq a6 0 14",
    "4rrk1/2p1b1p1/p1p3q1/4p3/2P2n1p/1P1NR2P/PB3PP1/3R1QK1 b - - 2 24",
    "r3qbrk/6p1/2b2pPp/p3pP1Q/PpPpP2P/3P1B2/2PB3K/R5R1 w - - 16 42",
    "6k1/1R3p2/6p1/2Bp3p/3P2q1/P7/1P2rQ1K/5R2 b - - 4 44",
    "8/8/1p2k1p1/3p3p/1p1P1P1P/1P2PK2/8/8 w - - 3 54",
    "7r/2p3k1/1p1p1qp1/1P1Bp3/p1P2r1P/P7/4R3/Q4RK1 w - - 0 36",
    "r1bq1rk1/pp2b1pp/n1pp1n2/3P1p2/2P1p3/2N1P2N/PP2BPPP/R1BQ1RK1 b - - 2 10",
    "3r3k/2r4p/1p1b3q/p4P2/P2Pp3/1B2P3/3BQ1RP/6K1 w - - 3 87",
    "2r4r/1p4k1/1Pnp4/3Qb1pq/8/4BpPp/5P2/2RR1BK1 w - - 0 42",
    "4q1bk/6b1/7p/p1p4p/PNPpP2P/KN4P1/3Q4/4R3 b - - 0 37",
    "2q3r1/1r2pk2/pp3pp1/2pP3p/P1Pb1BbP/1P4Q1/R3NPP1/4R1K1 w - - 2 34",
    "1r2r2k/1b4q1/pp5p/2pPp1p1/P3Pn2/1P1B1Q1P/2R3P1/4BR1K b - - 1 37",
    "r3kbbr/pp1n1p1P/3ppnp1/q5N1/1P1pP3/P1N1B3/2P1QP2/R3KB1R b KQkq b3 0 17",
    "8/6pk/2b1Rp2/3r4/1R1B2PP/P5K1/8/2r5 b - - 16 42",
    "1r4k1/4ppb1/2n1b1qp/pB4p1/1n1BP1P1/7P/2PNQPK1/3RN3 w - - 8 29",
    "8/p2B4/PkP5/4p1pK/4Pb1p/5P2/8/8 w - - 29 68",
];
