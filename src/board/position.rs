//! Position state: piece placement, castling bookkeeping, the per-ply
//! state stack, draw and repetition detection.
//!
//! Make/unmake, legality, SEE, and FEN handling live in their own
//! files; this one owns the struct and the queries everything else
//! shares.

use super::attack_tables::{
    attacks, between, bishop_attacks, line, pawn_attacks, pseudo_attacks, rook_attacks,
};
use super::error::MoveParseError;
use super::movegen::{generate_legal, GenKind};
use super::nnue::{AccumulatorStack, BucketCache};
use super::state::{StateInfo, STATE_STACK_SIZE};
use super::types::{
    more_than_one, poplsb, square_bb, CastlingRights, Color, Move, MoveList, Piece, Square,
};
use super::cuckoo::{cuckoo_h1, cuckoo_h2, CUCKOO};
use super::zobrist::ZOBRIST;

pub const STARTPOS_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

pub struct Position {
    pub(crate) bb: super::types::PieceSet,
    pub(crate) to_move: Color,
    pub(crate) full_moves: u32,
    pub(crate) chess960: bool,
    /// Rook start squares per single castling right, indexed by the
    /// right's bit value.
    pub(crate) castling_rook_squares: [Option<Square>; 16],
    /// Squares that must be empty for each castling right.
    pub(crate) castling_rook_paths: [u64; 16],
    pub(crate) states: Vec<StateInfo>,
    /// Index of the current state record; entry 0 is the loaded
    /// position and acts as the low sentinel for repetition walks.
    game_ply: usize,
    pub(crate) accumulators: AccumulatorStack,
    pub(crate) bucket_cache: BucketCache,
}

impl Default for Position {
    fn default() -> Self {
        Position::new()
    }
}

impl Position {
    /// The standard starting position.
    #[must_use]
    pub fn new() -> Self {
        let mut pos = Position {
            bb: super::types::PieceSet::default(),
            to_move: Color::White,
            full_moves: 1,
            chess960: false,
            castling_rook_squares: [None; 16],
            castling_rook_paths: [0; 16],
            states: vec![StateInfo::default(); STATE_STACK_SIZE],
            game_ply: 0,
            accumulators: AccumulatorStack::new(STATE_STACK_SIZE),
            bucket_cache: BucketCache::default(),
        };
        // The constant FEN always parses.
        let _ = pos.load_fen(STARTPOS_FEN);
        pos
    }

    /// Parse a FEN into a fresh position.
    pub fn from_fen(fen: &str) -> Result<Self, super::error::FenError> {
        let mut pos = Position::new();
        pos.load_fen(fen)?;
        Ok(pos)
    }

    // ------------------------------------------------------------------
    // State access

    #[inline]
    pub(crate) fn state(&self) -> &StateInfo {
        &self.states[self.game_ply]
    }

    #[inline]
    pub(crate) fn state_mut(&mut self) -> &mut StateInfo {
        &mut self.states[self.game_ply]
    }

    #[inline]
    pub(crate) fn game_ply(&self) -> usize {
        self.game_ply
    }

    #[inline]
    pub(crate) fn advance_ply(&mut self) {
        self.game_ply += 1;
        debug_assert!(self.game_ply < STATE_STACK_SIZE);
    }

    #[inline]
    pub(crate) fn retreat_ply(&mut self) {
        debug_assert!(self.game_ply > 0);
        self.game_ply -= 1;
    }

    pub(crate) fn reset_stack(&mut self) {
        self.game_ply = 0;
        self.states[0] = StateInfo::default();
        self.accumulators.reset();
    }

    // ------------------------------------------------------------------
    // Simple queries

    #[inline]
    #[must_use]
    pub fn side_to_move(&self) -> Color {
        self.to_move
    }

    #[inline]
    #[must_use]
    pub fn is_chess960(&self) -> bool {
        self.chess960
    }

    pub fn set_chess960(&mut self, enabled: bool) {
        self.chess960 = enabled;
    }

    #[inline]
    #[must_use]
    pub fn hash(&self) -> u64 {
        self.state().hash
    }

    #[inline]
    #[must_use]
    pub fn pawn_hash(&self) -> u64 {
        self.state().pawn_hash
    }

    #[inline]
    #[must_use]
    pub fn non_pawn_hash(&self, color: Color) -> u64 {
        self.state().non_pawn_hash[color.index()]
    }

    #[inline]
    #[must_use]
    pub fn checkers(&self) -> u64 {
        self.state().checkers
    }

    #[inline]
    #[must_use]
    pub fn in_check(&self) -> bool {
        self.checkers() != 0
    }

    #[inline]
    #[must_use]
    pub fn in_double_check(&self) -> bool {
        more_than_one(self.checkers())
    }

    #[inline]
    #[must_use]
    pub fn king_sq(&self, color: Color) -> Square {
        self.state().king_squares[color.index()]
    }

    #[inline]
    #[must_use]
    pub fn ep_square(&self) -> Option<Square> {
        self.state().ep_square
    }

    #[inline]
    #[must_use]
    pub fn halfmove_clock(&self) -> i32 {
        self.state().halfmove_clock
    }

    #[inline]
    #[must_use]
    pub fn captured_piece(&self) -> Option<Piece> {
        self.state().captured
    }

    #[inline]
    #[must_use]
    pub fn castling_rights(&self) -> CastlingRights {
        self.state().castling
    }

    #[inline]
    #[must_use]
    pub fn full_moves(&self) -> u32 {
        self.full_moves
    }

    #[inline]
    #[must_use]
    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.bb.piece_at(sq)
    }

    /// All occupied squares.
    #[inline]
    #[must_use]
    pub fn occupancy(&self) -> super::types::Bitboard {
        super::types::Bitboard(self.bb.occupancy)
    }

    /// The squares holding `color`'s pieces of the given kind.
    #[inline]
    #[must_use]
    pub fn pieces(&self, color: Color, piece: Piece) -> super::types::Bitboard {
        super::types::Bitboard(self.bb.pieces_of(color, piece))
    }

    #[inline]
    pub(crate) fn check_squares(&self, piece: Piece) -> u64 {
        self.state().check_squares[piece.index()]
    }

    /// Would a `piece` landing on `to` give check?
    #[inline]
    #[must_use]
    pub fn gives_check(&self, piece: Piece, to: Square) -> bool {
        self.check_squares(piece) & square_bb(to) != 0
    }

    #[inline]
    pub(crate) fn blockers(&self, color: Color) -> u64 {
        self.state().blockers[color.index()]
    }

    #[inline]
    pub(crate) fn pinners(&self, color: Color) -> u64 {
        self.state().pinners[color.index()]
    }

    /// Anything but pawns and the king.
    #[inline]
    #[must_use]
    pub fn has_non_pawn_material(&self, color: Color) -> bool {
        (self.bb.occupancy
            ^ self.bb.pieces[Piece::Pawn.index()]
            ^ self.bb.pieces[Piece::King.index()])
            & self.bb.colors[color.index()]
            != 0
    }

    /// Captures a piece on the destination square (castling's
    /// king-takes-rook encoding excluded).
    #[inline]
    #[must_use]
    pub fn is_capture(&self, mv: Move) -> bool {
        self.bb.piece_at(mv.to()).is_some() && !mv.is_castle()
    }

    #[inline]
    #[must_use]
    pub fn is_noisy(&self, mv: Move) -> bool {
        self.is_capture(mv) || mv.is_en_passant()
    }

    // ------------------------------------------------------------------
    // Castling bookkeeping

    #[inline]
    pub(crate) fn castling_rook_square(&self, cr: CastlingRights) -> Option<Square> {
        self.castling_rook_squares[cr.table_index()]
    }

    #[inline]
    pub(crate) fn castling_path(&self, cr: CastlingRights) -> u64 {
        self.castling_rook_paths[cr.table_index()]
    }

    pub(crate) fn can_castle(&self, occupied: u64, ours: u64, cr: CastlingRights) -> bool {
        self.castling_rights().intersects(cr)
            && self.castling_path(cr) & occupied == 0
            && self.has_castling_rook(ours, cr)
    }

    pub(crate) fn has_castling_rook(&self, ours: u64, cr: CastlingRights) -> bool {
        match self.castling_rook_square(cr) {
            Some(rook) => self.bb.pieces[Piece::Rook.index()] & square_bb(rook) & ours != 0,
            None => false,
        }
    }

    /// Register a castling right for `color` with its rook on
    /// `rook_from`, deriving the blocked-path mask.
    pub(crate) fn set_castling_status(&mut self, color: Color, rook_from: Square) {
        let king_from = self.bb.king_sq(color);
        let kingside = king_from.index() < rook_from.index();
        let cr = match (color, kingside) {
            (Color::White, true) => CastlingRights::WHITE_KING,
            (Color::White, false) => CastlingRights::WHITE_QUEEN,
            (Color::Black, true) => CastlingRights::BLACK_KING,
            (Color::Black, false) => CastlingRights::BLACK_QUEEN,
        };

        self.castling_rook_squares[cr.table_index()] = Some(rook_from);

        let king_to = Square::from_coords(if kingside { 6 } else { 2 }, king_from.rank());
        let rook_to = Square::from_coords(if kingside { 5 } else { 3 }, king_from.rank());

        self.castling_rook_paths[cr.table_index()] = (line(rook_from, rook_to)
            | line(king_from, king_to))
            & !(square_bb(king_from) | square_bb(rook_from));

        self.state_mut().castling.add(cr);
    }

    /// Which castling right a rook on `sq` carries, if any.
    pub(crate) fn castling_right_for_rook(&self, sq: Square) -> CastlingRights {
        for cr in CastlingRights::ALL.iter() {
            if self.castling_rook_squares[cr.table_index()] == Some(sq) {
                return cr;
            }
        }
        CastlingRights::NONE
    }

    /// Drop castling rights, updating the hash for each bit removed.
    pub(crate) fn remove_castling(&mut self, cr: CastlingRights) {
        let st = self.state_mut();
        let prev = st.castling;
        ZOBRIST.castle(&mut st.hash, prev, cr);
        st.castling.remove(cr);
    }

    // ------------------------------------------------------------------
    // Hashing

    /// Toggle a piece-square key on the main hash and the pawn or
    /// non-pawn side hash.
    pub(crate) fn update_hash(&mut self, color: Color, piece: Piece, sq: Square) {
        let key = ZOBRIST.piece(color, piece, sq);
        let st = self.state_mut();
        st.hash ^= key;
        if piece == Piece::Pawn {
            st.pawn_hash ^= key;
        } else {
            st.non_pawn_hash[color.index()] ^= key;
        }
    }

    /// The hash the position would have after `mv`, ignoring castling
    /// and en-passant effects. Good enough for TT prefetching.
    #[must_use]
    pub fn hash_after(&self, mv: Move) -> u64 {
        let mut hash = self.hash();
        let from = mv.from();
        let to = mv.to();
        let us = self.bb.color_at(from);
        let Some(piece) = self.bb.piece_at(from) else {
            return hash;
        };

        if let Some(captured) = self.bb.piece_at(to) {
            hash ^= ZOBRIST.piece(us.flip(), captured, to);
        }
        hash ^= ZOBRIST.piece(us, piece, from) ^ ZOBRIST.piece(us, piece, to);
        ZOBRIST.flip_side(&mut hash);
        hash
    }

    // ------------------------------------------------------------------
    // Check info

    /// Recompute checkers, pins, and check squares after the board
    /// changed under the current side to move.
    pub(crate) fn set_state(&mut self) {
        let kings = [self.bb.king_sq(Color::White), self.bb.king_sq(Color::Black)];
        let us = self.to_move;
        let checkers = self.bb.attackers_to(kings[us.index()], self.bb.occupancy)
            & self.bb.colors[us.flip().index()];

        let (mut hash, pawn_hash, non_pawn) = super::zobrist::hashes_from_scratch(
            &self.bb.piece_types,
            self.bb.colors[0],
            self.bb.colors[1],
        );

        let castling = self.state().castling;
        ZOBRIST.castle(&mut hash, castling, castling);
        if let Some(ep) = self.state().ep_square {
            ZOBRIST.en_passant(&mut hash, ep.file());
        }
        if us == Color::Black {
            ZOBRIST.flip_side(&mut hash);
        }

        let st = self.state_mut();
        st.king_squares = kings;
        st.checkers = checkers;
        st.pawn_hash = pawn_hash;
        st.non_pawn_hash = non_pawn;
        st.hash = hash;

        self.set_check_info();
    }

    /// Pins/blockers for both kings and the squares from which each of
    /// our piece kinds would check the opposing king.
    pub(crate) fn set_check_info(&mut self) {
        let (w_blockers, b_pinners) = self.bb.blocking_pieces(Color::White);
        let (b_blockers, w_pinners) = self.bb.blocking_pieces(Color::Black);

        let their_king = self.state().king_squares[self.to_move.flip().index()];
        let occ = self.bb.occupancy;
        let them = self.to_move.flip();

        let st = self.state_mut();
        st.blockers = [w_blockers, b_blockers];
        st.pinners = [w_pinners, b_pinners];

        st.check_squares[Piece::Pawn.index()] = pawn_attacks(them, their_king);
        st.check_squares[Piece::Knight.index()] = pseudo_attacks(Piece::Knight, their_king);
        st.check_squares[Piece::Bishop.index()] = bishop_attacks(their_king, occ);
        st.check_squares[Piece::Rook.index()] = rook_attacks(their_king, occ);
        st.check_squares[Piece::Queen.index()] =
            st.check_squares[Piece::Bishop.index()] | st.check_squares[Piece::Rook.index()];
        st.check_squares[Piece::King.index()] = 0;
    }

    // ------------------------------------------------------------------
    // Draw detection

    #[must_use]
    pub fn is_draw(&self) -> bool {
        self.is_fifty_move_draw() || self.is_insufficient_material() || self.is_threefold()
    }

    #[inline]
    #[must_use]
    pub fn is_fifty_move_draw(&self) -> bool {
        self.state().halfmove_clock >= 100
    }

    /// No queens, rooks, or pawns, and minor material too thin to mate.
    #[must_use]
    pub fn is_insufficient_material(&self) -> bool {
        let heavy = self.bb.pieces[Piece::Queen.index()]
            | self.bb.pieces[Piece::Rook.index()]
            | self.bb.pieces[Piece::Pawn.index()];
        if heavy != 0 {
            return false;
        }

        let knights = self.bb.pieces[Piece::Knight.index()].count_ones();
        let bishops = self.bb.pieces[Piece::Bishop.index()].count_ones();

        (knights == 0 && bishops < 2) || (bishops == 0 && knights <= 2)
    }

    /// The current hash occurs three times on the state stack.
    #[must_use]
    pub fn is_threefold(&self) -> bool {
        if self.game_ply < 8 {
            return false;
        }

        let current = self.state().hash;
        let mut count = 1;
        let mut idx = self.game_ply;
        // Same side to move every two plies; stop at the stack bottom.
        while idx >= 2 {
            idx -= 2;
            if self.states[idx].hash == current {
                count += 1;
                if count == 3 {
                    return true;
                }
            }
        }
        false
    }

    /// Upcoming-repetition probe: is there a reversible move that takes
    /// us back to a position already seen within the halfmove window?
    /// `ply` distinguishes repetitions inside the search tree (always
    /// relevant) from ones straddling the root.
    #[must_use]
    pub fn has_cycle(&self, ply: i32) -> bool {
        let st = self.state();
        let dist = st.halfmove_clock.min(st.plies_from_null);
        if dist < 3 {
            return false;
        }

        let hash_back = |i: i32| self.states[self.game_ply - i as usize].hash;

        let mut i = 3;
        while i <= dist {
            let diff = st.hash ^ hash_back(i);

            let slot = if diff == CUCKOO.keys[cuckoo_h1(diff)] {
                cuckoo_h1(diff)
            } else if diff == CUCKOO.keys[cuckoo_h2(diff)] {
                cuckoo_h2(diff)
            } else {
                i += 2;
                continue;
            };

            let mv = CUCKOO.moves[slot];
            let (from, to) = (mv.from(), mv.to());

            if self.bb.occupancy & between(from, to) == 0 {
                if ply > i {
                    return true;
                }
                // Straddling the root: only counts if the repeating
                // piece is ours to move.
                let pc = if self.bb.piece_at(from).is_some() {
                    self.bb.color_at(from)
                } else {
                    self.bb.color_at(to)
                };
                return pc == self.to_move;
            }
            i += 2;
        }
        false
    }

    // ------------------------------------------------------------------
    // Perft

    /// Legal-move tree count with bulk counting at the leaves.
    pub fn perft(&mut self, depth: u32) -> u64 {
        let mut list = MoveList::new();
        generate_legal(self, &mut list);

        if depth == 1 {
            return list.len() as u64;
        }

        let mut nodes = 0;
        for i in 0..list.len() {
            let mv = list[i].mv;
            self.make_move_basic(mv);
            nodes += self.perft(depth - 1);
            self.unmake_move(mv);
        }
        nodes
    }

    /// Perft with per-root-move subtotals, for movegen debugging.
    pub fn split_perft(&mut self, depth: u32) -> u64 {
        let mut list = MoveList::new();
        generate_legal(self, &mut list);

        let mut total = 0;
        for i in 0..list.len() {
            let mv = list[i].mv;
            self.make_move_basic(mv);
            let nodes = if depth > 1 { self.perft(depth - 1) } else { 1 };
            self.unmake_move(mv);
            total += nodes;
            println!("{}: {nodes}", mv.smith_notation(self.chess960));
        }
        total
    }

    // ------------------------------------------------------------------
    // Move text

    /// Find the legal move matching `text` in either castling
    /// rendering, case-insensitively.
    pub fn try_find_move(&self, text: &str) -> Result<Move, MoveParseError> {
        let mut list = MoveList::new();
        generate_legal(self, &mut list);

        for i in 0..list.len() {
            let mv = list[i].mv;
            if mv.smith_notation(self.chess960).eq_ignore_ascii_case(text)
                || mv.smith_notation(!self.chess960).eq_ignore_ascii_case(text)
            {
                return Ok(mv);
            }
        }
        Err(MoveParseError::NoMatch {
            notation: text.to_string(),
        })
    }

    /// All legal moves; allocation-free generation into `list`.
    pub fn legal_moves(&self, list: &mut MoveList) {
        generate_legal(self, list);
    }

    /// Generate moves of the given kind into `list`.
    pub fn generate(&self, list: &mut MoveList, kind: GenKind) {
        super::movegen::generate(self, list, kind);
    }
}

impl super::types::PieceSet {
    /// Every piece (both colors, kings excluded) attacking `sq` under
    /// the given occupancy. King adjacency is handled separately where
    /// it matters.
    #[must_use]
    pub(crate) fn attackers_to(&self, sq: Square, occupied: u64) -> u64 {
        (bishop_attacks(sq, occupied)
            & (self.pieces[Piece::Bishop.index()] | self.pieces[Piece::Queen.index()]))
            | (rook_attacks(sq, occupied)
                & (self.pieces[Piece::Rook.index()] | self.pieces[Piece::Queen.index()]))
            | (pseudo_attacks(Piece::Knight, sq) & self.pieces[Piece::Knight.index()])
            | (pawn_attacks(Color::White, sq)
                & self.colors[Color::Black.index()]
                & self.pieces[Piece::Pawn.index()])
            | (pawn_attacks(Color::Black, sq)
                & self.colors[Color::White.index()]
                & self.pieces[Piece::Pawn.index()])
    }

    /// Attack mask of a piece standing on `sq`.
    #[must_use]
    pub(crate) fn attack_mask(&self, sq: Square, color: Color, piece: Piece, occupied: u64) -> u64 {
        match piece {
            Piece::Pawn => pawn_attacks(color, sq),
            _ => attacks(piece, sq, occupied),
        }
    }

    /// Pieces shielding `color`'s king from enemy sliders, plus the
    /// enemy sliders doing the pinning.
    #[must_use]
    pub(crate) fn blocking_pieces(&self, color: Color) -> (u64, u64) {
        let mut blockers = 0u64;
        let mut pinners = 0u64;

        let us = self.colors[color.index()];
        let them = self.colors[color.flip().index()];
        let occ = us | them;
        let our_king = self.king_sq(color);

        let mut candidates = ((pseudo_attacks(Piece::Rook, our_king)
            & (self.pieces[Piece::Queen.index()] | self.pieces[Piece::Rook.index()]))
            | (pseudo_attacks(Piece::Bishop, our_king)
                & (self.pieces[Piece::Queen.index()] | self.pieces[Piece::Bishop.index()])))
            & them;

        while candidates != 0 {
            let sq = poplsb(&mut candidates);
            let blocking = between(our_king, sq) & occ;

            if blocking != 0 && !more_than_one(blocking) {
                blockers |= blocking;
                if blocking & us != 0 {
                    pinners |= square_bb(sq);
                }
            }
        }

        (blockers, pinners)
    }
}
