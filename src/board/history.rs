//! Per-worker history tables.
//!
//! Every entry updates with the bounded-drift rule
//! `new = old + bonus - old*|bonus|/CLAMP`, which saturates smoothly
//! near ±CLAMP instead of hard-clipping. The continuation tables are
//! consulted through the search stack at 1, 2, 4, and 6 plies back;
//! the correction tables remember how far the static eval tends to
//! miss for a given pawn / non-pawn structure.

use super::types::{make_piece_index, Color, Move, Piece, Square};

pub(crate) const HISTORY_CLAMP: i32 = 16384;
pub(crate) const LOW_PLY_COUNT: usize = 4;
const LOW_PLY_CLAMP: i32 = 8192;

pub(crate) const CORRECTION_SCALE: i32 = 1024;
pub(crate) const CORRECTION_GRAIN: i32 = 256;
pub(crate) const CORRECTION_MAX: i32 = CORRECTION_GRAIN * 64;
const CORRECTION_SIZE: usize = 16384;

#[inline]
fn drift(entry: &mut i16, bonus: i32, clamp: i32) {
    let e = i32::from(*entry);
    *entry = (e + bonus - e * bonus.abs() / clamp) as i16;
}

/// `[piece 0..12][to]` slice of the continuation table.
pub(crate) type PieceToHistory = [[i16; 64]; 12];

/// Index of one continuation-history slice: (in-check, is-capture,
/// piece, to-square) of the move that was played at that ply.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct ContHistIndex {
    pub in_check: bool,
    pub is_capture: bool,
    pub piece: usize,
    pub to: usize,
}

impl Default for ContHistIndex {
    fn default() -> Self {
        ContHistIndex {
            in_check: false,
            is_capture: false,
            piece: 0,
            to: 0,
        }
    }
}

pub(crate) struct HistoryTable {
    /// `[color][from*64+to]`
    main: Vec<[i16; 4096]>,
    /// `[color][piece][to][captured]`
    capture: Vec<[[[i16; 6]; 64]; 6]>,
    /// `[ply][from*64+to]`, low plies only.
    low_ply: Vec<[i16; 4096]>,
    /// `[in_check][is_capture][piece][to]` -> PieceToHistory
    continuations: Vec<PieceToHistory>,
    /// `[color][pawn_hash % N]`
    pawn_correction: Vec<[i16; CORRECTION_SIZE]>,
    /// `[color][non_pawn_hash % N]`
    non_pawn_correction: Vec<[i16; CORRECTION_SIZE]>,
}

impl HistoryTable {
    #[must_use]
    pub fn new() -> Self {
        let mut table = HistoryTable {
            main: vec![[0; 4096]; 2],
            capture: vec![[[[0; 6]; 64]; 6]; 2],
            low_ply: vec![[0; 4096]; LOW_PLY_COUNT],
            continuations: vec![[[0; 64]; 12]; 2 * 2 * 12 * 64],
            pawn_correction: vec![[0; CORRECTION_SIZE]; 2],
            non_pawn_correction: vec![[0; CORRECTION_SIZE]; 2],
        };
        table.clear();
        table
    }

    pub fn clear(&mut self) {
        for t in &mut self.main {
            t.fill(0);
        }
        for t in &mut self.capture {
            *t = [[[0; 6]; 64]; 6];
        }
        for t in &mut self.low_ply {
            t.fill(0);
        }
        for t in &mut self.continuations {
            *t = [[-50; 64]; 12];
        }
        for t in &mut self.pawn_correction {
            t.fill(0);
        }
        for t in &mut self.non_pawn_correction {
            t.fill(0);
        }
    }

    // ------------------------------------------------------------------
    // Main history

    #[inline]
    #[must_use]
    pub fn main(&self, color: Color, mv: Move) -> i32 {
        i32::from(self.main[color.index()][mv.move_mask()])
    }

    #[inline]
    pub fn update_main(&mut self, color: Color, mv: Move, bonus: i32) {
        drift(
            &mut self.main[color.index()][mv.move_mask()],
            bonus,
            HISTORY_CLAMP,
        );
    }

    // ------------------------------------------------------------------
    // Capture history

    #[inline]
    #[must_use]
    pub fn capture(&self, color: Color, piece: Piece, to: Square, captured: Piece) -> i32 {
        i32::from(
            self.capture[color.index()][piece.index()][to.index()][captured.index()],
        )
    }

    #[inline]
    pub fn update_capture(
        &mut self,
        color: Color,
        piece: Piece,
        to: Square,
        captured: Piece,
        bonus: i32,
    ) {
        drift(
            &mut self.capture[color.index()][piece.index()][to.index()][captured.index()],
            bonus,
            HISTORY_CLAMP,
        );
    }

    // ------------------------------------------------------------------
    // Low-ply history

    #[inline]
    #[must_use]
    pub fn low_ply(&self, ply: usize, mv: Move) -> i32 {
        i32::from(self.low_ply[ply][mv.move_mask()])
    }

    #[inline]
    pub fn update_low_ply(&mut self, ply: usize, mv: Move, bonus: i32) {
        drift(&mut self.low_ply[ply][mv.move_mask()], bonus, LOW_PLY_CLAMP);
    }

    // ------------------------------------------------------------------
    // Continuation history

    #[inline]
    fn cont_slot(idx: ContHistIndex) -> usize {
        ((usize::from(idx.in_check) * 2 + usize::from(idx.is_capture)) * 12 + idx.piece) * 64
            + idx.to
    }

    /// Score of (piece, to) in the slice owned by a prior move.
    #[inline]
    #[must_use]
    pub fn continuation(&self, owner: ContHistIndex, piece: usize, to: Square) -> i32 {
        i32::from(self.continuations[Self::cont_slot(owner)][piece][to.index()])
    }

    #[inline]
    pub fn update_continuation(&mut self, owner: ContHistIndex, piece: usize, to: Square, bonus: i32) {
        drift(
            &mut self.continuations[Self::cont_slot(owner)][piece][to.index()],
            bonus,
            HISTORY_CLAMP,
        );
    }

    // ------------------------------------------------------------------
    // Correction history

    #[inline]
    #[must_use]
    pub fn pawn_correction(&self, color: Color, pawn_hash: u64) -> i32 {
        i32::from(self.pawn_correction[color.index()][pawn_hash as usize % CORRECTION_SIZE])
    }

    #[inline]
    #[must_use]
    pub fn non_pawn_correction(&self, color: Color, non_pawn_hash: u64) -> i32 {
        i32::from(self.non_pawn_correction[color.index()][non_pawn_hash as usize % CORRECTION_SIZE])
    }

    /// Blend `diff` (search result minus static eval) into a
    /// correction slot with weight `min(depth^2+1, 128)`.
    fn blend_correction(entry: &mut i16, diff: i32, weight: i32) {
        let e = i32::from(*entry);
        let updated =
            (e * (CORRECTION_SCALE - weight) + diff * CORRECTION_GRAIN * weight) / CORRECTION_SCALE;
        *entry = updated.clamp(-CORRECTION_MAX, CORRECTION_MAX) as i16;
    }

    pub fn update_correction(
        &mut self,
        color: Color,
        pawn_hash: u64,
        non_pawn_hashes: [u64; 2],
        diff: i32,
        depth: i32,
    ) {
        let weight = (depth * depth + 1).min(128);
        Self::blend_correction(
            &mut self.pawn_correction[color.index()][pawn_hash as usize % CORRECTION_SIZE],
            diff,
            weight,
        );
        for side in [Color::White, Color::Black] {
            Self::blend_correction(
                &mut self.non_pawn_correction[color.index()]
                    [non_pawn_hashes[side.index()] as usize % CORRECTION_SIZE],
                diff,
                weight,
            );
        }
    }

    /// The eval adjustment implied by the correction tables.
    #[must_use]
    pub fn correction(&self, color: Color, pawn_hash: u64, non_pawn_hashes: [u64; 2]) -> i32 {
        let pawn = self.pawn_correction(color, pawn_hash) / CORRECTION_GRAIN;
        let non_pawn_w = self.non_pawn_correction(color, non_pawn_hashes[0]) / CORRECTION_GRAIN;
        let non_pawn_b = self.non_pawn_correction(color, non_pawn_hashes[1]) / CORRECTION_GRAIN;
        (pawn * 200 + non_pawn_w * 100 + non_pawn_b * 100) / 300
    }
}

impl Default for HistoryTable {
    fn default() -> Self {
        HistoryTable::new()
    }
}

/// Continuation index for a move about to be played.
#[inline]
#[must_use]
pub(crate) fn cont_index(
    in_check: bool,
    is_capture: bool,
    color: Color,
    piece: Piece,
    to: Square,
) -> ContHistIndex {
    ContHistIndex {
        in_check,
        is_capture,
        piece: make_piece_index(color, piece),
        to: to.index(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drift_updates_saturate() {
        let mut table = HistoryTable::new();
        let mv = Move::new(Square::from_index(12), Square::from_index(28));
        for _ in 0..1000 {
            table.update_main(Color::White, mv, 2000);
        }
        let v = table.main(Color::White, mv);
        assert!(v <= HISTORY_CLAMP, "history {v} exceeds clamp");
        assert!(v > HISTORY_CLAMP / 2, "history {v} failed to saturate");

        for _ in 0..1000 {
            table.update_main(Color::White, mv, -2000);
        }
        assert!(table.main(Color::White, mv) >= -HISTORY_CLAMP);
    }

    #[test]
    fn continuations_start_slightly_negative() {
        let table = HistoryTable::new();
        let idx = cont_index(false, false, Color::White, Piece::Knight, Square::from_index(18));
        assert_eq!(table.continuation(idx, 3, Square::from_index(20)), -50);
    }

    #[test]
    fn correction_blend_is_bounded() {
        let mut table = HistoryTable::new();
        for _ in 0..200 {
            table.update_correction(Color::White, 0xABCD, [0x1234, 0x5678], 500, 10);
        }
        let corr = table.correction(Color::White, 0xABCD, [0x1234, 0x5678]);
        assert!(corr.abs() <= CORRECTION_MAX / CORRECTION_GRAIN * 2);
    }
}
