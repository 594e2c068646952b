//! Quantised network: file loading and inference.
//!
//! The network blob is little-endian, laid out as:
//! feature-transformer weights (i16, all input buckets), FT biases
//! (i16), L1 weights (i8, `[feature][output bucket][L2]`), L1 biases
//! (f32), L2 weights (f32, `[L2][output bucket][L3]`), L2 biases (f32),
//! L3 weights (f32, `[L3][output bucket]`), L3 biases (f32).
//!
//! After loading, the L1 feature order is permuted (see
//! [`L1_PERMUTATION`]) so that features which tend to fire together sit
//! in the same 4-byte chunk, keeping the sparse activation pass dense
//! in nonzero chunks.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use once_cell::sync::Lazy;

use super::accumulator::{Accumulator, BucketCache, CachedBoard};
use super::arch::{
    output_bucket, BUCKET_CACHE_SLOTS, FT_QUANT, FT_SHIFT, INPUT_BUCKETS, INPUT_SIZE,
    KING_BUCKETS, L1_CHUNK_PER_32, L1_PAIR_COUNT, L1_QUANT, L1_SIZE, L2_SIZE, L3_SIZE,
    OUTPUT_BUCKETS, OUTPUT_SCALE,
};
use super::simd;
use crate::board::error::NetworkError;
use crate::board::position::Position;
use crate::board::types::{poplsb, Color, Move, Piece, Square, ALL_PIECES};
use crate::util::AlignedBuf;

const FT_WEIGHT_COUNT: usize = INPUT_SIZE * L1_SIZE * INPUT_BUCKETS;
const L1_WEIGHT_COUNT: usize = L1_SIZE * L2_SIZE;
const NNZ_CHUNKS: usize = L1_SIZE / L1_CHUNK_PER_32;

/// L1 pair-feature order applied after loading. The shipped network is
/// exported already ordered, so this is the identity; the plumbing
/// stays so a profile-guided order can be swapped in without touching
/// the inference code.
static L1_PERMUTATION: Lazy<Vec<usize>> = Lazy::new(|| (0..L1_PAIR_COUNT).collect());

/// mask byte -> positions of its set bits, for the sparse pass.
static NNZ_TABLE: Lazy<[[u16; 8]; 256]> = Lazy::new(|| {
    let mut table = [[0u16; 8]; 256];
    for (mask, entry) in table.iter_mut().enumerate() {
        let mut bits = mask as u32;
        let mut k = 0;
        while bits != 0 {
            entry[k] = bits.trailing_zeros() as u16;
            bits &= bits - 1;
            k += 1;
        }
    }
    table
});

/// The quantised network, ready for inference.
pub struct Network {
    /// `[bucket][feature][L1_SIZE]` flattened; feature offsets are
    /// premultiplied by `L1_SIZE` (see [`feature_index_single`]).
    ft_weights: AlignedBuf<i16>,
    ft_biases: AlignedBuf<i16>,
    /// `[bucket][feature * L2_SIZE + j]`
    l1_weights: Vec<Box<[i8]>>,
    l1_biases: [[f32; L2_SIZE]; OUTPUT_BUCKETS],
    /// `[bucket][i * L3_SIZE + j]`
    l2_weights: Vec<Box<[f32]>>,
    l2_biases: [[f32; L3_SIZE]; OUTPUT_BUCKETS],
    l3_weights: [[f32; L3_SIZE]; OUTPUT_BUCKETS],
    l3_biases: [f32; OUTPUT_BUCKETS],
}

fn read_i16s<R: Read>(r: &mut R, dst: &mut [i16]) -> Result<(), NetworkError> {
    let mut buf = [0u8; 2];
    for v in dst {
        r.read_exact(&mut buf)?;
        *v = i16::from_le_bytes(buf);
    }
    Ok(())
}

fn read_i8s<R: Read>(r: &mut R, dst: &mut [i8]) -> Result<(), NetworkError> {
    let mut buf = [0u8; 1];
    for v in dst {
        r.read_exact(&mut buf)?;
        *v = buf[0] as i8;
    }
    Ok(())
}

fn read_f32s<R: Read>(r: &mut R, dst: &mut [f32]) -> Result<(), NetworkError> {
    let mut buf = [0u8; 4];
    for v in dst {
        r.read_exact(&mut buf)?;
        *v = f32::from_le_bytes(buf);
    }
    Ok(())
}

impl Network {
    /// Load a network from a file. Failure is fatal for search; the
    /// caller refuses to search without an evaluator.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, NetworkError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::from_reader(&mut reader)
    }

    /// Read the full blob in its on-disk order.
    pub fn from_reader<R: Read>(r: &mut R) -> Result<Self, NetworkError> {
        let mut ft_weights: AlignedBuf<i16> = AlignedBuf::new_zeroed(FT_WEIGHT_COUNT);
        read_i16s(r, ft_weights.as_mut_slice())?;

        let mut ft_biases: AlignedBuf<i16> = AlignedBuf::new_zeroed(L1_SIZE);
        read_i16s(r, ft_biases.as_mut_slice())?;

        // On disk: [feature][bucket][L2]; in memory: [bucket][feature*L2+j].
        let mut l1_disk = vec![0i8; L1_SIZE * OUTPUT_BUCKETS * L2_SIZE];
        read_i8s(r, &mut l1_disk)?;
        let mut l1_weights: Vec<Box<[i8]>> = (0..OUTPUT_BUCKETS)
            .map(|_| vec![0i8; L1_WEIGHT_COUNT].into_boxed_slice())
            .collect();
        for f in 0..L1_SIZE {
            for b in 0..OUTPUT_BUCKETS {
                for j in 0..L2_SIZE {
                    l1_weights[b][f * L2_SIZE + j] = l1_disk[(f * OUTPUT_BUCKETS + b) * L2_SIZE + j];
                }
            }
        }

        let mut l1_biases = [[0f32; L2_SIZE]; OUTPUT_BUCKETS];
        for bucket in &mut l1_biases {
            read_f32s(r, bucket)?;
        }

        // On disk: [L2][bucket][L3]; in memory: [bucket][i*L3+j].
        let mut l2_disk = vec![0f32; L2_SIZE * OUTPUT_BUCKETS * L3_SIZE];
        read_f32s(r, &mut l2_disk)?;
        let mut l2_weights: Vec<Box<[f32]>> = (0..OUTPUT_BUCKETS)
            .map(|_| vec![0f32; L2_SIZE * L3_SIZE].into_boxed_slice())
            .collect();
        for i in 0..L2_SIZE {
            for b in 0..OUTPUT_BUCKETS {
                for j in 0..L3_SIZE {
                    l2_weights[b][i * L3_SIZE + j] = l2_disk[(i * OUTPUT_BUCKETS + b) * L3_SIZE + j];
                }
            }
        }

        let mut l2_biases = [[0f32; L3_SIZE]; OUTPUT_BUCKETS];
        for bucket in &mut l2_biases {
            read_f32s(r, bucket)?;
        }

        // On disk: [L3][bucket].
        let mut l3_disk = vec![0f32; L3_SIZE * OUTPUT_BUCKETS];
        read_f32s(r, &mut l3_disk)?;
        let mut l3_weights = [[0f32; L3_SIZE]; OUTPUT_BUCKETS];
        for (i, row) in l3_disk.chunks_exact(OUTPUT_BUCKETS).enumerate() {
            for (b, &w) in row.iter().enumerate() {
                l3_weights[b][i] = w;
            }
        }

        let mut l3_biases = [0f32; OUTPUT_BUCKETS];
        read_f32s(r, &mut l3_biases)?;

        let mut net = Network {
            ft_weights,
            ft_biases,
            l1_weights,
            l1_biases,
            l2_weights,
            l2_biases,
            l3_weights,
            l3_biases,
        };
        net.permute_l1();
        log::info!("network loaded ({FT_WEIGHT_COUNT} FT weights, {OUTPUT_BUCKETS} output buckets)");
        Ok(net)
    }

    /// Reorder L1 pair features for sparse-activation density. Both
    /// halves of each pair move together, and the FT weights/biases and
    /// L1 weights move in lockstep so inference is unaffected.
    fn permute_l1(&mut self) {
        let perm = &*L1_PERMUTATION;
        if perm.iter().enumerate().all(|(dst, &src)| dst == src) {
            return;
        }

        let one_bucket = INPUT_SIZE * L1_SIZE;
        for bucket in 0..INPUT_BUCKETS {
            let slab = &mut self.ft_weights.as_mut_slice()[bucket * one_bucket..][..one_bucket];
            let before = slab.to_vec();
            for feature in 0..INPUT_SIZE {
                let base = feature * L1_SIZE;
                for (dst, &src) in perm.iter().enumerate() {
                    slab[base + dst] = before[base + src];
                    slab[base + dst + L1_PAIR_COUNT] = before[base + src + L1_PAIR_COUNT];
                }
            }
        }

        let before = self.ft_biases.as_slice().to_vec();
        for (dst, &src) in perm.iter().enumerate() {
            self.ft_biases[dst] = before[src];
            self.ft_biases[dst + L1_PAIR_COUNT] = before[src + L1_PAIR_COUNT];
        }

        for bucket in 0..OUTPUT_BUCKETS {
            let before = self.l1_weights[bucket].to_vec();
            for (dst, &src) in perm.iter().enumerate() {
                for j in 0..L2_SIZE {
                    self.l1_weights[bucket][dst * L2_SIZE + j] = before[src * L2_SIZE + j];
                    self.l1_weights[bucket][(dst + L1_PAIR_COUNT) * L2_SIZE + j] =
                        before[(src + L1_PAIR_COUNT) * L2_SIZE + j];
                }
            }
        }
    }

    /// Deterministic small-weight network for tests and benches; no
    /// file needed, and every accumulator path behaves as with a real
    /// net.
    #[must_use]
    pub fn synthetic(seed: u64) -> Self {
        let mut state = seed | 1;
        let mut next = move || {
            state ^= state >> 12;
            state ^= state << 25;
            state ^= state >> 27;
            state.wrapping_mul(0x2545_F491_4F6C_DD1D)
        };

        let mut ft_weights: AlignedBuf<i16> = AlignedBuf::new_zeroed(FT_WEIGHT_COUNT);
        for w in ft_weights.as_mut_slice() {
            *w = (next() & 0x3F) as i16 - 32;
        }
        let mut ft_biases: AlignedBuf<i16> = AlignedBuf::new_zeroed(L1_SIZE);
        for b in ft_biases.as_mut_slice() {
            *b = (next() & 0x1F) as i16;
        }
        let l1_weights = (0..OUTPUT_BUCKETS)
            .map(|_| {
                (0..L1_WEIGHT_COUNT)
                    .map(|_| (next() & 0xF) as i8 - 8)
                    .collect()
            })
            .collect();
        let mut l1_biases = [[0f32; L2_SIZE]; OUTPUT_BUCKETS];
        for bucket in &mut l1_biases {
            for b in bucket.iter_mut() {
                *b = ((next() & 0xFF) as f32 - 128.0) / 1024.0;
            }
        }
        let l2_weights = (0..OUTPUT_BUCKETS)
            .map(|_| {
                (0..L2_SIZE * L3_SIZE)
                    .map(|_| ((next() & 0xFF) as f32 - 128.0) / 256.0)
                    .collect()
            })
            .collect();
        let mut l2_biases = [[0f32; L3_SIZE]; OUTPUT_BUCKETS];
        for bucket in &mut l2_biases {
            for b in bucket.iter_mut() {
                *b = ((next() & 0xFF) as f32 - 128.0) / 1024.0;
            }
        }
        let mut l3_weights = [[0f32; L3_SIZE]; OUTPUT_BUCKETS];
        for bucket in &mut l3_weights {
            for w in bucket.iter_mut() {
                *w = ((next() & 0xFF) as f32 - 128.0) / 256.0;
            }
        }
        let mut l3_biases = [0f32; OUTPUT_BUCKETS];
        for b in &mut l3_biases {
            *b = ((next() & 0xFF) as f32 - 128.0) / 1024.0;
        }

        Network {
            ft_weights,
            ft_biases,
            l1_weights,
            l1_biases,
            l2_weights,
            l2_biases,
            l3_weights,
            l3_biases,
        }
    }

    /// Handcrafted network that evaluates material plus a pinch of
    /// centralization through the real inference path. Deterministic
    /// and file-free; used by tests and benches so search behavior is
    /// meaningful without shipping a trained net.
    #[must_use]
    pub fn material_proxy() -> Self {
        // Piece worth in 1/32-pawn units, centered at 128 in the first
        // FT channel; the pair partner saturates via its bias so the
        // product stays linear in the material sum. Units are chosen
        // large enough to survive the FT_SHIFT truncation.
        fn unit_value(piece: Piece, sq: Square) -> i16 {
            let base: i16 = match piece {
                Piece::Pawn => 32,
                Piece::Knight => 96,
                Piece::Bishop => 104,
                Piece::Rook => 160,
                Piece::Queen => 288,
                Piece::King => 0,
            };
            let centrality: i16 = match piece {
                Piece::Pawn | Piece::Knight => {
                    let file = sq.file();
                    let rank = sq.rank();
                    if (3..=4).contains(&file) && (3..=4).contains(&rank) {
                        8
                    } else if (2..=5).contains(&file) && (2..=5).contains(&rank) {
                        4
                    } else {
                        0
                    }
                }
                _ => 0,
            };
            base + centrality
        }

        let mut ft_weights: AlignedBuf<i16> = AlignedBuf::new_zeroed(FT_WEIGHT_COUNT);
        {
            let slab = ft_weights.as_mut_slice();
            for bucket in 0..INPUT_BUCKETS {
                for ours in 0..2 {
                    for piece in ALL_PIECES {
                        for sq in 0..64 {
                            let feature =
                                INPUT_SIZE * bucket + ours * 384 + piece.index() * 64 + sq;
                            let u = unit_value(piece, Square::from_index(sq));
                            slab[feature * L1_SIZE] = if ours == 0 { u } else { -u };
                        }
                    }
                }
            }
        }

        let mut ft_biases: AlignedBuf<i16> = AlignedBuf::new_zeroed(L1_SIZE);
        ft_biases[0] = 128;
        // Saturated gate channel: the pair product reads c0 * 255.
        ft_biases[L1_PAIR_COUNT] = FT_QUANT as i16;

        let mut l1_weights: Vec<Box<[i8]>> = (0..OUTPUT_BUCKETS)
            .map(|_| vec![0i8; L1_WEIGHT_COUNT].into_boxed_slice())
            .collect();
        for bucket in &mut l1_weights {
            // Our half minus their half of the single live channel.
            bucket[0] = 64;
            bucket[L1_PAIR_COUNT * L2_SIZE] = -64;
        }

        let mut l1_biases = [[0f32; L2_SIZE]; OUTPUT_BUCKETS];
        for bucket in &mut l1_biases {
            bucket[0] = 0.3;
        }

        let mut l2_weights: Vec<Box<[f32]>> = (0..OUTPUT_BUCKETS)
            .map(|_| vec![0f32; L2_SIZE * L3_SIZE].into_boxed_slice())
            .collect();
        for bucket in &mut l2_weights {
            bucket[0] = 1.0;
        }
        let l2_biases = [[0f32; L3_SIZE]; OUTPUT_BUCKETS];

        let mut l3_weights = [[0f32; L3_SIZE]; OUTPUT_BUCKETS];
        for bucket in &mut l3_weights {
            bucket[0] = 1.0;
        }
        let l3_biases = [0f32; OUTPUT_BUCKETS];

        Network {
            ft_weights,
            ft_biases,
            l1_weights,
            l1_biases,
            l2_weights,
            l2_biases,
            l3_weights,
            l3_biases,
        }
    }

    #[inline]
    fn ft_weight_slice(&self, offset: u32) -> &[i16] {
        &self.ft_weights.as_slice()[offset as usize..offset as usize + L1_SIZE]
    }

    #[inline]
    pub(crate) fn ft_biases(&self) -> &[i16] {
        self.ft_biases.as_slice()
    }
}

/// Refresh-cache slot for a king on `king_sq` seen from `perspective`.
/// Mirrored king halves get distinct slots.
#[inline]
#[must_use]
pub(crate) fn cache_slot(king_sq: Square, perspective: Color) -> usize {
    let oriented = king_sq.relative_to(perspective.index());
    debug_assert!(KING_BUCKETS[oriented.index()] < BUCKET_CACHE_SLOTS);
    KING_BUCKETS[oriented.index()]
}

/// Feature offset (premultiplied by `L1_SIZE`) for one perspective.
#[inline]
#[must_use]
pub(crate) fn feature_index_single(
    piece_color: Color,
    piece: Piece,
    sq: Square,
    king_sq: Square,
    perspective: Color,
) -> u32 {
    const COLOR_STRIDE: usize = 64 * 6;
    const PIECE_STRIDE: usize = 64;

    let mut sq = sq.relative_to(perspective.index());
    let mut king = king_sq.relative_to(perspective.index());
    if king.file() > 3 {
        sq = sq.flip_file();
        king = king.flip_file();
    }

    let bucket = KING_BUCKETS[king.index()] % INPUT_BUCKETS;
    let color = piece_color.index() ^ perspective.index();
    let idx = INPUT_SIZE * bucket + color * COLOR_STRIDE + piece.index() * PIECE_STRIDE + sq.index();
    (idx * L1_SIZE) as u32
}

/// Feature offsets for both perspectives at once.
#[inline]
#[must_use]
pub(crate) fn feature_index(
    piece_color: Color,
    piece: Piece,
    sq: Square,
    white_king: Square,
    black_king: Square,
) -> (u32, u32) {
    (
        feature_index_single(piece_color, piece, sq, white_king, Color::White),
        feature_index_single(piece_color, piece, sq, black_king, Color::Black),
    )
}

/// Queue this move's accumulator deltas on the next state's slot.
/// Called by make-move before the state index advances; no network
/// access is needed, only feature arithmetic.
pub(crate) fn queue_move_updates(pos: &mut Position, mv: Move) {
    let us = pos.to_move;
    let them = us.flip();
    let from = mv.from();
    let to = mv.to();
    let our_piece = match pos.bb.piece_at(from) {
        Some(p) => p,
        None => return,
    };
    let their_piece = pos.bb.piece_at(to);
    let white_king = pos.king_sq(Color::White);
    let black_king = pos.king_sq(Color::Black);

    let ply = pos.game_ply();
    let (src, dst) = pos.accumulators.pair_mut(ply, ply + 1);

    dst.needs_refresh = src.needs_refresh;
    dst.computed = [false, false];
    dst.update[0].clear();
    dst.update[1].clear();

    let king_dest = if mv.is_castle() {
        mv.castling_king_square()
    } else {
        to
    };

    if our_piece == Piece::King
        && KING_BUCKETS[from.relative_to(us.index()).index()]
            != KING_BUCKETS[king_dest.relative_to(us.index()).index()]
    {
        // Our king crossed a bucket (or mirror) boundary: this side
        // needs a cache refresh, the opponent still updates cheaply.
        dst.needs_refresh[us.index()] = true;

        let their_king = if us == Color::White {
            black_king
        } else {
            white_king
        };
        let upd = &mut dst.update[them.index()];

        let from_ft = feature_index_single(us, our_piece, from, their_king, them);

        if mv.is_castle() {
            let rook_from = to;
            let rook_to = mv.castling_rook_square();
            let king_to = feature_index_single(us, our_piece, king_dest, their_king, them);
            let rf = feature_index_single(us, Piece::Rook, rook_from, their_king, them);
            let rt = feature_index_single(us, Piece::Rook, rook_to, their_king, them);
            upd.push_sub_sub_add_add(from_ft, rf, king_to, rt);
        } else if let Some(captured) = their_piece {
            let to_ft = feature_index_single(us, our_piece, to, their_king, them);
            let cap = feature_index_single(them, captured, to, their_king, them);
            upd.push_sub_sub_add(from_ft, cap, to_ft);
        } else if mv.is_en_passant() {
            let cap_sq = to.offset(-us.up());
            let to_ft = feature_index_single(us, our_piece, to, their_king, them);
            let cap = feature_index_single(them, Piece::Pawn, cap_sq, their_king, them);
            upd.push_sub_sub_add(from_ft, cap, to_ft);
        } else {
            let to_ft = feature_index_single(us, our_piece, to, their_king, them);
            upd.push_sub_add(from_ft, to_ft);
        }
        return;
    }

    if mv.is_castle() {
        let rook_from = to;
        let rook_to = mv.castling_rook_square();
        let (w_kfrom, b_kfrom) = feature_index(us, Piece::King, from, white_king, black_king);
        let (w_kto, b_kto) = feature_index(us, Piece::King, king_dest, white_king, black_king);
        let (w_rfrom, b_rfrom) = feature_index(us, Piece::Rook, rook_from, white_king, black_king);
        let (w_rto, b_rto) = feature_index(us, Piece::Rook, rook_to, white_king, black_king);
        dst.update[0].push_sub_sub_add_add(w_kfrom, w_rfrom, w_kto, w_rto);
        dst.update[1].push_sub_sub_add_add(b_kfrom, b_rfrom, b_kto, b_rto);
        return;
    }

    let placed = if mv.is_promotion() {
        mv.promotion_piece()
    } else {
        our_piece
    };
    let (w_from, b_from) = feature_index(us, our_piece, from, white_king, black_king);
    let (w_to, b_to) = feature_index(us, placed, to, white_king, black_king);
    dst.update[0].push_sub_add(w_from, w_to);
    dst.update[1].push_sub_add(b_from, b_to);

    if let Some(captured) = their_piece {
        let (w_cap, b_cap) = feature_index(them, captured, to, white_king, black_king);
        dst.update[0].push_sub(w_cap);
        dst.update[1].push_sub(b_cap);
    } else if mv.is_en_passant() {
        let cap_sq = to.offset(-us.up());
        let (w_cap, b_cap) = feature_index(them, Piece::Pawn, cap_sq, white_king, black_king);
        dst.update[0].push_sub(w_cap);
        dst.update[1].push_sub(b_cap);
    }
}

/// Null moves carry the accumulator forward unchanged.
pub(crate) fn queue_null_move(pos: &mut Position) {
    let ply = pos.game_ply();
    let (src, dst) = pos.accumulators.pair_mut(ply, ply + 1);
    dst.sides[0].0 = src.sides[0].0;
    dst.sides[1].0 = src.sides[1].0;
    dst.needs_refresh = src.needs_refresh;
    dst.computed = src.computed;
    dst.update[0].clear();
    dst.update[1].clear();
}

/// Apply one state's queued deltas on top of the previous accumulator.
fn update_single(net: &Network, prev: &Accumulator, curr: &mut Accumulator, perspective: Color) {
    let p = perspective.index();
    let upd = curr.update[p];

    if upd.is_empty() {
        // Null move: carry the state forward untouched.
        curr.sides[p].0 = prev.sides[p].0;
        curr.needs_refresh[p] = prev.needs_refresh[p];
        curr.computed[p] = true;
        return;
    }

    let src = &prev.sides[p].0;
    let dst = &mut curr.sides[p].0;
    match (upd.add_count, upd.sub_count) {
        (1, 1) => simd::sub_add(
            src,
            dst,
            net.ft_weight_slice(upd.subs[0]),
            net.ft_weight_slice(upd.adds[0]),
        ),
        (1, 2) => simd::sub_sub_add(
            src,
            dst,
            net.ft_weight_slice(upd.subs[0]),
            net.ft_weight_slice(upd.subs[1]),
            net.ft_weight_slice(upd.adds[0]),
        ),
        (2, 2) => simd::sub_sub_add_add(
            src,
            dst,
            net.ft_weight_slice(upd.subs[0]),
            net.ft_weight_slice(upd.subs[1]),
            net.ft_weight_slice(upd.adds[0]),
            net.ft_weight_slice(upd.adds[1]),
        ),
        _ => debug_assert!(false, "impossible update shape"),
    }
    curr.computed[p] = true;
}

/// Rebuild one perspective from the bucket cache: diff the cached board
/// against the current one and apply only the delta, then memoise the
/// result back into the cache.
pub(crate) fn refresh_accumulator_perspective(pos: &mut Position, net: &Network, perspective: Color) {
    let p = perspective.index();
    let king = pos.king_sq(perspective);
    let slot = cache_slot(king, perspective);

    let entry = pos.bucket_cache.entry_mut(slot);
    if !entry.primed[p] {
        entry.acc.sides[p].0[..].copy_from_slice(net.ft_biases());
        entry.boards[p] = CachedBoard::default();
        entry.primed[p] = true;
    }

    let side = &mut entry.acc.sides[p].0;
    for color in [Color::White, Color::Black] {
        for piece in ALL_PIECES {
            let prev = entry.boards[p].pieces[piece.index()] & entry.boards[p].colors[color.index()];
            let curr = pos.bb.pieces[piece.index()] & pos.bb.colors[color.index()];

            let mut added = curr & !prev;
            while added != 0 {
                let sq = poplsb(&mut added);
                let idx = feature_index_single(color, piece, sq, king, perspective);
                simd::add_assign(&mut side[..], net.ft_weight_slice(idx));
            }

            let mut removed = prev & !curr;
            while removed != 0 {
                let sq = poplsb(&mut removed);
                let idx = feature_index_single(color, piece, sq, king, perspective);
                simd::sub_assign(&mut side[..], net.ft_weight_slice(idx));
            }
        }
    }

    entry.boards[p].pieces = pos.bb.pieces;
    entry.boards[p].colors = pos.bb.colors;

    let cached = entry.acc.sides[p].0;
    let acc = pos.accumulators.get_mut(pos.game_ply());
    acc.sides[p].0 = cached;
    acc.needs_refresh[p] = false;
    acc.computed[p] = true;
}

/// Bring the current accumulator up to date for both perspectives:
/// walk back to the nearest computed (or refresh-flagged) state, then
/// replay updates forward.
pub(crate) fn process_updates(pos: &mut Position, net: &Network) {
    let ply = pos.game_ply();
    for perspective in [Color::White, Color::Black] {
        let p = perspective.index();
        if pos.accumulators.get(ply).computed[p] {
            continue;
        }
        if pos.accumulators.get(ply).needs_refresh[p] {
            refresh_accumulator_perspective(pos, net, perspective);
            continue;
        }

        let mut curr = ply - 1;
        while !pos.accumulators.get(curr).computed[p]
            && !pos.accumulators.get(curr).needs_refresh[p]
        {
            curr -= 1;
        }

        if pos.accumulators.get(curr).needs_refresh[p] {
            // The nearest usable ancestor itself wants a refresh;
            // rebuilding the current state directly is cheaper.
            refresh_accumulator_perspective(pos, net, perspective);
        } else {
            while curr != ply {
                let (prev, next) = pos.accumulators.pair_mut(curr, curr + 1);
                update_single(net, prev, next, perspective);
                curr += 1;
            }
        }
    }
}

/// Evaluate the position from the side to move's point of view.
pub fn evaluate(pos: &mut Position, net: &Network) -> i32 {
    process_updates(pos, net);

    let bucket = output_bucket(pos.bb.occupancy.count_ones());
    let acc = pos.accumulators.get(pos.game_ply());
    let us = &acc.sides[pos.to_move.index()].0;
    let them = &acc.sides[pos.to_move.flip().index()].0;

    forward(net, us, them, bucket)
}

fn forward(net: &Network, us: &[i16; L1_SIZE], them: &[i16; L1_SIZE], bucket: usize) -> i32 {
    let mut ft_out = [0u8; L1_SIZE];
    let mut nnz_indices = [0u16; NNZ_CHUNKS];
    let mut nnz_count = 0usize;

    // Pair activation: clamp the first half to [0, Q], the second half
    // to at most Q, multiply, shift. Negative products pack to zero.
    for (half, acc) in [us, them].into_iter().enumerate() {
        let offset = half * L1_PAIR_COUNT;
        for i in 0..L1_PAIR_COUNT {
            let c0 = i32::from(acc[i]).clamp(0, FT_QUANT);
            let c1 = i32::from(acc[i + L1_PAIR_COUNT]).min(FT_QUANT);
            let product = (c0 * c1) >> FT_SHIFT;
            ft_out[offset + i] = product.clamp(0, 255) as u8;
        }
    }

    // Record which 4-byte chunks are nonzero, eight chunks at a time
    // through the mask table.
    for group in 0..NNZ_CHUNKS / 8 {
        let mut mask = 0usize;
        for j in 0..8 {
            let c = (group * 8 + j) * L1_CHUNK_PER_32;
            let word = u32::from_le_bytes([
                ft_out[c],
                ft_out[c + 1],
                ft_out[c + 2],
                ft_out[c + 3],
            ]);
            mask |= usize::from(word != 0) << j;
        }
        let entry = &NNZ_TABLE[mask];
        for &off in entry.iter().take(mask.count_ones() as usize) {
            nnz_indices[nnz_count] = (group * 8) as u16 + off;
            nnz_count += 1;
        }
    }

    // Sparse L1: only nonzero chunks contribute.
    let l1w = &net.l1_weights[bucket];
    let mut sums = [0i32; L2_SIZE];
    for &chunk in &nnz_indices[..nnz_count] {
        let base = chunk as usize * L1_CHUNK_PER_32;
        for k in 0..L1_CHUNK_PER_32 {
            let x = i32::from(ft_out[base + k]);
            if x == 0 {
                continue;
            }
            let row = &l1w[(base + k) * L2_SIZE..][..L2_SIZE];
            for (j, &w) in row.iter().enumerate() {
                sums[j] += x * i32::from(w);
            }
        }
    }

    let mul = (1 << FT_SHIFT) as f32 / (FT_QUANT * FT_QUANT * L1_QUANT) as f32;
    let mut l1_out = [0f32; L2_SIZE];
    for j in 0..L2_SIZE {
        let v = sums[j] as f32 * mul + net.l1_biases[bucket][j];
        let c = v.clamp(0.0, 1.0);
        l1_out[j] = c * c;
    }

    let l2w = &net.l2_weights[bucket];
    let mut l2_sums = net.l2_biases[bucket];
    for (i, &x) in l1_out.iter().enumerate() {
        for j in 0..L3_SIZE {
            l2_sums[j] += x * l2w[i * L3_SIZE + j];
        }
    }
    let mut l2_out = [0f32; L3_SIZE];
    for j in 0..L3_SIZE {
        let c = l2_sums[j].clamp(0.0, 1.0);
        l2_out[j] = c * c;
    }

    let mut out = net.l3_biases[bucket];
    for (i, &x) in l2_out.iter().enumerate() {
        out += x * net.l3_weights[bucket][i];
    }

    (out * OUTPUT_SCALE as f32) as i32
}
