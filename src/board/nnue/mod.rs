//! NNUE evaluation.
//!
//! Quantised perspective-symmetric network with:
//! - 16 king-placement input buckets (32-way table folded horizontally)
//! - 2048-wide pair-activated feature transformer in int16
//! - two small float layers and 8 material-count output buckets
//! - incremental per-perspective accumulators with a bucketed
//!   king-refresh cache, brought up to date lazily before evaluation

pub mod accumulator;
pub mod arch;
pub mod network;
pub mod simd;

pub use accumulator::{Accumulator, AccumulatorStack, BucketCache};
pub use arch::{L1_SIZE, OUTPUT_BUCKETS};
pub use network::{evaluate, Network};

pub(crate) use network::{process_updates, queue_move_updates, queue_null_move};
