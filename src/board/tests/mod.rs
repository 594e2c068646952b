//! Board and search test suite.

mod draw;
mod make_unmake;
mod nnue;
mod perft;
mod proptest;
mod repetition;
mod search;

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::board::nnue::Network;

/// One synthetic network shared by every test that evaluates; building
/// the feature transformer is the expensive part.
pub(crate) static TEST_NETWORK: Lazy<Arc<Network>> =
    Lazy::new(|| Arc::new(Network::synthetic(0x0DDBA11)));
