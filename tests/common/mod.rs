//! Common test infrastructure shared across integration tests.
//!
//! This module provides:
//! - `stubs`: a tally simulation over integers and a socket that drops chosen messages
//! - `test_utils`: scenario helpers, input scripts and tracing setup
//!
//! # Usage
//!
//! From any integration test file:
//! ```ignore
//! #[path = "common/mod.rs"]
//! mod common;
//! use common::stubs::{Tally, TallyConfig};
//! use common::{init_tracing, move_then_idle};
//! ```

pub mod stubs;
pub mod test_utils;

// Not every integration binary uses every helper.
#[allow(unused_imports)]
pub use test_utils::{
    assert_converged, init_tracing, move_then_idle, top_down_inputs, IDLE_TICKS, MOVE_TICKS,
};
