//! Aggregation modules.
//!
//! The consumer side of a fan-in run lives here.

pub mod aggregator;

pub use aggregator::*;
