//! Property-based tests for the quantified invariants in spec.md §8.

pub mod cache;
pub mod result_laws;
pub mod retry;
