//! Cross-crate pipeline integration tests
//!
//! End-to-end scenarios over a seeded memory store, stage short-circuit
//! behavior, and the statistical properties of the noise mechanism.
