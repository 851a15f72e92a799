//! Verdict policy
//!
//! Turns loosely-typed service responses into strict pass/fail signals and
//! combines them into a session-level verdict.

pub mod aggregator;
pub mod normalizer;
