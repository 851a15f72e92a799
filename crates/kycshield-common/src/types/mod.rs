//! Core types for KYCShield verification

pub mod capability;
pub mod outcome;
pub mod unified;
