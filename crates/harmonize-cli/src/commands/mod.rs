//! CLI command implementations.

pub mod check;
pub mod cohorts;
pub mod run;
