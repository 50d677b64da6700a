//! CLI command implementations.

pub mod config;
pub mod hash;
pub mod replay;
