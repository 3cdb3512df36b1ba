//! Shared plumbing for the strategy binaries.

pub mod cli;
pub mod rpc;
