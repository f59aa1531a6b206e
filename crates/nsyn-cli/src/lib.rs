//! nsyn CLI crate
//!
//! Library view of the `nsyn` binary so commands can be driven from tests.
//!
//! Commands (see [commands]):
//! - build: wire a random network of demo units across worker threads,
//!   deliver one spike per unit, optionally change the resolution and write a
//!   checkpoint (plain, or chunked and parallel into one file).
//! - inspect: summarize a checkpoint file.
//!
//! Configuration comes from `nsyn.toml` (see [config]); flags override it.

pub mod commands;
pub mod config;
pub mod demo;
pub mod error;

pub use commands::NsynCli;
