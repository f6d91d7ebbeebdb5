//! Dominion host process.
//!
//! Owns a single `Dominion` engine, feeds it external commands over an
//! in-process queue, drives the enforcement sweep on its configured
//! interval, and persists snapshots.

pub mod command;
pub mod host;

pub use command::Command;
pub use host::Host;
