//! Dominion governance engine.
//!
//! Faction, territory and war registries with serialized cross-entity
//! orchestration, scheduled upkeep enforcement, and taxation. The engine
//! is a single-process in-memory authority: one owner mutates it, the
//! scheduler feeds back through the same entry points as player actions,
//! and state persists as snapshots.

pub mod config;
pub mod engine;
pub mod error;
pub mod factions;
pub mod members;
pub mod taxation;
pub mod territory;
pub mod upkeep;
pub mod wars;
pub mod zones;

pub use config::{ConfigError, EngineOptions};
pub use engine::Dominion;
pub use error::{ClaimError, FactionError, WarError};
pub use factions::FactionRegistry;
pub use members::MemberDirectory;
pub use territory::AreaRegistry;
pub use wars::WarRegistry;
pub use zones::ZoneTracker;
