//! Shared vocabulary for the Dominion governance engine.
//!
//! Typed ids, the persisted record layer, and the outbound notice enum.
//! Pure data; all business logic lives in `dominion-core`.

pub mod ids;
pub mod notice;
pub mod records;

pub use ids::{AreaId, ContainerId, FactionId, MemberId, WarId};
pub use notice::{DisbandReason, Notice};
pub use records::{
    AreaRecord, AreaSeed, DominionSnapshot, FactionRecord, Role, WarEndReason, WarRecord,
    ZoneKind, ZoneRecord,
};
