use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AreaId, ContainerId, FactionId, WarId};
use crate::records::{WarEndReason, ZoneKind};

/// Why a faction was removed from the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisbandReason {
    /// Disbanded by its own leadership.
    Voluntary,
    /// Destroyed by an external ruling (admin action, conquest).
    Eliminated,
    /// The last member left the roster.
    Abandoned,
}

/// All outbound engine→observer notifications. Fully serializable.
///
/// Fire-and-forget: the engine never depends on a consumer handling these.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Notice {
    // Faction lifecycle
    FactionCreated {
        faction: FactionId,
    },
    FactionDisbanded {
        faction: FactionId,
        reason: DisbandReason,
    },
    /// Generic refresh signal for dependent caches (map render, UI).
    FactionsChanged,

    // Territory
    AreaClaimLost {
        area: AreaId,
        faction: FactionId,
    },
    /// An upkeep debit failed; the grace window is running.
    UpkeepDefaulted {
        area: AreaId,
        faction: FactionId,
        grace_until: DateTime<Utc>,
    },
    /// The grace window elapsed unpaid and the claim was removed.
    AreaEvicted {
        area: AreaId,
        faction: FactionId,
    },

    // Conflict
    WarDeclared {
        war: WarId,
        attacker: FactionId,
        defender: FactionId,
    },
    WarEnded {
        war: WarId,
        attacker: FactionId,
        defender: FactionId,
        reason: WarEndReason,
    },

    // Economy
    TaxCollected {
        faction: FactionId,
        container: Option<ContainerId>,
        amount: i64,
    },

    // Zones
    ZoneExpired {
        area: AreaId,
        kind: ZoneKind,
    },
}
