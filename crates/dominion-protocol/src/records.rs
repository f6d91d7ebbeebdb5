//! Persisted record layer.
//!
//! These structs are the snapshot format the registries serialize to and
//! restore from. Optional fields default so older snapshots keep loading.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AreaId, ContainerId, FactionId, MemberId, WarId};

/// Role a member holds within their faction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Owner,
    Manager,
    Member,
}

impl Role {
    /// Managers and the owner can administer claims and war.
    pub fn can_manage(self) -> bool {
        matches!(self, Role::Owner | Role::Manager)
    }
}

/// Persisted state of one faction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FactionRecord {
    pub id: FactionId,
    pub description: String,
    pub owner: MemberId,
    /// Member roster; always contains `owner` with `Role::Owner`.
    pub members: BTreeMap<MemberId, Role>,
    pub tax_rate: f32,
    #[serde(default)]
    pub tax_container: Option<ContainerId>,
    #[serde(default)]
    pub treasury: i64,
}

impl FactionRecord {
    pub fn has_member(&self, member: &MemberId) -> bool {
        self.members.contains_key(member)
    }

    pub fn role_of(&self, member: &MemberId) -> Option<Role> {
        self.members.get(member).copied()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

/// Persisted state of one territory cell.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AreaRecord {
    pub id: AreaId,
    #[serde(default)]
    pub owner: Option<FactionId>,
    /// Owner-assigned display name.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,
    /// Next upkeep collection deadline; set while claimed.
    #[serde(default)]
    pub upkeep_due: Option<DateTime<Utc>>,
    /// Set when an upkeep debit failed; cleared on payment or unclaim.
    #[serde(default)]
    pub default_since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub town: bool,
    #[serde(default)]
    pub badlands: bool,
    /// Labels attached by the spatial grid provider (monuments, landmarks).
    #[serde(default)]
    pub labels: Vec<String>,
}

impl AreaRecord {
    pub fn is_claimed(&self) -> bool {
        self.owner.is_some()
    }
}

/// Seed record handed over by the spatial grid provider at startup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AreaSeed {
    pub id: AreaId,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// Why a war reached a terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarEndReason {
    Surrender,
    Timeout,
    Eliminated,
}

/// One conflict between two factions. Terminal records are kept as history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WarRecord {
    pub id: WarId,
    pub attacker: FactionId,
    pub defender: FactionId,
    pub justification: String,
    pub declared_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_reason: Option<WarEndReason>,
}

impl WarRecord {
    pub fn is_active(&self) -> bool {
        self.end_reason.is_none()
    }

    pub fn involves(&self, faction: &FactionId) -> bool {
        self.attacker == *faction || self.defender == *faction
    }

    /// Wars are unique per unordered pair while active.
    pub fn is_between(&self, a: &FactionId, b: &FactionId) -> bool {
        (self.attacker == *a && self.defender == *b)
            || (self.attacker == *b && self.defender == *a)
    }
}

/// What spawned a temporary event zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneKind {
    War,
    Raid,
}

/// A temporary zone anchored to an area, removed by the scheduler on expiry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ZoneRecord {
    pub area: AreaId,
    pub kind: ZoneKind,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Full engine state for persistence and restore.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DominionSnapshot {
    #[serde(default)]
    pub factions: Vec<FactionRecord>,
    #[serde(default)]
    pub areas: Vec<AreaRecord>,
    #[serde(default)]
    pub wars: Vec<WarRecord>,
    #[serde(default)]
    pub zones: Vec<ZoneRecord>,
}
